//! Status-Aware Pool Routing
//!
//! Picks one endpoint per call from pools of interchangeable cloud endpoints,
//! skipping endpoints marked inactive, and invokes the requested capability
//! on it.
//!
//! # Architecture
//!
//! ```text
//! +---------------------+        +------------------------+
//! |  ComponentRouter    |        |  HierarchicalRouter    |
//! |  completion/safety/ |        |  groups -> instances   |
//! |  extraction lanes   |        |                        |
//! +----------+----------+        +-----------+------------+
//!            |                               |
//!            +---------------+---------------+
//!                            v
//!                 +---------------------+
//!                 |   PoolDispatcher    |  <-- cursor per PoolId, skip inactive
//!                 +----------+----------+
//!                            |
//!                            v
//!                 +---------------------+
//!                 |  SelectionStrategy  |  <-- round-robin / priority-ordered
//!                 +----------+----------+
//!                            |
//!                            v
//!                 +---------------------+
//!                 |  Pool<EndpointEntry>|  <-- status flipped by StatusMonitor
//!                 +---------------------+
//! ```
//!
//! # Design Principles
//!
//! 1. **Selection never blocks**: picking an endpoint is bounded in-memory work;
//!    only the backend call after it awaits
//! 2. **Explicit pool identity**: cursors are keyed by a caller-supplied [`PoolId`]
//! 3. **Route around inactive, not around failed**: a failed call is returned,
//!    never retried on another endpoint

pub mod capability;
pub mod component;
pub mod config;
pub mod dispatcher;
pub mod endpoint;
pub mod error;
pub mod factory;
pub mod health;
pub mod hierarchical;
pub mod metrics;
pub mod policy;

pub use capability::{Capability, CapabilityOutput, Routed};
pub use component::{BackendEntry, BackendPool, Component, ComponentRouter, UnknownComponent};
pub use config::{PoolSettings, DEFAULT_MAX_ATTEMPTS};
pub use dispatcher::PoolDispatcher;
pub use endpoint::{EndpointEntry, EndpointMetadata, EndpointStatus, Pool, PoolId};
pub use error::DispatchError;
pub use factory::{build_component_router, build_hierarchical_router, build_pool, FactoryError};
pub use health::{StatusMonitor, DEFAULT_FAILURE_THRESHOLD};
pub use hierarchical::{HierarchicalRouter, ProviderGroup, GROUPS_POOL};
pub use metrics::{DispatchMetrics, DispatchSnapshot};
pub use policy::{SelectionStrategy, UnknownStrategy};
