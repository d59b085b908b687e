//! Multicloud Core - Status-Aware Dispatch Across Cloud Endpoint Pools
//!
//! Routes completion, embedding, safety-check and extraction calls across
//! pools of interchangeable cloud endpoints (model deployments, regional
//! instances, whole providers). Each call selects one endpoint under a
//! load-distribution strategy, skips endpoints marked inactive, and gives up
//! explicitly when a pool has nothing left to offer.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                         Caller                               │
//! └───────────────┬─────────────────────────────┬────────────────┘
//!                 │                             │
//!      ┌──────────▼──────────┐       ┌──────────▼──────────┐
//!      │   ComponentRouter   │       │ HierarchicalRouter  │
//!      │ one pool/component  │       │  group -> instance  │
//!      └──────────┬──────────┘       └──────────┬──────────┘
//!                 └──────────────┬──────────────┘
//!                     ┌──────────▼──────────┐
//!                     │   PoolDispatcher    │
//!                     └──────────┬──────────┘
//!                     ┌──────────▼──────────┐
//!                     │    CloudBackend     │  echo / OpenAI-compatible
//!                     └─────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```ignore
//! use multicloud_core::{build_component_router, load_config, CompletionRequest};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = load_config()?;
//!     let router = build_component_router(&config, &config.provider)?;
//!
//!     let request = CompletionRequest::new("Summarise the incident report", "gpt-4o");
//!     let response = router.invoke_completion(&request).await?;
//!     println!("{}", response.content);
//!     Ok(())
//! }
//! ```
//!
//! # Module Overview
//!
//! - [`routing`]: endpoints, pools, selection strategies, dispatcher and routers
//! - [`backend`]: the capability interface and its adapters
//! - [`config`]: TOML configuration with environment and CLI overrides

#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod backend;
pub mod config;
pub mod routing;

// Backend exports
pub use backend::{
    create_backend, BackendError, CloudBackend, CompletionRequest, CompletionResponse,
    EchoBackend, ExtractedText, OpenAiBackend, SafetyVerdict,
};

// Routing exports
pub use routing::{
    build_component_router, build_hierarchical_router, Capability, CapabilityOutput, Component,
    ComponentRouter, DispatchError, DispatchSnapshot, EndpointEntry, EndpointStatus,
    FactoryError, HierarchicalRouter, Pool, PoolDispatcher, PoolId, PoolSettings, Routed,
    SelectionStrategy, StatusMonitor,
};

// Config exports
pub use config::{
    default_config_path, load_config, load_config_from_path, BackendKind, ConfigError,
    ConfigOverrides, ConfigSource, EndpointToml, MulticloudConfig, MulticloudToml,
};
