//! Component Router
//!
//! Binds three independent pools, one per component, each with its own
//! dispatcher, and exposes one call-site per capability.
//!
//! ```text
//!                      +-------------------------------+
//! invoke_completion -> | completion pool | dispatcher  | -> backend.create_completion
//! invoke_safety_check->| safety pool     | dispatcher  | -> backend.check_safety
//! invoke_extraction -> | extraction pool | dispatcher  | -> backend.extract_document
//!                      +-------------------------------+
//! ```
//!
//! Selection failures propagate unchanged. A failed backend call is returned
//! as [`DispatchError::BackendCallFailed`] and is never retried on another
//! endpoint; only inactive endpoints are routed around.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::capability::{Capability, CapabilityOutput, Routed};
use super::config::PoolSettings;
use super::dispatcher::PoolDispatcher;
use super::endpoint::{EndpointEntry, Pool};
use super::error::DispatchError;
use super::health::StatusMonitor;
use crate::backend::{
    BackendError, CloudBackend, CompletionRequest, CompletionResponse, ExtractedText,
    SafetyVerdict,
};

/// Pool of boxed cloud backends
pub type BackendPool = Pool<Box<dyn CloudBackend>>;

/// Entry of a [`BackendPool`]
pub type BackendEntry = EndpointEntry<Box<dyn CloudBackend>>;

// ============================================================================
// Component
// ============================================================================

/// Logical component served by its own pool
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Component {
    /// Completions and embeddings
    #[serde(alias = "llm")]
    Completion,

    /// Content safety classification
    #[serde(alias = "safety", alias = "content-safety")]
    SafetyCheck,

    /// Document text extraction
    #[serde(alias = "analyser")]
    Extraction,
}

/// Error returned when a component name is not recognised
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown component '{0}' (expected completion, safety-check or extraction)")]
pub struct UnknownComponent(pub String);

impl Component {
    /// Every component, in lane order
    pub const ALL: [Self; 3] = [Self::Completion, Self::SafetyCheck, Self::Extraction];

    /// Canonical name
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Completion => "completion",
            Self::SafetyCheck => "safety-check",
            Self::Extraction => "extraction",
        }
    }

    /// Suffix used in pool ids and `[pools.<name>]` config sections
    #[must_use]
    pub fn pool_name(self) -> &'static str {
        match self {
            Self::Completion => "completion",
            Self::SafetyCheck => "safety",
            Self::Extraction => "extraction",
        }
    }

    pub(crate) fn lane(self) -> usize {
        match self {
            Self::Completion => 0,
            Self::SafetyCheck => 1,
            Self::Extraction => 2,
        }
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Component {
    type Err = UnknownComponent;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "completion" | "llm" => Ok(Self::Completion),
            "safety-check" | "safety" | "content-safety" => Ok(Self::SafetyCheck),
            "extraction" | "analyser" => Ok(Self::Extraction),
            _ => Err(UnknownComponent(s.to_string())),
        }
    }
}

// ============================================================================
// Component Router
// ============================================================================

/// One pool and the dispatcher that selects from it
pub(crate) struct Lane {
    pub(crate) pool: BackendPool,
    pub(crate) dispatcher: PoolDispatcher,
}

impl Lane {
    pub(crate) fn round_robin(pool: BackendPool) -> Self {
        Self {
            pool,
            dispatcher: PoolDispatcher::round_robin(),
        }
    }
}

/// Three independently cursored (pool, dispatcher) pairs
pub struct ComponentRouter {
    lanes: [Lane; 3],
    monitor: Option<Arc<StatusMonitor>>,
}

impl ComponentRouter {
    /// Create a router over the three pools with round-robin dispatchers
    pub fn new(completion: BackendPool, safety: BackendPool, extraction: BackendPool) -> Self {
        Self {
            lanes: [
                Lane::round_robin(completion),
                Lane::round_robin(safety),
                Lane::round_robin(extraction),
            ],
            monitor: None,
        }
    }

    /// Replace the dispatcher of one component
    ///
    /// Must be called before the router serves traffic; the component's
    /// cursor starts over.
    #[must_use]
    pub fn with_settings(mut self, component: Component, settings: &PoolSettings) -> Self {
        self.lanes[component.lane()].dispatcher = PoolDispatcher::new(settings);
        self
    }

    /// Report call outcomes to a status monitor
    #[must_use]
    pub fn with_monitor(mut self, monitor: Arc<StatusMonitor>) -> Self {
        self.monitor = Some(monitor);
        self
    }

    /// Pool serving `component`
    pub fn pool(&self, component: Component) -> &BackendPool {
        &self.lanes[component.lane()].pool
    }

    /// Dispatcher for `component`
    pub fn dispatcher(&self, component: Component) -> &PoolDispatcher {
        &self.lanes[component.lane()].dispatcher
    }

    /// Attached status monitor, if any
    pub fn monitor(&self) -> Option<&Arc<StatusMonitor>> {
        self.monitor.as_ref()
    }

    /// Select the next active endpoint for `component`
    ///
    /// # Errors
    ///
    /// Returns the dispatcher's selection error unchanged.
    pub fn select(&self, component: Component) -> Result<&BackendEntry, DispatchError> {
        let lane = &self.lanes[component.lane()];
        lane.dispatcher.select(&lane.pool)
    }

    /// Generate a completion on the next completion endpoint
    ///
    /// # Errors
    ///
    /// Selection errors, or [`DispatchError::BackendCallFailed`].
    pub async fn invoke_completion(
        &self,
        request: &CompletionRequest,
    ) -> Result<CompletionResponse, DispatchError> {
        let entry = self.select(Component::Completion)?;
        let result = entry.handle().create_completion(request).await;
        self.settle(Component::Completion, entry, result)
    }

    /// Classify `text` on the next safety endpoint
    ///
    /// # Errors
    ///
    /// Selection errors, or [`DispatchError::BackendCallFailed`].
    pub async fn invoke_safety_check(&self, text: &str) -> Result<SafetyVerdict, DispatchError> {
        let entry = self.select(Component::SafetyCheck)?;
        let result = entry.handle().check_safety(text).await;
        self.settle(Component::SafetyCheck, entry, result)
    }

    /// Extract a document on the next extraction endpoint
    ///
    /// # Errors
    ///
    /// Selection errors, or [`DispatchError::BackendCallFailed`].
    pub async fn invoke_extraction(
        &self,
        path: &std::path::Path,
    ) -> Result<ExtractedText, DispatchError> {
        let entry = self.select(Component::Extraction)?;
        let result = entry.handle().extract_document(path).await;
        self.settle(Component::Extraction, entry, result)
    }

    /// Run any capability on the pool of its component
    ///
    /// Embeddings go to the completion pool.
    ///
    /// # Errors
    ///
    /// Selection errors, or [`DispatchError::BackendCallFailed`].
    pub async fn dispatch(
        &self,
        capability: Capability<'_>,
    ) -> Result<Routed<CapabilityOutput>, DispatchError> {
        let component = capability.component();
        let entry = self.select(component)?;
        tracing::debug!(
            component = %component,
            endpoint = %entry.name(),
            capability = %capability,
            "Dispatching call"
        );
        let result = capability.invoke(&**entry.handle()).await;
        let output = self.settle(component, entry, result)?;
        Ok(Routed {
            group: None,
            endpoint: entry.name().to_string(),
            output,
        })
    }

    fn settle<T>(
        &self,
        component: Component,
        entry: &BackendEntry,
        result: Result<T, BackendError>,
    ) -> Result<T, DispatchError> {
        settle_call(self.monitor.as_deref(), self.pool(component), entry, result)
    }
}

impl fmt::Debug for ComponentRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("ComponentRouter");
        for component in Component::ALL {
            s.field(component.pool_name(), self.pool(component));
        }
        s.finish_non_exhaustive()
    }
}

/// Report the outcome of a backend call and wrap a failure
pub(crate) fn settle_call<T>(
    monitor: Option<&StatusMonitor>,
    pool: &BackendPool,
    entry: &BackendEntry,
    result: Result<T, BackendError>,
) -> Result<T, DispatchError> {
    match result {
        Ok(value) => {
            if let Some(monitor) = monitor {
                monitor.record_success(pool.id(), entry);
            }
            Ok(value)
        }
        Err(source) => {
            tracing::warn!(
                pool = %pool.id(),
                endpoint = %entry.name(),
                error = %source,
                "Backend call failed"
            );
            if let Some(monitor) = monitor {
                monitor.record_failure(pool.id(), entry);
            }
            Err(DispatchError::BackendCallFailed {
                endpoint: entry.name().to_string(),
                source,
            })
        }
    }
}
