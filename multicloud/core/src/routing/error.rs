//! Dispatch Errors

use thiserror::Error;

use super::endpoint::PoolId;
use crate::backend::BackendError;

/// Errors surfaced by dispatchers and routers
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The pool has no entries; needs reconfiguration, not a retry
    #[error("Pool '{pool}' has no endpoints")]
    EmptyPool {
        /// Pool that was empty
        pool: PoolId,
    },

    /// A full sweep found no active entry
    #[error("No active endpoint in pool '{pool}'")]
    NoActiveEndpoint {
        /// Pool that was swept
        pool: PoolId,
    },

    /// Selection examined more candidates than allowed
    #[error("Selection in pool '{pool}' exceeded {attempts} attempts")]
    SelectionLimitExceeded {
        /// Pool being selected from
        pool: PoolId,
        /// Configured attempt ceiling
        attempts: u32,
    },

    /// The selected endpoint's backend call failed
    #[error("Backend call to '{endpoint}' failed: {source}")]
    BackendCallFailed {
        /// Endpoint that served the call
        endpoint: String,
        /// Error reported by the backend
        source: BackendError,
    },
}

impl DispatchError {
    /// Pool the error relates to, for selection errors
    #[must_use]
    pub fn pool(&self) -> Option<&PoolId> {
        match self {
            Self::EmptyPool { pool }
            | Self::NoActiveEndpoint { pool }
            | Self::SelectionLimitExceeded { pool, .. } => Some(pool),
            Self::BackendCallFailed { .. } => None,
        }
    }

    /// Whether the caller may reasonably try again later
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::NoActiveEndpoint { .. } => true,
            Self::BackendCallFailed { source, .. } => matches!(
                source,
                BackendError::ConnectionFailed(_)
                    | BackendError::RateLimited { .. }
                    | BackendError::Timeout
            ),
            Self::EmptyPool { .. } | Self::SelectionLimitExceeded { .. } => false,
        }
    }
}
