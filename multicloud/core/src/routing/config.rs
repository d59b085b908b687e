//! Routing Configuration
//!
//! Per-pool dispatch settings: which selection strategy to use and how many
//! candidates a single selection may examine before giving up.

use serde::{Deserialize, Serialize};

use super::policy::SelectionStrategy;
use crate::config::ConfigError;

/// Default ceiling on candidates examined by one selection
pub const DEFAULT_MAX_ATTEMPTS: u32 = 1000;

/// Dispatch settings for one pool
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolSettings {
    /// Selection strategy
    pub strategy: SelectionStrategy,

    /// Maximum candidates examined per selection
    pub max_attempts: u32,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            strategy: SelectionStrategy::RoundRobin,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl PoolSettings {
    /// Settings for the given strategy with the default attempt ceiling
    #[must_use]
    pub fn new(strategy: SelectionStrategy) -> Self {
        Self {
            strategy,
            ..Default::default()
        }
    }

    /// Set the attempt ceiling
    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Check the settings are usable
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] if `max_attempts` is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::ValidationError(
                "max_attempts must be a positive integer".into(),
            ));
        }
        Ok(())
    }
}
