//! Passive Endpoint Health
//!
//! Tracks consecutive call failures per endpoint and marks an endpoint
//! inactive once it reaches the failure threshold. Nothing here probes an
//! endpoint: the monitor only reacts to outcomes reported by the routers,
//! and an inactive endpoint stays inactive until someone calls
//! [`StatusMonitor::reactivate`].
//!
//! ```text
//! success ----------------------------> failures = 0
//! failure --> failures += 1 --(>= threshold)--> set_status(Inactive)
//! reactivate -------------------------> failures = 0, set_status(Active)
//! ```
//!
//! Entries are keyed by pool and endpoint name, because the same configured
//! endpoint can sit in several pools, each holding its own handle.

use dashmap::DashMap;

use super::endpoint::{EndpointEntry, EndpointStatus, PoolId};

/// Consecutive failures before an endpoint is taken out of rotation
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 3;

/// Consecutive-failure tracker that flips endpoint status
#[derive(Debug)]
pub struct StatusMonitor {
    failure_threshold: u32,
    failures: DashMap<(PoolId, String), u32>,
}

impl Default for StatusMonitor {
    fn default() -> Self {
        Self::new(DEFAULT_FAILURE_THRESHOLD)
    }
}

impl StatusMonitor {
    /// Create a monitor; a threshold of 0 disables deactivation
    #[must_use]
    pub fn new(failure_threshold: u32) -> Self {
        Self {
            failure_threshold,
            failures: DashMap::new(),
        }
    }

    /// Configured threshold
    pub fn failure_threshold(&self) -> u32 {
        self.failure_threshold
    }

    /// A call through `entry` succeeded
    pub fn record_success<H>(&self, pool: &PoolId, entry: &EndpointEntry<H>) {
        self.failures.remove(&key(pool, entry.name()));
    }

    /// A call through `entry` failed
    ///
    /// Returns true if this failure took the endpoint out of rotation.
    pub fn record_failure<H>(&self, pool: &PoolId, entry: &EndpointEntry<H>) -> bool {
        let count = {
            let mut failures = self.failures.entry(key(pool, entry.name())).or_insert(0);
            *failures = failures.saturating_add(1);
            *failures
        };

        if self.failure_threshold == 0 || count < self.failure_threshold {
            tracing::debug!(
                pool = %pool,
                endpoint = %entry.name(),
                consecutive_failures = count,
                "Endpoint call failed"
            );
            return false;
        }

        let previous = entry.set_status(EndpointStatus::Inactive);
        if previous.is_active() {
            tracing::warn!(
                pool = %pool,
                endpoint = %entry.name(),
                consecutive_failures = count,
                "Endpoint marked inactive"
            );
            true
        } else {
            false
        }
    }

    /// Put `entry` back into rotation and forget its failures
    pub fn reactivate<H>(&self, pool: &PoolId, entry: &EndpointEntry<H>) {
        self.failures.remove(&key(pool, entry.name()));
        if !entry.set_status(EndpointStatus::Active).is_active() {
            tracing::info!(pool = %pool, endpoint = %entry.name(), "Endpoint reactivated");
        }
    }

    /// Current consecutive failure count for an endpoint
    pub fn consecutive_failures(&self, pool: &PoolId, endpoint: &str) -> u32 {
        self.failures
            .get(&key(pool, endpoint))
            .map_or(0, |count| *count)
    }
}

fn key(pool: &PoolId, endpoint: &str) -> (PoolId, String) {
    (pool.clone(), endpoint.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_deactivates() {
        let monitor = StatusMonitor::new(2);
        let pool = PoolId::from("p");
        let entry = EndpointEntry::new("e", ());

        assert!(!monitor.record_failure(&pool, &entry));
        assert!(entry.is_active());
        assert!(monitor.record_failure(&pool, &entry));
        assert!(!entry.is_active());
        assert_eq!(monitor.consecutive_failures(&pool, "e"), 2);

        // Already inactive: not reported again
        assert!(!monitor.record_failure(&pool, &entry));
    }

    #[test]
    fn test_success_resets_count() {
        let monitor = StatusMonitor::new(2);
        let pool = PoolId::from("p");
        let entry = EndpointEntry::new("e", ());

        monitor.record_failure(&pool, &entry);
        monitor.record_success(&pool, &entry);
        monitor.record_failure(&pool, &entry);

        assert!(entry.is_active());
        assert_eq!(monitor.consecutive_failures(&pool, "e"), 1);
    }

    #[test]
    fn test_reactivate() {
        let monitor = StatusMonitor::new(1);
        let pool = PoolId::from("p");
        let entry = EndpointEntry::new("e", ());

        assert!(monitor.record_failure(&pool, &entry));
        monitor.reactivate(&pool, &entry);
        assert!(entry.is_active());
        assert_eq!(monitor.consecutive_failures(&pool, "e"), 0);
    }

    #[test]
    fn test_zero_threshold_never_deactivates() {
        let monitor = StatusMonitor::new(0);
        let pool = PoolId::from("p");
        let entry = EndpointEntry::new("e", ());
        for _ in 0..10 {
            assert!(!monitor.record_failure(&pool, &entry));
        }
        assert!(entry.is_active());
    }

    #[test]
    fn test_pools_tracked_separately() {
        let monitor = StatusMonitor::new(5);
        let completion = PoolId::from("azure/completion");
        let safety = PoolId::from("azure/safety");
        let entry = EndpointEntry::new("shared", ());

        monitor.record_failure(&completion, &entry);
        assert_eq!(monitor.consecutive_failures(&completion, "shared"), 1);
        assert_eq!(monitor.consecutive_failures(&safety, "shared"), 0);
    }
}
