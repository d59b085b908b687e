//! Dispatch Metrics
//!
//! Lock-free counters kept by every dispatcher:
//! - Successful selections
//! - Inactive entries skipped
//! - Sweeps that found nothing active
//! - Empty-pool and attempt-ceiling failures

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Counters for one dispatcher
#[derive(Debug, Default)]
pub struct DispatchMetrics {
    selections: AtomicU64,
    inactive_skips: AtomicU64,
    exhausted_sweeps: AtomicU64,
    empty_pool: AtomicU64,
    limit_exceeded: AtomicU64,
}

impl DispatchMetrics {
    /// Create zeroed counters
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_selection(&self) {
        self.selections.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_inactive_skip(&self) {
        self.inactive_skips.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_exhausted(&self) {
        self.exhausted_sweeps.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_empty_pool(&self) {
        self.empty_pool.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_limit_exceeded(&self) {
        self.limit_exceeded.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of the counters
    pub fn snapshot(&self) -> DispatchSnapshot {
        DispatchSnapshot {
            selections: self.selections.load(Ordering::Relaxed),
            inactive_skips: self.inactive_skips.load(Ordering::Relaxed),
            exhausted_sweeps: self.exhausted_sweeps.load(Ordering::Relaxed),
            empty_pool: self.empty_pool.load(Ordering::Relaxed),
            limit_exceeded: self.limit_exceeded.load(Ordering::Relaxed),
        }
    }
}

/// Immutable copy of [`DispatchMetrics`]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct DispatchSnapshot {
    /// Selections that returned an entry
    pub selections: u64,
    /// Inactive candidates skipped
    pub inactive_skips: u64,
    /// Sweeps that ended in `NoActiveEndpoint`
    pub exhausted_sweeps: u64,
    /// Selections against an empty pool
    pub empty_pool: u64,
    /// Selections that hit the attempt ceiling
    pub limit_exceeded: u64,
}

impl DispatchSnapshot {
    /// Total selection calls, successful or not
    #[must_use]
    pub fn total_calls(&self) -> u64 {
        self.selections + self.exhausted_sweeps + self.empty_pool + self.limit_exceeded
    }

    /// Fraction of selection calls that failed (0.0 - 1.0)
    #[must_use]
    pub fn failure_rate(&self) -> f64 {
        let total = self.total_calls();
        if total == 0 {
            0.0
        } else {
            (total - self.selections) as f64 / total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_counts() {
        let metrics = DispatchMetrics::new();
        metrics.record_selection();
        metrics.record_selection();
        metrics.record_inactive_skip();
        metrics.record_exhausted();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.selections, 2);
        assert_eq!(snapshot.inactive_skips, 1);
        assert_eq!(snapshot.exhausted_sweeps, 1);
        assert_eq!(snapshot.total_calls(), 3);
        assert!((snapshot.failure_rate() - 1.0 / 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_empty_snapshot() {
        let snapshot = DispatchMetrics::new().snapshot();
        assert_eq!(snapshot, DispatchSnapshot::default());
        assert!(snapshot.failure_rate().abs() < f64::EPSILON);
    }
}
