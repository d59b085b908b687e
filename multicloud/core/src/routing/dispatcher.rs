//! Pool Dispatcher
//!
//! Picks one active entry from a pool per call. Keeps one cursor per
//! [`PoolId`], asks the selection strategy for the next candidate, advances
//! the cursor and skips inactive entries until it finds an active one or
//! completes a sweep.
//!
//! # Selection Flow
//!
//! ```text
//! select(pool)
//!     |
//!     +-- empty pool ------------------------------> EmptyPool
//!     |
//!     v
//! +-> lock cursor[pool.id] -> next_candidate -> advance -> unlock
//! |       |
//! |       +-- candidate active --------------------> Ok(entry)
//! |       |
//! |       +-- len(pool) candidates examined -------> reset cursor, NoActiveEndpoint
//! |       |
//! +-------+-- max_attempts examined ---------------> SelectionLimitExceeded
//! ```
//!
//! # Concurrency
//!
//! The cursor map is a `DashMap`; the read-advance-write for one pool runs
//! under that pool's shard lock and nothing else does. Status is checked
//! after the lock is released, so two concurrent callers can end up on the
//! same entry. Selection is approximately fair, not exclusive.

use dashmap::DashMap;

use super::config::PoolSettings;
use super::endpoint::{EndpointEntry, Pool, PoolId};
use super::error::DispatchError;
use super::metrics::{DispatchMetrics, DispatchSnapshot};
use super::policy::SelectionStrategy;

/// Status-aware cursor-driven selector over pools
#[derive(Debug)]
pub struct PoolDispatcher {
    strategy: SelectionStrategy,
    max_attempts: u32,
    cursors: DashMap<PoolId, usize>,
    metrics: DispatchMetrics,
}

impl Default for PoolDispatcher {
    fn default() -> Self {
        Self::new(&PoolSettings::default())
    }
}

impl PoolDispatcher {
    /// Create a dispatcher with the given settings
    #[must_use]
    pub fn new(settings: &PoolSettings) -> Self {
        Self {
            strategy: settings.strategy,
            max_attempts: settings.max_attempts,
            cursors: DashMap::new(),
            metrics: DispatchMetrics::new(),
        }
    }

    /// Round-robin dispatcher with default settings
    #[must_use]
    pub fn round_robin() -> Self {
        Self::new(&PoolSettings::new(SelectionStrategy::RoundRobin))
    }

    /// Priority-ordered dispatcher with default settings
    #[must_use]
    pub fn priority_ordered() -> Self {
        Self::new(&PoolSettings::new(SelectionStrategy::PriorityOrdered))
    }

    /// Selection strategy in use
    pub fn strategy(&self) -> SelectionStrategy {
        self.strategy
    }

    /// Attempt ceiling per selection
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Current cursor for a pool (0 if the pool was never selected from)
    pub fn cursor(&self, pool: &PoolId) -> usize {
        self.cursors.get(pool).map_or(0, |c| *c)
    }

    /// Number of pools with a cursor
    pub fn tracked_pools(&self) -> usize {
        self.cursors.len()
    }

    /// Forget the cursor of a pool so the next selection starts at 0
    pub fn reset(&self, pool: &PoolId) {
        self.cursors.remove(pool);
    }

    /// Counter snapshot
    pub fn metrics(&self) -> DispatchSnapshot {
        self.metrics.snapshot()
    }

    /// Select the next active entry of `pool`
    ///
    /// # Errors
    ///
    /// - [`DispatchError::EmptyPool`] if the pool has no entries; no cursor is touched.
    /// - [`DispatchError::NoActiveEndpoint`] if a full sweep found nothing active;
    ///   the pool's cursor is reset to 0.
    /// - [`DispatchError::SelectionLimitExceeded`] if `max_attempts` candidates were
    ///   examined before a sweep could complete.
    pub fn select<'p, H>(&self, pool: &'p Pool<H>) -> Result<&'p EndpointEntry<H>, DispatchError> {
        let len = pool.len();
        if len == 0 {
            self.metrics.record_empty_pool();
            tracing::warn!(pool = %pool.id(), "Selection attempted on empty pool");
            return Err(DispatchError::EmptyPool {
                pool: pool.id().clone(),
            });
        }

        let mut examined = 0_usize;
        for _ in 0..self.max_attempts {
            let Some(index) = self.advance(pool) else {
                break;
            };
            examined += 1;

            if let Some(entry) = pool.get(index) {
                if entry.is_active() {
                    self.metrics.record_selection();
                    tracing::trace!(
                        pool = %pool.id(),
                        endpoint = %entry.name(),
                        index,
                        "Endpoint selected"
                    );
                    return Ok(entry);
                }

                self.metrics.record_inactive_skip();
                tracing::debug!(
                    pool = %pool.id(),
                    endpoint = %entry.name(),
                    "Skipping inactive endpoint"
                );
            }

            if examined >= len {
                self.cursors.insert(pool.id().clone(), 0);
                self.metrics.record_exhausted();
                tracing::warn!(
                    pool = %pool.id(),
                    pool_size = len,
                    strategy = %self.strategy,
                    "No active endpoint found after full sweep"
                );
                return Err(DispatchError::NoActiveEndpoint {
                    pool: pool.id().clone(),
                });
            }
        }

        self.metrics.record_limit_exceeded();
        tracing::error!(
            pool = %pool.id(),
            pool_size = len,
            examined,
            max_attempts = self.max_attempts,
            "Selection attempt ceiling exceeded"
        );
        Err(DispatchError::SelectionLimitExceeded {
            pool: pool.id().clone(),
            attempts: self.max_attempts,
        })
    }

    /// Take the next candidate and advance the cursor as one step
    fn advance<H>(&self, pool: &Pool<H>) -> Option<usize> {
        let mut cursor = self.cursors.entry(pool.id().clone()).or_insert(0);
        let (index, next) = self.strategy.next_candidate(pool, *cursor)?;
        *cursor = next;
        Some(index)
    }
}
