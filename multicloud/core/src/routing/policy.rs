//! Selection Policies
//!
//! A policy maps a pool and its cursor to the next candidate index. Policies
//! are pure: they never look at endpoint status and never touch the cursor
//! map. Skipping inactive entries is the dispatcher's job.
//!
//! # Strategies
//!
//! ```text
//! round-robin       pool order        e0 -> e1 -> e2 -> e0 ...
//! priority-ordered  priority order    p0 -> p1 -> p2 -> p0 ...
//! ```
//!
//! Priority ordering sorts by ascending priority with ties kept in pool
//! order, which gives primary/secondary failover: while the primary is
//! active every sweep reaches it first.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::endpoint::Pool;

/// Load-distribution strategy for one pool
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SelectionStrategy {
    /// Cycle through the pool in order
    #[default]
    RoundRobin,

    /// Cycle through the pool sorted by ascending priority
    #[serde(alias = "master-slave")]
    PriorityOrdered,
}

/// Error returned when a strategy name is not recognised
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unsupported selection strategy '{0}' (expected round-robin or priority-ordered)")]
pub struct UnknownStrategy(pub String);

impl SelectionStrategy {
    /// Canonical name of the strategy
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::RoundRobin => "round-robin",
            Self::PriorityOrdered => "priority-ordered",
        }
    }

    /// Next candidate for `cursor` as `(index, new_cursor)`
    ///
    /// `index` is a position in the pool's own order. A cursor that is out of
    /// range for this pool is wrapped first. Returns `None` for an empty pool.
    #[must_use]
    pub fn next_candidate<H>(self, pool: &Pool<H>, cursor: usize) -> Option<(usize, usize)> {
        let len = pool.len();
        if len == 0 {
            return None;
        }

        let position = cursor % len;
        let index = match self {
            Self::RoundRobin => position,
            Self::PriorityOrdered => *pool.priority_order().get(position)?,
        };

        Some((index, (position + 1) % len))
    }
}

impl fmt::Display for SelectionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SelectionStrategy {
    type Err = UnknownStrategy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "round-robin" => Ok(Self::RoundRobin),
            "priority-ordered" | "master-slave" => Ok(Self::PriorityOrdered),
            _ => Err(UnknownStrategy(s.to_string())),
        }
    }
}
