//! Endpoints and Pools
//!
//! An [`EndpointEntry`] wraps one backend handle together with an
//! availability flag that a health-management collaborator flips from the
//! outside. A [`Pool`] is the fixed, ordered set of entries the dispatcher
//! cycles through, identified by a caller-supplied [`PoolId`].
//!
//! # Thread Safety
//!
//! The status flag is an atomic so health updates can land while requests
//! are being dispatched. Reads are not synchronized with any other state:
//! a dispatcher may act on a status that changes a moment later.

use std::borrow::Borrow;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

// ============================================================================
// Status and Metadata
// ============================================================================

/// Availability of an endpoint
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndpointStatus {
    /// Endpoint may be selected
    #[default]
    Active,
    /// Endpoint is skipped by every dispatcher
    Inactive,
}

impl EndpointStatus {
    /// Whether this status allows selection
    #[must_use]
    pub fn is_active(self) -> bool {
        matches!(self, Self::Active)
    }
}

impl fmt::Display for EndpointStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Inactive => write!(f, "inactive"),
        }
    }
}

/// Descriptor consulted by priority-ordered selection
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointMetadata {
    /// Lower values are preferred (0 = primary)
    pub priority: u32,
    /// Region or deployment label, informational only
    pub region: Option<String>,
}

impl EndpointMetadata {
    /// Metadata with the given priority
    #[must_use]
    pub fn with_priority(priority: u32) -> Self {
        Self {
            priority,
            region: None,
        }
    }
}

// ============================================================================
// Endpoint Entry
// ============================================================================

/// A backend handle plus its externally managed status
///
/// The entry owns the handle. Dispatchers only ever hand out shared
/// references to it.
pub struct EndpointEntry<H> {
    name: String,
    handle: H,
    metadata: Option<EndpointMetadata>,
    active: AtomicBool,
}

impl<H> EndpointEntry<H> {
    /// Create an active entry
    pub fn new(name: impl Into<String>, handle: H) -> Self {
        Self {
            name: name.into(),
            handle,
            metadata: None,
            active: AtomicBool::new(true),
        }
    }

    /// Attach selection metadata
    #[must_use]
    pub fn with_metadata(mut self, metadata: EndpointMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Shorthand for metadata carrying only a priority
    #[must_use]
    pub fn with_priority(self, priority: u32) -> Self {
        self.with_metadata(EndpointMetadata::with_priority(priority))
    }

    /// Set the initial status
    #[must_use]
    pub fn with_status(self, status: EndpointStatus) -> Self {
        self.active.store(status.is_active(), Ordering::Release);
        self
    }

    /// Endpoint name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The wrapped backend handle
    pub fn handle(&self) -> &H {
        &self.handle
    }

    /// Selection metadata, if any
    pub fn metadata(&self) -> Option<&EndpointMetadata> {
        self.metadata.as_ref()
    }

    /// Priority used by priority-ordered selection (0 when no metadata)
    pub fn priority(&self) -> u32 {
        self.metadata.as_ref().map_or(0, |m| m.priority)
    }

    /// Current status
    pub fn status(&self) -> EndpointStatus {
        if self.is_active() {
            EndpointStatus::Active
        } else {
            EndpointStatus::Inactive
        }
    }

    /// Whether the entry is currently selectable
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Update the status, returning the previous one
    ///
    /// Called by health management, never by a dispatcher.
    pub fn set_status(&self, status: EndpointStatus) -> EndpointStatus {
        let was_active = self.active.swap(status.is_active(), Ordering::AcqRel);
        if was_active != status.is_active() {
            tracing::info!(endpoint = %self.name, status = %status, "Endpoint status changed");
        }
        if was_active {
            EndpointStatus::Active
        } else {
            EndpointStatus::Inactive
        }
    }
}

impl<H> fmt::Debug for EndpointEntry<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EndpointEntry")
            .field("name", &self.name)
            .field("metadata", &self.metadata)
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Pool Identity
// ============================================================================

/// Stable identity of a pool, used to key dispatcher cursors
///
/// Two pools with the same id share a cursor, so ids must be distinct across
/// pools that are not the same logical pool.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PoolId(Arc<str>);

impl PoolId {
    /// Create a pool id
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(Arc::from(id.as_ref()))
    }

    /// The id as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PoolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for PoolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PoolId({:?})", &*self.0)
    }
}

impl From<&str> for PoolId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for PoolId {
    fn from(id: String) -> Self {
        Self(Arc::from(id))
    }
}

impl Borrow<str> for PoolId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

// ============================================================================
// Pool
// ============================================================================

/// A fixed-membership, ordered set of interchangeable endpoints
pub struct Pool<H> {
    id: PoolId,
    entries: Vec<EndpointEntry<H>>,
    /// Entry indices sorted by ascending priority, ties in original order
    priority_order: Vec<usize>,
}

impl<H> Pool<H> {
    /// Create a pool; membership is fixed from here on
    pub fn new(id: impl Into<PoolId>, entries: Vec<EndpointEntry<H>>) -> Self {
        let mut priority_order: Vec<usize> = (0..entries.len()).collect();
        // sort_by_key is stable, which keeps equal priorities in pool order
        priority_order.sort_by_key(|&i| entries[i].priority());

        Self {
            id: id.into(),
            entries,
            priority_order,
        }
    }

    /// Pool identity
    pub fn id(&self) -> &PoolId {
        &self.id
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the pool has no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry at `index`
    pub fn get(&self, index: usize) -> Option<&EndpointEntry<H>> {
        self.entries.get(index)
    }

    /// Entry with the given name
    pub fn find(&self, name: &str) -> Option<&EndpointEntry<H>> {
        self.entries.iter().find(|e| e.name() == name)
    }

    /// All entries in pool order
    pub fn entries(&self) -> &[EndpointEntry<H>] {
        &self.entries
    }

    /// Entry indices in priority order
    pub fn priority_order(&self) -> &[usize] {
        &self.priority_order
    }

    /// Number of entries currently active
    pub fn active_count(&self) -> usize {
        self.entries.iter().filter(|e| e.is_active()).count()
    }

    /// Set the status of the named entry; returns false if no such entry
    pub fn set_status(&self, name: &str, status: EndpointStatus) -> bool {
        match self.find(name) {
            Some(entry) => {
                entry.set_status(status);
                true
            }
            None => false,
        }
    }
}

impl<H> fmt::Debug for Pool<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("id", &self.id)
            .field("entries", &self.entries)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool_with_priorities(priorities: &[u32]) -> Pool<()> {
        let entries = priorities
            .iter()
            .enumerate()
            .map(|(i, &p)| EndpointEntry::new(format!("e{i}"), ()).with_priority(p))
            .collect();
        Pool::new("test", entries)
    }

    #[test]
    fn test_entry_defaults() {
        let entry = EndpointEntry::new("azure-eastus", 7_u8);
        assert_eq!(entry.name(), "azure-eastus");
        assert_eq!(*entry.handle(), 7);
        assert!(entry.is_active());
        assert_eq!(entry.priority(), 0);
        assert!(entry.metadata().is_none());
    }

    #[test]
    fn test_set_status_returns_previous() {
        let entry = EndpointEntry::new("e", ());
        assert_eq!(entry.set_status(EndpointStatus::Inactive), EndpointStatus::Active);
        assert_eq!(entry.status(), EndpointStatus::Inactive);
        assert_eq!(entry.set_status(EndpointStatus::Inactive), EndpointStatus::Inactive);
        assert_eq!(entry.set_status(EndpointStatus::Active), EndpointStatus::Inactive);
        assert!(entry.is_active());
    }

    #[test]
    fn test_with_status() {
        let entry = EndpointEntry::new("e", ()).with_status(EndpointStatus::Inactive);
        assert!(!entry.is_active());
    }

    #[test]
    fn test_priority_order_is_stable() {
        let pool = pool_with_priorities(&[2, 0, 1, 0]);
        assert_eq!(pool.priority_order(), &[1, 3, 2, 0]);
    }

    #[test]
    fn test_pool_lookup_and_status() {
        let pool = pool_with_priorities(&[0, 0, 0]);
        assert_eq!(pool.len(), 3);
        assert_eq!(pool.active_count(), 3);

        assert!(pool.set_status("e1", EndpointStatus::Inactive));
        assert!(!pool.set_status("missing", EndpointStatus::Inactive));
        assert_eq!(pool.active_count(), 2);
        assert_eq!(pool.find("e1").map(EndpointEntry::status), Some(EndpointStatus::Inactive));
    }

    #[test]
    fn test_empty_pool() {
        let pool: Pool<()> = Pool::new("empty", Vec::new());
        assert!(pool.is_empty());
        assert!(pool.priority_order().is_empty());
        assert!(pool.get(0).is_none());
    }

    #[test]
    fn test_pool_id() {
        let a = PoolId::from("azure/completion");
        let b = PoolId::new(String::from("azure/completion"));
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "azure/completion");
        assert_eq!(format!("{a:?}"), "PoolId(\"azure/completion\")");
    }
}
