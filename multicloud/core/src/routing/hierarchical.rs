//! Hierarchical Router
//!
//! Two dispatchers in series: the outer one picks a group (typically a cloud
//! provider), the inner one of that group picks an instance, and the
//! capability is invoked on the instance.
//!
//! ```text
//!                     +------------------------+
//! route(cap) -------> | groups/<component>     |--> "aws"
//!                     +------------------------+       |
//!                                                       v
//!               +----------------------+   +----------------------+
//!               | azure/<component>    |   | aws/<component>      |--> u2 --> cap.invoke(u2)
//!               | [e1, e2]             |   | [u1, u2, u3]         |
//!               +----------------------+   +----------------------+
//! ```
//!
//! Each group keeps one instance pool per [`Component`], and the capability's
//! component decides which one is used. The outer pool for a component only
//! lists groups that have instances for it, so a group without safety
//! endpoints is never picked for a safety check.
//!
//! Every instance pool has its own dispatcher, so exhausting one group's
//! instances leaves the cursors of the other groups alone. If no group is
//! active the call fails before any instance is selected.

use std::fmt;
use std::sync::Arc;

use super::capability::{Capability, CapabilityOutput, Routed};
use super::component::{settle_call, BackendEntry, BackendPool, Component, Lane};
use super::config::PoolSettings;
use super::dispatcher::PoolDispatcher;
use super::endpoint::{EndpointEntry, EndpointStatus, Pool};
use super::error::DispatchError;
use super::health::StatusMonitor;
use crate::backend::{CompletionRequest, CompletionResponse};

/// Prefix of the outer group pool ids and name of their `[pools.*]` section
pub const GROUPS_POOL: &str = "groups";

/// One named group with an instance pool per component
pub struct ProviderGroup {
    name: String,
    lanes: [Lane; 3],
}

impl ProviderGroup {
    /// Create a group from its three instance pools
    pub fn new(
        name: impl Into<String>,
        completion: BackendPool,
        safety: BackendPool,
        extraction: BackendPool,
    ) -> Self {
        Self {
            name: name.into(),
            lanes: [
                Lane::round_robin(completion),
                Lane::round_robin(safety),
                Lane::round_robin(extraction),
            ],
        }
    }

    /// Create a group that only serves completions and embeddings
    pub fn completion_only(name: impl Into<String>, completion: BackendPool) -> Self {
        let name = name.into();
        let empty = |component: Component| {
            Pool::new(format!("{name}/{}", component.pool_name()), Vec::new())
        };
        let safety = empty(Component::SafetyCheck);
        let extraction = empty(Component::Extraction);
        Self::new(name, completion, safety, extraction)
    }

    /// Group name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Instances serving `component`
    pub fn pool(&self, component: Component) -> &BackendPool {
        &self.lanes[component.lane()].pool
    }

    /// Dispatcher over the instances serving `component`
    pub fn dispatcher(&self, component: Component) -> &PoolDispatcher {
        &self.lanes[component.lane()].dispatcher
    }

    /// Whether the group has any instance for `component`
    pub fn serves(&self, component: Component) -> bool {
        !self.pool(component).is_empty()
    }
}

impl fmt::Debug for ProviderGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("ProviderGroup");
        s.field("name", &self.name);
        for component in Component::ALL {
            s.field(component.pool_name(), self.pool(component));
        }
        s.finish_non_exhaustive()
    }
}

/// Group-then-instance router
pub struct HierarchicalRouter {
    /// Outer pool per component; each entry's handle indexes into `groups`
    group_pools: [Pool<usize>; 3],
    group_dispatcher: PoolDispatcher,
    groups: Vec<ProviderGroup>,
    monitor: Option<Arc<StatusMonitor>>,
}

impl HierarchicalRouter {
    /// Create a router from `(group name, completion pool)` pairs
    ///
    /// The groups serve completions and embeddings only. Group order is the
    /// outer round-robin order. All dispatchers start out round-robin.
    pub fn new(groups: Vec<(String, BackendPool)>) -> Self {
        Self::from_groups(
            groups
                .into_iter()
                .map(|(name, pool)| ProviderGroup::completion_only(name, pool))
                .collect(),
        )
    }

    /// Create a router from fully populated groups, in outer order
    pub fn from_groups(groups: Vec<ProviderGroup>) -> Self {
        let outer = |component: Component| {
            let entries = groups
                .iter()
                .enumerate()
                .filter(|(_, group)| group.serves(component))
                .map(|(index, group)| EndpointEntry::new(group.name.clone(), index))
                .collect();
            Pool::new(format!("{GROUPS_POOL}/{}", component.pool_name()), entries)
        };
        let group_pools = Component::ALL.map(outer);

        Self {
            group_pools,
            group_dispatcher: PoolDispatcher::round_robin(),
            groups,
            monitor: None,
        }
    }

    /// Replace the outer (group) dispatcher
    #[must_use]
    pub fn with_group_settings(mut self, settings: &PoolSettings) -> Self {
        self.group_dispatcher = PoolDispatcher::new(settings);
        self
    }

    /// Replace every instance dispatcher of one group; unknown groups are ignored
    #[must_use]
    pub fn with_instance_settings(mut self, group: &str, settings: &PoolSettings) -> Self {
        if let Some(g) = self.groups.iter_mut().find(|g| g.name == group) {
            for lane in &mut g.lanes {
                lane.dispatcher = PoolDispatcher::new(settings);
            }
        }
        self
    }

    /// Report call outcomes to a status monitor
    #[must_use]
    pub fn with_monitor(mut self, monitor: Arc<StatusMonitor>) -> Self {
        self.monitor = Some(monitor);
        self
    }

    /// Group names in outer order
    pub fn group_names(&self) -> impl Iterator<Item = &str> {
        self.groups.iter().map(ProviderGroup::name)
    }

    /// Look up a group
    pub fn group(&self, name: &str) -> Option<&ProviderGroup> {
        self.groups.iter().find(|g| g.name == name)
    }

    /// Outer pool of the groups serving `component`
    pub fn group_pool(&self, component: Component) -> &Pool<usize> {
        &self.group_pools[component.lane()]
    }

    /// Outer dispatcher; keeps one cursor per component
    pub fn group_dispatcher(&self) -> &PoolDispatcher {
        &self.group_dispatcher
    }

    /// Take a whole group in or out of rotation; returns false for unknown groups
    pub fn set_group_status(&self, group: &str, status: EndpointStatus) -> bool {
        for pool in &self.group_pools {
            pool.set_status(group, status);
        }
        self.group(group).is_some()
    }

    /// Select a group serving `component`, then an instance within it
    ///
    /// # Errors
    ///
    /// The outer selection error if no group is available, otherwise the
    /// selected group's instance selection error.
    pub fn select_instance(
        &self,
        component: Component,
    ) -> Result<(&ProviderGroup, &BackendEntry), DispatchError> {
        let outer = self.group_pool(component);
        let group_entry = self.group_dispatcher.select(outer)?;
        let Some(group) = self.groups.get(*group_entry.handle()) else {
            // Handles are assigned from `groups` at construction
            return Err(DispatchError::EmptyPool {
                pool: outer.id().clone(),
            });
        };
        let instance = group.dispatcher(component).select(group.pool(component))?;
        tracing::trace!(
            group = %group.name,
            component = %component,
            instance = %instance.name(),
            "Instance selected"
        );
        Ok((group, instance))
    }

    /// Route a capability and report where it was served
    ///
    /// # Errors
    ///
    /// Selection errors, or [`DispatchError::BackendCallFailed`].
    pub async fn dispatch(
        &self,
        capability: Capability<'_>,
    ) -> Result<Routed<CapabilityOutput>, DispatchError> {
        let component = capability.component();
        let (group, instance) = self.select_instance(component)?;
        tracing::debug!(
            group = %group.name,
            endpoint = %instance.name(),
            capability = %capability,
            "Dispatching call"
        );
        let result = capability.invoke(&**instance.handle()).await;
        let output = settle_call(
            self.monitor.as_deref(),
            group.pool(component),
            instance,
            result,
        )?;
        Ok(Routed {
            group: Some(group.name.clone()),
            endpoint: instance.name().to_string(),
            output,
        })
    }

    /// Route a capability
    ///
    /// # Errors
    ///
    /// Selection errors, or [`DispatchError::BackendCallFailed`].
    pub async fn route(&self, capability: Capability<'_>) -> Result<CapabilityOutput, DispatchError> {
        self.dispatch(capability).await.map(|routed| routed.output)
    }

    /// Generate a completion on the next group's next instance
    ///
    /// # Errors
    ///
    /// Selection errors, or [`DispatchError::BackendCallFailed`].
    pub async fn create_completion(
        &self,
        request: &CompletionRequest,
    ) -> Result<CompletionResponse, DispatchError> {
        let (group, instance) = self.select_instance(Component::Completion)?;
        let result = instance.handle().create_completion(request).await;
        settle_call(
            self.monitor.as_deref(),
            group.pool(Component::Completion),
            instance,
            result,
        )
    }

    /// Embed `text` on the next group's next completion instance
    ///
    /// # Errors
    ///
    /// Selection errors, or [`DispatchError::BackendCallFailed`].
    pub async fn create_embedding(&self, text: &str, model: &str) -> Result<Vec<f32>, DispatchError> {
        let (group, instance) = self.select_instance(Component::Completion)?;
        let result = instance.handle().create_embedding(text, model).await;
        settle_call(
            self.monitor.as_deref(),
            group.pool(Component::Completion),
            instance,
            result,
        )
    }
}

impl fmt::Debug for HierarchicalRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HierarchicalRouter")
            .field("groups", &self.groups)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{CloudBackend, EchoBackend, SafetyVerdict};
    use crate::routing::policy::SelectionStrategy;
    use pretty_assertions::assert_eq;

    fn echo_pool(id: &str, instances: &[&str]) -> BackendPool {
        let entries = instances
            .iter()
            .map(|n| EndpointEntry::new(*n, Box::new(EchoBackend::new(*n)) as Box<dyn CloudBackend>))
            .collect();
        Pool::new(id, entries)
    }

    fn group(name: &str, instances: &[&str]) -> (String, BackendPool) {
        (name.to_string(), echo_pool(name, instances))
    }

    fn router() -> HierarchicalRouter {
        HierarchicalRouter::new(vec![group("A", &["a1", "a2"]), group("B", &["b1"])])
    }

    async fn served(router: &HierarchicalRouter, n: usize) -> Vec<(String, String)> {
        let request = CompletionRequest::new("q", "m");
        let mut out = Vec::new();
        for _ in 0..n {
            let routed = router.dispatch(Capability::Completion(&request)).await.unwrap();
            out.push((routed.group.unwrap_or_default(), routed.endpoint));
        }
        out
    }

    fn pairs(expected: &[(&str, &str)]) -> Vec<(String, String)> {
        expected
            .iter()
            .map(|(g, e)| ((*g).to_string(), (*e).to_string()))
            .collect()
    }

    #[tokio::test]
    async fn test_groups_alternate_and_instances_cycle() {
        let router = router();
        assert_eq!(
            served(&router, 6).await,
            pairs(&[
                ("A", "a1"),
                ("B", "b1"),
                ("A", "a2"),
                ("B", "b1"),
                ("A", "a1"),
                ("B", "b1"),
            ])
        );
    }

    #[tokio::test]
    async fn test_inactive_group_is_skipped() {
        let router = router();
        assert!(router.set_group_status("A", EndpointStatus::Inactive));
        assert!(!router.set_group_status("C", EndpointStatus::Inactive));

        assert_eq!(
            served(&router, 2).await,
            pairs(&[("B", "b1"), ("B", "b1")])
        );
    }

    #[tokio::test]
    async fn test_no_active_group_fails_before_instance_selection() {
        let router = router();
        router.set_group_status("A", EndpointStatus::Inactive);
        router.set_group_status("B", EndpointStatus::Inactive);

        let err = router.create_embedding("text", "ada").await.unwrap_err();
        match err {
            DispatchError::NoActiveEndpoint { pool } => {
                assert_eq!(pool.as_str(), "groups/completion");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        for name in ["A", "B"] {
            let group = router.group(name).unwrap();
            assert_eq!(group.dispatcher(Component::Completion).tracked_pools(), 0);
        }
    }

    #[tokio::test]
    async fn test_exhausted_group_leaves_other_cursors_alone() {
        let router = router();
        router
            .group("B")
            .unwrap()
            .pool(Component::Completion)
            .set_status("b1", EndpointStatus::Inactive);

        let request = CompletionRequest::new("q", "m");
        assert!(router.create_completion(&request).await.is_ok()); // A/a1
        let err = router.create_completion(&request).await.unwrap_err(); // B exhausted
        assert!(matches!(err, DispatchError::NoActiveEndpoint { ref pool } if pool.as_str() == "B"));

        let a = router.group("A").unwrap();
        let lane = Component::Completion;
        assert_eq!(a.dispatcher(lane).cursor(a.pool(lane).id()), 1);
        let response = router.create_completion(&request).await.unwrap();
        assert_eq!(response.content, "[a2] q");
    }

    #[tokio::test]
    async fn test_priority_ordered_groups() {
        let router = HierarchicalRouter::new(vec![group("A", &["a1"]), group("B", &["b1", "b2"])])
            .with_instance_settings("B", &PoolSettings::new(SelectionStrategy::PriorityOrdered))
            .with_instance_settings("missing", &PoolSettings::default());

        assert_eq!(router.group_names().collect::<Vec<_>>(), vec!["A", "B"]);
        for component in Component::ALL {
            assert_eq!(
                router.group("B").unwrap().dispatcher(component).strategy(),
                SelectionStrategy::PriorityOrdered
            );
        }
    }

    #[tokio::test]
    async fn test_capability_uses_its_component_pool() {
        let router = HierarchicalRouter::from_groups(vec![
            ProviderGroup::new(
                "azure",
                echo_pool("azure/completion", &["azure-llm"]),
                echo_pool("azure/safety", &["azure-safety"]),
                echo_pool("azure/extraction", &[]),
            ),
            ProviderGroup::completion_only("aws", echo_pool("aws/completion", &["aws-llm"])),
        ]);

        for _ in 0..3 {
            let routed = router
                .dispatch(Capability::SafetyCheck { text: "fine" })
                .await
                .unwrap();
            assert_eq!(routed.group.as_deref(), Some("azure"));
            assert_eq!(routed.endpoint, "azure-safety");
            assert_eq!(routed.output, CapabilityOutput::SafetyVerdict(SafetyVerdict::safe()));
        }

        assert_eq!(router.group_pool(Component::SafetyCheck).len(), 1);
        assert_eq!(router.group_pool(Component::Completion).len(), 2);
        assert!(!router.group("aws").unwrap().serves(Component::SafetyCheck));
    }

    #[tokio::test]
    async fn test_capability_without_any_group_fails_empty() {
        let router = router();
        let err = router
            .route(Capability::SafetyCheck { text: "fine" })
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::EmptyPool { ref pool } if pool.as_str() == "groups/safety"));
    }

    #[test]
    fn test_empty_router_reports_empty_group_pool() {
        let router = HierarchicalRouter::new(Vec::new());
        let err = router.select_instance(Component::Completion).unwrap_err();
        assert!(matches!(err, DispatchError::EmptyPool { ref pool } if pool.as_str() == "groups/completion"));
    }
}
