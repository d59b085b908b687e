//! Router Construction
//!
//! Builds pools and routers from a loaded [`MulticloudConfig`].
//!
//! Pool ids are derived from configuration so they stay stable across
//! rebuilds and never collide:
//!
//! | Pool | Id |
//! |------|----|
//! | component pool | `<provider>/<completion\|safety\|extraction>` |
//! | outer group pool | `groups/<completion\|safety\|extraction>` |
//! | instance pool of a group | `<group>/<completion\|safety\|extraction>` |
//!
//! Settings come from `[pools.<name>]` where `<name>` is the component pool
//! name for component routers, `groups` for every outer group pool, or the
//! group name for all of that group's instance pools.

use std::sync::Arc;

use thiserror::Error;

use super::component::{BackendPool, Component, ComponentRouter};
use super::endpoint::{EndpointEntry, EndpointMetadata, EndpointStatus, Pool};
use super::health::StatusMonitor;
use super::hierarchical::{HierarchicalRouter, ProviderGroup, GROUPS_POOL};
use crate::backend::{create_backend, BackendError};
use crate::config::{EndpointToml, MulticloudConfig};

/// Errors raised while building routers
#[derive(Debug, Error)]
pub enum FactoryError {
    /// A backend could not be constructed
    #[error("Failed to create backend for endpoint '{endpoint}': {source}")]
    Backend {
        /// Endpoint being built
        endpoint: String,
        /// Construction error
        source: BackendError,
    },

    /// No endpoint belongs to the requested provider
    #[error("No endpoints configured for provider '{0}'")]
    UnknownProvider(String),

    /// The configuration has no endpoints at all
    #[error("No endpoints configured")]
    NoEndpoints,
}

/// Build a pool from endpoint definitions, in the given order
///
/// # Errors
///
/// Returns [`FactoryError::Backend`] if any backend fails to build.
pub fn build_pool<'a>(
    id: impl Into<super::endpoint::PoolId>,
    endpoints: impl IntoIterator<Item = &'a EndpointToml>,
) -> Result<BackendPool, FactoryError> {
    let entries = endpoints
        .into_iter()
        .map(|endpoint| {
            let backend = create_backend(endpoint).map_err(|source| FactoryError::Backend {
                endpoint: endpoint.name.clone(),
                source,
            })?;
            let status = if endpoint.active {
                EndpointStatus::Active
            } else {
                EndpointStatus::Inactive
            };
            Ok(EndpointEntry::new(endpoint.name.clone(), backend)
                .with_metadata(EndpointMetadata {
                    priority: endpoint.priority,
                    region: endpoint.region.clone(),
                })
                .with_status(status))
        })
        .collect::<Result<Vec<_>, FactoryError>>()?;

    Ok(Pool::new(id, entries))
}

/// Build the component router for `provider`
///
/// # Errors
///
/// [`FactoryError::UnknownProvider`] if no endpoint is in the provider's
/// group, or [`FactoryError::Backend`].
pub fn build_component_router(
    config: &MulticloudConfig,
    provider: &str,
) -> Result<ComponentRouter, FactoryError> {
    if !config.endpoints.iter().any(|e| e.group == provider) {
        return Err(FactoryError::UnknownProvider(provider.to_string()));
    }

    let pool_for = |component: Component| {
        build_pool(
            format!("{provider}/{}", component.pool_name()),
            config
                .endpoints
                .iter()
                .filter(|e| e.group == provider && e.serves(component)),
        )
    };

    let mut router = ComponentRouter::new(
        pool_for(Component::Completion)?,
        pool_for(Component::SafetyCheck)?,
        pool_for(Component::Extraction)?,
    );
    for component in Component::ALL {
        router = router.with_settings(component, &config.pool_settings(component.pool_name()));
    }

    tracing::info!(
        provider,
        completion = router.pool(Component::Completion).len(),
        safety = router.pool(Component::SafetyCheck).len(),
        extraction = router.pool(Component::Extraction).len(),
        "Component router built"
    );

    Ok(router.with_monitor(Arc::new(StatusMonitor::new(config.failure_threshold))))
}

/// Build the hierarchical router over every configured group
///
/// Groups are ordered by first appearance in the endpoint list. Each group
/// gets one instance pool per component, holding the group's endpoints that
/// serve it.
///
/// # Errors
///
/// [`FactoryError::NoEndpoints`] for an empty configuration, or
/// [`FactoryError::Backend`].
pub fn build_hierarchical_router(config: &MulticloudConfig) -> Result<HierarchicalRouter, FactoryError> {
    let group_names = config.groups();
    if group_names.is_empty() {
        return Err(FactoryError::NoEndpoints);
    }

    let groups = group_names
        .iter()
        .map(|&group| {
            let pool_for = |component: Component| {
                build_pool(
                    format!("{group}/{}", component.pool_name()),
                    config
                        .endpoints
                        .iter()
                        .filter(|e| e.group == group && e.serves(component)),
                )
            };
            Ok(ProviderGroup::new(
                group,
                pool_for(Component::Completion)?,
                pool_for(Component::SafetyCheck)?,
                pool_for(Component::Extraction)?,
            ))
        })
        .collect::<Result<Vec<_>, FactoryError>>()?;

    let mut router = HierarchicalRouter::from_groups(groups)
        .with_group_settings(&config.pool_settings(GROUPS_POOL));
    for &group in &group_names {
        router = router.with_instance_settings(group, &config.pool_settings(group));
    }

    tracing::info!(
        groups = group_names.len(),
        completion = router.group_pool(Component::Completion).len(),
        safety = router.group_pool(Component::SafetyCheck).len(),
        extraction = router.group_pool(Component::Extraction).len(),
        "Hierarchical router built"
    );

    Ok(router.with_monitor(Arc::new(StatusMonitor::new(config.failure_threshold))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::CompletionRequest;
    use crate::config::PoolOverride;
    use crate::routing::capability::Capability;
    use crate::routing::policy::SelectionStrategy;
    use pretty_assertions::assert_eq;

    fn config() -> MulticloudConfig {
        let mut config = MulticloudConfig::default();
        config.endpoints = vec![
            EndpointToml::echo("azure-east", "azure")
                .with_components(vec![Component::Completion, Component::SafetyCheck]),
            EndpointToml::echo("aws-east", "aws"),
            EndpointToml::echo("azure-west", "azure").with_priority(1),
            EndpointToml::echo("azure-docs", "azure").with_components(vec![Component::Extraction]),
        ];
        config
    }

    fn names(pool: &BackendPool) -> Vec<&str> {
        pool.entries().iter().map(EndpointEntry::name).collect()
    }

    #[test]
    fn test_component_pools_filtered_by_group_and_component() {
        let router = build_component_router(&config(), "azure").unwrap();

        let completion = router.pool(Component::Completion);
        assert_eq!(completion.id().as_str(), "azure/completion");
        assert_eq!(names(completion), vec!["azure-east", "azure-west"]);
        assert_eq!(names(router.pool(Component::SafetyCheck)), vec!["azure-east"]);
        assert_eq!(names(router.pool(Component::Extraction)), vec!["azure-docs"]);
        assert_eq!(completion.find("azure-west").map(EndpointEntry::priority), Some(1));
        assert!(router.monitor().is_some());
    }

    #[test]
    fn test_unknown_provider() {
        assert!(matches!(
            build_component_router(&config(), "gcp"),
            Err(FactoryError::UnknownProvider(ref p)) if p == "gcp"
        ));
    }

    #[test]
    fn test_inactive_endpoint_starts_inactive() {
        let mut config = config();
        config.endpoints[2].active = false;
        let router = build_component_router(&config, "azure").unwrap();
        assert_eq!(router.pool(Component::Completion).active_count(), 1);
    }

    #[test]
    fn test_pool_settings_applied() {
        let mut config = config();
        config.pools.insert(
            "completion".into(),
            PoolOverride {
                strategy: Some(SelectionStrategy::PriorityOrdered),
                max_attempts: Some(4),
            },
        );
        config.pools.insert(
            "groups".into(),
            PoolOverride {
                strategy: Some(SelectionStrategy::PriorityOrdered),
                max_attempts: None,
            },
        );

        let router = build_component_router(&config, "azure").unwrap();
        let dispatcher = router.dispatcher(Component::Completion);
        assert_eq!(dispatcher.strategy(), SelectionStrategy::PriorityOrdered);
        assert_eq!(dispatcher.max_attempts(), 4);
        assert_eq!(
            router.dispatcher(Component::SafetyCheck).strategy(),
            SelectionStrategy::RoundRobin
        );

        let hierarchical = build_hierarchical_router(&config).unwrap();
        assert_eq!(
            hierarchical.group_dispatcher().strategy(),
            SelectionStrategy::PriorityOrdered
        );
    }

    #[test]
    fn test_hierarchical_groups_in_first_appearance_order() {
        let router = build_hierarchical_router(&config()).unwrap();
        assert_eq!(router.group_names().collect::<Vec<_>>(), vec!["azure", "aws"]);

        let azure = router.group("azure").unwrap();
        let completion = azure.pool(Component::Completion);
        assert_eq!(completion.id().as_str(), "azure/completion");
        assert_eq!(names(completion), vec!["azure-east", "azure-west"]);
        assert_eq!(names(azure.pool(Component::SafetyCheck)), vec!["azure-east"]);
        assert_eq!(names(azure.pool(Component::Extraction)), vec!["azure-docs"]);
        assert!(!router.group("aws").unwrap().serves(Component::Extraction));
        assert_eq!(
            router.group_pool(Component::Completion).id().as_str(),
            "groups/completion"
        );
    }

    #[tokio::test]
    async fn test_hierarchical_safety_reaches_safety_only_endpoint() {
        let mut config = MulticloudConfig::default();
        config.endpoints = vec![
            EndpointToml::echo("azure-llm", "azure"),
            EndpointToml::echo("azure-safety", "azure")
                .with_components(vec![Component::SafetyCheck]),
            EndpointToml::echo("aws-llm", "aws"),
        ];
        let router = build_hierarchical_router(&config).unwrap();

        for _ in 0..3 {
            let routed = router
                .dispatch(Capability::SafetyCheck { text: "hello" })
                .await
                .unwrap();
            assert_eq!(routed.endpoint, "azure-safety");
        }

        let request = CompletionRequest::new("q", "m");
        let served: Vec<String> = [
            router.dispatch(Capability::Completion(&request)).await.unwrap(),
            router.dispatch(Capability::Completion(&request)).await.unwrap(),
        ]
        .into_iter()
        .map(|routed| routed.endpoint)
        .collect();
        assert_eq!(served, vec!["azure-llm", "aws-llm"]);
    }

    #[test]
    fn test_hierarchical_needs_endpoints() {
        assert!(matches!(
            build_hierarchical_router(&MulticloudConfig::default()),
            Err(FactoryError::NoEndpoints)
        ));
    }
}
