//! Traffic simulation through the routers

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::ValueEnum;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use tracing::{debug, info};

use multicloud_core::routing::{
    Capability, CapabilityOutput, ComponentRouter, DispatchError, DispatchSnapshot,
    HierarchicalRouter, Pool, PoolDispatcher, Routed,
};
use multicloud_core::{
    build_component_router, build_hierarchical_router, Component, CompletionRequest,
    MulticloudConfig,
};

/// Router under test
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// One pool per component within the configured provider
    Component,
    /// Group first, then instance
    Hierarchical,
}

/// Capability to call
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CapabilityArg {
    /// Chat completion
    Completion,
    /// Embedding
    Embedding,
    /// Content safety check
    Safety,
    /// Document extraction
    Extraction,
}

/// Parameters of one simulation run
#[derive(Debug)]
pub struct SimulateArgs {
    pub mode: Mode,
    pub capability: CapabilityArg,
    pub calls: usize,
    pub concurrency: usize,
    pub prompt: String,
    pub model: String,
    pub document: Option<PathBuf>,
}

/// Outcome of one call
#[derive(Debug, Serialize)]
pub struct CallRecord {
    pub call: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Dispatcher counters for one pool
#[derive(Debug, Serialize)]
pub struct PoolReport {
    pub pool: String,
    pub strategy: String,
    pub active: usize,
    pub size: usize,
    pub metrics: DispatchSnapshot,
}

/// Everything a simulation produced
#[derive(Debug, Serialize)]
pub struct SimulationReport {
    pub mode: Mode,
    pub capability: CapabilityArg,
    pub calls: Vec<CallRecord>,
    pub served: BTreeMap<String, usize>,
    pub failures: usize,
    pub pools: Vec<PoolReport>,
}

impl SimulationReport {
    /// Human-readable rendering
    pub fn print(&self) {
        for record in &self.calls {
            match (&record.endpoint, &record.error) {
                (Some(endpoint), _) => match &record.group {
                    Some(group) => println!("#{:<4} {group} -> {endpoint}", record.call),
                    None => println!("#{:<4} {endpoint}", record.call),
                },
                (None, Some(error)) => println!("#{:<4} FAILED: {error}", record.call),
                (None, None) => {}
            }
        }

        println!();
        println!("Served:");
        for (endpoint, count) in &self.served {
            println!("  {endpoint:<24} {count}");
        }
        println!("  {:<24} {}", "(failed)", self.failures);

        println!();
        println!("Dispatchers:");
        for pool in &self.pools {
            let m = &pool.metrics;
            println!(
                "  {:<24} {:<16} active {}/{}  selections {}  skips {}  exhausted {}  empty {}  limit {}",
                pool.pool,
                pool.strategy,
                pool.active,
                pool.size,
                m.selections,
                m.inactive_skips,
                m.exhausted_sweeps,
                m.empty_pool,
                m.limit_exceeded,
            );
        }
    }
}

enum Router {
    Component(ComponentRouter),
    Hierarchical(HierarchicalRouter),
}

impl Router {
    async fn dispatch(
        &self,
        capability: Capability<'_>,
    ) -> Result<Routed<CapabilityOutput>, DispatchError> {
        match self {
            Self::Component(router) => router.dispatch(capability).await,
            Self::Hierarchical(router) => router.dispatch(capability).await,
        }
    }

    /// Dispatcher state of every pool that can serve `component`
    fn pool_reports(&self, component: Component) -> Vec<PoolReport> {
        match self {
            Self::Component(router) => Component::ALL
                .iter()
                .map(|&c| report(router.pool(c), router.dispatcher(c)))
                .collect(),
            Self::Hierarchical(router) => {
                let mut reports = vec![report(
                    router.group_pool(component),
                    router.group_dispatcher(),
                )];
                reports.extend(router.group_names().filter_map(|name| {
                    let group = router.group(name)?;
                    group
                        .serves(component)
                        .then(|| report(group.pool(component), group.dispatcher(component)))
                }));
                reports
            }
        }
    }
}

fn report<H>(pool: &Pool<H>, dispatcher: &PoolDispatcher) -> PoolReport {
    PoolReport {
        pool: pool.id().to_string(),
        strategy: dispatcher.strategy().to_string(),
        active: pool.active_count(),
        size: pool.len(),
        metrics: dispatcher.metrics(),
    }
}

/// Build the requested router and push `args.calls` calls through it
pub async fn run(config: &MulticloudConfig, args: &SimulateArgs) -> Result<SimulationReport> {
    if config.endpoints.is_empty() {
        bail!("No endpoints configured; add [[endpoints]] to the configuration file");
    }

    let router = match args.mode {
        Mode::Component => Router::Component(
            build_component_router(config, &config.provider)
                .with_context(|| format!("Failed to build router for '{}'", config.provider))?,
        ),
        Mode::Hierarchical => Router::Hierarchical(
            build_hierarchical_router(config).context("Failed to build hierarchical router")?,
        ),
    };

    let request = CompletionRequest::new(args.prompt.clone(), args.model.clone());
    let capability = match args.capability {
        CapabilityArg::Completion => Capability::Completion(&request),
        CapabilityArg::Embedding => Capability::Embedding {
            text: &args.prompt,
            model: &args.model,
        },
        CapabilityArg::Safety => Capability::SafetyCheck { text: &args.prompt },
        CapabilityArg::Extraction => Capability::Extraction {
            path: args
                .document
                .as_deref()
                .context("--document is required for extraction")?,
        },
    };

    info!(
        mode = ?args.mode,
        capability = %capability,
        calls = args.calls,
        concurrency = args.concurrency,
        "Starting simulation"
    );

    let router_ref = &router;
    let outcomes: Vec<(usize, Result<Routed<CapabilityOutput>, DispatchError>)> =
        stream::iter(1..=args.calls)
            .map(|call| async move { (call, router_ref.dispatch(capability).await) })
            .buffered(args.concurrency)
            .collect()
            .await;

    let mut served = BTreeMap::new();
    let mut failures = 0;
    let calls: Vec<CallRecord> = outcomes
        .into_iter()
        .map(|(call, outcome)| match outcome {
            Ok(routed) => {
                debug!(call, endpoint = %routed.endpoint, "Call served");
                *served.entry(routed.endpoint.clone()).or_insert(0) += 1;
                CallRecord {
                    call,
                    group: routed.group,
                    endpoint: Some(routed.endpoint),
                    error: None,
                }
            }
            Err(e) => {
                failures += 1;
                CallRecord {
                    call,
                    group: None,
                    endpoint: None,
                    error: Some(e.to_string()),
                }
            }
        })
        .collect();

    Ok(SimulationReport {
        mode: args.mode,
        capability: args.capability,
        calls,
        served,
        failures,
        pools: router.pool_reports(capability.component()),
    })
}
