//! Multicloud CLI - Inspect and Dry-Run Endpoint Dispatch
//!
//! Loads the dispatch configuration, prints it, and simulates traffic through
//! the component or hierarchical router to show which endpoint serves each
//! call.
//!
//! # Usage
//!
//! ```bash
//! # Show the resolved configuration
//! multicloud show-config
//!
//! # Ten completions through the component router of the configured provider
//! multicloud simulate --calls 10
//!
//! # Hierarchical routing with one endpoint forced to fail
//! multicloud --config demos/dispatch.toml simulate --mode hierarchical \
//!     --calls 12 --fail aws-us-east-1
//!
//! # Verbose logging
//! RUST_LOG=multicloud_core=debug multicloud simulate --calls 4
//! ```

mod simulate;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use multicloud_core::config::{default_config_path, load_config_from_path, ConfigOverrides};
use multicloud_core::SelectionStrategy;

use simulate::{CapabilityArg, Mode, SimulateArgs};

/// Multicloud - status-aware dispatch across cloud endpoint pools
#[derive(Parser, Debug)]
#[command(name = "multicloud")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short = 'c', long, env = "MULTICLOUD_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, env = "MULTICLOUD_LOG_LEVEL", default_value = "warn")]
    log_level: String,

    /// Default selection strategy (round-robin, priority-ordered)
    #[arg(long, global = true)]
    strategy: Option<SelectionStrategy>,

    /// Default attempt ceiling per selection
    #[arg(long, global = true)]
    max_attempts: Option<u32>,

    /// Provider group for the component router
    #[arg(short = 'p', long, global = true)]
    provider: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the resolved configuration as JSON
    ShowConfig,

    /// Issue calls through a router and report where each was served
    Simulate {
        /// Router to exercise
        #[arg(short = 'm', long, value_enum, default_value_t = Mode::Component)]
        mode: Mode,

        /// Capability to call
        #[arg(short = 'k', long, value_enum, default_value_t = CapabilityArg::Completion)]
        capability: CapabilityArg,

        /// Number of calls
        #[arg(short = 'n', long, default_value_t = 10)]
        calls: usize,

        /// Calls in flight at once
        #[arg(long, default_value_t = 1)]
        concurrency: usize,

        /// Make an echo endpoint fail every call (repeatable)
        #[arg(long, value_name = "ENDPOINT")]
        fail: Vec<String>,

        /// Consecutive failures before an endpoint is taken out of rotation
        #[arg(long)]
        failure_threshold: Option<u32>,

        /// Prompt or text sent with each call
        #[arg(long, default_value = "ping")]
        prompt: String,

        /// Model or deployment name
        #[arg(long, default_value = "")]
        model: String,

        /// Document to extract (extraction only)
        #[arg(long, value_name = "PATH")]
        document: Option<PathBuf>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Initialize logging with the specified level
fn init_logging(level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!("multicloud={level},multicloud_core={level}"))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level);

    let path = args.config.clone().or_else(default_config_path);
    let mut config = load_config_from_path(path.clone()).with_context(|| match path {
        Some(ref p) => format!("Failed to load configuration from {}", p.display()),
        None => "Failed to load configuration".to_string(),
    })?;

    let mut overrides = ConfigOverrides::new();
    if let Some(strategy) = args.strategy {
        overrides = overrides.with_strategy(strategy);
    }
    if let Some(max_attempts) = args.max_attempts {
        overrides = overrides.with_max_attempts(max_attempts);
    }
    if let Some(ref provider) = args.provider {
        overrides = overrides.with_provider(provider.clone());
    }

    match args.command {
        Command::ShowConfig => {
            overrides.apply(&mut config).context("Invalid override")?;
            info!(source = %config.source(), "Configuration resolved");
            println!("# source: {}", config.source());
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        Command::Simulate {
            mode,
            capability,
            calls,
            concurrency,
            fail,
            failure_threshold,
            prompt,
            model,
            document,
            json,
        } => {
            for endpoint in fail {
                overrides = overrides.with_failing_endpoint(endpoint);
            }
            if let Some(threshold) = failure_threshold {
                overrides = overrides.with_failure_threshold(threshold);
            }
            overrides.apply(&mut config).context("Invalid override")?;

            let sim = SimulateArgs {
                mode,
                capability,
                calls,
                concurrency: concurrency.max(1),
                prompt,
                model,
                document,
            };
            let report = simulate::run(&config, &sim).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                report.print();
            }
        }
    }

    Ok(())
}
