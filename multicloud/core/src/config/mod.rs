//! Dispatch Configuration
//!
//! Pool settings, health threshold and endpoint definitions, read from
//! `~/.config/multicloud/dispatch.toml`.
//!
//! # Precedence
//!
//! Later layers win over earlier ones, listed here strongest first:
//! 1. CLI arguments (via [`ConfigOverrides`])
//! 2. Environment variables
//! 3. TOML configuration file
//! 4. Default values
//!
//! # Location
//!
//! `dirs::config_dir()` decides the base, so `$XDG_CONFIG_HOME` is honoured on Linux.
//!
//! # Example Configuration
//!
//! ```toml
//! [dispatch]
//! strategy = "round-robin"
//! max_attempts = 1000
//! provider = "azure"
//!
//! [pools.completion]
//! strategy = "priority-ordered"
//!
//! [pools.groups]
//! max_attempts = 10
//!
//! [health]
//! failure_threshold = 3
//!
//! [[endpoints]]
//! name = "azure-eastus"
//! group = "azure"
//! components = ["completion", "safety"]
//! priority = 0
//! kind = "openai"
//! base_url = "https://eastus.example.openai.azure.com/openai"
//! api_key_env = "AZURE_OPENAI_KEY"
//! model = "gpt-4o"
//!
//! [[endpoints]]
//! name = "azure-westus"
//! group = "azure"
//! priority = 1
//! ```
//!
//! # Environment Variables
//!
//! | Variable | Overrides |
//! |----------|-----------|
//! | `MULTICLOUD_STRATEGY` | `dispatch.strategy` |
//! | `MULTICLOUD_MAX_ATTEMPTS` | `dispatch.max_attempts` |
//! | `MULTICLOUD_FAILURE_THRESHOLD` | `health.failure_threshold` |
//! | `CLOUD_PROVIDER` | `dispatch.provider` |

use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::routing::{
    Component, PoolSettings, SelectionStrategy, DEFAULT_FAILURE_THRESHOLD, GROUPS_POOL,
};

/// Provider used when neither the file nor `CLOUD_PROVIDER` names one
pub const DEFAULT_PROVIDER: &str = "azure";

// =============================================================================
// Error Types
// =============================================================================

/// Configuration loading and validation failures
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Cannot read dispatch config {path}: {source}")]
    ReadError {
        /// File that could not be read
        path: PathBuf,
        /// I/O failure
        source: std::io::Error,
    },

    /// File is not valid TOML or has unknown values
    #[error("Malformed dispatch config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Values parse but cannot be used
    #[error("Invalid dispatch config: {0}")]
    ValidationError(String),
}

// =============================================================================
// Provenance
// =============================================================================

/// Strongest layer that contributed to a configuration
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Command-line flags
    Cli,
    /// Environment variables
    Env,
    /// Dispatch TOML file
    File,
    /// Built-in defaults only
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cli => f.write_str("command line"),
            Self::Env => f.write_str("environment"),
            Self::File => f.write_str("file"),
            Self::Default => f.write_str("defaults"),
        }
    }
}

// =============================================================================
// File Format
// =============================================================================

/// Dispatch section: defaults for every pool
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchToml {
    /// Default selection strategy
    pub strategy: Option<String>,

    /// Default attempt ceiling
    pub max_attempts: Option<u32>,

    /// Provider group served by the component router
    pub provider: Option<String>,
}

/// Per-pool section (`[pools.<name>]`)
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolToml {
    /// Selection strategy for this pool
    pub strategy: Option<String>,

    /// Attempt ceiling for this pool
    pub max_attempts: Option<u32>,
}

/// Health section
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthToml {
    /// Consecutive failures before an endpoint is marked inactive (0 = never)
    pub failure_threshold: Option<u32>,
}

/// How an endpoint's backend is constructed
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// In-process echo backend
    #[default]
    Echo,
    /// OpenAI-compatible HTTP API
    OpenAi,
}

/// One `[[endpoints]]` entry
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EndpointToml {
    /// Unique endpoint name
    pub name: String,

    /// Provider group the endpoint belongs to
    #[serde(default = "default_group")]
    pub group: String,

    /// Components the endpoint serves
    #[serde(default = "default_components")]
    pub components: Vec<Component>,

    /// Priority for priority-ordered pools (0 = primary)
    #[serde(default)]
    pub priority: u32,

    /// Initial status
    #[serde(default = "default_active")]
    pub active: bool,

    /// Backend implementation
    #[serde(default)]
    pub kind: BackendKind,

    /// API base URL (openai endpoints)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Environment variable holding the API key (openai endpoints)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,

    /// Model or deployment name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Region label
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,

    /// Echo endpoints only: fail every call
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub fail: bool,
}

fn default_group() -> String {
    DEFAULT_PROVIDER.to_string()
}

fn default_components() -> Vec<Component> {
    vec![Component::Completion]
}

fn default_active() -> bool {
    true
}

impl EndpointToml {
    /// An active echo endpoint in `group` serving completions
    pub fn echo(name: impl Into<String>, group: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            group: group.into(),
            components: default_components(),
            priority: 0,
            active: true,
            kind: BackendKind::Echo,
            base_url: None,
            api_key_env: None,
            model: None,
            region: None,
            fail: false,
        }
    }

    /// Set the served components
    #[must_use]
    pub fn with_components(mut self, components: Vec<Component>) -> Self {
        self.components = components;
        self
    }

    /// Set the priority
    #[must_use]
    pub fn with_priority(mut self, priority: u32) -> Self {
        self.priority = priority;
        self
    }

    /// Whether the endpoint serves `component`
    pub fn serves(&self, component: Component) -> bool {
        self.components.contains(&component)
    }
}

/// Top-level TOML configuration structure
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MulticloudToml {
    /// Dispatch defaults
    pub dispatch: DispatchToml,

    /// Per-pool sections
    pub pools: BTreeMap<String, PoolToml>,

    /// Health section
    pub health: HealthToml,

    /// Endpoint definitions
    pub endpoints: Vec<EndpointToml>,
}

// =============================================================================
// Main Configuration Struct
// =============================================================================

/// Settings explicitly given for one pool; unset fields fall back to the defaults
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct PoolOverride {
    /// Strategy for this pool
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strategy: Option<SelectionStrategy>,

    /// Attempt ceiling for this pool
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_attempts: Option<u32>,
}

/// Resolved configuration for routers and the CLI
///
/// Use [`load_config`] to load it with proper priority handling.
#[derive(Clone, Debug, Serialize)]
pub struct MulticloudConfig {
    /// Settings for pools without their own section
    pub default_settings: PoolSettings,

    /// Per-pool settings, keyed by pool name
    pub pools: BTreeMap<String, PoolOverride>,

    /// Consecutive failures before an endpoint is marked inactive
    pub failure_threshold: u32,

    /// Provider group served by the component router
    pub provider: String,

    /// Endpoint definitions in file order
    pub endpoints: Vec<EndpointToml>,

    /// File the values were read from, when one existed
    pub config_file_path: Option<PathBuf>,

    /// Strongest contributing layer
    source: ConfigSource,
}

impl Default for MulticloudConfig {
    fn default() -> Self {
        Self {
            default_settings: PoolSettings::default(),
            pools: BTreeMap::new(),
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            provider: DEFAULT_PROVIDER.to_string(),
            endpoints: Vec::new(),
            config_file_path: None,
            source: ConfigSource::Default,
        }
    }
}

impl MulticloudConfig {
    /// Built-in defaults with no endpoints
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Strongest layer that contributed
    #[must_use]
    pub fn source(&self) -> ConfigSource {
        self.source
    }

    /// Override the recorded provenance
    pub fn set_source(&mut self, source: ConfigSource) {
        self.source = source;
    }

    /// Effective settings for the pool `name`
    #[must_use]
    pub fn pool_settings(&self, name: &str) -> PoolSettings {
        let mut settings = self.default_settings;
        if let Some(pool) = self.pools.get(name) {
            if let Some(strategy) = pool.strategy {
                settings.strategy = strategy;
            }
            if let Some(max_attempts) = pool.max_attempts {
                settings.max_attempts = max_attempts;
            }
        }
        settings
    }

    /// Group names in order of first appearance
    #[must_use]
    pub fn groups(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.endpoints
            .iter()
            .map(|e| e.group.as_str())
            .filter(|group| seen.insert(*group))
            .collect()
    }

    /// Check the resolved configuration
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] for a zero attempt ceiling,
    /// an empty or duplicated endpoint name, an openai endpoint without
    /// a `base_url`, a group named like a reserved pool section, or a
    /// `[pools.<name>]` section that matches no pool.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.default_settings.validate()?;

        let groups = self.groups();
        if let Some(group) = groups.iter().find(|g| is_reserved_pool_name(g)) {
            return Err(ConfigError::ValidationError(format!(
                "group name '{group}' is reserved for the [pools.{group}] section"
            )));
        }
        for name in self.pools.keys() {
            if !is_reserved_pool_name(name) && !groups.contains(&name.as_str()) {
                return Err(ConfigError::ValidationError(format!(
                    "[pools.{name}] matches no pool (expected completion, safety, extraction, \
                     {GROUPS_POOL} or a group name)"
                )));
            }
        }

        for name in self.pools.keys() {
            self.pool_settings(name).validate().map_err(|e| {
                ConfigError::ValidationError(format!("pool '{name}': {}", strip_prefix(&e)))
            })?;
        }

        let mut names = HashSet::new();
        for endpoint in &self.endpoints {
            if endpoint.name.trim().is_empty() {
                return Err(ConfigError::ValidationError(
                    "endpoint name must not be empty".into(),
                ));
            }
            if !names.insert(endpoint.name.as_str()) {
                return Err(ConfigError::ValidationError(format!(
                    "duplicate endpoint name '{}'",
                    endpoint.name
                )));
            }
            if endpoint.kind == BackendKind::OpenAi && endpoint.base_url.is_none() {
                return Err(ConfigError::ValidationError(format!(
                    "endpoint '{}' of kind openai needs a base_url",
                    endpoint.name
                )));
            }
        }
        Ok(())
    }
}

/// Section names owned by component pools and the outer group pools
fn is_reserved_pool_name(name: &str) -> bool {
    name == GROUPS_POOL || Component::ALL.iter().any(|c| c.pool_name() == name)
}

fn strip_prefix(error: &ConfigError) -> String {
    match error {
        ConfigError::ValidationError(message) => message.clone(),
        other => other.to_string(),
    }
}

// =============================================================================
// Configuration Loading
// =============================================================================

/// `multicloud/dispatch.toml` under the platform config directory
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("multicloud").join("dispatch.toml"))
}

/// Load the dispatch configuration from its default location
///
/// # Errors
///
/// Returns an error if the config file exists but cannot be parsed, or if
/// the merged configuration is invalid. A missing config file is not an
/// error (defaults are used).
pub fn load_config() -> Result<MulticloudConfig, ConfigError> {
    load_config_from_path(default_config_path())
}

/// Load the dispatch configuration from `path`, then layer the environment on top
///
/// With `None`, or a path that does not exist, only defaults and environment
/// apply.
///
/// # Errors
///
/// Returns an error if the specified config file cannot be read or parsed,
/// or if the merged configuration is invalid.
pub fn load_config_from_path(path: Option<PathBuf>) -> Result<MulticloudConfig, ConfigError> {
    let mut config = MulticloudConfig::default();

    if let Some(file) = path.as_ref() {
        if file.exists() {
            let text = std::fs::read_to_string(file).map_err(|source| ConfigError::ReadError {
                path: file.clone(),
                source,
            })?;

            let parsed: MulticloudToml = toml::from_str(&text)?;
            apply_toml_config(&mut config, parsed)?;
            config.config_file_path = Some(file.clone());
            config.source = ConfigSource::File;

            tracing::info!(
                path = %file.display(),
                endpoints = config.endpoints.len(),
                "Dispatch config loaded"
            );
        } else {
            tracing::debug!(
                path = %file.display(),
                "No dispatch config file, using defaults"
            );
        }
    }

    apply_env_config(&mut config);
    config.validate()?;

    Ok(config)
}

fn parse_strategy(value: &str, section: &str) -> Result<SelectionStrategy, ConfigError> {
    value
        .parse()
        .map_err(|e| ConfigError::ValidationError(format!("{section}: {e}")))
}

/// Apply TOML configuration values to the config struct
fn apply_toml_config(config: &mut MulticloudConfig, toml: MulticloudToml) -> Result<(), ConfigError> {
    if let Some(ref strategy) = toml.dispatch.strategy {
        config.default_settings.strategy = parse_strategy(strategy, "dispatch.strategy")?;
    }
    if let Some(max_attempts) = toml.dispatch.max_attempts {
        config.default_settings.max_attempts = max_attempts;
    }
    if let Some(provider) = toml.dispatch.provider {
        config.provider = provider;
    }

    for (name, pool) in toml.pools {
        let strategy = pool
            .strategy
            .as_deref()
            .map(|s| parse_strategy(s, &format!("pools.{name}.strategy")))
            .transpose()?;
        config.pools.insert(
            name,
            PoolOverride {
                strategy,
                max_attempts: pool.max_attempts,
            },
        );
    }

    if let Some(threshold) = toml.health.failure_threshold {
        config.failure_threshold = threshold;
    }

    config.endpoints = toml.endpoints;
    Ok(())
}

/// Apply environment variable overrides to the config
fn apply_env_config(config: &mut MulticloudConfig) {
    apply_env_from(config, |key| std::env::var(key).ok());
}

fn apply_env_from(config: &mut MulticloudConfig, var: impl Fn(&str) -> Option<String>) {
    if let Some(strategy) = var("MULTICLOUD_STRATEGY") {
        match strategy.parse::<SelectionStrategy>() {
            Ok(strategy) => {
                config.default_settings.strategy = strategy;
                config.source = ConfigSource::Env;
            }
            Err(e) => tracing::warn!(error = %e, "Ignoring MULTICLOUD_STRATEGY"),
        }
    }
    if let Some(attempts) = var("MULTICLOUD_MAX_ATTEMPTS") {
        if let Ok(n) = attempts.parse::<u32>() {
            config.default_settings.max_attempts = n;
            config.source = ConfigSource::Env;
        }
    }
    if let Some(threshold) = var("MULTICLOUD_FAILURE_THRESHOLD") {
        if let Ok(n) = threshold.parse::<u32>() {
            config.failure_threshold = n;
            config.source = ConfigSource::Env;
        }
    }
    if let Some(provider) = var("CLOUD_PROVIDER") {
        let provider = provider.trim().to_lowercase();
        if !provider.is_empty() {
            config.provider = provider;
            config.source = ConfigSource::Env;
        }
    }
}

// =============================================================================
// Command-Line Overrides
// =============================================================================

/// Values given on the command line, applied after [`load_config`]
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    /// Default strategy override
    pub strategy: Option<SelectionStrategy>,

    /// Default attempt ceiling override
    pub max_attempts: Option<u32>,

    /// Provider override
    pub provider: Option<String>,

    /// Failure threshold override
    pub failure_threshold: Option<u32>,

    /// Endpoints to mark failing (echo endpoints only)
    pub failing_endpoints: Vec<String>,
}

impl ConfigOverrides {
    /// No overrides
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set default strategy override
    #[must_use]
    pub fn with_strategy(mut self, strategy: SelectionStrategy) -> Self {
        self.strategy = Some(strategy);
        self
    }

    /// Set attempt ceiling override
    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    /// Set provider override
    #[must_use]
    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    /// Set failure threshold override
    #[must_use]
    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = Some(threshold);
        self
    }

    /// Make the named endpoint fail every call
    #[must_use]
    pub fn with_failing_endpoint(mut self, name: impl Into<String>) -> Self {
        self.failing_endpoints.push(name.into());
        self
    }

    /// Write the overrides into `config` and re-validate it
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] if an override leaves the
    /// configuration invalid or names an unknown endpoint.
    pub fn apply(&self, config: &mut MulticloudConfig) -> Result<(), ConfigError> {
        if self.strategy.is_some()
            || self.max_attempts.is_some()
            || self.provider.is_some()
            || self.failure_threshold.is_some()
            || !self.failing_endpoints.is_empty()
        {
            config.source = ConfigSource::Cli;
        }

        if let Some(strategy) = self.strategy {
            config.default_settings.strategy = strategy;
        }
        if let Some(max_attempts) = self.max_attempts {
            config.default_settings.max_attempts = max_attempts;
        }
        if let Some(ref provider) = self.provider {
            config.provider = provider.clone();
        }
        if let Some(threshold) = self.failure_threshold {
            config.failure_threshold = threshold;
        }

        for name in &self.failing_endpoints {
            let endpoint = config
                .endpoints
                .iter_mut()
                .find(|e| &e.name == name)
                .ok_or_else(|| ConfigError::ValidationError(format!("unknown endpoint '{name}'")))?;
            endpoint.fail = true;
        }

        config.validate()
    }
}

// =============================================================================
// Tests
// =============================================================================
