//! Configuration schema for ScopeForge.

use serde::{Deserialize, Serialize};

/// Sentinel prefix left by provisioning tooling before the planner exists.
const PLACEHOLDER_PREFIX: &str = "PLACEHOLDER";

/// Root config for the ScopeForge service.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ForgeConfig {
    #[serde(default, rename = "$schema")]
    pub schema: Option<String>,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub objects: ObjectsConfig,
    #[serde(default)]
    pub oracle: OracleConfig,
    #[serde(default)]
    pub planner: PlannerConfig,
    #[serde(default)]
    pub workflow: WorkflowConfig,
}

impl ForgeConfig {
    /// Start building a config programmatically with defaults applied.
    pub fn builder() -> ForgeConfigBuilder {
        ForgeConfigBuilder::new()
    }
}

/// Builder for assembling a `ForgeConfig` in code.
#[derive(Debug, Default, Clone)]
pub struct ForgeConfigBuilder {
    config: ForgeConfig,
}

impl ForgeConfigBuilder {
    /// Create a new builder seeded with default config values.
    pub fn new() -> Self {
        Self {
            config: ForgeConfig::default(),
        }
    }

    /// Replace the HTTP server configuration.
    pub fn server(mut self, server: ServerConfig) -> Self {
        self.config.server = server;
        self
    }

    /// Replace the session storage configuration.
    pub fn storage(mut self, storage: StorageConfig) -> Self {
        self.config.storage = storage;
        self
    }

    /// Replace the object store configuration.
    pub fn objects(mut self, objects: ObjectsConfig) -> Self {
        self.config.objects = objects;
        self
    }

    /// Replace the completion oracle configuration.
    pub fn oracle(mut self, oracle: OracleConfig) -> Self {
        self.config.oracle = oracle;
        self
    }

    /// Replace the delegated planner configuration.
    pub fn planner(mut self, planner: PlannerConfig) -> Self {
        self.config.planner = planner;
        self
    }

    /// Replace the workflow configuration.
    pub fn workflow(mut self, workflow: WorkflowConfig) -> Self {
        self.config.workflow = workflow;
        self
    }

    /// Finalize and return the built `ForgeConfig`.
    pub fn build(self) -> ForgeConfig {
        self.config
    }
}

/// Bind address settings for the HTTP surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

/// Session record and rate sheet storage locations.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StorageConfig {
    /// Root directory for session rollouts. `None` keeps sessions in memory.
    #[serde(default)]
    pub sessions_path: Option<String>,
    /// Optional JSON rate sheet path; the seeded sheet is used when absent.
    #[serde(default)]
    pub rate_sheet_path: Option<String>,
}

/// Template and artifact object store locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectsConfig {
    /// Root directory for uploaded templates.
    #[serde(default)]
    pub templates_root: Option<String>,
    /// Root directory for generated artifacts.
    #[serde(default)]
    pub artifacts_root: Option<String>,
    /// Lifetime for signed artifact links, in seconds.
    #[serde(default = "default_signed_url_ttl_secs")]
    pub signed_url_ttl_secs: u64,
}

impl Default for ObjectsConfig {
    fn default() -> Self {
        Self {
            templates_root: None,
            artifacts_root: None,
            signed_url_ttl_secs: default_signed_url_ttl_secs(),
        }
    }
}

fn default_signed_url_ttl_secs() -> u64 {
    3600
}

/// Text-completion oracle settings used by the analysis and rendering steps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleConfig {
    /// Completion endpoint URL.
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Model identifier passed through to the provider.
    #[serde(default = "default_model_id")]
    pub model_id: String,
    /// Token budget per completion.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            model_id: default_model_id(),
            max_tokens: default_max_tokens(),
        }
    }
}

fn default_model_id() -> String {
    "claude-3-5-sonnet".to_string()
}

fn default_max_tokens() -> u32 {
    2000
}

/// Delegated planner provisioning.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PlannerConfig {
    /// Planner agent identifier.
    #[serde(default)]
    pub agent_id: Option<String>,
    /// Planner agent alias identifier.
    #[serde(default)]
    pub agent_alias_id: Option<String>,
    /// Planner invocation endpoint.
    #[serde(default)]
    pub endpoint: Option<String>,
}

impl PlannerConfig {
    /// Whether the planner identifiers are real values rather than absent,
    /// blank, or provisioning-time placeholders.
    pub fn is_provisioned(&self) -> bool {
        provisioned_value(self.agent_id.as_deref())
            && provisioned_value(self.agent_alias_id.as_deref())
    }
}

fn provisioned_value(value: Option<&str>) -> bool {
    match value {
        Some(value) => {
            let value = value.trim();
            !value.is_empty() && !value.starts_with(PLACEHOLDER_PREFIX)
        }
        None => false,
    }
}

/// Orchestration strategy selection.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStrategyKind {
    /// This service calls each step explicitly in a fixed order.
    #[default]
    Direct,
    /// A delegated planner decides step order; we observe its event stream.
    Delegated,
}

/// Workflow execution settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    #[serde(default)]
    pub strategy: WorkflowStrategyKind,
    /// Total attempts for the delegated dispatch call on throttling errors.
    #[serde(default = "default_max_dispatch_attempts")]
    pub max_dispatch_attempts: u32,
    /// Base delay for exponential dispatch backoff, in milliseconds.
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
    /// Minimum interval between event-log flushes, in milliseconds.
    #[serde(default = "default_event_flush_interval_ms")]
    pub event_flush_interval_ms: u64,
    /// Pause applied after a mid-stream throttle signal, in milliseconds.
    #[serde(default = "default_throttle_pause_ms")]
    pub throttle_pause_ms: u64,
    /// Watchdog bound on a single workflow execution, in seconds.
    #[serde(default = "default_max_workflow_secs")]
    pub max_workflow_secs: u64,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            strategy: WorkflowStrategyKind::default(),
            max_dispatch_attempts: default_max_dispatch_attempts(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            event_flush_interval_ms: default_event_flush_interval_ms(),
            throttle_pause_ms: default_throttle_pause_ms(),
            max_workflow_secs: default_max_workflow_secs(),
        }
    }
}

fn default_max_dispatch_attempts() -> u32 {
    3
}

fn default_retry_base_delay_ms() -> u64 {
    500
}

fn default_event_flush_interval_ms() -> u64 {
    1000
}

fn default_throttle_pause_ms() -> u64 {
    1000
}

fn default_max_workflow_secs() -> u64 {
    900
}
