//! JSON5 config loading and validation.

use crate::{ConfigError, ForgeConfig, WorkflowStrategyKind};
use log::{debug, info};
use serde_json::Value;
use std::fs;
use std::path::Path;

impl ForgeConfig {
    /// Load a config from a JSON5 file.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        info!("loading config from path: {}", path.as_ref().display());
        let contents = fs::read_to_string(path)?;
        Self::load_from_str(&contents)
    }

    /// Load a config from JSON5 contents.
    pub fn load_from_str(contents: &str) -> Result<Self, ConfigError> {
        debug!("loading config from raw contents (len={})", contents.len());
        let value: Value = json5::from_str(contents)?;
        let config: ForgeConfig = serde_json::from_value(value)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration invariants that cannot be expressed in serde.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workflow.max_dispatch_attempts == 0 {
            return Err(ConfigError::Invalid(
                "workflow.max_dispatch_attempts must be at least 1".to_string(),
            ));
        }
        if self.workflow.event_flush_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "workflow.event_flush_interval_ms must be non-zero".to_string(),
            ));
        }
        if self.workflow.strategy == WorkflowStrategyKind::Delegated
            && self.planner.endpoint.as_deref().is_none_or(str::is_empty)
            && self.planner.is_provisioned()
        {
            return Err(ConfigError::Invalid(
                "planner.endpoint is required when planner identifiers are set".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn loads_json5_with_comments_and_defaults() {
        let config = ForgeConfig::load_from_str(
            r#"{
                // local dev setup
                server: { port: 9090 },
                workflow: { strategy: "delegated" },
            }"#,
        )
        .expect("load");
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.workflow.strategy, WorkflowStrategyKind::Delegated);
    }

    #[test]
    fn load_from_path_round_trips() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        write!(file, r#"{{ storage: {{ sessions_path: "/tmp/sessions" }} }}"#).expect("write");
        let config = ForgeConfig::load_from_path(file.path()).expect("load");
        assert_eq!(
            config.storage.sessions_path,
            Some("/tmp/sessions".to_string())
        );
    }

    #[test]
    fn rejects_zero_dispatch_attempts() {
        let err = ForgeConfig::load_from_str(r#"{ workflow: { max_dispatch_attempts: 0 } }"#)
            .expect_err("invalid");
        assert_eq!(
            err.to_string(),
            "invalid config: workflow.max_dispatch_attempts must be at least 1"
        );
    }

    #[test]
    fn rejects_provisioned_planner_without_endpoint() {
        let err = ForgeConfig::load_from_str(
            r#"{
                workflow: { strategy: "delegated" },
                planner: { agent_id: "AGT1", agent_alias_id: "ALIAS1" },
            }"#,
        )
        .expect_err("invalid");
        assert_eq!(
            err.to_string(),
            "invalid config: planner.endpoint is required when planner identifiers are set"
        );
    }
}
