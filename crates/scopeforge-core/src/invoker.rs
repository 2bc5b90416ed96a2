//! Uniform step invocation: a registry of named steps behind one interface.

use async_trait::async_trait;
use log::debug;
use parking_lot::RwLock;
use scopeforge_protocol::{StepError, StepName};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Interface for a single leaf transformation step.
///
/// A step receives a payload containing at minimum the session id, persists
/// its own output through the session store before returning, and hands back
/// a structured result for chaining.
#[async_trait]
pub trait Step: Send + Sync {
    /// Return the step name.
    fn name(&self) -> StepName;
    /// Execute the step with the given payload.
    async fn run(&self, payload: Value) -> Result<Value, StepError>;
}

/// Uniform interface to execute one named step.
///
/// Callers are agnostic to how the step executes; they only see the result.
#[async_trait]
pub trait StepInvoker: Send + Sync {
    /// Invoke a step by name with a payload.
    async fn invoke(&self, step: StepName, payload: Value) -> Result<Value, StepError>;
}

/// In-memory registry of step implementations.
#[derive(Default, Clone)]
pub struct StepRegistry {
    steps: Arc<RwLock<HashMap<StepName, Arc<dyn Step>>>>,
}

impl StepRegistry {
    /// Create an empty step registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a step under its name.
    pub fn register(&self, step: Arc<dyn Step>) {
        debug!("registering step (name={})", step.name());
        self.steps.write().insert(step.name(), step);
    }

    /// Fetch a step by name.
    pub fn get(&self, name: StepName) -> Option<Arc<dyn Step>> {
        self.steps.read().get(&name).cloned()
    }

    /// List all registered step names.
    pub fn list(&self) -> Vec<StepName> {
        self.steps.read().keys().copied().collect()
    }
}

#[async_trait]
impl StepInvoker for StepRegistry {
    async fn invoke(&self, step: StepName, payload: Value) -> Result<Value, StepError> {
        let Some(step_impl) = self.get(step) else {
            return Err(StepError::UnknownStep(step.as_str().to_string()));
        };
        debug!("invoking step (name={})", step);
        let result = step_impl.run(payload).await;
        match &result {
            Ok(_) => debug!("step succeeded (name={})", step),
            Err(err) => debug!("step failed (name={}, error={})", step, err),
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    struct EchoStep;

    #[async_trait]
    impl Step for EchoStep {
        fn name(&self) -> StepName {
            StepName::CalculateCost
        }

        async fn run(&self, payload: Value) -> Result<Value, StepError> {
            Ok(payload)
        }
    }

    #[tokio::test]
    async fn registry_routes_by_name() {
        let registry = StepRegistry::new();
        registry.register(Arc::new(EchoStep));

        let result = registry
            .invoke(StepName::CalculateCost, json!({ "session_id": "s" }))
            .await
            .expect("invoke");
        assert_eq!(result, json!({ "session_id": "s" }));
    }

    #[tokio::test]
    async fn unknown_step_is_a_fatal_error() {
        let registry = StepRegistry::new();
        let err = registry
            .invoke(StepName::GenerateSlides, json!({}))
            .await
            .expect_err("missing");
        match err {
            StepError::UnknownStep(ref name) => assert_eq!(name, "generate_slides"),
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(err.is_retryable(), false);
    }
}
