//! Step doubles for orchestration tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use scopeforge_core::invoker::Step;
use scopeforge_core::store::SessionStore;
use scopeforge_protocol::{SessionId, StepError, StepName};
use serde_json::Value;
use std::sync::Arc;

/// Step that returns a fixed output without side effects.
pub struct FixedStep {
    name: StepName,
    output: Value,
}

impl FixedStep {
    /// Always succeed with the given output.
    pub fn new(name: StepName, output: Value) -> Self {
        Self { name, output }
    }
}

#[async_trait]
impl Step for FixedStep {
    fn name(&self) -> StepName {
        self.name
    }

    async fn run(&self, _payload: Value) -> Result<Value, StepError> {
        Ok(self.output.clone())
    }
}

/// Step that always fails with the given error.
pub struct FailingStep {
    name: StepName,
    error: StepError,
}

impl FailingStep {
    /// Always fail with the given error.
    pub fn new(name: StepName, error: StepError) -> Self {
        Self { name, error }
    }
}

#[async_trait]
impl Step for FailingStep {
    fn name(&self) -> StepName {
        self.name
    }

    async fn run(&self, _payload: Value) -> Result<Value, StepError> {
        Err(self.error.clone())
    }
}

/// Step that records its payloads, optionally appending an artifact link the
/// way the real renderers do.
pub struct RecordingStep {
    name: StepName,
    output: Value,
    appends_url: Option<(Arc<dyn SessionStore>, String)>,
    payloads: Arc<Mutex<Vec<Value>>>,
}

impl RecordingStep {
    /// Record payloads and succeed with the given output.
    pub fn new(name: StepName, output: Value) -> Self {
        Self {
            name,
            output,
            appends_url: None,
            payloads: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Also append the given artifact link to the session on every run.
    pub fn appending_url(
        mut self,
        store: Arc<dyn SessionStore>,
        url: impl Into<String>,
    ) -> Self {
        self.appends_url = Some((store, url.into()));
        self
    }

    /// Payloads observed so far.
    pub fn payloads(&self) -> Arc<Mutex<Vec<Value>>> {
        self.payloads.clone()
    }

    /// Number of invocations observed so far.
    pub fn invocations(&self) -> usize {
        self.payloads.lock().len()
    }
}

#[async_trait]
impl Step for RecordingStep {
    fn name(&self) -> StepName {
        self.name
    }

    async fn run(&self, payload: Value) -> Result<Value, StepError> {
        self.payloads.lock().push(payload.clone());
        if let Some((store, url)) = &self.appends_url {
            let session_id = session_id_from(&payload)?;
            store
                .append_document_url(session_id, url)
                .await
                .map_err(|err| StepError::Internal(err.to_string()))?;
        }
        Ok(self.output.clone())
    }
}

fn session_id_from(payload: &Value) -> Result<SessionId, StepError> {
    payload
        .get("session_id")
        .and_then(Value::as_str)
        .and_then(|raw| raw.parse().ok())
        .ok_or_else(|| StepError::InvalidPayload("session_id missing".to_string()))
}
