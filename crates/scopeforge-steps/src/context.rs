//! Shared dependencies and payload helpers for the workflow steps.

use crate::objects::ObjectStore;
use crate::oracle::CompletionOracle;
use crate::rates::RateSheetProvider;
use scopeforge_core::store::{SessionStore, SessionStoreError};
use scopeforge_protocol::{SessionId, StepError};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// Collaborators injected into every step at construction time.
pub struct StepContext {
    /// Session record store.
    pub store: Arc<dyn SessionStore>,
    /// Text-completion oracle for the analysis step.
    pub oracle: Arc<dyn CompletionOracle>,
    /// Object store holding uploaded templates.
    pub templates: Arc<dyn ObjectStore>,
    /// Object store receiving generated artifacts.
    pub artifacts: Arc<dyn ObjectStore>,
    /// Role rate sheet for the costing step.
    pub rates: Arc<dyn RateSheetProvider>,
    /// Lifetime of signed artifact links.
    pub signed_url_ttl: Duration,
}

/// Extract the required session id from a step payload.
pub(crate) fn session_id_field(payload: &Value) -> Result<SessionId, StepError> {
    payload
        .get("session_id")
        .and_then(|value| match value {
            Value::String(raw) => raw.parse().ok(),
            _ => None,
        })
        .ok_or_else(|| StepError::InvalidPayload("session_id is required".to_string()))
}

/// Extract a required string field from a step payload.
pub(crate) fn str_field<'a>(payload: &'a Value, key: &str) -> Result<&'a str, StepError> {
    payload
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| StepError::InvalidPayload(format!("{key} is required")))
}

/// Map a store failure into the step error taxonomy. A missing session is
/// the step's own business failure, not a malformed payload.
pub(crate) fn store_err(err: SessionStoreError) -> StepError {
    match err {
        SessionStoreError::NotFound(session_id) => {
            StepError::Internal(format!("session not found: {session_id}"))
        }
        other => StepError::Internal(other.to_string()),
    }
}

impl StepContext {
    /// Store a rendered artifact, sign a link for it, and append the link to
    /// the session record.
    pub(crate) async fn publish_artifact(
        &self,
        session_id: SessionId,
        key: &str,
        content: &[u8],
    ) -> Result<String, StepError> {
        self.artifacts
            .put(key, content)
            .await
            .map_err(|err| StepError::Internal(err.to_string()))?;
        let url = self
            .artifacts
            .signed_url(key, self.signed_url_ttl)
            .map_err(|err| StepError::Internal(err.to_string()))?;
        self.store
            .append_document_url(session_id, &url)
            .await
            .map_err(store_err)?;
        Ok(url)
    }

    /// Fetch an optional template body, failing when a named template is
    /// absent from the store.
    pub(crate) async fn template_body(
        &self,
        template_path: Option<&str>,
    ) -> Result<Option<Vec<u8>>, StepError> {
        match template_path {
            Some(path) => {
                let body = self
                    .templates
                    .get(path)
                    .await
                    .map_err(|err| StepError::Internal(err.to_string()))?;
                Ok(Some(body))
            }
            None => Ok(None),
        }
    }
}
