//! Text-completion oracle boundary used by the analysis step.

use async_trait::async_trait;
use log::debug;
use serde_json::Value;
use thiserror::Error;

/// Errors returned by a completion oracle.
#[derive(Debug, Error)]
pub enum OracleError {
    /// The request could not be completed.
    #[error("oracle request failed: {0}")]
    Request(String),
    /// The provider returned a payload outside the agreed contract.
    #[error("oracle returned an unexpected payload: {0}")]
    Contract(String),
}

/// One completion request.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// Prompt text.
    pub prompt: String,
    /// Token budget for the completion.
    pub max_tokens: u32,
}

/// Opaque text-completion backend with a JSON-ish contract.
#[async_trait]
pub trait CompletionOracle: Send + Sync {
    /// Complete the prompt and return the response text.
    async fn complete(&self, request: CompletionRequest) -> Result<String, OracleError>;
}

/// HTTP completion client speaking the messages contract.
pub struct HttpCompletionOracle {
    client: reqwest::Client,
    endpoint: String,
    model_id: String,
}

impl HttpCompletionOracle {
    /// Create a client for the given endpoint and model.
    pub fn new(endpoint: impl Into<String>, model_id: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            model_id: model_id.into(),
        }
    }
}

#[async_trait]
impl CompletionOracle for HttpCompletionOracle {
    async fn complete(&self, request: CompletionRequest) -> Result<String, OracleError> {
        debug!(
            "requesting completion (model={}, prompt_len={})",
            self.model_id,
            request.prompt.len()
        );
        let response = self
            .client
            .post(&self.endpoint)
            .json(&serde_json::json!({
                "model": self.model_id,
                "max_tokens": request.max_tokens,
                "messages": [
                    { "role": "user", "content": request.prompt }
                ],
            }))
            .send()
            .await
            .map_err(|err| OracleError::Request(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(OracleError::Request(format!(
                "oracle endpoint returned {status}"
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|err| OracleError::Contract(err.to_string()))?;
        body.get("content")
            .and_then(Value::as_array)
            .and_then(|content| content.first())
            .and_then(|block| block.get("text"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| OracleError::Contract("missing content[0].text".to_string()))
    }
}

/// Oracle that returns a fixed response; used when no endpoint is
/// configured and throughout the test suites.
#[derive(Debug, Clone, Default)]
pub struct StaticOracle {
    response: String,
}

impl StaticOracle {
    /// Always respond with the given text.
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
        }
    }
}

#[async_trait]
impl CompletionOracle for StaticOracle {
    async fn complete(&self, _request: CompletionRequest) -> Result<String, OracleError> {
        Ok(self.response.clone())
    }
}
