//! Requirements analysis: raw notes in, structured extraction out.

use crate::context::{StepContext, session_id_field, store_err, str_field};
use crate::oracle::CompletionRequest;
use async_trait::async_trait;
use log::{info, warn};
use regex::Regex;
use scopeforge_core::Step;
use scopeforge_core::store::SessionUpdate;
use scopeforge_protocol::{StepError, StepName};
use serde_json::{Value, json};
use std::sync::Arc;

const ANALYSIS_MAX_TOKENS: u32 = 2000;

/// Extracts scope, deliverables, risks, and complexity from raw notes via
/// the completion oracle, falling back to a neutral record when the oracle
/// response is not decodable JSON.
pub struct AnalyzeRequirementsStep {
    ctx: Arc<StepContext>,
}

impl AnalyzeRequirementsStep {
    /// Create the step over shared dependencies.
    pub fn new(ctx: Arc<StepContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Step for AnalyzeRequirementsStep {
    fn name(&self) -> StepName {
        StepName::AnalyzeRequirements
    }

    async fn run(&self, payload: Value) -> Result<Value, StepError> {
        let session_id = session_id_field(&payload)?;
        let requirements = str_field(&payload, "requirements")?;
        info!(
            "analyzing requirements (session_id={}, input_len={})",
            session_id,
            requirements.len()
        );

        let response = self
            .ctx
            .oracle
            .complete(CompletionRequest {
                prompt: analysis_prompt(requirements),
                max_tokens: ANALYSIS_MAX_TOKENS,
            })
            .await
            .map_err(|err| StepError::Internal(err.to_string()))?;

        let mut analysis = match extract_json_object(&response) {
            Some(analysis) => analysis,
            None => {
                warn!(
                    "oracle response was not decodable JSON, using fallback (session_id={})",
                    session_id
                );
                fallback_analysis()
            }
        };
        if let Some(fields) = analysis.as_object_mut() {
            fields.insert(
                "raw_requirements".to_string(),
                Value::String(requirements.to_string()),
            );
        }

        self.ctx
            .store
            .update(
                session_id,
                SessionUpdate {
                    requirements_data: Some(analysis.clone()),
                    ..SessionUpdate::default()
                },
            )
            .await
            .map_err(store_err)?;

        Ok(analysis)
    }
}

fn analysis_prompt(requirements: &str) -> String {
    format!(
        "Analyze these project requirements and extract key information. \
         Return a JSON object with this structure:\n\
         {{\n\
           \"project_scope\": \"Description of what the project entails\",\n\
           \"deliverables\": [\"List of specific deliverables\"],\n\
           \"technical_requirements\": [\"List of technical needs\"],\n\
           \"timeline_estimate\": \"Estimated timeline\",\n\
           \"complexity_level\": \"Low/Medium/High\",\n\
           \"team_skills_needed\": [\"Required skills/roles\"],\n\
           \"key_risks\": [\"Potential project risks\"]\n\
         }}\n\n\
         Requirements to analyze:\n{requirements}"
    )
}

/// Parse the response as JSON, or pull the first JSON object out of
/// surrounding prose.
fn extract_json_object(text: &str) -> Option<Value> {
    if let Ok(value) = serde_json::from_str::<Value>(text)
        && value.is_object()
    {
        return Some(value);
    }
    let pattern = Regex::new(r"(?s)\{.*\}").ok()?;
    let candidate = pattern.find(text)?.as_str();
    serde_json::from_str::<Value>(candidate)
        .ok()
        .filter(Value::is_object)
}

/// Neutral analysis used when the oracle response cannot be decoded.
fn fallback_analysis() -> Value {
    json!({
        "project_scope": "Requirements analysis completed",
        "deliverables": ["Custom software solution"],
        "technical_requirements": ["To be determined"],
        "timeline_estimate": "To be estimated",
        "complexity_level": "Medium",
        "team_skills_needed": ["Software development"],
        "key_risks": ["Scope changes"],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn extract_json_object_handles_prose_wrapping() {
        let wrapped = "Here is the analysis you asked for:\n\
                       { \"complexity_level\": \"High\" }\nLet me know!";
        assert_eq!(
            extract_json_object(wrapped),
            Some(json!({ "complexity_level": "High" }))
        );

        assert_eq!(extract_json_object("no json here"), None);
        assert_eq!(extract_json_object("[1, 2, 3]"), None);
    }

    #[test]
    fn fallback_analysis_is_medium_complexity() {
        let fallback = fallback_analysis();
        assert_eq!(fallback["complexity_level"], json!("Medium"));
    }
}
