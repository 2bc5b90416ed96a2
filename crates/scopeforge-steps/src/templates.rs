//! Template retrieval and selection from the template object store.

use crate::context::{StepContext, session_id_field, store_err};
use crate::objects::ObjectInfo;
use async_trait::async_trait;
use log::info;
use scopeforge_core::Step;
use scopeforge_core::store::SessionUpdate;
use scopeforge_protocol::{StepError, StepName};
use serde_json::{Value, json};
use std::sync::Arc;

const SOW_PREFIX: &str = "sow-templates/";
const DECK_PREFIX: &str = "powerpoint-templates/";
const PREMIUM_COST_THRESHOLD: f64 = 100_000.0;

/// Lists available templates and selects the best fit for the project's
/// complexity and cost.
pub struct RetrieveTemplatesStep {
    ctx: Arc<StepContext>,
}

impl RetrieveTemplatesStep {
    /// Create the step over shared dependencies.
    pub fn new(ctx: Arc<StepContext>) -> Self {
        Self { ctx }
    }

    async fn list_kind(&self, prefix: &str, extension: &str) -> Result<Vec<Value>, StepError> {
        let entries = self
            .ctx
            .templates
            .list(prefix)
            .await
            .map_err(|err| StepError::Internal(err.to_string()))?;
        Ok(entries
            .iter()
            .filter(|entry| entry.key.ends_with(extension))
            .map(template_entry)
            .collect())
    }
}

#[async_trait]
impl Step for RetrieveTemplatesStep {
    fn name(&self) -> StepName {
        StepName::RetrieveTemplates
    }

    async fn run(&self, payload: Value) -> Result<Value, StepError> {
        let session_id = session_id_field(&payload)?;
        let template_type = payload
            .get("template_type")
            .and_then(Value::as_str)
            .unwrap_or("both");
        if !matches!(template_type, "sow" | "powerpoint" | "both") {
            return Err(StepError::InvalidPayload(format!(
                "unknown template_type: {template_type}"
            )));
        }
        info!(
            "retrieving templates (session_id={}, template_type={})",
            session_id, template_type
        );

        let session = self.ctx.store.get(session_id).await.map_err(store_err)?;
        let complexity = session
            .requirements_data
            .as_ref()
            .and_then(|data| data.get("complexity_level"))
            .and_then(Value::as_str)
            .unwrap_or("Medium")
            .to_string();
        let total_cost = session
            .cost_data
            .as_ref()
            .and_then(|data| data.get("total_cost"))
            .and_then(Value::as_f64)
            .unwrap_or(50_000.0);
        let premium = complexity == "High" || total_cost > PREMIUM_COST_THRESHOLD;

        let mut selection = serde_json::Map::new();
        if matches!(template_type, "sow" | "both") {
            let candidates = self.list_kind(SOW_PREFIX, ".docx").await?;
            if let Some(template) = select_template(&candidates, premium, "enterprise") {
                selection.insert("sow".to_string(), template);
            }
        }
        if matches!(template_type, "powerpoint" | "both") {
            let candidates = self.list_kind(DECK_PREFIX, ".pptx").await?;
            if let Some(template) = select_template(&candidates, premium, "detailed") {
                selection.insert("powerpoint".to_string(), template);
            }
        }
        let selection = Value::Object(selection);

        self.ctx
            .store
            .update(
                session_id,
                SessionUpdate {
                    template_selection: Some(selection.clone()),
                    ..SessionUpdate::default()
                },
            )
            .await
            .map_err(store_err)?;

        Ok(selection)
    }
}

fn template_entry(entry: &ObjectInfo) -> Value {
    let name = entry
        .key
        .rsplit('/')
        .next()
        .and_then(|file| file.rsplit_once('.'))
        .map(|(stem, _)| stem.to_string())
        .unwrap_or_else(|| entry.key.clone());
    json!({
        "name": name,
        "key": entry.key,
        "size": entry.size,
        "last_modified": entry.last_modified.to_rfc3339(),
    })
}

/// Pick the premium variant when warranted, otherwise the standard one,
/// falling back to whatever is available.
fn select_template(candidates: &[Value], premium: bool, premium_marker: &str) -> Option<Value> {
    if candidates.is_empty() {
        return None;
    }
    let marker = if premium { premium_marker } else { "standard" };
    candidates
        .iter()
        .find(|candidate| {
            candidate
                .get("name")
                .and_then(Value::as_str)
                .is_some_and(|name| name.to_lowercase().contains(marker))
        })
        .or_else(|| candidates.first())
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn candidates() -> Vec<Value> {
        vec![
            json!({ "name": "enterprise-sow", "key": "sow-templates/enterprise-sow.docx" }),
            json!({ "name": "standard-sow", "key": "sow-templates/standard-sow.docx" }),
        ]
    }

    #[test]
    fn premium_projects_get_the_premium_template() {
        let selected = select_template(&candidates(), true, "enterprise").expect("selected");
        assert_eq!(selected["name"], json!("enterprise-sow"));
    }

    #[test]
    fn standard_projects_get_the_standard_template() {
        let selected = select_template(&candidates(), false, "enterprise").expect("selected");
        assert_eq!(selected["name"], json!("standard-sow"));
    }

    #[test]
    fn selection_falls_back_to_the_first_candidate() {
        let only = vec![json!({ "name": "vintage", "key": "sow-templates/vintage.docx" })];
        let selected = select_template(&only, true, "enterprise").expect("selected");
        assert_eq!(selected["name"], json!("vintage"));
        assert_eq!(select_template(&[], false, "enterprise"), None);
    }
}
