//! Slide deck generation into the artifact store.

use crate::context::{StepContext, session_id_field};
use async_trait::async_trait;
use log::info;
use scopeforge_core::Step;
use scopeforge_protocol::{StepError, StepName};
use serde_json::{Value, json};
use std::sync::Arc;

/// Renders the proposal deck and appends its signed link to the session.
pub struct GenerateSlidesStep {
    ctx: Arc<StepContext>,
}

impl GenerateSlidesStep {
    /// Create the step over shared dependencies.
    pub fn new(ctx: Arc<StepContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Step for GenerateSlidesStep {
    fn name(&self) -> StepName {
        StepName::GenerateSlides
    }

    async fn run(&self, payload: Value) -> Result<Value, StepError> {
        let session_id = session_id_field(&payload)?;
        let template_path = payload.get("template_path").and_then(Value::as_str);
        let proposal_data = payload.get("proposal_data").cloned().unwrap_or(json!({}));
        info!(
            "generating slide deck (session_id={}, template={})",
            session_id,
            template_path.unwrap_or("none")
        );

        let template = self.ctx.template_body(template_path).await?;
        let rendered = render_deck(&proposal_data, template.as_deref());
        let key = format!("{session_id}/presentation.pptx");
        let url = self
            .ctx
            .publish_artifact(session_id, &key, rendered.as_bytes())
            .await?;

        Ok(json!({
            "session_id": session_id,
            "document_url": url,
        }))
    }
}

/// Render a deck outline from the proposal data. Layout fidelity is the
/// template's concern; this produces the slide content.
fn render_deck(proposal: &Value, template: Option<&[u8]>) -> String {
    let client = text_at(proposal, &["client_name"]).unwrap_or("Client");
    let project = text_at(proposal, &["project_name"]).unwrap_or("Proposal");
    let scope = text_at(proposal, &["requirements_data", "project_scope"])
        .unwrap_or("Scope to be confirmed");
    let timeline = text_at(proposal, &["requirements_data", "timeline_estimate"])
        .unwrap_or("Timeline to be confirmed");
    let total = proposal
        .get("cost_data")
        .and_then(|cost| cost.get("total_cost"))
        .and_then(Value::as_f64)
        .unwrap_or(0.0);

    let mut slides = vec![
        format!("# {project}\n{client}"),
        format!("## Project Overview\n{scope}"),
        format!("## Timeline\n{timeline}"),
        format!("## Investment\nTotal: ${total:.2} USD"),
    ];
    if let Some(deliverables) = proposal
        .get("requirements_data")
        .and_then(|data| data.get("deliverables"))
        .and_then(Value::as_array)
    {
        let bullets = deliverables
            .iter()
            .filter_map(Value::as_str)
            .map(|item| format!("- {item}"))
            .collect::<Vec<_>>()
            .join("\n");
        slides.insert(2, format!("## Deliverables\n{bullets}"));
    }
    let base = template
        .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
        .unwrap_or_default();
    format!("{base}\n{}\n", slides.join("\n\n"))
}

fn text_at<'a>(value: &'a Value, path: &[&str]) -> Option<&'a str> {
    let mut current = value;
    for key in path {
        current = current.get(key)?;
    }
    current.as_str()
}
