//! Statement-of-work generation into the artifact store.

use crate::context::{StepContext, session_id_field};
use async_trait::async_trait;
use log::info;
use scopeforge_core::Step;
use scopeforge_protocol::{StepError, StepName};
use serde_json::{Value, json};
use std::sync::Arc;

/// Renders the statement of work and appends its signed link to the session.
pub struct GenerateDocumentStep {
    ctx: Arc<StepContext>,
}

impl GenerateDocumentStep {
    /// Create the step over shared dependencies.
    pub fn new(ctx: Arc<StepContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Step for GenerateDocumentStep {
    fn name(&self) -> StepName {
        StepName::GenerateDocument
    }

    async fn run(&self, payload: Value) -> Result<Value, StepError> {
        let session_id = session_id_field(&payload)?;
        let template_path = payload.get("template_path").and_then(Value::as_str);
        let proposal_data = payload.get("proposal_data").cloned().unwrap_or(json!({}));
        info!(
            "generating statement of work (session_id={}, template={})",
            session_id,
            template_path.unwrap_or("none")
        );

        let template = self.ctx.template_body(template_path).await?;
        let rendered = render_sow(&proposal_data, template.as_deref());
        let key = format!("{session_id}/sow.docx");
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

/// Render the SOW sections from the proposal data.
fn render_sow(proposal: &Value, template: Option<&[u8]>) -> String {
    let client = proposal
        .get("client_name")
        .and_then(Value::as_str)
        .unwrap_or("Client");
    let requirements = proposal.get("requirements_data");
    let scope = requirements
        .and_then(|data| data.get("project_scope"))
        .and_then(Value::as_str)
        .unwrap_or("Scope to be confirmed");
    let timeline = requirements
        .and_then(|data| data.get("timeline_estimate"))
        .and_then(Value::as_str)
        .unwrap_or("Timeline to be confirmed");

    let mut sections = vec![
        "Statement of Work".to_string(),
        format!("1. Project Overview\nPrepared for {client}.\n{scope}"),
        format!("2. Scope of Services\n{}", bullet_list(requirements, "deliverables")),
        format!("3. Timeline\n{timeline}"),
        format!("4. Investment\n{}", investment_table(proposal.get("cost_data"))),
    ];
    if let Some(risks) = requirements
        .and_then(|data| data.get("key_risks"))
        .and_then(Value::as_array)
        .filter(|risks| !risks.is_empty())
    {
        let bullets = risks
            .iter()
            .filter_map(Value::as_str)
            .map(|risk| format!("- {risk}"))
            .collect::<Vec<_>>()
            .join("\n");
        sections.push(format!("5. Assumptions and Risks\n{bullets}"));
    }
    let base = template
        .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
        .unwrap_or_default();
    format!("{base}\n{}\n", sections.join("\n\n"))
}

fn bullet_list(requirements: Option<&Value>, key: &str) -> String {
    let items: Vec<String> = requirements
        .and_then(|data| data.get(key))
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(|item| format!("- {item}"))
                .collect()
        })
        .unwrap_or_default();
    if items.is_empty() {
        "- To be confirmed".to_string()
    } else {
        items.join("\n")
    }
}

fn investment_table(cost_data: Option<&Value>) -> String {
    let Some(cost_data) = cost_data else {
        return "Pricing to be confirmed.".to_string();
    };
    let total = cost_data
        .get("total_cost")
        .and_then(Value::as_f64)
        .unwrap_or(0.0);
    let mut lines = Vec::new();
    if let Some(breakdown) = cost_data.get("breakdown").and_then(Value::as_object) {
        for (role, line) in breakdown {
            let hours = line.get("hours").and_then(Value::as_f64).unwrap_or(0.0);
            let subtotal = line.get("subtotal").and_then(Value::as_f64).unwrap_or(0.0);
            lines.push(format!("{role}: {hours:.0} hours, ${subtotal:.2}"));
        }
    }
    lines.push(format!("Total: ${total:.2} USD"));
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sow_renders_sections_and_breakdown() {
        let proposal = json!({
            "client_name": "Acme",
            "requirements_data": {
                "project_scope": "Replace the legacy CRM",
                "deliverables": ["Web app"],
                "timeline_estimate": "12 weeks",
                "key_risks": ["Scope changes"],
            },
            "cost_data": {
                "total_cost": 48000.0,
                "breakdown": {
                    "dev": { "hours": 280.0, "rate": 100.0, "subtotal": 28000.0 },
                },
            },
        });
        let sow = render_sow(&proposal, None);
        assert!(sow.contains("Statement of Work"));
        assert!(sow.contains("Prepared for Acme"));
        assert!(sow.contains("- Web app"));
        assert!(sow.contains("dev: 280 hours, $28000.00"));
        assert!(sow.contains("5. Assumptions and Risks"));
    }

    #[test]
    fn sow_tolerates_missing_cost_data() {
        let sow = render_sow(&json!({}), None);
        assert!(sow.contains("Pricing to be confirmed."));
        assert!(sow.contains("- To be confirmed"));
    }
}
