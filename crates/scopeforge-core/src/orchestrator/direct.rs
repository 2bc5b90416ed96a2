//! Direct chaining: this service calls each step explicitly in a fixed order.

use crate::error::ForgeCoreError;
use crate::invoker::StepInvoker;
use crate::orchestrator::strategy::{WorkflowOutcome, WorkflowStrategy, stage_for_step};
use crate::store::{SessionStore, SessionUpdate};
use crate::types::IntakeFields;
use async_trait::async_trait;
use log::{debug, info};
use scopeforge_protocol::{SessionId, StepName};
use serde_json::{Value, json};
use std::sync::Arc;

/// Fixed-order pipeline: analyze, cost, templates, then both renderers.
pub struct DirectStrategy {
    store: Arc<dyn SessionStore>,
    invoker: Arc<dyn StepInvoker>,
}

impl DirectStrategy {
    /// Create a direct-chaining strategy over the given invoker.
    pub fn new(store: Arc<dyn SessionStore>, invoker: Arc<dyn StepInvoker>) -> Self {
        Self { store, invoker }
    }

    /// Mark the stage before a step runs.
    async fn enter_stage(&self, session_id: SessionId, step: StepName) -> Result<(), ForgeCoreError> {
        let (label, percent) = stage_for_step(step);
        debug!(
            "entering stage (session_id={}, step={}, progress={})",
            session_id, step, percent
        );
        self.store
            .update(session_id, SessionUpdate::stage(label, percent))
            .await?;
        Ok(())
    }
}

#[async_trait]
impl WorkflowStrategy for DirectStrategy {
    fn name(&self) -> &'static str {
        "direct"
    }

    async fn run(
        &self,
        session_id: SessionId,
        intake: &IntakeFields,
    ) -> Result<WorkflowOutcome, ForgeCoreError> {
        info!("running direct chain (session_id={})", session_id);

        self.enter_stage(session_id, StepName::AnalyzeRequirements)
            .await?;
        let requirements_data = self
            .invoker
            .invoke(
                StepName::AnalyzeRequirements,
                json!({
                    "session_id": session_id,
                    "requirements": intake.requirements.clone(),
                }),
            )
            .await?;

        self.enter_stage(session_id, StepName::CalculateCost).await?;
        let cost_data = self
            .invoker
            .invoke(
                StepName::CalculateCost,
                json!({
                    "session_id": session_id,
                    "requirements_data": requirements_data.clone(),
                }),
            )
            .await?;

        self.enter_stage(session_id, StepName::RetrieveTemplates)
            .await?;
        let template_selection = self
            .invoker
            .invoke(
                StepName::RetrieveTemplates,
                json!({
                    "session_id": session_id,
                    "template_type": "both",
                }),
            )
            .await?;

        let proposal_data = json!({
            "client_name": intake.client_name.clone(),
            "project_name": intake.project_name.clone(),
            "industry": intake.industry.clone(),
            "requirements_data": requirements_data,
            "cost_data": cost_data,
        });

        // The two renderers are order-independent and persist through
        // additive appends, so they can run concurrently.
        self.enter_stage(session_id, StepName::GenerateSlides).await?;
        let slides = self.invoker.invoke(
            StepName::GenerateSlides,
            json!({
                "session_id": session_id,
                "template_path": template_key(&template_selection, "powerpoint"),
                "proposal_data": proposal_data.clone(),
            }),
        );
        let document = self.invoker.invoke(
            StepName::GenerateDocument,
            json!({
                "session_id": session_id,
                "template_path": template_key(&template_selection, "sow"),
                "proposal_data": proposal_data,
            }),
        );
        let (slides, document) = tokio::try_join!(slides, document)?;
        debug!(
            "renderers finished (session_id={}, slides={}, document={})",
            session_id,
            slides.get("document_url").is_some(),
            document.get("document_url").is_some()
        );

        Ok(WorkflowOutcome::Completed)
    }
}

/// Pull the stored object key for one template kind out of the selection.
fn template_key(selection: &Value, kind: &str) -> Value {
    selection
        .get(kind)
        .and_then(|template| template.get("key"))
        .cloned()
        .unwrap_or(Value::Null)
}
