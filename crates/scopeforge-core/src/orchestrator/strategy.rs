//! Strategy interface for driving a workflow to completion.

use crate::error::ForgeCoreError;
use crate::types::IntakeFields;
use async_trait::async_trait;
use scopeforge_protocol::{SessionId, StepName};

/// Result of one workflow execution attempt, before reconciliation.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkflowOutcome {
    /// The run reported success; artifact reconciliation still applies.
    Completed,
    /// The planner stopped to wait for external input.
    AwaitingInput,
    /// The run failed with a message for the session record.
    Failed { message: String },
}

/// One orchestration mode, chosen at construction time from configuration.
#[async_trait]
pub trait WorkflowStrategy: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &'static str;
    /// Drive the pipeline for one session to an outcome.
    async fn run(
        &self,
        session_id: SessionId,
        intake: &IntakeFields,
    ) -> Result<WorkflowOutcome, ForgeCoreError>;
}

/// Fixed stage label and progress percentage for a known step.
pub(crate) fn stage_for_step(step: StepName) -> (&'static str, u8) {
    match step {
        StepName::AnalyzeRequirements => ("Analyzing requirements", 30),
        StepName::CalculateCost => ("Calculating cost", 50),
        StepName::RetrieveTemplates => ("Retrieving templates", 60),
        StepName::GenerateSlides => ("Generating slide deck", 80),
        StepName::GenerateDocument => ("Generating statement of work", 95),
    }
}

/// Look up the stage table by an announced tool name.
pub(crate) fn stage_for_tool(tool: &str) -> Option<(&'static str, u8)> {
    StepName::parse(tool).map(stage_for_step)
}
