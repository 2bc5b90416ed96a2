//! Delegated planning: hand the intake to an autonomous planner and observe
//! its event stream.

use crate::error::ForgeCoreError;
use crate::orchestrator::strategy::{WorkflowOutcome, WorkflowStrategy};
use crate::orchestrator::stream::{EventStreamReader, StreamOutcome};
use crate::planner::{Planner, PlannerEventStream};
use crate::types::IntakeFields;
use async_trait::async_trait;
use log::{info, warn};
use scopeforge_protocol::{SessionId, StepName};
use std::sync::Arc;
use std::time::Duration;

/// Single-dispatch strategy: one planner call, then stream consumption.
pub struct DelegatedStrategy {
    planner: Arc<dyn Planner>,
    reader: EventStreamReader,
    max_attempts: u32,
    base_delay: Duration,
}

impl DelegatedStrategy {
    /// Create a delegated strategy with bounded dispatch retries.
    pub fn new(
        planner: Arc<dyn Planner>,
        reader: EventStreamReader,
        max_attempts: u32,
        base_delay: Duration,
    ) -> Self {
        Self {
            planner,
            reader,
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// Start the planner run, retrying only throttling errors with
    /// exponential backoff.
    async fn start_with_retry(
        &self,
        session_id: SessionId,
        instructions: &str,
    ) -> Result<PlannerEventStream, ForgeCoreError> {
        let mut delay = self.base_delay;
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self
                .planner
                .start_run(session_id, instructions.to_string())
                .await
            {
                Ok(stream) => return Ok(stream),
                Err(err) if err.is_retryable() && attempt < self.max_attempts => {
                    warn!(
                        "planner dispatch throttled, backing off (session_id={}, attempt={}, delay_ms={})",
                        session_id,
                        attempt,
                        delay.as_millis()
                    );
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }
}

#[async_trait]
impl WorkflowStrategy for DelegatedStrategy {
    fn name(&self) -> &'static str {
        "delegated"
    }

    async fn run(
        &self,
        session_id: SessionId,
        intake: &IntakeFields,
    ) -> Result<WorkflowOutcome, ForgeCoreError> {
        info!("dispatching to planner (session_id={})", session_id);
        let instructions = build_instructions(session_id, intake);
        let stream = self.start_with_retry(session_id, &instructions).await?;

        match self.reader.consume(session_id, stream).await? {
            StreamOutcome::Completed => Ok(WorkflowOutcome::Completed),
            StreamOutcome::AwaitingInput => Ok(WorkflowOutcome::AwaitingInput),
            StreamOutcome::Failed { message } => Ok(WorkflowOutcome::Failed { message }),
        }
    }
}

/// Explicit step-ordering instructions handed to the planner.
fn build_instructions(session_id: SessionId, intake: &IntakeFields) -> String {
    let steps = StepName::ALL
        .iter()
        .enumerate()
        .map(|(index, step)| format!("{}. {}", index + 1, step))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "Produce a proposal for client \"{client}\" (project: \"{project}\", industry: \"{industry}\").\n\
         Session id: {session_id}. Requested duration: {duration:?}, team size: {team_size}.\n\
         Run these tools in order, passing the session id to every call:\n{steps}\n\
         Requirements:\n{requirements}",
        client = intake.client_name,
        project = intake.project_name,
        industry = intake.industry,
        duration = intake.duration,
        team_size = intake.team_size,
        requirements = intake.requirements,
    )
}
