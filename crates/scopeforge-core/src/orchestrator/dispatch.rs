//! Async dispatch boundary: return to the caller quickly while the workflow
//! runs out-of-band.

use crate::error::ForgeCoreError;
use crate::types::IntakeFields;
use async_trait::async_trait;
use log::info;
use scopeforge_protocol::SessionId;
use std::sync::Arc;

/// Out-of-band workflow execution entry point.
///
/// Implementations must never panic the host; all failures end up on the
/// session record.
#[async_trait]
pub trait WorkflowRunner: Send + Sync {
    /// Run one workflow to a terminal state, recording progress and failures
    /// on the session.
    async fn run_workflow(&self, session_id: SessionId, intake: IntakeFields);
}

/// Schedules a workflow to run exactly once, out-of-band.
///
/// `dispatch` must return well under the client-facing request timeout; a
/// synchronous scheduling failure is fatal for the request and must be
/// surfaced, not swallowed.
#[async_trait]
pub trait WorkflowDispatcher: Send + Sync {
    /// Hand off execution for the given session.
    async fn dispatch(
        &self,
        session_id: SessionId,
        intake: IntakeFields,
    ) -> Result<(), ForgeCoreError>;
}

/// Fire-and-forget dispatcher backed by the tokio runtime.
pub struct TokioDispatcher {
    runner: Arc<dyn WorkflowRunner>,
}

impl TokioDispatcher {
    /// Create a dispatcher that re-enters the given runner on a spawned task.
    pub fn new(runner: Arc<dyn WorkflowRunner>) -> Self {
        Self { runner }
    }
}

#[async_trait]
impl WorkflowDispatcher for TokioDispatcher {
    async fn dispatch(
        &self,
        session_id: SessionId,
        intake: IntakeFields,
    ) -> Result<(), ForgeCoreError> {
        info!("scheduling background workflow (session_id={})", session_id);
        let runner = self.runner.clone();
        tokio::spawn(async move {
            runner.run_workflow(session_id, intake).await;
        });
        Ok(())
    }
}
