//! Error types for the core orchestration crate.

use crate::planner::PlannerError;
use crate::store::SessionStoreError;
use scopeforge_protocol::{SessionId, StepError};
use thiserror::Error;

/// Errors returned by orchestrator operations.
#[derive(Debug, Error)]
pub enum ForgeCoreError {
    /// Session id is unknown to the orchestrator.
    #[error("unknown session: {0}")]
    UnknownSession(SessionId),
    /// No artifacts have been produced for the session yet.
    #[error("no documents available yet: {0}")]
    ArtifactsNotReady(SessionId),
    /// Intake fields failed validation; no session was created.
    #[error("invalid intake: {0}")]
    InvalidIntake(String),
    /// Session store failure.
    #[error("store error: {0}")]
    Store(String),
    /// Step invocation failure.
    #[error(transparent)]
    Step(#[from] StepError),
    /// Delegated planner failure.
    #[error(transparent)]
    Planner(#[from] PlannerError),
    /// Background dispatch failure.
    #[error("dispatch error: {0}")]
    Dispatch(String),
    /// Operator-level provisioning problem.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<SessionStoreError> for ForgeCoreError {
    fn from(err: SessionStoreError) -> Self {
        match err {
            SessionStoreError::NotFound(session_id) => ForgeCoreError::UnknownSession(session_id),
            other => ForgeCoreError::Store(other.to_string()),
        }
    }
}
