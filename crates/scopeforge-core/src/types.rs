//! Core data types shared across the orchestrator API.

use crate::error::ForgeCoreError;
use chrono::{DateTime, Utc};
use scopeforge_protocol::{AgentEvent, SessionId, SessionStatus};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Requested engagement duration, mapped to a working-week count.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum ProjectDuration {
    /// Roughly one month.
    Short,
    /// Roughly one quarter.
    #[default]
    Medium,
    /// Roughly half a year.
    Long,
}

impl ProjectDuration {
    /// Working weeks covered by this duration.
    pub fn weeks(&self) -> u32 {
        match self {
            ProjectDuration::Short => 4,
            ProjectDuration::Medium => 12,
            ProjectDuration::Long => 24,
        }
    }
}

/// Immutable intake fields captured when a session is created.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IntakeFields {
    /// Client the proposal is for.
    pub client_name: String,
    /// Project label.
    #[serde(default)]
    pub project_name: String,
    /// Client industry.
    #[serde(default)]
    pub industry: String,
    /// Raw requirements text from the client meeting.
    pub requirements: String,
    /// Requested engagement duration.
    #[serde(default)]
    pub duration: ProjectDuration,
    /// Requested team size.
    #[serde(default = "default_team_size")]
    pub team_size: u32,
}

fn default_team_size() -> u32 {
    4
}

impl IntakeFields {
    /// Check the required fields before any session exists.
    pub fn validate(&self) -> Result<(), ForgeCoreError> {
        if self.client_name.trim().is_empty() {
            return Err(ForgeCoreError::InvalidIntake(
                "client_name is required".to_string(),
            ));
        }
        if self.requirements.trim().is_empty() {
            return Err(ForgeCoreError::InvalidIntake(
                "requirements is required".to_string(),
            ));
        }
        Ok(())
    }
}

/// Full session record: intake, workflow state, results, and event log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Session {
    /// Session identifier.
    pub id: SessionId,
    /// Client the proposal is for.
    pub client_name: String,
    /// Project label.
    pub project_name: String,
    /// Client industry.
    pub industry: String,
    /// Requested engagement duration.
    pub duration: ProjectDuration,
    /// Requested team size.
    pub team_size: u32,
    /// Workflow lifecycle status.
    pub status: SessionStatus,
    /// Human-readable stage label while processing.
    pub current_stage: Option<String>,
    /// Percentage complete, 0-100, non-decreasing while not terminal.
    pub progress: u8,
    /// Failure message when the status is an error state.
    pub error_message: Option<String>,
    /// Structured requirements extraction plus raw input.
    pub requirements_data: Option<Value>,
    /// Role-based cost breakdown.
    pub cost_data: Option<Value>,
    /// Chosen template references.
    pub template_selection: Option<Value>,
    /// Signed links to generated artifacts, append-only.
    pub document_urls: Vec<String>,
    /// Ordered log of every event observed from a delegated planner.
    pub agent_events: Vec<AgentEvent>,
    /// Creation timestamp, set once.
    pub created_at: DateTime<Utc>,
    /// Timestamp of the latest mutation.
    pub updated_at: DateTime<Utc>,
}

impl Session {
    /// Build the initial record for a new session.
    pub fn new(id: SessionId, intake: IntakeFields, created_at: DateTime<Utc>) -> Self {
        let raw = json!({ "raw_requirements": intake.requirements });
        Self {
            id,
            client_name: intake.client_name,
            project_name: intake.project_name,
            industry: intake.industry,
            duration: intake.duration,
            team_size: intake.team_size,
            status: SessionStatus::Pending,
            current_stage: None,
            progress: 0,
            error_message: None,
            requirements_data: Some(raw),
            cost_data: None,
            template_selection: None,
            document_urls: Vec::new(),
            agent_events: Vec::new(),
            created_at,
            updated_at: created_at,
        }
    }
}

/// Response returned to the client immediately after submission.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SubmissionReceipt {
    /// Identifier to poll.
    pub session_id: SessionId,
    /// Initial status, always `PENDING`.
    pub status: SessionStatus,
    /// Relative URL for status polling.
    pub poll_url: String,
}

/// Final artifact links derived from a completed session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProposalArtifacts {
    /// Signed link to the slide deck, if generated.
    pub powerpoint_url: Option<String>,
    /// Signed link to the statement of work, if generated.
    pub sow_url: Option<String>,
    /// Cost breakdown captured during the run.
    pub cost_data: Option<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use uuid::Uuid;

    fn intake() -> IntakeFields {
        IntakeFields {
            client_name: "Acme".to_string(),
            project_name: "CRM".to_string(),
            industry: "retail".to_string(),
            requirements: "Build a CRM".to_string(),
            duration: ProjectDuration::Medium,
            team_size: 4,
        }
    }

    #[test]
    fn duration_maps_to_weeks() {
        assert_eq!(ProjectDuration::Short.weeks(), 4);
        assert_eq!(ProjectDuration::Medium.weeks(), 12);
        assert_eq!(ProjectDuration::Long.weeks(), 24);
    }

    #[test]
    fn intake_validation_requires_client_and_requirements() {
        assert!(intake().validate().is_ok());

        let mut missing_client = intake();
        missing_client.client_name = "  ".to_string();
        let err = missing_client.validate().expect_err("invalid");
        assert_eq!(err.to_string(), "invalid intake: client_name is required");

        let mut missing_requirements = intake();
        missing_requirements.requirements = String::new();
        let err = missing_requirements.validate().expect_err("invalid");
        assert_eq!(err.to_string(), "invalid intake: requirements is required");
    }

    #[test]
    fn new_session_starts_pending_with_raw_requirements() {
        let id = Uuid::new_v4();
        let session = Session::new(id, intake(), Utc::now());
        assert_eq!(session.status, scopeforge_protocol::SessionStatus::Pending);
        assert_eq!(session.progress, 0);
        assert_eq!(
            session.requirements_data,
            Some(serde_json::json!({ "raw_requirements": "Build a CRM" }))
        );
        assert_eq!(session.document_urls.len(), 0);
    }

    #[test]
    fn intake_deserializes_with_defaults() {
        let intake: IntakeFields = serde_json::from_value(serde_json::json!({
            "client_name": "Acme",
            "requirements": "Build a CRM",
        }))
        .expect("deserialize");
        assert_eq!(intake.team_size, 4);
        assert_eq!(intake.duration, ProjectDuration::Medium);
        assert_eq!(intake.project_name, "");
    }
}
