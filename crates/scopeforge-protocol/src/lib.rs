//! Wire protocol types for ScopeForge sessions, steps, and planner events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

/// Unique identifier for a session.
pub type SessionId = Uuid;

/// Lifecycle status for a session.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    /// Session created, workflow not yet running.
    Pending,
    /// Workflow is executing.
    Processing,
    /// Workflow finished and artifacts exist.
    Completed,
    /// Workflow failed.
    Error,
    /// The delegated planner stopped to wait for external input.
    AwaitingInput,
    /// Planner credentials are missing or placeholders; operator action needed.
    ConfigurationError,
}

impl SessionStatus {
    /// Whether no further workflow mutation is expected from this status.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SessionStatus::Pending | SessionStatus::Processing)
    }

    /// Return the status as its wire string.
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Pending => "PENDING",
            SessionStatus::Processing => "PROCESSING",
            SessionStatus::Completed => "COMPLETED",
            SessionStatus::Error => "ERROR",
            SessionStatus::AwaitingInput => "AWAITING_INPUT",
            SessionStatus::ConfigurationError => "CONFIGURATION_ERROR",
        }
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Closed set of workflow step names.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum StepName {
    /// Extract structured requirements from raw notes.
    AnalyzeRequirements,
    /// Produce a role-based cost breakdown.
    CalculateCost,
    /// Select deck and SOW templates.
    RetrieveTemplates,
    /// Render the slide deck artifact.
    GenerateSlides,
    /// Render the statement-of-work artifact.
    GenerateDocument,
}

impl StepName {
    /// All steps in direct-chain execution order.
    pub const ALL: [StepName; 5] = [
        StepName::AnalyzeRequirements,
        StepName::CalculateCost,
        StepName::RetrieveTemplates,
        StepName::GenerateSlides,
        StepName::GenerateDocument,
    ];

    /// Return the step name as its wire string.
    pub fn as_str(&self) -> &'static str {
        match self {
            StepName::AnalyzeRequirements => "analyze_requirements",
            StepName::CalculateCost => "calculate_cost",
            StepName::RetrieveTemplates => "retrieve_templates",
            StepName::GenerateSlides => "generate_slides",
            StepName::GenerateDocument => "generate_document",
        }
    }

    /// Parse a wire string into a step name.
    pub fn parse(value: &str) -> Option<StepName> {
        match value {
            "analyze_requirements" => Some(StepName::AnalyzeRequirements),
            "calculate_cost" => Some(StepName::CalculateCost),
            "retrieve_templates" => Some(StepName::RetrieveTemplates),
            "generate_slides" => Some(StepName::GenerateSlides),
            "generate_document" => Some(StepName::GenerateDocument),
            _ => None,
        }
    }
}

impl std::fmt::Display for StepName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors returned by step invocations.
#[derive(Debug, Clone, Error)]
pub enum StepError {
    /// No step registered under the requested name.
    #[error("unknown step: {0}")]
    UnknownStep(String),
    /// The payload is malformed for this step; retrying the same payload cannot help.
    #[error("invalid step payload: {0}")]
    InvalidPayload(String),
    /// A transient provider error; safe to retry.
    #[error("provider throttled: {0}")]
    Throttled(String),
    /// The step's own business failure.
    #[error("step failed: {0}")]
    Internal(String),
}

impl StepError {
    /// Whether the invocation may be retried with the same payload.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StepError::Throttled(_))
    }
}

/// Why a planner run reached a terminal point.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TerminalReason {
    /// The planner reports the run finished.
    Completed,
    /// The planner needs external input before it can continue.
    AwaitingInput,
}

/// Classified event observed from a delegated planner run.
///
/// Events are never mutated after creation and are appended to the session
/// event log in arrival order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentEvent {
    /// Unique id for the event.
    pub id: Uuid,
    /// Timestamp when the event was classified.
    pub created_at: DateTime<Utc>,
    /// Classified event content.
    pub kind: AgentEventKind,
}

impl AgentEvent {
    /// Classify a raw planner event, stamping it now.
    pub fn classify(event: PlannerEvent) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            kind: AgentEventKind::from(event),
        }
    }

    /// Record an unrecoverable stream failure as an event.
    pub fn classify_error(message: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            kind: AgentEventKind::StreamError {
                message: message.into(),
            },
        }
    }
}

/// All classified event kinds from a planner stream.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case", tag = "type", content = "payload")]
pub enum AgentEventKind {
    /// A chunk of free response text.
    TextFragment { text: String },
    /// A named tool is about to run with the given parameters.
    ToolCallAnnounced { tool: String, parameters: Value },
    /// A tool returned its payload.
    ToolResult { tool: String, output: Value },
    /// The planner's internal rationale.
    ReasoningNote { text: String },
    /// A non-fatal signal, e.g. mid-stream throttling.
    Warning { message: String },
    /// The planner reached a terminal point.
    TerminalSignal { reason: TerminalReason },
    /// The stream failed with an unrecoverable provider error.
    StreamError { message: String },
}

impl From<PlannerEvent> for AgentEventKind {
    fn from(event: PlannerEvent) -> Self {
        match event {
            PlannerEvent::Chunk { text } => AgentEventKind::TextFragment { text },
            PlannerEvent::ToolInvocation { tool, parameters } => {
                AgentEventKind::ToolCallAnnounced { tool, parameters }
            }
            PlannerEvent::ToolObservation { tool, output } => {
                AgentEventKind::ToolResult { tool, output }
            }
            PlannerEvent::Rationale { text } => AgentEventKind::ReasoningNote { text },
            PlannerEvent::Throttled { message } => AgentEventKind::Warning { message },
            PlannerEvent::Finished { outcome } => {
                AgentEventKind::TerminalSignal { reason: outcome }
            }
        }
    }
}

/// Raw wire event emitted by a delegated planner stream.
///
/// This is the loosely-shaped provider format; it is parsed into
/// [`AgentEventKind`] at the stream boundary and never passed further in.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case", tag = "type", content = "payload")]
pub enum PlannerEvent {
    /// Free-text completion chunk.
    Chunk { text: String },
    /// Announcement that a tool is about to be invoked.
    ToolInvocation { tool: String, parameters: Value },
    /// Result payload returned by a tool.
    ToolObservation { tool: String, output: Value },
    /// Planner reasoning trace.
    Rationale { text: String },
    /// Embedded rate-limit signal; pause, do not abort.
    Throttled { message: String },
    /// Terminal completion or need-for-input signal.
    Finished { outcome: TerminalReason },
}

/// Unrecoverable errors surfaced on a planner event stream.
#[derive(Debug, Clone, Error)]
pub enum PlannerStreamError {
    /// Provider-signaled internal or validation failure.
    #[error("planner stream failed: {0}")]
    Provider(String),
    /// A stream frame could not be decoded.
    #[error("planner stream frame undecodable: {0}")]
    Decode(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn status_terminality_and_wire_names() {
        assert_eq!(SessionStatus::Pending.is_terminal(), false);
        assert_eq!(SessionStatus::Processing.is_terminal(), false);
        assert_eq!(SessionStatus::Completed.is_terminal(), true);
        assert_eq!(SessionStatus::Error.is_terminal(), true);
        assert_eq!(SessionStatus::AwaitingInput.is_terminal(), true);
        assert_eq!(SessionStatus::ConfigurationError.is_terminal(), true);

        let encoded = serde_json::to_value(SessionStatus::AwaitingInput).expect("serialize");
        assert_eq!(encoded, json!("AWAITING_INPUT"));
    }

    #[test]
    fn step_name_round_trips() {
        for step in StepName::ALL {
            assert_eq!(StepName::parse(step.as_str()), Some(step));
        }
        assert_eq!(StepName::parse("deploy_everything"), None);
    }

    #[test]
    fn planner_events_classify_into_agent_events() {
        let invocation = PlannerEvent::ToolInvocation {
            tool: "calculate_cost".to_string(),
            parameters: json!({ "session_id": "abc" }),
        };
        assert_eq!(
            AgentEventKind::from(invocation),
            AgentEventKind::ToolCallAnnounced {
                tool: "calculate_cost".to_string(),
                parameters: json!({ "session_id": "abc" }),
            }
        );

        let throttle = PlannerEvent::Throttled {
            message: "rate exceeded".to_string(),
        };
        assert_eq!(
            AgentEventKind::from(throttle),
            AgentEventKind::Warning {
                message: "rate exceeded".to_string(),
            }
        );

        let done = PlannerEvent::Finished {
            outcome: TerminalReason::AwaitingInput,
        };
        assert_eq!(
            AgentEventKind::from(done),
            AgentEventKind::TerminalSignal {
                reason: TerminalReason::AwaitingInput,
            }
        );
    }

    #[test]
    fn agent_event_round_trips_through_json() {
        let event = AgentEvent {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            kind: AgentEventKind::ToolResult {
                tool: "generate_slides".to_string(),
                output: json!({ "document_url": "file:///tmp/deck.pptx" }),
            },
        };
        let encoded = serde_json::to_value(&event).expect("serialize");
        let decoded: AgentEvent = serde_json::from_value(encoded).expect("deserialize");
        assert_eq!(decoded, event);
    }
}
