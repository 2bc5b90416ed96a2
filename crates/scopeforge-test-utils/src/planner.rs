//! Planner doubles: scripted streams, throttling, and hard failures.

use async_trait::async_trait;
use parking_lot::Mutex;
use scopeforge_core::planner::{Planner, PlannerError, PlannerEventStream};
use scopeforge_protocol::{PlannerEvent, PlannerStreamError, SessionId};
use std::sync::Arc;
use std::time::Instant;

/// Planner that replays a fixed sequence of stream items.
#[derive(Clone)]
pub struct ScriptedPlanner {
    items: Arc<Vec<Result<PlannerEvent, String>>>,
    seen_instructions: Arc<Mutex<Vec<String>>>,
}

impl ScriptedPlanner {
    /// Replay the given events, all successful.
    pub fn new(events: Vec<PlannerEvent>) -> Self {
        Self {
            items: Arc::new(events.into_iter().map(Ok).collect()),
            seen_instructions: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Replay events and end the stream with a provider error.
    pub fn with_stream_error(events: Vec<PlannerEvent>, message: impl Into<String>) -> Self {
        let mut items: Vec<Result<PlannerEvent, String>> =
            events.into_iter().map(Ok).collect();
        items.push(Err(message.into()));
        Self {
            items: Arc::new(items),
            seen_instructions: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Instructions passed to each `start_run` call.
    pub fn seen_instructions(&self) -> Arc<Mutex<Vec<String>>> {
        self.seen_instructions.clone()
    }
}

#[async_trait]
impl Planner for ScriptedPlanner {
    async fn start_run(
        &self,
        _session_id: SessionId,
        instructions: String,
    ) -> Result<PlannerEventStream, PlannerError> {
        self.seen_instructions.lock().push(instructions);
        let items: Vec<Result<PlannerEvent, PlannerStreamError>> = self
            .items
            .iter()
            .map(|item| match item {
                Ok(event) => Ok(event.clone()),
                Err(message) => Err(PlannerStreamError::Provider(message.clone())),
            })
            .collect();
        Ok(Box::pin(futures_util::stream::iter(items)))
    }
}

/// Planner whose dispatch always throttles, recording each attempt time.
#[derive(Clone)]
pub struct ThrottledPlanner {
    attempts: Arc<Mutex<Vec<Instant>>>,
}

impl ThrottledPlanner {
    /// Create the planner plus a handle to its attempt log.
    pub fn new() -> (Self, Arc<Mutex<Vec<Instant>>>) {
        let attempts = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                attempts: attempts.clone(),
            },
            attempts,
        )
    }
}

#[async_trait]
impl Planner for ThrottledPlanner {
    async fn start_run(
        &self,
        _session_id: SessionId,
        _instructions: String,
    ) -> Result<PlannerEventStream, PlannerError> {
        self.attempts.lock().push(Instant::now());
        Err(PlannerError::Throttled("rate exceeded".to_string()))
    }
}

/// Planner whose dispatch fails with a non-retryable error.
#[derive(Clone)]
pub struct FailingPlanner {
    message: String,
    attempts: Arc<Mutex<u32>>,
}

impl FailingPlanner {
    /// Fail every dispatch with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            attempts: Arc::new(Mutex::new(0)),
        }
    }

    /// Number of dispatch attempts observed.
    pub fn attempts(&self) -> u32 {
        *self.attempts.lock()
    }
}

#[async_trait]
impl Planner for FailingPlanner {
    async fn start_run(
        &self,
        _session_id: SessionId,
        _instructions: String,
    ) -> Result<PlannerEventStream, PlannerError> {
        *self.attempts.lock() += 1;
        Err(PlannerError::Invocation(self.message.clone()))
    }
}
