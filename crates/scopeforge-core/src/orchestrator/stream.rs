//! Event stream reader: classify planner events, throttle writes, and adapt
//! terminal signals into workflow outcomes.

use crate::error::ForgeCoreError;
use crate::orchestrator::strategy::stage_for_tool;
use crate::planner::PlannerEventStream;
use crate::store::{SessionStore, SessionUpdate};
use futures_util::StreamExt;
use log::{debug, error, warn};
use scopeforge_protocol::{AgentEvent, AgentEventKind, SessionId, TerminalReason};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// How a planner stream finished, as observed by the reader.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamOutcome {
    /// The stream ended after a completion signal or natural exhaustion.
    Completed,
    /// The stream ended with a need-for-input signal.
    AwaitingInput,
    /// The stream failed with an unrecoverable provider error.
    Failed { message: String },
}

/// Consumes a planner event stream, batching event-log writes.
///
/// Classified events are buffered in memory and flushed to the session store
/// at most once per flush interval, so bursts of fast-arriving chunks never
/// exceed the store's write rate.
pub struct EventStreamReader {
    store: Arc<dyn SessionStore>,
    flush_interval: Duration,
    throttle_pause: Duration,
}

impl EventStreamReader {
    /// Create a reader with explicit flush and pause intervals.
    pub fn new(
        store: Arc<dyn SessionStore>,
        flush_interval: Duration,
        throttle_pause: Duration,
    ) -> Self {
        Self {
            store,
            flush_interval,
            throttle_pause,
        }
    }

    /// Consume the stream to its end, updating the session as it goes.
    pub async fn consume(
        &self,
        session_id: SessionId,
        mut stream: PlannerEventStream,
    ) -> Result<StreamOutcome, ForgeCoreError> {
        let mut buffer: Vec<AgentEvent> = Vec::new();
        let mut last_flush = Instant::now();
        let mut progress = self.store.get(session_id).await?.progress;

        while let Some(item) = stream.next().await {
            let event = match item {
                Ok(event) => AgentEvent::classify(event),
                Err(err) => {
                    error!(
                        "planner stream failed (session_id={}, error={})",
                        session_id, err
                    );
                    buffer.push(AgentEvent::classify_error(err.to_string()));
                    self.flush(session_id, &mut buffer).await?;
                    return Ok(StreamOutcome::Failed {
                        message: err.to_string(),
                    });
                }
            };

            let mut pause = false;
            let mut outcome = None;
            match &event.kind {
                AgentEventKind::ToolCallAnnounced { tool, .. } => {
                    let (label, percent) = match stage_for_tool(tool) {
                        Some((label, percent)) => (label.to_string(), percent),
                        // Unknown stage names get an incremental estimate.
                        None => (format!("Running {tool}"), progress.saturating_add(5).min(99)),
                    };
                    progress = progress.max(percent);
                    debug!(
                        "tool announced (session_id={}, tool={}, progress={})",
                        session_id, tool, progress
                    );
                    self.store
                        .update(session_id, SessionUpdate::stage(label, progress))
                        .await?;
                }
                AgentEventKind::Warning { message } => {
                    warn!(
                        "planner throttle warning (session_id={}, message={})",
                        session_id, message
                    );
                    pause = true;
                }
                AgentEventKind::TerminalSignal { reason } => {
                    outcome = Some(match reason {
                        TerminalReason::Completed => StreamOutcome::Completed,
                        TerminalReason::AwaitingInput => StreamOutcome::AwaitingInput,
                    });
                }
                _ => {}
            }

            buffer.push(event);
            if let Some(outcome) = outcome {
                self.flush(session_id, &mut buffer).await?;
                return Ok(outcome);
            }
            if last_flush.elapsed() >= self.flush_interval {
                self.flush(session_id, &mut buffer).await?;
                last_flush = Instant::now();
            }
            if pause {
                tokio::time::sleep(self.throttle_pause).await;
            }
        }

        self.flush(session_id, &mut buffer).await?;
        Ok(StreamOutcome::Completed)
    }

    async fn flush(
        &self,
        session_id: SessionId,
        buffer: &mut Vec<AgentEvent>,
    ) -> Result<(), ForgeCoreError> {
        if buffer.is_empty() {
            return Ok(());
        }
        debug!(
            "flushing agent events (session_id={}, count={})",
            session_id,
            buffer.len()
        );
        self.store.append_events(session_id, buffer).await?;
        buffer.clear();
        Ok(())
    }
}
