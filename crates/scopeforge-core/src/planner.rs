//! Delegated planner boundary: invocation trait and the remote HTTP client.
//!
//! The planner is an externally hosted autonomous tool-calling loop. This
//! module only starts a run and adapts its wire stream; the raw frames are
//! decoded into [`PlannerEvent`] at this boundary and never passed further in.

use async_trait::async_trait;
use futures_util::{Stream, StreamExt};
use log::{debug, info};
use scopeforge_protocol::{PlannerEvent, PlannerStreamError, SessionId};
use std::collections::VecDeque;
use std::pin::Pin;
use thiserror::Error;

/// Ordered, possibly long-lived stream of planner events.
pub type PlannerEventStream =
    Pin<Box<dyn Stream<Item = Result<PlannerEvent, PlannerStreamError>> + Send>>;

/// Errors returned when starting a planner run.
#[derive(Debug, Error)]
pub enum PlannerError {
    /// The provider throttled the invocation; retry with backoff.
    #[error("planner throttled: {0}")]
    Throttled(String),
    /// The invocation failed for a non-throttling reason.
    #[error("planner invocation failed: {0}")]
    Invocation(String),
}

impl PlannerError {
    /// Whether the dispatch call may be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, PlannerError::Throttled(_))
    }
}

/// Client interface to a delegated planner.
#[async_trait]
pub trait Planner: Send + Sync {
    /// Start a planner run and return its event stream.
    async fn start_run(
        &self,
        session_id: SessionId,
        instructions: String,
    ) -> Result<PlannerEventStream, PlannerError>;
}

/// HTTP planner client consuming newline-delimited JSON event frames.
pub struct RemotePlanner {
    client: reqwest::Client,
    endpoint: String,
    agent_id: String,
    agent_alias_id: String,
}

impl RemotePlanner {
    /// Create a client for the given endpoint and agent identifiers.
    pub fn new(
        endpoint: impl Into<String>,
        agent_id: impl Into<String>,
        agent_alias_id: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            agent_id: agent_id.into(),
            agent_alias_id: agent_alias_id.into(),
        }
    }
}

#[async_trait]
impl Planner for RemotePlanner {
    async fn start_run(
        &self,
        session_id: SessionId,
        instructions: String,
    ) -> Result<PlannerEventStream, PlannerError> {
        info!(
            "starting planner run (session_id={}, agent_id={})",
            session_id, self.agent_id
        );
        let response = self
            .client
            .post(&self.endpoint)
            .json(&serde_json::json!({
                "agent_id": self.agent_id,
                "agent_alias_id": self.agent_alias_id,
                "session_id": session_id,
                "input": instructions,
            }))
            .send()
            .await
            .map_err(|err| PlannerError::Invocation(err.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(PlannerError::Throttled(format!(
                "planner endpoint returned {status}"
            )));
        }
        if !status.is_success() {
            return Err(PlannerError::Invocation(format!(
                "planner endpoint returned {status}"
            )));
        }

        let decoder = JsonLineDecoder::new(response.bytes_stream());
        let stream = futures_util::stream::unfold(decoder, |mut decoder| async move {
            decoder.next_event().await.map(|item| (item, decoder))
        });
        Ok(Box::pin(stream))
    }
}

/// Incremental newline-delimited JSON decoder over a byte stream.
struct JsonLineDecoder<S> {
    inner: S,
    buffer: Vec<u8>,
    queued: VecDeque<String>,
    done: bool,
}

impl<S, B, E> JsonLineDecoder<S>
where
    S: Stream<Item = Result<B, E>> + Unpin,
    B: AsRef<[u8]>,
    E: std::fmt::Display,
{
    fn new(inner: S) -> Self {
        Self {
            inner,
            buffer: Vec::new(),
            queued: VecDeque::new(),
            done: false,
        }
    }

    async fn next_event(&mut self) -> Option<Result<PlannerEvent, PlannerStreamError>> {
        loop {
            if let Some(line) = self.queued.pop_front() {
                debug!("decoding planner frame (len={})", line.len());
                return Some(decode_frame(&line));
            }
            if self.done {
                return None;
            }
            match self.inner.next().await {
                Some(Ok(chunk)) => {
                    self.buffer.extend_from_slice(chunk.as_ref());
                    self.drain_complete_lines();
                }
                Some(Err(err)) => {
                    self.done = true;
                    return Some(Err(PlannerStreamError::Provider(err.to_string())));
                }
                None => {
                    self.done = true;
                    // Trailing bytes without a newline still form a frame.
                    if !self.buffer.is_empty() {
                        let rest = String::from_utf8_lossy(&self.buffer).into_owned();
                        self.buffer.clear();
                        if !rest.trim().is_empty() {
                            self.queued.push_back(rest);
                        }
                    }
                }
            }
        }
    }

    fn drain_complete_lines(&mut self) {
        while let Some(pos) = self.buffer.iter().position(|byte| *byte == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line[..line.len() - 1]).into_owned();
            if !line.trim().is_empty() {
                self.queued.push_back(line);
            }
        }
    }
}

fn decode_frame(line: &str) -> Result<PlannerEvent, PlannerStreamError> {
    serde_json::from_str(line).map_err(|err| PlannerStreamError::Decode(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use scopeforge_protocol::TerminalReason;

    #[test]
    fn decode_frame_parses_tagged_events() {
        let event = decode_frame(
            r#"{"type":"tool_invocation","payload":{"tool":"calculate_cost","parameters":{}}}"#,
        )
        .expect("decode");
        assert_eq!(
            event,
            PlannerEvent::ToolInvocation {
                tool: "calculate_cost".to_string(),
                parameters: serde_json::json!({}),
            }
        );

        let done = decode_frame(r#"{"type":"finished","payload":{"outcome":"completed"}}"#)
            .expect("decode");
        assert_eq!(
            done,
            PlannerEvent::Finished {
                outcome: TerminalReason::Completed,
            }
        );
    }

    #[test]
    fn decode_frame_reports_undecodable_frames() {
        let err = decode_frame("not json").expect_err("undecodable");
        assert!(matches!(err, PlannerStreamError::Decode(_)));
    }

    #[tokio::test]
    async fn line_decoder_reassembles_frames_across_chunks() {
        let chunks: Vec<Result<&str, std::convert::Infallible>> = vec![
            Ok(r#"{"type":"chunk","payload":{"text":"hel"#),
            Ok("lo\"}}\n"),
            Ok(r#"{"type":"finished","payload":{"outcome":"completed"}}"#),
        ];
        let mut decoder = JsonLineDecoder::new(futures_util::stream::iter(chunks));

        let first = decoder.next_event().await.expect("first").expect("decode");
        assert_eq!(
            first,
            PlannerEvent::Chunk {
                text: "hello".to_string(),
            }
        );
        let second = decoder.next_event().await.expect("second").expect("decode");
        assert_eq!(
            second,
            PlannerEvent::Finished {
                outcome: TerminalReason::Completed,
            }
        );
        assert!(decoder.next_event().await.is_none());
    }

    #[test]
    fn throttled_errors_are_the_only_retryable_kind() {
        assert_eq!(PlannerError::Throttled("slow down".into()).is_retryable(), true);
        assert_eq!(PlannerError::Invocation("boom".into()).is_retryable(), false);
    }
}
