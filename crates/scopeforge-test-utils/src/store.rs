//! Session store wrapper that records write batches.

use async_trait::async_trait;
use parking_lot::Mutex;
use scopeforge_core::store::{
    MemorySessionStore, SessionStore, SessionStoreError, SessionUpdate,
};
use scopeforge_core::types::{IntakeFields, Session};
use scopeforge_protocol::{AgentEvent, SessionId};
use std::sync::Arc;

/// Wraps an in-memory store and records every `append_events` batch, so
/// tests can assert how many writes happened and what each one carried.
#[derive(Clone, Default)]
pub struct RecordingSessionStore {
    inner: MemorySessionStore,
    event_batches: Arc<Mutex<Vec<Vec<AgentEvent>>>>,
    update_count: Arc<Mutex<usize>>,
}

impl RecordingSessionStore {
    /// Create an empty recording store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every batch passed to `append_events`, in call order.
    pub fn event_batches(&self) -> Vec<Vec<AgentEvent>> {
        self.event_batches.lock().clone()
    }

    /// Number of `update` calls observed.
    pub fn update_count(&self) -> usize {
        *self.update_count.lock()
    }
}

#[async_trait]
impl SessionStore for RecordingSessionStore {
    async fn create(&self, intake: IntakeFields) -> Result<SessionId, SessionStoreError> {
        self.inner.create(intake).await
    }

    async fn get(&self, session_id: SessionId) -> Result<Session, SessionStoreError> {
        self.inner.get(session_id).await
    }

    async fn update(
        &self,
        session_id: SessionId,
        update: SessionUpdate,
    ) -> Result<(), SessionStoreError> {
        *self.update_count.lock() += 1;
        self.inner.update(session_id, update).await
    }

    async fn append_document_url(
        &self,
        session_id: SessionId,
        url: &str,
    ) -> Result<(), SessionStoreError> {
        self.inner.append_document_url(session_id, url).await
    }

    async fn append_events(
        &self,
        session_id: SessionId,
        events: &[AgentEvent],
    ) -> Result<(), SessionStoreError> {
        self.event_batches.lock().push(events.to_vec());
        self.inner.append_events(session_id, events).await
    }
}
