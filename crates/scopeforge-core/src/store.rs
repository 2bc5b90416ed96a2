//! Session persistence: typed partial updates and additive append operations.
//!
//! Two implementations are provided: an in-memory map for tests and embedded
//! use, and a JSONL rollout store that records every mutation as an
//! append-only event and replays the log on read. The append-only design is
//! what makes `append_document_url`/`append_events` additive rather than
//! read-modify-write, so concurrent writers cannot clobber each other.

use crate::types::{IntakeFields, Session};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use directories::BaseDirs;
use log::{debug, info, warn};
use parking_lot::{Mutex, RwLock};
use scopeforge_config::StorageConfig;
use scopeforge_protocol::{AgentEvent, SessionId, SessionStatus};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// Errors returned by the session store.
#[derive(Debug, Error)]
pub enum SessionStoreError {
    #[error("session not found: {0}")]
    NotFound(SessionId),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("unsupported schema version: {0}")]
    UnsupportedSchema(u32),
    #[error("missing session metadata")]
    MissingMetadata,
    #[error("session already exists: {0}")]
    SessionExists(SessionId),
}

/// Partial update applied to the mutable workflow fields of a session.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SessionUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<SessionStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_stage: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requirements_data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost_data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_selection: Option<Value>,
}

impl SessionUpdate {
    /// Update only the status.
    pub fn status(status: SessionStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    /// Update the stage label and progress together.
    pub fn stage(label: impl Into<String>, progress: u8) -> Self {
        Self {
            current_stage: Some(label.into()),
            progress: Some(progress),
            ..Self::default()
        }
    }

    /// Transition into a failure status with a message.
    pub fn failed(status: SessionStatus, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            error_message: Some(message.into()),
            ..Self::default()
        }
    }

    /// Attach a status to this update.
    pub fn with_status(mut self, status: SessionStatus) -> Self {
        self.status = Some(status);
        self
    }
}

/// Typed read/update operations against the session record.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Generate an identifier and write the initial record.
    async fn create(&self, intake: IntakeFields) -> Result<SessionId, SessionStoreError>;
    /// Load a session by id.
    async fn get(&self, session_id: SessionId) -> Result<Session, SessionStoreError>;
    /// Apply a partial field update, stamping `updated_at`.
    async fn update(
        &self,
        session_id: SessionId,
        update: SessionUpdate,
    ) -> Result<(), SessionStoreError>;
    /// Append one artifact link without clobbering concurrent appends.
    async fn append_document_url(
        &self,
        session_id: SessionId,
        url: &str,
    ) -> Result<(), SessionStoreError>;
    /// Append a batch of planner events in arrival order.
    async fn append_events(
        &self,
        session_id: SessionId,
        events: &[AgentEvent],
    ) -> Result<(), SessionStoreError>;
}

/// Apply a partial update in place. Returns false when the session is
/// terminal and the mutation was ignored.
fn apply_update(session: &mut Session, update: SessionUpdate, at: DateTime<Utc>) -> bool {
    if session.status.is_terminal() {
        return false;
    }
    if let Some(status) = update.status {
        session.status = status;
    }
    if let Some(stage) = update.current_stage {
        session.current_stage = Some(stage);
    }
    if let Some(progress) = update.progress {
        // Progress never moves backwards while the workflow is live.
        session.progress = session.progress.max(progress.min(100));
    }
    if let Some(message) = update.error_message {
        session.error_message = Some(message);
    }
    if let Some(requirements_data) = update.requirements_data {
        session.requirements_data = Some(requirements_data);
    }
    if let Some(cost_data) = update.cost_data {
        session.cost_data = Some(cost_data);
    }
    if let Some(template_selection) = update.template_selection {
        session.template_selection = Some(template_selection);
    }
    session.updated_at = at;
    true
}

/// Append an artifact link in place, honoring the terminal guard.
fn apply_document_url(session: &mut Session, url: &str, at: DateTime<Utc>) -> bool {
    if session.status.is_terminal() {
        return false;
    }
    session.document_urls.push(url.to_string());
    session.updated_at = at;
    true
}

/// Append classified events in place, honoring the terminal guard.
fn apply_events(session: &mut Session, events: &[AgentEvent], at: DateTime<Utc>) -> bool {
    if session.status.is_terminal() {
        return false;
    }
    session.agent_events.extend_from_slice(events);
    session.updated_at = at;
    true
}

/// In-memory session store backed by a shared map.
#[derive(Default, Clone)]
pub struct MemorySessionStore {
    sessions: Arc<RwLock<HashMap<SessionId, Session>>>,
}

impl MemorySessionStore {
    /// Create an empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn create(&self, intake: IntakeFields) -> Result<SessionId, SessionStoreError> {
        let session_id = Uuid::new_v4();
        let session = Session::new(session_id, intake, Utc::now());
        info!(
            "created session (session_id={}, client={})",
            session_id, session.client_name
        );
        self.sessions.write().insert(session_id, session);
        Ok(session_id)
    }

    async fn get(&self, session_id: SessionId) -> Result<Session, SessionStoreError> {
        self.sessions
            .read()
            .get(&session_id)
            .cloned()
            .ok_or(SessionStoreError::NotFound(session_id))
    }

    async fn update(
        &self,
        session_id: SessionId,
        update: SessionUpdate,
    ) -> Result<(), SessionStoreError> {
        let mut sessions = self.sessions.write();
        let session = sessions
            .get_mut(&session_id)
            .ok_or(SessionStoreError::NotFound(session_id))?;
        if !apply_update(session, update, Utc::now()) {
            warn!(
                "ignoring update to terminal session (session_id={}, status={})",
                session_id, session.status
            );
        }
        Ok(())
    }

    async fn append_document_url(
        &self,
        session_id: SessionId,
        url: &str,
    ) -> Result<(), SessionStoreError> {
        let mut sessions = self.sessions.write();
        let session = sessions
            .get_mut(&session_id)
            .ok_or(SessionStoreError::NotFound(session_id))?;
        if apply_document_url(session, url, Utc::now()) {
            debug!(
                "appended document url (session_id={}, count={})",
                session_id,
                session.document_urls.len()
            );
        } else {
            warn!(
                "ignoring document url append to terminal session (session_id={})",
                session_id
            );
        }
        Ok(())
    }

    async fn append_events(
        &self,
        session_id: SessionId,
        events: &[AgentEvent],
    ) -> Result<(), SessionStoreError> {
        if events.is_empty() {
            return Ok(());
        }
        let mut sessions = self.sessions.write();
        let session = sessions
            .get_mut(&session_id)
            .ok_or(SessionStoreError::NotFound(session_id))?;
        if apply_events(session, events, Utc::now()) {
            debug!(
                "appended agent events (session_id={}, batch={}, total={})",
                session_id,
                events.len(),
                session.agent_events.len()
            );
        } else {
            warn!(
                "ignoring event append to terminal session (session_id={})",
                session_id
            );
        }
        Ok(())
    }
}

/// Internal JSONL rollout event representation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum RolloutEvent {
    SchemaVersion {
        version: u32,
    },
    SessionCreated {
        session_id: SessionId,
        intake: IntakeFields,
        created_at: DateTime<Utc>,
    },
    FieldsUpdated {
        update: SessionUpdate,
        at: DateTime<Utc>,
    },
    DocumentUrlAppended {
        url: String,
        at: DateTime<Utc>,
    },
    EventsAppended {
        events: Vec<AgentEvent>,
        at: DateTime<Utc>,
    },
}

#[derive(Default)]
struct RolloutState {
    version: Option<u32>,
    session: Option<Session>,
}

impl RolloutState {
    fn apply(&mut self, session_id: SessionId, event: RolloutEvent) -> Result<(), SessionStoreError> {
        match event {
            RolloutEvent::SchemaVersion { version } => {
                self.version = Some(version);
                if version > 1 {
                    return Err(SessionStoreError::UnsupportedSchema(version));
                }
            }
            RolloutEvent::SessionCreated {
                intake, created_at, ..
            } => {
                self.session = Some(Session::new(session_id, intake, created_at));
            }
            RolloutEvent::FieldsUpdated { update, at } => {
                if let Some(session) = self.session.as_mut() {
                    apply_update(session, update, at);
                }
            }
            RolloutEvent::DocumentUrlAppended { url, at } => {
                if let Some(session) = self.session.as_mut() {
                    apply_document_url(session, &url, at);
                }
            }
            RolloutEvent::EventsAppended { events, at } => {
                if let Some(session) = self.session.as_mut() {
                    apply_events(session, &events, at);
                }
            }
        }
        Ok(())
    }

    fn finish(self) -> Result<Session, SessionStoreError> {
        let _ = self.version.ok_or(SessionStoreError::MissingMetadata)?;
        self.session.ok_or(SessionStoreError::MissingMetadata)
    }
}

/// JSONL-backed session store, one rollout file per session.
pub struct JsonlSessionStore {
    /// Root directory for session rollouts.
    root: PathBuf,
    /// Serialize replay-then-append sequences across writers.
    write_lock: Mutex<()>,
}

impl JsonlSessionStore {
    /// Create a new JSONL store under the given root.
    pub fn new(root: impl AsRef<Path>) -> Result<Self, SessionStoreError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        info!("initialized JSONL session store (root={})", root.display());
        Ok(Self {
            root,
            write_lock: Mutex::new(()),
        })
    }

    /// Build the rollout file path for a session.
    fn rollout_path(&self, session_id: SessionId) -> PathBuf {
        self.root.join(format!("{session_id}.jsonl"))
    }

    /// Append an event to an existing rollout file.
    fn write_event(
        &self,
        session_id: SessionId,
        event: &RolloutEvent,
    ) -> Result<(), SessionStoreError> {
        let path = self.rollout_path(session_id);
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        let line = serde_json::to_string(event)?;
        writeln!(file, "{line}")?;
        Ok(())
    }

    /// Read and reconstruct a session from its rollout file.
    fn read_rollout(&self, session_id: SessionId) -> Result<Option<Session>, SessionStoreError> {
        let path = self.rollout_path(session_id);
        if !path.exists() {
            return Ok(None);
        }
        let file = OpenOptions::new().read(true).open(&path)?;
        let reader = BufReader::new(file);
        let mut rollout = RolloutState::default();

        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let event: RolloutEvent = serde_json::from_str(&line)?;
            rollout.apply(session_id, event)?;
        }
        Ok(Some(rollout.finish()?))
    }

    /// Replay the current state, then append the event only if the session is
    /// still accepting mutations. Holding the write lock across replay and
    /// append keeps the terminal guard race-free.
    fn append_if_live(
        &self,
        session_id: SessionId,
        event: RolloutEvent,
    ) -> Result<(), SessionStoreError> {
        let _guard = self.write_lock.lock();
        let session = self
            .read_rollout(session_id)?
            .ok_or(SessionStoreError::NotFound(session_id))?;
        if session.status.is_terminal() {
            warn!(
                "ignoring write to terminal session (session_id={}, status={})",
                session_id, session.status
            );
            return Ok(());
        }
        self.write_event(session_id, &event)
    }
}

#[async_trait]
impl SessionStore for JsonlSessionStore {
    async fn create(&self, intake: IntakeFields) -> Result<SessionId, SessionStoreError> {
        let session_id = Uuid::new_v4();
        let created_at = Utc::now();
        info!(
            "recording session creation (session_id={}, client={})",
            session_id, intake.client_name
        );
        let _guard = self.write_lock.lock();
        let path = self.rollout_path(session_id);
        if path.exists() {
            return Err(SessionStoreError::SessionExists(session_id));
        }
        let mut file = OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(&path)?;
        let header = serde_json::to_string(&RolloutEvent::SchemaVersion { version: 1 })?;
        writeln!(file, "{header}")?;
        let line = serde_json::to_string(&RolloutEvent::SessionCreated {
            session_id,
            intake,
            created_at,
        })?;
        writeln!(file, "{line}")?;
        Ok(session_id)
    }

    async fn get(&self, session_id: SessionId) -> Result<Session, SessionStoreError> {
        self.read_rollout(session_id)?
            .ok_or(SessionStoreError::NotFound(session_id))
    }

    async fn update(
        &self,
        session_id: SessionId,
        update: SessionUpdate,
    ) -> Result<(), SessionStoreError> {
        self.append_if_live(
            session_id,
            RolloutEvent::FieldsUpdated {
                update,
                at: Utc::now(),
            },
        )
    }

    async fn append_document_url(
        &self,
        session_id: SessionId,
        url: &str,
    ) -> Result<(), SessionStoreError> {
        debug!(
            "appending document url (session_id={}, url={})",
            session_id, url
        );
        self.append_if_live(
            session_id,
            RolloutEvent::DocumentUrlAppended {
                url: url.to_string(),
                at: Utc::now(),
            },
        )
    }

    async fn append_events(
        &self,
        session_id: SessionId,
        events: &[AgentEvent],
    ) -> Result<(), SessionStoreError> {
        if events.is_empty() {
            return Ok(());
        }
        debug!(
            "appending agent events (session_id={}, batch={})",
            session_id,
            events.len()
        );
        self.append_if_live(
            session_id,
            RolloutEvent::EventsAppended {
                events: events.to_vec(),
                at: Utc::now(),
            },
        )
    }
}

/// Build the session store configured for this deployment: a JSONL store when
/// a path is configured or resolvable, otherwise in-memory.
pub fn build_session_store(
    config: &StorageConfig,
) -> Result<Arc<dyn SessionStore>, SessionStoreError> {
    match resolve_sessions_root(config.sessions_path.as_ref()) {
        Some(root) => {
            info!("initializing session store (root={})", root.display());
            Ok(Arc::new(JsonlSessionStore::new(root)?))
        }
        None => {
            warn!("no session root resolvable; sessions will not survive restart");
            Ok(Arc::new(MemorySessionStore::new()))
        }
    }
}

/// Resolve an absolute storage root for configured or default session paths.
fn resolve_sessions_root(path: Option<&String>) -> Option<PathBuf> {
    if let Some(path) = path {
        let path = PathBuf::from(path);
        if path.is_absolute() {
            return Some(path);
        }
        if let Ok(cwd) = std::env::current_dir() {
            return Some(cwd.join(path));
        }
        return None;
    }

    BaseDirs::new().map(|dirs| dirs.home_dir().join(".scopeforge").join("sessions"))
}
