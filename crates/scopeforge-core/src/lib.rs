//! Core orchestration primitives for ScopeForge.
//!
//! This crate owns the session model and store, the step invoker, the planner
//! client boundary, and the workflow orchestrator used by the server and SDK.

pub mod error;
pub mod invoker;
pub mod orchestrator;
pub mod planner;
pub mod store;
pub mod types;

pub use error::ForgeCoreError;
pub use invoker::{Step, StepInvoker, StepRegistry};
/// Orchestrator facade and workflow engine.
pub use orchestrator::{
    DelegatedStrategy, DirectStrategy, EventStreamReader, Orchestrator, StreamOutcome,
    TokioDispatcher, WorkflowDispatcher, WorkflowEngine, WorkflowOutcome, WorkflowRunner,
    WorkflowStrategy,
};
pub use planner::{Planner, PlannerError, PlannerEventStream, RemotePlanner};
pub use store::{
    JsonlSessionStore, MemorySessionStore, SessionStore, SessionStoreError, SessionUpdate,
    build_session_store,
};
pub use types::{IntakeFields, ProjectDuration, ProposalArtifacts, Session, SubmissionReceipt};
