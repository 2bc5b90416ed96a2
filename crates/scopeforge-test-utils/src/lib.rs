//! Test helpers shared across ScopeForge crates.

pub mod planner;
pub mod steps;
pub mod store;

pub use planner::{FailingPlanner, ScriptedPlanner, ThrottledPlanner};
pub use steps::{FailingStep, FixedStep, RecordingStep};
pub use store::RecordingSessionStore;
