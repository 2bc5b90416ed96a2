//! Embedding surface for ScopeForge.
//!
//! Re-exports the workspace crates under stable module names so consumers
//! depend on a single crate, plus a logging bootstrap helper.

/// Configuration schema and loading.
pub use scopeforge_config as config;
/// Orchestrator, stores, and planner boundary.
pub use scopeforge_core as core;
/// Wire types shared across components.
pub use scopeforge_protocol as protocol;
/// Leaf workflow steps and their collaborators.
pub use scopeforge_steps as steps;

#[inline]
/// Initialize logging via env_logger when the "logging" feature is enabled.
///
/// A no-op otherwise; binaries should call this early in startup.
pub fn init_logging() {
    #[cfg(feature = "logging")]
    {
        let _ = env_logger::try_init();
    }
}
