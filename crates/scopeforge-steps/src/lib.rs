//! Leaf transformation steps for the proposal workflow.
//!
//! Each step is a pure transform behind the uniform [`Step`] interface:
//! payload in, structured result out, with its own output persisted through
//! the session store before returning.

mod analyze;
mod context;
mod cost;
mod document;
mod objects;
mod oracle;
mod rates;
mod slides;
mod templates;

pub use analyze::AnalyzeRequirementsStep;
pub use context::StepContext;
pub use cost::CalculateCostStep;
pub use document::GenerateDocumentStep;
pub use objects::{LocalObjectStore, ObjectInfo, ObjectStore, ObjectStoreError};
pub use oracle::{
    CompletionOracle, CompletionRequest, HttpCompletionOracle, OracleError, StaticOracle,
};
pub use rates::{RateSheetError, RateSheetProvider, RoleRate, StaticRateSheet};
pub use slides::GenerateSlidesStep;
pub use templates::RetrieveTemplatesStep;

use scopeforge_core::{Step, StepRegistry};
use std::sync::Arc;

/// Build a registry containing all five workflow steps.
pub fn builtin_step_registry(ctx: Arc<StepContext>) -> StepRegistry {
    let registry = StepRegistry::new();
    let steps: Vec<Arc<dyn Step>> = vec![
        Arc::new(AnalyzeRequirementsStep::new(ctx.clone())),
        Arc::new(CalculateCostStep::new(ctx.clone())),
        Arc::new(RetrieveTemplatesStep::new(ctx.clone())),
        Arc::new(GenerateSlidesStep::new(ctx.clone())),
        Arc::new(GenerateDocumentStep::new(ctx)),
    ];
    for step in steps {
        registry.register(step);
    }
    registry
}
