//! Configuration models and loading for ScopeForge.
//!
//! This crate owns the config schema, validation, and JSON5 file loading used
//! by both the server binary and embedding consumers.

mod error;
mod loader;
mod model;

/// Public error type returned by config loading and validation APIs.
pub use error::ConfigError;
/// Configuration schema models.
pub use model::*;
