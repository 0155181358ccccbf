//! Cross-cutting error types for triage.
//!
//! Domain-specific errors (`StoreError`, `DispatchError`) are defined in their
//! respective crates. Everything here is a validation failure: it is raised
//! synchronously and never results in queued work.

use thiserror::Error;

use crate::batch::BatchValidationError;

/// Errors that can be raised by any triage crate.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The requested model is not part of the registry.
    #[error("Model {0} doesn't exist")]
    UnknownModel(String),

    /// A batch request failed input validation.
    #[error("Invalid batch: {0}")]
    InvalidBatch(#[from] BatchValidationError),

    /// An entity identifier could not be parsed.
    #[error("Malformed entity identifier '{input}': {reason}")]
    MalformedEntity { input: String, reason: String },

    /// A job key string does not have the expected shape.
    #[error("Malformed job key '{0}'")]
    MalformedJobKey(String),

    /// Data failed validation (format, constraints).
    #[error("Validation error: {0}")]
    Validation(String),
}
