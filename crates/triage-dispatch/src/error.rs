//! Dispatch error taxonomy.
//!
//! - Validation failures (unknown model, bad batch) are raised before any
//!   oracle, store, or queue call.
//! - Upstream failures (oracle, store, timeouts) are retryable and are never
//!   reported as `Pending`.
//! - Entity not found is not an error: it is [`triage_core::Outcome::NotFound`].

use std::time::Duration;

use serde_json::{Value, json};
use thiserror::Error;
use triage_core::CoreError;
use triage_core::batch::BatchValidationError;
use triage_core::responses::{STATUS_BAD_REQUEST, STATUS_UNAVAILABLE};
use triage_store::StoreError;

use crate::oracle::OracleError;

#[derive(Debug, Error)]
pub enum DispatchError {
    /// The requested model is not in the registry.
    #[error("Model {0} doesn't exist")]
    InvalidModel(String),

    /// The batch was empty or named malformed identifiers.
    #[error("Invalid batch: {0}")]
    InvalidBatch(#[from] BatchValidationError),

    /// The request failed input validation.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The change-time oracle failed.
    #[error("change-time lookup failed: {0}")]
    Oracle(#[from] OracleError),

    /// The result store or job queue failed.
    #[error("store operation failed: {0}")]
    Store(#[from] StoreError),

    /// An upstream call exceeded its time bound.
    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },
}

impl From<CoreError> for DispatchError {
    fn from(error: CoreError) -> Self {
        match error {
            CoreError::UnknownModel(name) => Self::InvalidModel(name),
            CoreError::InvalidBatch(batch) => Self::InvalidBatch(batch),
            other => Self::Validation(other.to_string()),
        }
    }
}

impl DispatchError {
    /// Whether the caller may retry the same request later.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Oracle(_) | Self::Store(_) | Self::Timeout { .. })
    }

    #[must_use]
    pub const fn http_status(&self) -> u16 {
        if self.is_retryable() {
            STATUS_UNAVAILABLE
        } else {
            STATUS_BAD_REQUEST
        }
    }

    /// Response body for this error.
    ///
    /// Batch validation errors list every offending index under `field`
    /// (`bugs` or `issues`); every other error is `{"error": message}`.
    #[must_use]
    pub fn body(&self, field: &str) -> Value {
        match self {
            Self::InvalidBatch(batch) => batch.to_body(field),
            other => json!({ "error": other.to_string() }),
        }
    }
}
