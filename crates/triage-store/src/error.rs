//! Store error types for triage-store.

use thiserror::Error;
use triage_core::{CoreError, JobStatus};

/// Errors from result-store, pending-registry, and queue operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A SQL query failed or returned malformed data.
    #[error("Query failed: {0}")]
    Query(String),

    /// Schema migration failed.
    #[error("Migration failed: {0}")]
    Migration(String),

    /// Expected a result row but none was returned.
    #[error("No result returned")]
    NoResult,

    /// The queue has no job with this handle.
    #[error("Unknown job: {0}")]
    UnknownJob(String),

    /// A job status change that the lifecycle does not allow.
    #[error("Invalid job transition: {handle} from {from} to {to}")]
    InvalidTransition {
        handle: String,
        from: JobStatus,
        to: JobStatus,
    },

    /// Invalid state encountered (e.g., a worker reported a key the job never had).
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Payload (de)serialization failed.
    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Domain validation failed.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Underlying libSQL error.
    #[error("libSQL error: {0}")]
    LibSql(#[from] libsql::Error),
}
