//! # triage-dispatch
//!
//! The classification request path. A [`Dispatcher`] answers "classify this
//! entity (or these entities) with this model" from three collaborators:
//!
//! - a [`ChangeTimeOracle`] reporting each entity's current change time,
//! - a [`ResultStore`](triage_store::ResultStore) holding cached results and
//!   pending-job markers,
//! - a [`JobQueue`](triage_store::JobQueue) feeding inference workers.
//!
//! Results are keyed by model, entity, and change time, so an entity that
//! changed upstream simply misses the cache and gets a fresh job. Concurrent
//! requests for the same key enqueue at most one job.

mod batch;
pub mod dispatcher;
pub mod error;
pub mod oracle;

pub use dispatcher::{DispatchSettings, Dispatcher};
pub use error::DispatchError;
pub use oracle::{ChangeTimeOracle, OracleError};
