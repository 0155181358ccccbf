//! # triage-core
//!
//! Core types, job-key derivation, and error types for triage.
//!
//! This crate provides the foundational types shared across all triage crates:
//! - Model names and the registry of supported models
//! - Entities (tracker bugs and issues) and their opaque change times
//! - Job keys, job handles, queued jobs and their status state machine
//! - Cached results and pending-job records
//! - Batch input validation
//! - Classification outcomes and the response bodies of the HTTP contract
//! - Cross-cutting error types

pub mod batch;
pub mod entity;
pub mod errors;
pub mod ids;
pub mod job;
pub mod model;
pub mod responses;

pub use entity::{Entity, IssueRef};
pub use errors::CoreError;
pub use job::{CachedResult, ChangeTime, Job, JobHandle, JobItem, JobKey, JobStatus, PendingJob};
pub use model::{ModelName, ModelRegistry};
pub use responses::{BatchEntry, BatchResult, Outcome};
