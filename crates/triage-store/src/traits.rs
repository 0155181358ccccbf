//! Contracts between the dispatcher and its shared, durable resources.
//!
//! Both traits are implemented by the libSQL backend ([`crate::TriageDb`]) and
//! the in-memory backend ([`crate::memory`]). Methods return `Send` futures so
//! dispatch calls can run on any tokio worker thread.

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use triage_core::{CachedResult, Job, JobHandle, JobKey, JobStatus, PendingJob};

use crate::error::StoreError;

/// Result of an atomic set-if-absent on a pending-job record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Claim {
    /// No live record existed; the caller now owns the key and must enqueue.
    Acquired,
    /// A live record already exists; work is (or is about to be) in flight.
    Held(PendingJob),
}

/// Key/value store for cached results and pending-job markers, with expiry.
pub trait ResultStore: Send + Sync {
    /// Cached result for `key`, ignoring expired entries.
    fn get_result(
        &self,
        key: &JobKey,
    ) -> impl Future<Output = Result<Option<CachedResult>, StoreError>> + Send;

    /// Insert or replace the result for `key`.
    fn put_result(
        &self,
        key: &JobKey,
        result: &CachedResult,
        ttl: Duration,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Live pending record for `key`, ignoring expired entries.
    fn get_pending(
        &self,
        key: &JobKey,
    ) -> impl Future<Output = Result<Option<PendingJob>, StoreError>> + Send;

    /// Atomically create a pending record for `key` unless a live one exists.
    ///
    /// Expired records never block a claim.
    fn claim_pending(
        &self,
        key: &JobKey,
        ttl: Duration,
    ) -> impl Future<Output = Result<Claim, StoreError>> + Send;

    /// Record the queue handle on previously claimed keys, refreshing their expiry.
    fn attach_handle(
        &self,
        keys: &[JobKey],
        handle: &JobHandle,
        ttl: Duration,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Drop pending records. Returns how many existed.
    fn release_pending(
        &self,
        keys: &[JobKey],
    ) -> impl Future<Output = Result<u64, StoreError>> + Send;

    /// Delete expired results and pending records. Returns rows removed.
    fn purge_expired(&self) -> impl Future<Output = Result<u64, StoreError>> + Send;
}

/// A job as seen by the queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuedJob {
    pub handle: JobHandle,
    pub job: Job,
    pub status: JobStatus,
    pub error: Option<String>,
    pub enqueued_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// At-least-once work queue feeding inference workers.
pub trait JobQueue: Send + Sync {
    /// Add a job; fire-and-forget from the caller's perspective.
    fn enqueue(&self, job: &Job) -> impl Future<Output = Result<JobHandle, StoreError>> + Send;

    /// Current status, or `None` if the queue does not know the handle.
    fn status(
        &self,
        handle: &JobHandle,
    ) -> impl Future<Output = Result<Option<JobStatus>, StoreError>> + Send;

    /// Full job record.
    fn get(
        &self,
        handle: &JobHandle,
    ) -> impl Future<Output = Result<Option<QueuedJob>, StoreError>> + Send;

    /// Worker side: take the oldest queued job and mark it running.
    fn claim_next(&self) -> impl Future<Output = Result<Option<QueuedJob>, StoreError>> + Send;

    /// Worker side: mark a running job done.
    fn finish(&self, handle: &JobHandle) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Worker side: mark a queued or running job failed.
    fn fail(
        &self,
        handle: &JobHandle,
        reason: &str,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Jobs in enqueue order, optionally filtered by status.
    fn list(
        &self,
        status: Option<JobStatus>,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<QueuedJob>, StoreError>> + Send;

    /// Delete done and failed jobs last updated at least `older_than` ago.
    /// Returns how many were removed.
    fn purge_finished(
        &self,
        older_than: Duration,
    ) -> impl Future<Output = Result<u64, StoreError>> + Send;
}
