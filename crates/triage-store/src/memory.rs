//! Process-local store and queue.
//!
//! Each structure sits behind one `tokio::sync::Mutex`, so every trait method
//! is atomic with respect to the others. That makes [`MemoryStore::claim_pending`]
//! a true set-if-absent within the process.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use triage_core::{CachedResult, Job, JobHandle, JobKey, JobStatus, PendingJob};

use crate::error::StoreError;
use crate::helpers::{expiry_after, finished_cutoff};
use crate::traits::{Claim, JobQueue, QueuedJob, ResultStore};

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct StoreInner {
    results: HashMap<JobKey, (CachedResult, DateTime<Utc>)>,
    pending: HashMap<JobKey, PendingJob>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<StoreInner>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of result entries, expired ones included.
    pub async fn result_count(&self) -> usize {
        self.inner.lock().await.results.len()
    }

    /// Number of pending entries, expired ones included.
    pub async fn pending_count(&self) -> usize {
        self.inner.lock().await.pending.len()
    }
}

impl ResultStore for MemoryStore {
    async fn get_result(&self, key: &JobKey) -> Result<Option<CachedResult>, StoreError> {
        let now = Utc::now();
        let inner = self.inner.lock().await;
        Ok(inner
            .results
            .get(key)
            .filter(|(_, expires_at)| *expires_at > now)
            .map(|(result, _)| result.clone()))
    }

    async fn put_result(
        &self,
        key: &JobKey,
        result: &CachedResult,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        let expires_at = expiry_after(Utc::now(), ttl);
        self.inner
            .lock()
            .await
            .results
            .insert(key.clone(), (result.clone(), expires_at));
        Ok(())
    }

    async fn get_pending(&self, key: &JobKey) -> Result<Option<PendingJob>, StoreError> {
        let now = Utc::now();
        let inner = self.inner.lock().await;
        Ok(inner
            .pending
            .get(key)
            .filter(|pending| !pending.is_expired_at(now))
            .cloned())
    }

    async fn claim_pending(&self, key: &JobKey, ttl: Duration) -> Result<Claim, StoreError> {
        let now = Utc::now();
        let mut inner = self.inner.lock().await;
        if let Some(existing) = inner.pending.get(key)
            && !existing.is_expired_at(now)
        {
            return Ok(Claim::Held(existing.clone()));
        }
        inner.pending.insert(
            key.clone(),
            PendingJob {
                handle: None,
                claimed_at: now,
                expires_at: expiry_after(now, ttl),
            },
        );
        Ok(Claim::Acquired)
    }

    async fn attach_handle(
        &self,
        keys: &[JobKey],
        handle: &JobHandle,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        let now = Utc::now();
        let expires_at = expiry_after(now, ttl);
        let mut inner = self.inner.lock().await;
        for key in keys {
            let entry = inner.pending.entry(key.clone()).or_insert(PendingJob {
                handle: None,
                claimed_at: now,
                expires_at,
            });
            entry.handle = Some(handle.clone());
            entry.expires_at = expires_at;
        }
        Ok(())
    }

    async fn release_pending(&self, keys: &[JobKey]) -> Result<u64, StoreError> {
        let mut inner = self.inner.lock().await;
        let removed = keys
            .iter()
            .filter(|key| inner.pending.remove(*key).is_some())
            .count();
        Ok(removed as u64)
    }

    async fn purge_expired(&self) -> Result<u64, StoreError> {
        let now = Utc::now();
        let mut inner = self.inner.lock().await;
        let before = inner.results.len() + inner.pending.len();
        inner.results.retain(|_, (_, expires_at)| *expires_at > now);
        inner.pending.retain(|_, pending| !pending.is_expired_at(now));
        let after = inner.results.len() + inner.pending.len();
        Ok((before - after) as u64)
    }
}

// ---------------------------------------------------------------------------
// MemoryQueue
// ---------------------------------------------------------------------------

/// Handles drawn before giving up on an enqueue.
const ENQUEUE_ATTEMPTS: usize = 3;

#[derive(Debug, Default)]
struct QueueInner {
    jobs: HashMap<JobHandle, QueuedJob>,
    order: Vec<JobHandle>,
    enqueued: usize,
}

#[derive(Debug, Default)]
pub struct MemoryQueue {
    inner: Mutex<QueueInner>,
}

impl MemoryQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Total jobs ever enqueued, purged and forgotten ones included.
    pub async fn enqueued_count(&self) -> usize {
        self.inner.lock().await.enqueued
    }

    /// Drop a job as if the queue backend lost it.
    pub async fn forget(&self, handle: &JobHandle) -> bool {
        let mut inner = self.inner.lock().await;
        inner.order.retain(|queued| queued != handle);
        inner.jobs.remove(handle).is_some()
    }

    async fn enqueue_with<F>(&self, job: &Job, mut next_handle: F) -> Result<JobHandle, StoreError>
    where
        F: FnMut() -> Result<JobHandle, triage_core::CoreError>,
    {
        let now = Utc::now();
        let mut inner = self.inner.lock().await;
        for _ in 0..ENQUEUE_ATTEMPTS {
            let handle = next_handle()?;
            if inner.jobs.contains_key(&handle) {
                tracing::warn!(handle = %handle, "job handle already taken, drawing another");
                continue;
            }
            inner.jobs.insert(
                handle.clone(),
                QueuedJob {
                    handle: handle.clone(),
                    job: job.clone(),
                    status: JobStatus::Queued,
                    error: None,
                    enqueued_at: now,
                    updated_at: now,
                },
            );
            inner.order.push(handle.clone());
            inner.enqueued += 1;
            return Ok(handle);
        }
        Err(StoreError::InvalidState(format!(
            "no free job handle after {ENQUEUE_ATTEMPTS} attempts"
        )))
    }

    async fn transition(
        &self,
        handle: &JobHandle,
        to: JobStatus,
        error: Option<&str>,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        let job = inner
            .jobs
            .get_mut(handle)
            .ok_or_else(|| StoreError::UnknownJob(handle.to_string()))?;
        if !job.status.can_transition_to(to) {
            return Err(StoreError::InvalidTransition {
                handle: handle.to_string(),
                from: job.status,
                to,
            });
        }
        job.status = to;
        job.error = error.map(String::from);
        job.updated_at = Utc::now();
        Ok(())
    }
}

impl JobQueue for MemoryQueue {
    async fn enqueue(&self, job: &Job) -> Result<JobHandle, StoreError> {
        self.enqueue_with(job, JobHandle::generate).await
    }

    async fn status(&self, handle: &JobHandle) -> Result<Option<JobStatus>, StoreError> {
        Ok(self.inner.lock().await.jobs.get(handle).map(|job| job.status))
    }

    async fn get(&self, handle: &JobHandle) -> Result<Option<QueuedJob>, StoreError> {
        Ok(self.inner.lock().await.jobs.get(handle).cloned())
    }

    async fn claim_next(&self) -> Result<Option<QueuedJob>, StoreError> {
        let mut inner = self.inner.lock().await;
        let QueueInner { jobs, order, .. } = &mut *inner;
        let next = order
            .iter()
            .find(|handle| jobs.get(*handle).is_some_and(|job| job.status == JobStatus::Queued))
            .cloned();
        let Some(handle) = next else {
            return Ok(None);
        };
        let Some(job) = jobs.get_mut(&handle) else {
            return Ok(None);
        };
        job.status = JobStatus::Running;
        job.updated_at = Utc::now();
        Ok(Some(job.clone()))
    }

    async fn finish(&self, handle: &JobHandle) -> Result<(), StoreError> {
        self.transition(handle, JobStatus::Done, None).await
    }

    async fn fail(&self, handle: &JobHandle, reason: &str) -> Result<(), StoreError> {
        self.transition(handle, JobStatus::Failed, Some(reason)).await
    }

    async fn list(
        &self,
        status: Option<JobStatus>,
        limit: usize,
    ) -> Result<Vec<QueuedJob>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .order
            .iter()
            .filter_map(|handle| inner.jobs.get(handle))
            .filter(|job| status.is_none_or(|status| job.status == status))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn purge_finished(&self, older_than: Duration) -> Result<u64, StoreError> {
        let cutoff = finished_cutoff(Utc::now(), older_than);
        let mut inner = self.inner.lock().await;
        let before = inner.jobs.len();
        inner.jobs.retain(|_, job| {
            !(matches!(job.status, JobStatus::Done | JobStatus::Failed)
                && job.updated_at <= cutoff)
        });
        let QueueInner { jobs, order, .. } = &mut *inner;
        order.retain(|handle| jobs.contains_key(handle));
        Ok((before - inner.jobs.len()) as u64)
    }
}
