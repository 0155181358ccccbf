//! Worker-side completion path.
//!
//! Inference workers claim a job from the queue, compute a payload per item,
//! and report back through [`complete_job`] or [`fail_job`]. Both release the
//! job's pending records: completion because results are now cached, failure
//! so the next poll re-enqueues instead of waiting out the pending TTL.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use triage_core::{CachedResult, JobHandle, JobKey, JobStatus};

use crate::error::StoreError;
use crate::traits::{JobQueue, QueuedJob, ResultStore};

/// One computed payload reported by a worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerOutput {
    pub job_key: JobKey,
    pub payload: serde_json::Value,
}

async fn load_job<Q: JobQueue>(queue: &Q, handle: &JobHandle) -> Result<QueuedJob, StoreError> {
    queue
        .get(handle)
        .await?
        .ok_or_else(|| StoreError::UnknownJob(handle.to_string()))
}

/// Cache every output of a running job, release its pending records, and
/// mark it done. Returns the number of results written.
///
/// Each result is stored with the change time the job item was enqueued
/// with, so it is only ever served for that version of the entity.
///
/// # Errors
///
/// Returns `StoreError::InvalidTransition` if the job is not running,
/// `StoreError::InvalidState` if an output names a key the job does not
/// contain, or any store/queue failure.
pub async fn complete_job<S, Q>(
    store: &S,
    queue: &Q,
    handle: &JobHandle,
    outputs: Vec<WorkerOutput>,
    result_ttl: Duration,
) -> Result<usize, StoreError>
where
    S: ResultStore,
    Q: JobQueue,
{
    let queued = load_job(queue, handle).await?;
    if !queued.status.can_transition_to(JobStatus::Done) {
        return Err(StoreError::InvalidTransition {
            handle: handle.to_string(),
            from: queued.status,
            to: JobStatus::Done,
        });
    }

    let mut to_write = Vec::with_capacity(outputs.len());
    for output in outputs {
        let item = queued
            .job
            .items
            .iter()
            .find(|item| item.job_key == output.job_key)
            .ok_or_else(|| {
                StoreError::InvalidState(format!(
                    "job {handle} has no item with key {}",
                    output.job_key
                ))
            })?;
        to_write.push((
            output.job_key,
            CachedResult::new(output.payload, item.change_time.clone()),
        ));
    }

    for (key, result) in &to_write {
        store.put_result(key, result, result_ttl).await?;
    }

    let keys: Vec<JobKey> = queued.job.keys().cloned().collect();
    store.release_pending(&keys).await?;
    queue.finish(handle).await?;

    if to_write.len() < keys.len() {
        tracing::warn!(
            handle = %handle,
            written = to_write.len(),
            items = keys.len(),
            "job completed without a result for every item"
        );
    } else {
        tracing::info!(handle = %handle, written = to_write.len(), "job completed");
    }
    Ok(to_write.len())
}

/// Mark a job failed and release its pending records.
///
/// # Errors
///
/// Returns `StoreError::UnknownJob`, `StoreError::InvalidTransition` if the
/// job already finished, or any store/queue failure.
pub async fn fail_job<S, Q>(
    store: &S,
    queue: &Q,
    handle: &JobHandle,
    reason: &str,
) -> Result<(), StoreError>
where
    S: ResultStore,
    Q: JobQueue,
{
    let queued = load_job(queue, handle).await?;
    queue.fail(handle, reason).await?;

    let keys: Vec<JobKey> = queued.job.keys().cloned().collect();
    store.release_pending(&keys).await?;
    tracing::warn!(handle = %handle, reason, "job failed");
    Ok(())
}
