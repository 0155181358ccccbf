//! Job queue on libSQL.

use std::time::Duration;

use chrono::Utc;
use triage_core::ids::PREFIX_JOB;
use triage_core::{Job, JobHandle, JobItem, JobStatus};

use crate::TriageDb;
use crate::error::StoreError;
use crate::helpers::{finished_cutoff, from_millis, parse_text};
use crate::traits::{JobQueue, QueuedJob};

/// Handles drawn before giving up on an enqueue.
const ENQUEUE_ATTEMPTS: usize = 3;

const SELECT_COLS: &str = "handle, model, items, status, error, enqueued_at, updated_at";

fn row_to_job(row: &libsql::Row) -> Result<QueuedJob, StoreError> {
    let items: Vec<JobItem> = serde_json::from_str(&row.get::<String>(2)?)?;
    Ok(QueuedJob {
        handle: JobHandle::new(row.get::<String>(0)?),
        job: Job {
            model: parse_text(&row.get::<String>(1)?)?,
            items,
        },
        status: parse_text(&row.get::<String>(3)?)?,
        error: row.get::<Option<String>>(4)?,
        enqueued_at: from_millis(row.get::<i64>(5)?)?,
        updated_at: from_millis(row.get::<i64>(6)?)?,
    })
}

impl TriageDb {
    /// Move a job to `to`, enforcing the status state machine.
    async fn transition_job(
        &self,
        handle: &JobHandle,
        to: JobStatus,
        error: Option<&str>,
    ) -> Result<(), StoreError> {
        let from = self
            .status(handle)
            .await?
            .ok_or_else(|| StoreError::UnknownJob(handle.to_string()))?;
        if !from.can_transition_to(to) {
            return Err(StoreError::InvalidTransition {
                handle: handle.to_string(),
                from,
                to,
            });
        }

        let mut rows = self
            .conn()
            .query(
                "UPDATE jobs SET status = ?1, error = ?2, updated_at = ?3
                 WHERE handle = ?4 AND status = ?5
                 RETURNING handle",
                libsql::params![
                    to.as_str(),
                    error,
                    Utc::now().timestamp_millis(),
                    handle.as_str(),
                    from.as_str()
                ],
            )
            .await?;
        if rows.next().await?.is_none() {
            return Err(StoreError::InvalidState(format!(
                "job {handle} left status {from} concurrently"
            )));
        }
        Ok(())
    }
}

impl JobQueue for TriageDb {
    async fn enqueue(&self, job: &Job) -> Result<JobHandle, StoreError> {
        let items = serde_json::to_string(&job.items)?;
        let now = Utc::now().timestamp_millis();

        for _ in 0..ENQUEUE_ATTEMPTS {
            let handle = JobHandle::new(self.generate_id(PREFIX_JOB).await?);
            // A handle collision returns no row; draw a new handle.
            let mut rows = self
                .conn()
                .query(
                    "INSERT INTO jobs (handle, model, items, status, error, enqueued_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, NULL, ?5, ?5)
                     ON CONFLICT(handle) DO NOTHING
                     RETURNING handle",
                    libsql::params![
                        handle.as_str(),
                        job.model.as_str(),
                        items.as_str(),
                        JobStatus::Queued.as_str(),
                        now
                    ],
                )
                .await?;
            if rows.next().await?.is_some() {
                return Ok(handle);
            }
            tracing::warn!(handle = %handle, "job handle already taken, drawing another");
        }
        Err(StoreError::InvalidState(format!(
            "no free job handle after {ENQUEUE_ATTEMPTS} attempts"
        )))
    }

    async fn status(&self, handle: &JobHandle) -> Result<Option<JobStatus>, StoreError> {
        let mut rows = self
            .conn()
            .query("SELECT status FROM jobs WHERE handle = ?1", [handle.as_str()])
            .await?;
        match rows.next().await? {
            Some(row) => Ok(Some(parse_text(&row.get::<String>(0)?)?)),
            None => Ok(None),
        }
    }

    async fn get(&self, handle: &JobHandle) -> Result<Option<QueuedJob>, StoreError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {SELECT_COLS} FROM jobs WHERE handle = ?1"),
                [handle.as_str()],
            )
            .await?;
        match rows.next().await? {
            Some(row) => Ok(Some(row_to_job(&row)?)),
            None => Ok(None),
        }
    }

    async fn claim_next(&self) -> Result<Option<QueuedJob>, StoreError> {
        let mut rows = self
            .conn()
            .query(
                &format!(
                    "UPDATE jobs SET status = ?1, updated_at = ?2
                     WHERE handle = (
                         SELECT handle FROM jobs WHERE status = ?3
                         ORDER BY enqueued_at, rowid LIMIT 1
                     )
                     RETURNING {SELECT_COLS}"
                ),
                libsql::params![
                    JobStatus::Running.as_str(),
                    Utc::now().timestamp_millis(),
                    JobStatus::Queued.as_str()
                ],
            )
            .await?;
        match rows.next().await? {
            Some(row) => Ok(Some(row_to_job(&row)?)),
            None => Ok(None),
        }
    }

    async fn finish(&self, handle: &JobHandle) -> Result<(), StoreError> {
        self.transition_job(handle, JobStatus::Done, None).await
    }

    async fn fail(&self, handle: &JobHandle, reason: &str) -> Result<(), StoreError> {
        self.transition_job(handle, JobStatus::Failed, Some(reason))
            .await
    }

    async fn list(
        &self,
        status: Option<JobStatus>,
        limit: usize,
    ) -> Result<Vec<QueuedJob>, StoreError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let mut rows = match status {
            Some(status) => {
                self.conn()
                    .query(
                        &format!(
                            "SELECT {SELECT_COLS} FROM jobs WHERE status = ?1
                             ORDER BY enqueued_at, rowid LIMIT ?2"
                        ),
                        libsql::params![status.as_str(), limit],
                    )
                    .await?
            }
            None => {
                self.conn()
                    .query(
                        &format!(
                            "SELECT {SELECT_COLS} FROM jobs ORDER BY enqueued_at, rowid LIMIT ?1"
                        ),
                        [limit],
                    )
                    .await?
            }
        };

        let mut jobs = Vec::new();
        while let Some(row) = rows.next().await? {
            jobs.push(row_to_job(&row)?);
        }
        Ok(jobs)
    }

    async fn purge_finished(&self, older_than: Duration) -> Result<u64, StoreError> {
        let cutoff = finished_cutoff(Utc::now(), older_than).timestamp_millis();
        let removed = self
            .conn()
            .execute(
                "DELETE FROM jobs WHERE status IN (?1, ?2) AND updated_at <= ?3",
                libsql::params![JobStatus::Done.as_str(), JobStatus::Failed.as_str(), cutoff],
            )
            .await?;
        tracing::debug!(removed, "purged finished jobs");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use triage_core::{ChangeTime, Entity, JobKey, ModelRegistry};

    use super::*;

    async fn test_db() -> TriageDb {
        TriageDb::open_local(":memory:").await.unwrap()
    }

    fn job(ids: &[u64]) -> Job {
        let model = ModelRegistry::new(["component"]).resolve("component").unwrap();
        let change_time = ChangeTime::new("t1");
        Job {
            items: ids
                .iter()
                .map(|id| JobItem {
                    entity: Entity::bug(*id),
                    job_key: JobKey::derive(&model, &Entity::bug(*id), &change_time),
                    change_time: change_time.clone(),
                })
                .collect(),
            model,
        }
    }

    #[tokio::test]
    async fn enqueue_then_get() {
        let db = test_db().await;
        let original = job(&[123, 456]);
        let handle = db.enqueue(&original).await.unwrap();

        assert_eq!(db.status(&handle).await.unwrap(), Some(JobStatus::Queued));
        let stored = db.get(&handle).await.unwrap().unwrap();
        assert_eq!(stored.job, original);
        assert!(stored.error.is_none());
    }

    #[tokio::test]
    async fn unknown_handle_has_no_status() {
        let db = test_db().await;
        let status = db.status(&JobHandle::new("job-deadbeef")).await.unwrap();
        assert_eq!(status, None);
    }

    #[tokio::test]
    async fn claim_next_is_fifo_and_marks_running() {
        let db = test_db().await;
        let first = db.enqueue(&job(&[1])).await.unwrap();
        let second = db.enqueue(&job(&[2])).await.unwrap();

        let claimed = db.claim_next().await.unwrap().unwrap();
        assert_eq!(claimed.handle, first);
        assert_eq!(claimed.status, JobStatus::Running);

        let claimed = db.claim_next().await.unwrap().unwrap();
        assert_eq!(claimed.handle, second);
        assert!(db.claim_next().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn finish_requires_running() {
        let db = test_db().await;
        let handle = db.enqueue(&job(&[1])).await.unwrap();

        let err = db.finish(&handle).await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::InvalidTransition {
                from: JobStatus::Queued,
                to: JobStatus::Done,
                ..
            }
        ));

        db.claim_next().await.unwrap();
        db.finish(&handle).await.unwrap();
        assert_eq!(db.status(&handle).await.unwrap(), Some(JobStatus::Done));
    }

    #[tokio::test]
    async fn fail_records_reason() {
        let db = test_db().await;
        let handle = db.enqueue(&job(&[1])).await.unwrap();
        db.fail(&handle, "worker crashed").await.unwrap();

        let stored = db.get(&handle).await.unwrap().unwrap();
        assert_eq!(stored.status, JobStatus::Failed);
        assert_eq!(stored.error.as_deref(), Some("worker crashed"));
    }

    #[tokio::test]
    async fn list_filters_by_status() {
        let db = test_db().await;
        db.enqueue(&job(&[1])).await.unwrap();
        db.enqueue(&job(&[2])).await.unwrap();
        db.claim_next().await.unwrap();

        assert_eq!(db.list(None, 10).await.unwrap().len(), 2);
        assert_eq!(db.list(Some(JobStatus::Queued), 10).await.unwrap().len(), 1);
        assert_eq!(db.list(None, 1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn purge_finished_removes_only_old_finished_jobs() {
        let db = test_db().await;
        let done = db.enqueue(&job(&[1])).await.unwrap();
        let failed = db.enqueue(&job(&[2])).await.unwrap();
        let queued = db.enqueue(&job(&[3])).await.unwrap();
        db.claim_next().await.unwrap();
        db.finish(&done).await.unwrap();
        db.fail(&failed, "worker crashed").await.unwrap();

        assert_eq!(db.purge_finished(Duration::from_secs(3600)).await.unwrap(), 0);
        assert_eq!(db.purge_finished(Duration::ZERO).await.unwrap(), 2);

        assert_eq!(db.status(&done).await.unwrap(), None);
        assert_eq!(db.status(&failed).await.unwrap(), None);
        assert_eq!(db.status(&queued).await.unwrap(), Some(JobStatus::Queued));
    }

    #[tokio::test]
    async fn enqueued_handles_are_distinct() {
        let db = test_db().await;
        let mut handles = std::collections::HashSet::new();
        for id in 0..20 {
            assert!(handles.insert(db.enqueue(&job(&[id])).await.unwrap()));
        }
        assert_eq!(db.list(None, 100).await.unwrap().len(), 20);
    }

    #[tokio::test]
    async fn transitions_on_unknown_job_fail() {
        let db = test_db().await;
        let err = db.fail(&JobHandle::new("job-00000000"), "x").await.unwrap_err();
        assert!(matches!(err, StoreError::UnknownJob(_)));
    }
}
