//! Result store and pending-job registry on libSQL.

use std::time::Duration;

use chrono::Utc;
use triage_core::{CachedResult, ChangeTime, JobHandle, JobKey, PendingJob};

use crate::TriageDb;
use crate::error::StoreError;
use crate::helpers::{expiry_after, from_millis};
use crate::traits::{Claim, ResultStore};

/// Rounds of claim-then-read before giving up on a key whose record keeps
/// appearing and disappearing underneath us.
const CLAIM_ATTEMPTS: usize = 3;

fn row_to_pending(row: &libsql::Row) -> Result<PendingJob, StoreError> {
    Ok(PendingJob {
        handle: row.get::<Option<String>>(0)?.map(JobHandle::new),
        claimed_at: from_millis(row.get::<i64>(1)?)?,
        expires_at: from_millis(row.get::<i64>(2)?)?,
    })
}

impl ResultStore for TriageDb {
    async fn get_result(&self, key: &JobKey) -> Result<Option<CachedResult>, StoreError> {
        let now = Utc::now().timestamp_millis();
        let mut rows = self
            .conn()
            .query(
                "SELECT payload, change_time, computed_at FROM results
                 WHERE job_key = ?1 AND expires_at > ?2",
                libsql::params![key.as_str(), now],
            )
            .await?;
        let Some(row) = rows.next().await? else {
            return Ok(None);
        };
        let payload: String = row.get(0)?;
        Ok(Some(CachedResult {
            payload: serde_json::from_str(&payload)?,
            change_time: ChangeTime::new(row.get::<String>(1)?),
            computed_at: from_millis(row.get::<i64>(2)?)?,
        }))
    }

    async fn put_result(
        &self,
        key: &JobKey,
        result: &CachedResult,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        let expires_at = expiry_after(Utc::now(), ttl).timestamp_millis();
        let payload = serde_json::to_string(&result.payload)?;
        self.conn()
            .execute(
                "INSERT INTO results (job_key, payload, change_time, computed_at, expires_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(job_key) DO UPDATE SET
                     payload = excluded.payload,
                     change_time = excluded.change_time,
                     computed_at = excluded.computed_at,
                     expires_at = excluded.expires_at",
                libsql::params![
                    key.as_str(),
                    payload,
                    result.change_time.as_str(),
                    result.computed_at.timestamp_millis(),
                    expires_at
                ],
            )
            .await?;
        Ok(())
    }

    async fn get_pending(&self, key: &JobKey) -> Result<Option<PendingJob>, StoreError> {
        let now = Utc::now().timestamp_millis();
        let mut rows = self
            .conn()
            .query(
                "SELECT handle, claimed_at, expires_at FROM pending_jobs
                 WHERE job_key = ?1 AND expires_at > ?2",
                libsql::params![key.as_str(), now],
            )
            .await?;
        match rows.next().await? {
            Some(row) => Ok(Some(row_to_pending(&row)?)),
            None => Ok(None),
        }
    }

    async fn claim_pending(&self, key: &JobKey, ttl: Duration) -> Result<Claim, StoreError> {
        for _ in 0..CLAIM_ATTEMPTS {
            let now = Utc::now();
            let expires_at = expiry_after(now, ttl);
            // Inserts a fresh row, or takes over an expired one. A live row
            // makes the WHERE false, nothing changes and nothing is returned.
            // Ownership is read from this statement's own RETURNING row: the
            // connection-wide change count is shared with concurrent callers.
            let mut rows = self
                .conn()
                .query(
                    "INSERT INTO pending_jobs (job_key, handle, claimed_at, expires_at)
                     VALUES (?1, NULL, ?2, ?3)
                     ON CONFLICT(job_key) DO UPDATE SET
                         handle = NULL,
                         claimed_at = excluded.claimed_at,
                         expires_at = excluded.expires_at
                     WHERE pending_jobs.expires_at <= excluded.claimed_at
                     RETURNING job_key",
                    libsql::params![
                        key.as_str(),
                        now.timestamp_millis(),
                        expires_at.timestamp_millis()
                    ],
                )
                .await?;
            let acquired = rows.next().await?.is_some();
            drop(rows);
            if acquired {
                return Ok(Claim::Acquired);
            }
            if let Some(pending) = self.get_pending(key).await? {
                return Ok(Claim::Held(pending));
            }
        }
        Err(StoreError::InvalidState(format!(
            "pending record for {key} changed during {CLAIM_ATTEMPTS} claim attempts"
        )))
    }

    async fn attach_handle(
        &self,
        keys: &[JobKey],
        handle: &JobHandle,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        let now = Utc::now();
        let expires_at = expiry_after(now, ttl).timestamp_millis();
        for key in keys {
            self.conn()
                .execute(
                    "INSERT INTO pending_jobs (job_key, handle, claimed_at, expires_at)
                     VALUES (?1, ?2, ?3, ?4)
                     ON CONFLICT(job_key) DO UPDATE SET
                         handle = excluded.handle,
                         expires_at = excluded.expires_at",
                    libsql::params![
                        key.as_str(),
                        handle.as_str(),
                        now.timestamp_millis(),
                        expires_at
                    ],
                )
                .await?;
        }
        Ok(())
    }

    async fn release_pending(&self, keys: &[JobKey]) -> Result<u64, StoreError> {
        let mut removed = 0;
        for key in keys {
            removed += self
                .conn()
                .execute("DELETE FROM pending_jobs WHERE job_key = ?1", [key.as_str()])
                .await?;
        }
        Ok(removed)
    }

    async fn purge_expired(&self) -> Result<u64, StoreError> {
        let now = Utc::now().timestamp_millis();
        let results = self
            .conn()
            .execute("DELETE FROM results WHERE expires_at <= ?1", [now])
            .await?;
        let pending = self
            .conn()
            .execute("DELETE FROM pending_jobs WHERE expires_at <= ?1", [now])
            .await?;
        tracing::debug!(results, pending, "purged expired store entries");
        Ok(results + pending)
    }
}
