//! # triage-store
//!
//! Shared state of the classification service: cached results, pending-job
//! markers, and the job queue consumed by inference workers.
//!
//! Two backends implement the [`ResultStore`] and [`JobQueue`] contracts:
//! - [`TriageDb`]: libSQL, durable and shareable between processes.
//! - [`memory::MemoryStore`] / [`memory::MemoryQueue`]: process-local, for
//!   single-node deployments and tests.
//!
//! Single-flight is enforced here: [`ResultStore::claim_pending`] is an atomic
//! set-if-absent, so concurrent callers for the same job key get exactly one
//! [`Claim::Acquired`].

pub mod error;
pub mod helpers;
pub mod memory;
mod migrations;
mod queue;
mod results;
pub mod traits;
pub mod worker;

pub use error::StoreError;
pub use traits::{Claim, JobQueue, QueuedJob, ResultStore};

use libsql::Builder;

/// libSQL-backed result store and job queue.
pub struct TriageDb {
    #[allow(dead_code)]
    db: libsql::Database,
    conn: libsql::Connection,
}

impl TriageDb {
    /// Open a local database at the given path (or `":memory:"`).
    ///
    /// Runs migrations automatically on open.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the database cannot be opened or migrations fail.
    pub async fn open_local(path: &str) -> Result<Self, StoreError> {
        let db = Builder::new_local(path).build().await?;
        let conn = db.connect()?;

        let triage_db = Self { db, conn };
        triage_db.run_migrations().await?;
        tracing::debug!(path, "opened triage store");
        Ok(triage_db)
    }

    /// Access the underlying libSQL connection for direct queries.
    #[must_use]
    pub const fn conn(&self) -> &libsql::Connection {
        &self.conn
    }

    /// Generate a prefixed ID via libSQL. Returns e.g., `"job-a3f8b2c10d9e7f64"`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the query fails or returns no rows.
    pub async fn generate_id(&self, prefix: &str) -> Result<String, StoreError> {
        let mut rows = self
            .conn
            .query("SELECT ?1 || '-' || lower(hex(randomblob(8)))", [prefix])
            .await?;
        let row = rows.next().await?.ok_or(StoreError::NoResult)?;
        Ok(row.get::<String>(0)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_db() -> TriageDb {
        TriageDb::open_local(":memory:").await.unwrap()
    }

    #[tokio::test]
    async fn open_local_creates_schema() {
        let db = test_db().await;
        for table in &["results", "pending_jobs", "jobs"] {
            let mut rows = db
                .conn()
                .query(
                    "SELECT name FROM sqlite_master WHERE type='table' AND name=?1",
                    [*table],
                )
                .await
                .unwrap();
            let row = rows.next().await.unwrap();
            assert!(row.is_some(), "table '{table}' should exist");
        }
    }

    #[tokio::test]
    async fn migrations_are_idempotent() {
        let db = test_db().await;
        db.run_migrations().await.unwrap();
    }

    #[tokio::test]
    async fn generate_id_correct_format() {
        let db = test_db().await;
        let id = db.generate_id("job").await.unwrap();
        assert!(id.starts_with("job-"), "ID should start with 'job-': {id}");
        assert_eq!(id.len(), 20);
        assert!(id[4..].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[tokio::test]
    async fn open_on_disk_persists_between_handles() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("triage.db");
        let path = path.to_string_lossy();

        {
            let db = TriageDb::open_local(&path).await.unwrap();
            db.conn()
                .execute(
                    "INSERT INTO results (job_key, payload, change_time, computed_at, expires_at)
                     VALUES ('k', '{}', '1', 0, 9999999999999)",
                    (),
                )
                .await
                .unwrap();
        }

        let db = TriageDb::open_local(&path).await.unwrap();
        let mut rows = db
            .conn()
            .query("SELECT count(*) FROM results", ())
            .await
            .unwrap();
        let row = rows.next().await.unwrap().unwrap();
        assert_eq!(row.get::<i64>(0).unwrap(), 1);
    }
}
