//! Units of inference work and the records kept about them.
//!
//! A [`JobKey`] names "compute model M's result for entity E at version T".
//! Because the change time is part of the key, a changed entity maps to a new
//! key and results computed against an older version become unreachable
//! instead of being invalidated.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::entity::Entity;
use crate::errors::CoreError;
use crate::ids::{JOB_KEY_PREFIX, PREFIX_JOB, generate_id, to_hex};
use crate::model::ModelName;

/// Bytes of the change-time digest kept in a job key.
const CHANGE_TIME_DIGEST_BYTES: usize = 8;

// ---------------------------------------------------------------------------
// ChangeTime
// ---------------------------------------------------------------------------

/// Opaque version stamp of an entity, as reported by the tracker.
///
/// Only ever compared for equality; never interpreted as wall-clock time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChangeTime(String);

impl ChangeTime {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChangeTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// JobKey
// ---------------------------------------------------------------------------

/// Deterministic identifier of one unit of inference work.
///
/// Format: `triage:job:{model}:{entity store key}:{change-time digest}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobKey(String);

impl JobKey {
    /// Derive the key for `model` applied to `entity` at `change_time`.
    #[must_use]
    pub fn derive(model: &ModelName, entity: &Entity, change_time: &ChangeTime) -> Self {
        let digest = Sha256::digest(change_time.as_str().as_bytes());
        Self(format!(
            "{JOB_KEY_PREFIX}:{model}:{}:{}",
            entity.store_key(),
            to_hex(&digest[..CHANGE_TIME_DIGEST_BYTES])
        ))
    }

    /// Accept a key string produced by [`JobKey::derive`] (e.g. from a worker).
    ///
    /// # Errors
    ///
    /// Returns `CoreError::MalformedJobKey` if the prefix is missing, the
    /// model is empty, the entity part is not an entity store key, or the
    /// digest is not hex of the expected length.
    pub fn parse(raw: &str) -> Result<Self, CoreError> {
        let malformed = || CoreError::MalformedJobKey(raw.to_string());
        let rest = raw
            .strip_prefix(JOB_KEY_PREFIX)
            .and_then(|rest| rest.strip_prefix(':'))
            .ok_or_else(malformed)?;
        let (model, rest) = rest.split_once(':').ok_or_else(malformed)?;
        let (entity, digest) = rest.rsplit_once(':').ok_or_else(malformed)?;

        let digest_ok = digest.len() == CHANGE_TIME_DIGEST_BYTES * 2
            && digest.bytes().all(|b| b.is_ascii_hexdigit());
        let entity_ok = (entity.starts_with("bug/") || entity.starts_with("issue/"))
            && entity.parse::<Entity>().is_ok();
        if model.is_empty() || !entity_ok || !digest_ok {
            return Err(malformed());
        }
        Ok(Self(raw.to_string()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// JobHandle
// ---------------------------------------------------------------------------

/// Reference to a job in the queue, returned by enqueue.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobHandle(String);

impl JobHandle {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Mint a fresh random handle (`job-a3f8b2c10d9e7f64`).
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Validation` if the random source is unavailable.
    pub fn generate() -> Result<Self, CoreError> {
        generate_id(PREFIX_JOB).map(Self)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Job
// ---------------------------------------------------------------------------

/// One entity to classify inside a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobItem {
    pub entity: Entity,
    pub job_key: JobKey,
    pub change_time: ChangeTime,
}

/// Work handed to the queue: one model applied to one or more entities.
///
/// A single classify produces a one-item job; a batch produces one job for
/// every entity it newly claimed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub model: ModelName,
    pub items: Vec<JobItem>,
}

impl Job {
    #[must_use]
    pub fn single(model: ModelName, item: JobItem) -> Self {
        Self {
            model,
            items: vec![item],
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &JobKey> {
        self.items.iter().map(|item| &item.job_key)
    }
}

// ---------------------------------------------------------------------------
// JobStatus
// ---------------------------------------------------------------------------

/// Lifecycle of a queued job.
///
/// ```text
/// queued → running → done
///                  → failed
/// queued → failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Running,
    Done,
    Failed,
}

impl JobStatus {
    /// Valid next states from the current state.
    #[must_use]
    pub const fn allowed_next_states(self) -> &'static [Self] {
        match self {
            Self::Queued => &[Self::Running, Self::Failed],
            Self::Running => &[Self::Done, Self::Failed],
            Self::Done | Self::Failed => &[],
        }
    }

    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        self.allowed_next_states().contains(&next)
    }

    /// Whether a pending record pointing at a job in this state still
    /// represents work in flight.
    #[must_use]
    pub const fn is_live(self) -> bool {
        matches!(self, Self::Queued | Self::Running)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Stored records
// ---------------------------------------------------------------------------

/// A finished inference result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedResult {
    /// Model-specific result structure, returned to clients verbatim.
    pub payload: serde_json::Value,
    /// Change time of the entity the result was computed against.
    pub change_time: ChangeTime,
    pub computed_at: DateTime<Utc>,
}

impl CachedResult {
    pub fn new(payload: serde_json::Value, change_time: ChangeTime) -> Self {
        Self {
            payload,
            change_time,
            computed_at: Utc::now(),
        }
    }
}

/// Marker that work for a job key is in flight.
///
/// `handle` is `None` between the atomic claim and the enqueue completing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingJob {
    pub handle: Option<JobHandle>,
    pub claimed_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl PendingJob {
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}
