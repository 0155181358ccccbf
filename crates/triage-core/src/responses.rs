//! Classification outcomes and the response bodies of the HTTP contract.
//!
//! The HTTP layer is not part of this workspace, but the status codes and body
//! shapes it must emit are fixed here so every caller renders them the same way:
//!
//! | Outcome | Status | Body |
//! |---|---|---|
//! | ready | 200 | the result payload |
//! | pending | 202 | `{"ready": false}` |
//! | entity not found | 404 | `{"message": "Bug 123 not found"}` |
//! | batch, all ready | 200 | `{"bugs": {"123": payload, ...}}` |
//! | batch, otherwise | 202 | `{"bugs": {"123": payload, "456": {"ready": false}}}` |

use serde_json::{Value, json};

use crate::entity::Entity;
use crate::job::CachedResult;

pub const STATUS_OK: u16 = 200;
pub const STATUS_ACCEPTED: u16 = 202;
pub const STATUS_BAD_REQUEST: u16 = 400;
pub const STATUS_NOT_FOUND: u16 = 404;
pub const STATUS_UNAVAILABLE: u16 = 503;

/// Externally observable state of one classification request.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// A result for the entity's current version is cached.
    Ready(CachedResult),
    /// A job for the entity's current version is queued or running.
    Pending,
    /// The tracker does not know the entity. Terminal.
    NotFound(Entity),
}

impl Outcome {
    #[must_use]
    pub const fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }

    #[must_use]
    pub const fn http_status(&self) -> u16 {
        match self {
            Self::Ready(_) => STATUS_OK,
            Self::Pending => STATUS_ACCEPTED,
            Self::NotFound(_) => STATUS_NOT_FOUND,
        }
    }

    /// Body of a single-entity response.
    #[must_use]
    pub fn body(&self) -> Value {
        match self {
            Self::Ready(result) => result.payload.clone(),
            Self::Pending => not_ready(),
            Self::NotFound(entity) => json!({ "message": entity.not_found_message() }),
        }
    }

    /// Body of this outcome as one entry of a batch response.
    #[must_use]
    pub fn batch_entry_body(&self) -> Value {
        match self {
            Self::Ready(result) => result.payload.clone(),
            Self::Pending => not_ready(),
            Self::NotFound(entity) => json!({
                "ready": false,
                "error": "not_found",
                "message": entity.not_found_message(),
            }),
        }
    }
}

fn not_ready() -> Value {
    json!({ "ready": false })
}

/// Outcome for one caller-supplied identifier of a batch.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchEntry {
    /// Identifier exactly as the caller supplied it.
    pub key: String,
    pub outcome: Outcome,
}

/// Merged outcome of a batch request, in caller order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BatchResult {
    entries: Vec<BatchEntry>,
}

impl BatchResult {
    #[must_use]
    pub const fn new(entries: Vec<BatchEntry>) -> Self {
        Self { entries }
    }

    #[must_use]
    pub fn entries(&self) -> &[BatchEntry] {
        &self.entries
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Outcome> {
        self.entries
            .iter()
            .find(|entry| entry.key == key)
            .map(|entry| &entry.outcome)
    }

    /// True only when every entity of the batch is ready.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.entries.iter().all(|entry| entry.outcome.is_ready())
    }

    #[must_use]
    pub fn http_status(&self) -> u16 {
        if self.is_complete() {
            STATUS_OK
        } else {
            STATUS_ACCEPTED
        }
    }

    #[must_use]
    pub fn count_where(&self, pred: impl Fn(&Outcome) -> bool) -> usize {
        self.entries.iter().filter(|entry| pred(&entry.outcome)).count()
    }

    /// Response body, with the per-entity map under `field` (e.g. `"bugs"`).
    #[must_use]
    pub fn body(&self, field: &str) -> Value {
        let map: serde_json::Map<String, Value> = self
            .entries
            .iter()
            .map(|entry| (entry.key.clone(), entry.outcome.batch_entry_body()))
            .collect();
        json!({ field: map })
    }
}
