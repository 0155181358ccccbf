//! Batch request validation.
//!
//! Validation is all-or-nothing: a batch with any bad identifier is rejected
//! as a whole, and the error lists every offending index.

use std::collections::BTreeMap;

use serde_json::{Value, json};
use thiserror::Error;

use crate::entity::Entity;

const MSG_MIN_LENGTH: &str = "min length is 1";
const MSG_NOT_INTEGER: &str = "must be of integer type";
const MSG_NEGATIVE: &str = "min value is 0";
const MSG_MALFORMED_ISSUE: &str = "must be platform/owner/repo/number";

/// Why a batch request was rejected before any work happened.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BatchValidationError {
    #[error("batch must contain at least one entity")]
    Empty,

    #[error("{} invalid identifier(s) at indexes {:?}", .0.len(), .0.keys().collect::<Vec<_>>())]
    InvalidItems(BTreeMap<usize, &'static str>),
}

impl BatchValidationError {
    /// JSON error body for the 400 response, under `field` (e.g. `"bugs"`).
    #[must_use]
    pub fn to_body(&self, field: &str) -> Value {
        let detail = match self {
            Self::Empty => json!([MSG_MIN_LENGTH]),
            Self::InvalidItems(items) => {
                let per_index: serde_json::Map<String, Value> = items
                    .iter()
                    .map(|(idx, msg)| (idx.to_string(), json!([msg])))
                    .collect();
                json!([per_index])
            }
        };
        json!({ "errors": { field: detail } })
    }
}

/// Reject an empty batch.
///
/// # Errors
///
/// Returns `BatchValidationError::Empty` if `entities` is empty.
pub const fn ensure_non_empty(entities: &[Entity]) -> Result<(), BatchValidationError> {
    if entities.is_empty() {
        Err(BatchValidationError::Empty)
    } else {
        Ok(())
    }
}

/// Validate one caller-supplied identifier (`123`, `bug/123` or
/// `platform/owner/repo/number`).
///
/// # Errors
///
/// Returns the message reported for this index of a rejected batch.
pub fn check_identifier(raw: &str) -> Result<Entity, &'static str> {
    let trimmed = raw.trim();
    let bug_body = trimmed.strip_prefix("bug/").unwrap_or(trimmed);
    if !bug_body.contains('/') {
        if bug_body
            .strip_prefix('-')
            .is_some_and(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
        {
            return Err(MSG_NEGATIVE);
        }
        return trimmed.parse().map_err(|_| MSG_NOT_INTEGER);
    }
    trimmed.parse().map_err(|_| MSG_MALFORMED_ISSUE)
}

/// Validate a list of caller-supplied identifiers as one batch.
///
/// # Errors
///
/// Returns `BatchValidationError::Empty` for an empty list, or
/// `BatchValidationError::InvalidItems` naming every offending index.
pub fn parse_identifiers<S: AsRef<str>>(raw: &[S]) -> Result<Vec<Entity>, BatchValidationError> {
    if raw.is_empty() {
        return Err(BatchValidationError::Empty);
    }

    let mut offending = BTreeMap::new();
    let mut entities = Vec::with_capacity(raw.len());
    for (idx, item) in raw.iter().enumerate() {
        match check_identifier(item.as_ref()) {
            Ok(entity) => entities.push(entity),
            Err(message) => {
                offending.insert(idx, message);
            }
        }
    }

    if offending.is_empty() {
        Ok(entities)
    } else {
        Err(BatchValidationError::InvalidItems(offending))
    }
}
