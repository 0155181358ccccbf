//! Identifier prefixes and formatting helpers.

use crate::errors::CoreError;

/// Namespace prefix of every job key.
pub const JOB_KEY_PREFIX: &str = "triage:job";

/// Prefix of queue job handles (`job-a3f8b2c10d9e7f64`).
pub const PREFIX_JOB: &str = "job";

/// Number of random bytes in a generated id (rendered as 16 hex chars).
const RANDOM_ID_BYTES: usize = 8;

/// Generate a prefixed random id, e.g. `"job-a3f8b2c10d9e7f64"`.
///
/// # Errors
///
/// Returns `CoreError::Validation` if the operating system RNG is unavailable.
pub fn generate_id(prefix: &str) -> Result<String, CoreError> {
    let mut bytes = [0u8; RANDOM_ID_BYTES];
    getrandom::fill(&mut bytes)
        .map_err(|e| CoreError::Validation(format!("random source unavailable: {e}")))?;
    Ok(format!("{prefix}-{}", to_hex(&bytes)))
}

/// Lowercase hex rendering of a byte slice.
#[must_use]
pub fn to_hex(bytes: &[u8]) -> String {
    use std::fmt::Write;

    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(out, "{b:02x}");
    }
    out
}
