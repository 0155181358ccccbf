//! Result store and pending-job registry configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default database location, relative to the project root.
fn default_path() -> String {
    ".triage/triage.db".to_string()
}

/// Cached results live for a week.
const fn default_result_ttl_secs() -> u64 {
    7 * 24 * 60 * 60
}

/// Pending jobs that never complete are forgotten after 30 minutes.
const fn default_pending_ttl_secs() -> u64 {
    30 * 60
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StoreConfig {
    /// libSQL database path, or `:memory:`.
    #[serde(default = "default_path")]
    pub path: String,

    /// Time-to-live of cached results, in seconds.
    #[serde(default = "default_result_ttl_secs")]
    pub result_ttl_secs: u64,

    /// Time-to-live of pending-job records, in seconds. Bounds how long an
    /// orphaned job (enqueued, never completed) blocks a re-enqueue.
    #[serde(default = "default_pending_ttl_secs")]
    pub pending_ttl_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_path(),
            result_ttl_secs: default_result_ttl_secs(),
            pending_ttl_secs: default_pending_ttl_secs(),
        }
    }
}

impl StoreConfig {
    #[must_use]
    pub const fn result_ttl(&self) -> Duration {
        Duration::from_secs(self.result_ttl_secs)
    }

    #[must_use]
    pub const fn pending_ttl(&self) -> Duration {
        Duration::from_secs(self.pending_ttl_secs)
    }

    #[must_use]
    pub fn is_in_memory(&self) -> bool {
        self.path == ":memory:"
    }

    /// Database path resolved against `root` unless absolute or in-memory.
    #[must_use]
    pub fn resolved_path(&self, root: &std::path::Path) -> PathBuf {
        let path = PathBuf::from(&self.path);
        if self.is_in_memory() || path.is_absolute() {
            path
        } else {
            root.join(path)
        }
    }
}
