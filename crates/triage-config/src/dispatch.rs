//! Dispatcher timeouts.

use std::time::Duration;

use serde::{Deserialize, Serialize};

const fn default_oracle_timeout_ms() -> u64 {
    10_000
}

const fn default_store_timeout_ms() -> u64 {
    2_000
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DispatchConfig {
    /// Upper bound on one change-time lookup (single or bulk), in milliseconds.
    #[serde(default = "default_oracle_timeout_ms")]
    pub oracle_timeout_ms: u64,

    /// Upper bound on one result-store or queue operation, in milliseconds.
    #[serde(default = "default_store_timeout_ms")]
    pub store_timeout_ms: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            oracle_timeout_ms: default_oracle_timeout_ms(),
            store_timeout_ms: default_store_timeout_ms(),
        }
    }
}

impl DispatchConfig {
    #[must_use]
    pub const fn oracle_timeout(&self) -> Duration {
        Duration::from_millis(self.oracle_timeout_ms)
    }

    #[must_use]
    pub const fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }
}
