//! # triage-config
//!
//! Layered configuration loading for triage using figment.
//!
//! Configuration sources (in priority order, highest wins):
//! 1. Environment variables (`TRIAGE_*` prefix, `__` as separator)
//! 2. Project-level `.triage/config.toml`
//! 3. User-level `~/.config/triage/config.toml`
//! 4. Built-in defaults
//!
//! # Environment Variable Mapping
//!
//! Figment maps `TRIAGE_STORE__PENDING_TTL_SECS` -> `store.pending_ttl_secs`,
//! `TRIAGE_DISPATCH__ORACLE_TIMEOUT_MS` -> `dispatch.oracle_timeout_ms`, etc.
//!
//! # Usage
//!
//! ```no_run
//! use std::path::Path;
//!
//! use triage_config::TriageConfig;
//!
//! let config = TriageConfig::load_from(Path::new(".")).expect("config");
//! let registry = config.models.registry();
//! println!("{} models, results kept {:?}", registry.len(), config.store.result_ttl());
//! ```

mod dispatch;
mod error;
mod models;
mod store;

pub use dispatch::DispatchConfig;
pub use error::ConfigError;
pub use models::{DEFAULT_MODELS, ModelsConfig};
pub use store::StoreConfig;

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

/// Project-local configuration directory.
pub const PROJECT_DIR: &str = ".triage";

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TriageConfig {
    #[serde(default)]
    pub models: ModelsConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub dispatch: DispatchConfig,
}

impl TriageConfig {
    /// Load configuration whose project-local layer lives under `root`.
    ///
    /// Does not read `.env`; the binary loads `<root>/.env` before calling this.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a source cannot be parsed or a value is invalid.
    pub fn load_from(root: &Path) -> Result<Self, ConfigError> {
        let config: Self = Self::figment_for(root).extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Build the figment provider chain with the project layer under `root`.
    #[must_use]
    pub fn figment_for(root: &Path) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        // Layer 1: User-global config
        if let Some(global_path) = Self::global_config_path()
            && global_path.exists()
        {
            figment = figment.merge(Toml::file(global_path));
        }

        // Layer 2: Project-local config
        let local_path = root.join(PROJECT_DIR).join("config.toml");
        if local_path.exists() {
            figment = figment.merge(Toml::file(local_path));
        }

        // Layer 3: Environment variables (highest priority)
        figment.merge(Env::prefixed("TRIAGE_").split("__"))
    }

    /// Reject values the dispatcher cannot run with.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` naming the first bad field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.models.registry().is_empty() {
            return Err(ConfigError::invalid(
                "models.enabled",
                "at least one model must be enabled",
            ));
        }
        if self.store.result_ttl_secs == 0 {
            return Err(ConfigError::invalid("store.result_ttl_secs", "must be > 0"));
        }
        if self.store.pending_ttl_secs == 0 {
            return Err(ConfigError::invalid("store.pending_ttl_secs", "must be > 0"));
        }
        if self.store.path.trim().is_empty() {
            return Err(ConfigError::invalid("store.path", "must not be empty"));
        }
        if self.dispatch.oracle_timeout_ms == 0 {
            return Err(ConfigError::invalid(
                "dispatch.oracle_timeout_ms",
                "must be > 0",
            ));
        }
        if self.dispatch.store_timeout_ms == 0 {
            return Err(ConfigError::invalid("dispatch.store_timeout_ms", "must be > 0"));
        }
        Ok(())
    }

    /// Path to the user-global config file.
    fn global_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("triage").join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = TriageConfig::default();
        config.validate().unwrap();
        assert_eq!(config.dispatch.oracle_timeout_ms, 10_000);
        assert_eq!(config.dispatch.store_timeout_ms, 2_000);
    }

    #[test]
    fn figment_builds_without_files() {
        let figment = TriageConfig::figment_for(Path::new("/nonexistent/triage-root"));
        let config: TriageConfig = figment.extract().expect("should extract defaults");
        assert_eq!(config.store.pending_ttl_secs, 1800);
        assert!(config.models.registry().contains("component"));
    }

    #[test]
    fn zero_ttl_is_rejected() {
        let mut config = TriageConfig::default();
        config.store.pending_ttl_secs = 0;
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref field, .. } if field == "store.pending_ttl_secs"));
    }

    #[test]
    fn empty_model_list_is_rejected() {
        let mut config = TriageConfig::default();
        config.models.enabled = vec![" ".into()];
        assert!(config.validate().is_err());
    }
}
