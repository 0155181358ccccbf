//! Model registry configuration.

use serde::{Deserialize, Serialize};
use triage_core::ModelRegistry;

/// Models served out of the box.
pub const DEFAULT_MODELS: &[&str] = &[
    "component",
    "defectenhancementtask",
    "invalidcompatibilityreport",
    "needsdiagnosis",
    "regression",
    "spambug",
    "stepstoreproduce",
];

fn default_enabled() -> Vec<String> {
    DEFAULT_MODELS.iter().map(ToString::to_string).collect()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ModelsConfig {
    /// Names of the models requests may target.
    #[serde(default = "default_enabled")]
    pub enabled: Vec<String>,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
        }
    }
}

impl ModelsConfig {
    /// Build the registry injected into the dispatcher.
    #[must_use]
    pub fn registry(&self) -> ModelRegistry {
        ModelRegistry::new(self.enabled.iter().cloned())
    }
}
