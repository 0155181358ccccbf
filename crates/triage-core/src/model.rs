//! Classification model names and the registry of supported models.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::CoreError;

/// Name of a classification model (e.g. `component`, `regression`).
///
/// Request paths obtain a `ModelName` through [`ModelRegistry::resolve`], so a
/// value in hand means the model was known at the time of the request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelName(String);

impl ModelName {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModelName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Fixed set of models the service accepts requests for.
///
/// Built once at startup from configuration and injected into the dispatcher.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelRegistry {
    models: BTreeSet<String>,
}

impl ModelRegistry {
    /// Build a registry from model names. Blank names are skipped.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let models = names
            .into_iter()
            .map(Into::into)
            .map(|name: String| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .collect();
        Self { models }
    }

    /// Look up `name`, returning the validated model name.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::UnknownModel` if `name` is not registered.
    pub fn resolve(&self, name: &str) -> Result<ModelName, CoreError> {
        if self.models.contains(name) {
            Ok(ModelName(name.to_string()))
        } else {
            Err(CoreError::UnknownModel(name.to_string()))
        }
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.models.contains(name)
    }

    /// Registered model names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.models.iter().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.models.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}
