//! Resolved configuration snapshot

use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use types::Environment;

/// Immutable configuration produced by the [`Resolver`](crate::Resolver)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Config {
    environment: Environment,
    config_file: PathBuf,
    values: BTreeMap<String, String>,
}

impl Config {
    pub(crate) fn new(
        environment: Environment,
        config_file: PathBuf,
        values: BTreeMap<String, String>,
    ) -> Self {
        Self {
            environment,
            config_file,
            values,
        }
    }

    /// Validated runtime environment
    pub fn environment(&self) -> Environment {
        self.environment
    }

    /// Path of the configuration file that was read
    pub fn config_file(&self) -> &Path {
        &self.config_file
    }

    /// Resolved value for `key`, keys are case-insensitive
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(&key.to_lowercase()).map(String::as_str)
    }

    /// Every resolved value
    pub fn values(&self) -> &BTreeMap<String, String> {
        &self.values
    }

    /// Render the resolved configuration as YAML
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).context("Failed to serialize resolved configuration")
    }
}
