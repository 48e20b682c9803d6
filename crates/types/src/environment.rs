//! Runtime environment catalog

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Runtime environment the service is deployed in
///
/// Each variant owns an ordered list of accepted input aliases. Aliases are
/// matched exactly (no case folding, no trimming) and are unique across
/// variants, so the alias to variant mapping is a function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "&'static str")]
pub enum Environment {
    /// Local development, cloud features are disabled
    Development,
    /// Deployed service
    Production,
}

const DEVELOPMENT_ALIASES: &[&str] = &["development", "dev"];
const PRODUCTION_ALIASES: &[&str] = &["production", "prd", "prod"];

impl Environment {
    /// Every environment, in lookup order
    pub const ALL: [Environment; 2] = [Environment::Development, Environment::Production];

    /// Canonical short form, used when the environment is displayed or logged
    pub fn as_str(self) -> &'static str {
        match self {
            Environment::Development => "dev",
            Environment::Production => "prd",
        }
    }

    /// Accepted input values for this environment
    pub fn aliases(self) -> &'static [&'static str] {
        match self {
            Environment::Development => DEVELOPMENT_ALIASES,
            Environment::Production => PRODUCTION_ALIASES,
        }
    }

    /// Resolve a user-provided string into an environment
    pub fn lookup(value: &str) -> Result<Self, ConfigError> {
        Self::ALL
            .into_iter()
            .find(|env| env.aliases().contains(&value))
            .ok_or_else(|| ConfigError::UnknownEnvironment {
                value: value.to_string(),
            })
    }

    /// Whether cloud-only features should be activated
    pub fn on_cloud(self) -> bool {
        self != Environment::Development
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::lookup(s)
    }
}

impl TryFrom<String> for Environment {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::lookup(&value)
    }
}

impl From<Environment> for &'static str {
    fn from(env: Environment) -> Self {
        env.as_str()
    }
}
