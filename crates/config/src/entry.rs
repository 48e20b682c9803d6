//! Configuration entry definitions

use serde::{Deserialize, Serialize};
use types::Environment;

/// Flag of the configuration file entry
pub const CONFIG_FLAG: &str = "config";
/// Default configuration file path
pub const CONFIG_DEFAULT_VALUE: &str = "config/config.yaml";
/// Environment variable holding the configuration file path
pub const CONFIG_ENV_KEY: &str = "CONFIG";

/// Flag of the runtime environment entry
pub const ENVIRONMENT_FLAG: &str = "env";
/// Environment variable holding the runtime environment
pub const ENVIRONMENT_ENV_KEY: &str = "ENV";

/// Static description of one configurable value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    /// Flag parsed from program arguments, also the key in the value store
    pub flag: String,
    /// Value used when no source provides one
    #[serde(default)]
    pub default_value: String,
    /// Description shown by the flag help
    #[serde(default)]
    pub description: String,
    /// Environment variable holding the value, empty for none
    #[serde(default)]
    pub env_key: String,
}

impl Entry {
    /// Create a new entry
    pub fn new(
        flag: impl Into<String>,
        default_value: impl Into<String>,
        description: impl Into<String>,
        env_key: impl Into<String>,
    ) -> Self {
        Self {
            flag: flag.into(),
            default_value: default_value.into(),
            description: description.into(),
            env_key: env_key.into(),
        }
    }

    /// Whether the entry can be read from an environment variable
    pub fn has_env_source(&self) -> bool {
        !self.env_key.is_empty()
    }

    /// The configuration file path entry
    pub fn config_file() -> Self {
        Self::new(
            CONFIG_FLAG,
            CONFIG_DEFAULT_VALUE,
            "the config file path",
            CONFIG_ENV_KEY,
        )
    }

    /// The runtime environment entry
    pub fn environment() -> Self {
        Self::new(
            ENVIRONMENT_FLAG,
            Environment::Production.as_str(),
            "the runtime environment",
            ENVIRONMENT_ENV_KEY,
        )
    }
}

/// Append the entries every service carries to `entries`
pub fn append_builtin_entries(entries: &mut Vec<Entry>) {
    entries.push(Entry::config_file());
    entries.push(Entry::environment());
}
