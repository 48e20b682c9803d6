//! Layered key/value store holding resolved configuration values

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use tracing::warn;
use types::ConfigError;

/// Source a resolved value was taken from, highest precedence first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Layer {
    /// Explicitly supplied command-line flag
    Flag,
    /// Bound environment variable
    Env,
    /// Configuration file
    File,
    /// Static default
    Default,
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Layer::Flag => "flag",
            Layer::Env => "env",
            Layer::File => "file",
            Layer::Default => "default",
        };
        f.write_str(name)
    }
}

/// Where bound environment variables are read from
#[derive(Debug, Clone)]
enum EnvSource {
    /// The process environment, read at lookup time
    Process,
    /// A fixed set of variables
    Fixed(HashMap<String, String>),
}

impl EnvSource {
    fn get(&self, name: &str) -> Option<String> {
        match self {
            EnvSource::Process => {
                let value = std::env::var_os(name)?;
                Some(value.into_string().unwrap_or_else(|raw| {
                    warn!(env_key = %name, "Environment variable is not valid UTF-8, reading it lossily");
                    raw.to_string_lossy().into_owned()
                }))
            }
            EnvSource::Fixed(vars) => vars.get(name).cloned(),
        }
    }
}

/// Key/value store with one map per source layer
///
/// Keys are case-insensitive. A lookup walks the layers from flag down to
/// default and returns the first value found. Environment variables that are
/// set but empty count as unset.
#[derive(Debug, Clone)]
pub struct ValueStore {
    defaults: BTreeMap<String, String>,
    file: BTreeMap<String, String>,
    env_bindings: BTreeMap<String, String>,
    flags: BTreeMap<String, String>,
    env: EnvSource,
}

impl ValueStore {
    /// Create a store reading bound variables from the process environment
    pub fn new() -> Self {
        Self::with_source(EnvSource::Process)
    }

    /// Create a store reading bound variables from `vars` only
    pub fn with_env<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let vars = vars
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self::with_source(EnvSource::Fixed(vars))
    }

    fn with_source(env: EnvSource) -> Self {
        Self {
            defaults: BTreeMap::new(),
            file: BTreeMap::new(),
            env_bindings: BTreeMap::new(),
            flags: BTreeMap::new(),
            env,
        }
    }

    /// Set the value used when no other layer provides one
    pub fn set_default(&mut self, key: &str, value: impl Into<String>) {
        self.defaults.insert(normalize(key), value.into());
    }

    /// Use the environment variable `env_key` as a source for `key`
    pub fn bind_env(&mut self, key: &str, env_key: &str) -> Result<(), ConfigError> {
        if key.is_empty() {
            return Err(ConfigError::Binding {
                env_key: env_key.to_string(),
            });
        }
        self.env_bindings.insert(normalize(key), env_key.to_string());
        Ok(())
    }

    /// Record an explicitly supplied flag value
    pub fn set_flag(&mut self, key: &str, value: impl Into<String>) {
        self.flags.insert(normalize(key), value.into());
    }

    /// Merge configuration file values, replacing earlier file values
    pub fn merge_file<I, K, V>(&mut self, values: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        for (key, value) in values {
            self.file.insert(normalize(key.as_ref()), value.into());
        }
    }

    /// Resolved value and the layer it came from
    pub fn lookup(&self, key: &str) -> Option<(String, Layer)> {
        let key = normalize(key);

        if let Some(value) = self.flags.get(&key) {
            return Some((value.clone(), Layer::Flag));
        }

        if let Some(value) = self
            .env_bindings
            .get(&key)
            .and_then(|name| self.env.get(name))
            .filter(|value| !value.is_empty())
        {
            return Some((value, Layer::Env));
        }

        if let Some(value) = self.file.get(&key) {
            return Some((value.clone(), Layer::File));
        }

        self.defaults
            .get(&key)
            .map(|value| (value.clone(), Layer::Default))
    }

    /// Resolved value for `key`
    pub fn get(&self, key: &str) -> Option<String> {
        self.lookup(key).map(|(value, _)| value)
    }

    /// Resolved value for `key`, or an empty string
    pub fn get_string(&self, key: &str) -> String {
        self.get(key).unwrap_or_default()
    }

    /// Layer the resolved value for `key` came from
    pub fn source(&self, key: &str) -> Option<Layer> {
        self.lookup(key).map(|(_, layer)| layer)
    }

    /// Whether any layer provides a value for `key`
    pub fn is_set(&self, key: &str) -> bool {
        self.lookup(key).is_some()
    }

    /// Every key known to any layer, lower-cased and sorted
    pub fn keys(&self) -> BTreeSet<String> {
        self.defaults
            .keys()
            .chain(self.file.keys())
            .chain(self.env_bindings.keys())
            .chain(self.flags.keys())
            .cloned()
            .collect()
    }

    /// Resolved value of every key that has one
    pub fn all_settings(&self) -> BTreeMap<String, String> {
        self.keys()
            .into_iter()
            .filter_map(|key| self.get(&key).map(|value| (key, value)))
            .collect()
    }
}

impl Default for ValueStore {
    fn default() -> Self {
        Self::new()
    }
}

fn normalize(key: &str) -> String {
    key.to_lowercase()
}
