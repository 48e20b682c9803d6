//! Error types for the Planetfall service framework

use thiserror::Error;

/// Configuration resolution errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// An environment variable was bound to an empty flag key
    #[error("cannot bind environment variable {env_key:?} to an empty key")]
    Binding { env_key: String },

    /// The flag source rejected the registration or the program arguments
    #[error("invalid program arguments: {0}")]
    Flags(String),

    /// `--help` was requested, the rendered usage is carried along
    #[error("help requested")]
    HelpRequested { usage: String },

    /// Configuration file does not exist
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },

    /// Configuration file exists but cannot be read or parsed
    #[error("cannot read configuration file {path}: {message}")]
    FileRead { path: String, message: String },

    /// The runtime environment string matches no known alias
    #[error("no suitable environment found for {value}")]
    UnknownEnvironment { value: String },

    /// Failure of a resolution step, tagged with the step name
    ///
    /// The message includes the inner error, which is not exposed as `source()`.
    #[error("{step}: {inner}")]
    Step {
        step: &'static str,
        inner: Box<ConfigError>,
    },
}

impl ConfigError {
    /// Wrap the error with the name of the step that produced it
    pub fn in_step(self, step: &'static str) -> Self {
        ConfigError::Step {
            step,
            inner: Box::new(self),
        }
    }

    /// Innermost error, with every step wrapper removed
    pub fn root(&self) -> &ConfigError {
        match self {
            ConfigError::Step { inner, .. } => inner.root(),
            other => other,
        }
    }
}

/// Cloud feature errors
#[derive(Error, Debug)]
pub enum FeatureError {
    /// Project metadata could not be fetched
    #[error("metadata lookup failed for {path}: {message}")]
    Metadata { path: String, message: String },

    /// Error reporting client could not be created or used
    #[error("error reporting failed: {0}")]
    ErrorReporting(String),

    /// A feature was used before `start` or after `close`
    #[error("feature provider is not started")]
    NotStarted,

    /// HTTP client construction failed
    #[error("HTTP client error: {0}")]
    Client(String),
}
