//! Shared types for the Planetfall service framework
//!
//! This crate contains the domain types shared by the configuration and
//! server crates: the runtime environment catalog and the error taxonomy.

pub mod environment;
pub mod error;

// Re-export commonly used types
pub use environment::Environment;
pub use error::{ConfigError, FeatureError};
