//! Layered configuration resolution for Planetfall services
//!
//! Configuration values are described by [`Entry`] records and resolved from
//! command-line flags, environment variables and a configuration file into a
//! [`ValueStore`]. The [`Resolver`] also validates the runtime
//! [`Environment`](types::Environment) and returns an immutable [`Config`].
//!
//! Precedence, highest first: flag, environment variable, configuration
//! file, static default.

pub mod entry;
pub mod flags;
pub mod loader;
pub mod resolved;
pub mod resolver;
pub mod store;
pub mod validation;

pub use entry::*;
pub use flags::FlagSet;
pub use loader::load_file;
pub use resolved::Config;
pub use resolver::Resolver;
pub use store::{Layer, ValueStore};
pub use types::{ConfigError, Environment};
pub use validation::*;
