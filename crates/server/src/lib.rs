//! Service helper built on the resolved configuration
//!
//! [`Server`] owns the per-service logging context and, when the runtime
//! environment is on the cloud, a [`FeatureProvider`] giving access to cloud
//! features such as error reporting.

pub mod features;
pub mod logging;
pub mod server;

pub use features::{ErrorReport, FeatureProvider, GcpFeatureProvider, ReportLocation, RequestContext};
pub use server::Server;
