//! Pluggable cloud features
//!
//! A [`FeatureProvider`] manages the lifecycle of the cloud clients a service
//! uses. [`GcpFeatureProvider`] is the default implementation.

mod gcp;

pub use gcp::{GcpFeatureProvider, MetadataClient};

use async_trait::async_trait;
use types::FeatureError;

/// HTTP request an error occurred in
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    pub method: String,
    pub url: String,
    pub user_agent: Option<String>,
    pub referrer: Option<String>,
    pub remote_ip: Option<String>,
    pub status: Option<u16>,
}

impl RequestContext {
    /// Create a request context from a method and a URL
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            ..Default::default()
        }
    }
}

/// Source location an error was raised from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportLocation {
    pub file: String,
    pub line: u32,
}

impl ReportLocation {
    /// Location of the caller of the enclosing `#[track_caller]` function
    #[track_caller]
    pub fn caller() -> Self {
        let location = std::panic::Location::caller();
        Self {
            file: location.file().to_string(),
            line: location.line(),
        }
    }
}

/// Error event handed to a feature provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorReport {
    pub message: String,
    pub location: Option<ReportLocation>,
    pub request: Option<RequestContext>,
}

/// Provider of cloud features
///
/// Implementations are started once with the service name, receive error
/// reports while running and are closed at shutdown.
#[async_trait]
pub trait FeatureProvider: Send + Sync {
    /// Create the feature clients
    async fn start(&mut self, service_name: &str) -> Result<(), FeatureError>;

    /// Flush pending work and release the feature clients
    async fn close(&mut self) -> Result<(), FeatureError>;

    /// Queue an error report; delivery failures are logged, not returned
    fn report(&self, report: ErrorReport);

    /// Name of the provider
    fn name(&self) -> &str;
}
