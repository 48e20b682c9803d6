//! Service helper holding the configuration, logging context and cloud features

use crate::features::{ErrorReport, FeatureProvider, GcpFeatureProvider, ReportLocation, RequestContext};
use config::Config;
use std::fmt::Display;
use tracing::{error, info, info_span, Instrument, Span};
use types::{Environment, FeatureError};

/// Helper giving a service access to its configuration and cloud features
pub struct Server {
    environment: Environment,
    service_name: String,
    log_prefix: String,
    span: Span,
    provider: Option<Box<dyn FeatureProvider>>,
}

impl Server {
    /// Create a new server for `service_name`
    ///
    /// Cloud features are only started when the environment is on the cloud,
    /// using `provider` or the Google Cloud provider when none is given.
    pub async fn new(
        config: &Config,
        service_name: &str,
        provider: Option<Box<dyn FeatureProvider>>,
    ) -> Result<Self, FeatureError> {
        let environment = config.environment();
        let env_prefix = environment.as_str().to_uppercase();
        let service_prefix = service_name.to_lowercase();
        let log_prefix = format!("[{}] - {}", env_prefix, service_prefix);
        let span = info_span!("server", env = %env_prefix, service = %service_prefix);

        let provider = async {
            info!(environment = %environment, "Setting up the server");

            if !environment.on_cloud() {
                return Ok(None);
            }

            info!("Starting cloud features");
            let mut provider = provider
                .unwrap_or_else(|| Box::new(GcpFeatureProvider::new()) as Box<dyn FeatureProvider>);
            provider.start(service_name).await?;
            info!(provider = provider.name(), "Cloud features started");
            Ok::<_, FeatureError>(Some(provider))
        }
        .instrument(span.clone())
        .await?;

        Ok(Self {
            environment,
            service_name: service_name.to_string(),
            log_prefix,
            span,
            provider,
        })
    }

    /// Runtime environment the server was created for
    pub fn environment(&self) -> Environment {
        self.environment
    }

    /// Name of the service
    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// Prefix identifying the environment and service, e.g. `[PRD] - billing`
    pub fn log_prefix(&self) -> &str {
        &self.log_prefix
    }

    /// Span carrying the environment and service fields
    pub fn span(&self) -> &Span {
        &self.span
    }

    /// Log an error and report it when on the cloud
    #[track_caller]
    pub fn raise(&self, message: &str, err: impl Display, request: Option<&RequestContext>) {
        let location = ReportLocation::caller();
        let message = format!("{}: {}", message, err);

        let _enter = self.span.enter();
        error!(file = %location.file, line = location.line, "{}", message);

        if let Some(provider) = &self.provider {
            provider.report(ErrorReport {
                message,
                location: Some(location),
                request: request.cloned(),
            });
        }
    }

    /// Close the cloud features; does nothing when not on the cloud
    pub async fn close(&mut self) -> Result<(), FeatureError> {
        let provider = self.provider.take();

        async move {
            info!("Stopping the server");
            if let Some(mut provider) = provider {
                info!("Stopping cloud features");
                provider.close().await?;
            }
            Ok(())
        }
        .instrument(self.span.clone())
        .await
    }
}
