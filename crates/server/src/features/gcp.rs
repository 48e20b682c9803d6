//! Google Cloud feature provider

use super::{ErrorReport, FeatureProvider};
use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use types::FeatureError;

const DEFAULT_METADATA_URL: &str = "http://metadata.google.internal";
const METADATA_HOST_ENV: &str = "GCE_METADATA_HOST";
const DEFAULT_ERROR_REPORTING_URL: &str = "https://clouderrorreporting.googleapis.com";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// Client for the Compute Engine metadata server
#[derive(Debug, Clone)]
pub struct MetadataClient {
    http_client: Client,
    base_url: String,
}

/// OAuth token handed out by the metadata server
#[derive(Debug, Clone, Deserialize)]
struct AccessToken {
    access_token: String,
    expires_in: u64,
}

impl MetadataClient {
    /// Create a client for the metadata server, honoring `GCE_METADATA_HOST`
    pub fn new() -> Result<Self, FeatureError> {
        let base_url = std::env::var(METADATA_HOST_ENV)
            .map(|host| format!("http://{}", host))
            .unwrap_or_else(|_| DEFAULT_METADATA_URL.to_string());
        Self::with_base_url(base_url)
    }

    /// Create a client for a metadata server at `base_url`
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self, FeatureError> {
        Ok(Self {
            http_client: build_http_client()?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Identifier of the project the service runs in
    pub async fn project_id(&self) -> Result<String, FeatureError> {
        let path = "project/project-id";
        let project_id = self.get(path).await?.trim().to_string();
        if project_id.is_empty() {
            return Err(FeatureError::Metadata {
                path: path.to_string(),
                message: "empty project id".to_string(),
            });
        }
        Ok(project_id)
    }

    async fn access_token(&self) -> Result<AccessToken, FeatureError> {
        let path = "instance/service-accounts/default/token";
        let body = self.get(path).await?;
        serde_json::from_str(&body).map_err(|e| FeatureError::Metadata {
            path: path.to_string(),
            message: format!("invalid token response: {}", e),
        })
    }

    async fn get(&self, path: &str) -> Result<String, FeatureError> {
        let url = format!("{}/computeMetadata/v1/{}", self.base_url, path);
        let metadata_error = |message: String| FeatureError::Metadata {
            path: path.to_string(),
            message,
        };

        let response = self
            .http_client
            .get(&url)
            .header("Metadata-Flavor", "Google")
            .send()
            .await
            .map_err(|e| metadata_error(e.to_string()))?;

        if !response.status().is_success() {
            return Err(metadata_error(format!("HTTP status {}", response.status())));
        }

        response
            .text()
            .await
            .map_err(|e| metadata_error(format!("error reading response body: {}", e)))
    }
}

/// Error event in the Error Reporting API format
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ReportedErrorEvent {
    event_time: String,
    service_context: ServiceContext,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    context: Option<ErrorContext>,
}

#[derive(Debug, Serialize)]
struct ServiceContext {
    service: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    http_request: Option<HttpRequestContext>,
    #[serde(skip_serializing_if = "Option::is_none")]
    report_location: Option<SourceLocation>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct HttpRequestContext {
    method: String,
    url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    user_agent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    referrer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_status_code: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    remote_ip: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SourceLocation {
    file_path: String,
    line_number: u32,
    function_name: String,
}

impl ReportedErrorEvent {
    fn new(service_name: &str, report: &ErrorReport) -> Self {
        let http_request = report.request.as_ref().map(|request| HttpRequestContext {
            method: request.method.clone(),
            url: request.url.clone(),
            user_agent: request.user_agent.clone(),
            referrer: request.referrer.clone(),
            response_status_code: request.status,
            remote_ip: request.remote_ip.clone(),
        });
        let report_location = report.location.as_ref().map(|location| SourceLocation {
            file_path: location.file.clone(),
            line_number: location.line,
            function_name: "unknown".to_string(),
        });

        let context = if http_request.is_some() || report_location.is_some() {
            Some(ErrorContext {
                http_request,
                report_location,
            })
        } else {
            None
        };

        Self {
            event_time: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            service_context: ServiceContext {
                service: service_name.to_string(),
            },
            message: report.message.clone(),
            context,
        }
    }
}

/// Background task delivering queued error reports
struct ReportingWorker {
    http_client: Client,
    metadata: MetadataClient,
    endpoint: String,
    service_name: String,
    token: Option<(String, Instant)>,
}

impl ReportingWorker {
    async fn run(mut self, mut receiver: mpsc::UnboundedReceiver<ErrorReport>) {
        while let Some(report) = receiver.recv().await {
            if let Err(e) = self.send(&report).await {
                error!(error = %e, "Could not report error");
            }
        }
        debug!("Error reporting worker stopped");
    }

    async fn send(&mut self, report: &ErrorReport) -> Result<(), FeatureError> {
        let token = self.token().await?;
        let event = ReportedErrorEvent::new(&self.service_name, report);

        let response = self
            .http_client
            .post(&self.endpoint)
            .bearer_auth(token)
            .json(&event)
            .send()
            .await
            .map_err(|e| FeatureError::ErrorReporting(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(FeatureError::ErrorReporting(format!(
                "HTTP status {}: {}",
                status, body
            )));
        }

        debug!("Error reported");
        Ok(())
    }

    async fn token(&mut self) -> Result<String, FeatureError> {
        if let Some((token, expires_at)) = &self.token {
            if Instant::now() + TOKEN_REFRESH_MARGIN < *expires_at {
                return Ok(token.clone());
            }
        }

        let fresh = self.metadata.access_token().await?;
        // out-of-range lifetimes are not cached, the token is fetched again next time
        self.token = Instant::now()
            .checked_add(Duration::from_secs(fresh.expires_in))
            .map(|expires_at| (fresh.access_token.clone(), expires_at));
        if self.token.is_none() {
            warn!(expires_in = fresh.expires_in, "Access token lifetime out of range");
        }
        Ok(fresh.access_token)
    }
}

struct Running {
    project_id: String,
    sender: mpsc::UnboundedSender<ErrorReport>,
    worker: JoinHandle<()>,
}

/// Feature provider backed by Google Cloud
///
/// `start` resolves the project through the metadata server and spawns a
/// worker delivering error reports to the Error Reporting API. `close`
/// waits for queued reports to be delivered.
pub struct GcpFeatureProvider {
    metadata_url: Option<String>,
    error_reporting_url: String,
    running: Option<Running>,
}

impl GcpFeatureProvider {
    /// Create a provider using the production endpoints
    pub fn new() -> Self {
        Self {
            metadata_url: None,
            error_reporting_url: DEFAULT_ERROR_REPORTING_URL.to_string(),
            running: None,
        }
    }

    /// Create a provider using custom metadata and error reporting endpoints
    pub fn with_endpoints(
        metadata_url: impl Into<String>,
        error_reporting_url: impl Into<String>,
    ) -> Self {
        Self {
            metadata_url: Some(metadata_url.into()),
            error_reporting_url: error_reporting_url.into().trim_end_matches('/').to_string(),
            running: None,
        }
    }

    /// Project the provider was started in
    pub fn project_id(&self) -> Option<&str> {
        self.running.as_ref().map(|r| r.project_id.as_str())
    }
}

impl Default for GcpFeatureProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FeatureProvider for GcpFeatureProvider {
    async fn start(&mut self, service_name: &str) -> Result<(), FeatureError> {
        if self.running.is_some() {
            warn!("Cloud features already started");
            return Ok(());
        }

        let metadata = match &self.metadata_url {
            Some(url) => MetadataClient::with_base_url(url.clone())?,
            None => MetadataClient::new()?,
        };
        let project_id = metadata.project_id().await?;

        let endpoint = format!(
            "{}/v1beta1/projects/{}/events:report",
            self.error_reporting_url, project_id
        );
        let worker = ReportingWorker {
            http_client: build_http_client()?,
            metadata,
            endpoint,
            service_name: service_name.to_string(),
            token: None,
        };

        let (sender, receiver) = mpsc::unbounded_channel();
        let worker = tokio::spawn(worker.run(receiver));

        info!(project_id = %project_id, "Cloud features started");
        self.running = Some(Running {
            project_id,
            sender,
            worker,
        });
        Ok(())
    }

    async fn close(&mut self) -> Result<(), FeatureError> {
        let Running { sender, worker, .. } = self.running.take().ok_or(FeatureError::NotStarted)?;

        // closing the channel lets the worker drain the queue and exit
        drop(sender);
        worker
            .await
            .map_err(|e| FeatureError::ErrorReporting(format!("reporting worker failed: {}", e)))?;

        info!("Cloud features closed");
        Ok(())
    }

    fn report(&self, report: ErrorReport) {
        match &self.running {
            Some(running) => {
                if running.sender.send(report).is_err() {
                    error!("Error reporting worker is not running");
                }
            }
            None => warn!(
                message = %report.message,
                "Error reported before cloud features were started"
            ),
        }
    }

    fn name(&self) -> &str {
        "gcp"
    }
}

fn build_http_client() -> Result<Client, FeatureError> {
    Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .user_agent(concat!("planetfall-framework/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| FeatureError::Client(e.to_string()))
}
