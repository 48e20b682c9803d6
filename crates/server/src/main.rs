//! Planetfall service - Main Application Entry Point

use anyhow::{Context, Result};
use config::{ConfigError, Entry, Resolver, ValueStore};
use server::{logging::init_logging, Server};
use tracing::{debug, info, warn};

const SERVICE_NAME_FLAG: &str = "service-name";

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if it exists
    let dotenv_result = dotenv::dotenv();

    // Initialize logging
    init_logging()?;

    match dotenv_result {
        Ok(path) => info!(path = %path.display(), "Loaded environment variables from .env file"),
        Err(e) if !e.not_found() => warn!("Could not load .env file: {}", e),
        Err(_) => {}
    }

    info!("Starting Planetfall service v{}", env!("CARGO_PKG_VERSION"));

    // Resolve configuration
    let mut entries = vec![Entry::new(
        SERVICE_NAME_FLAG,
        "service",
        "the service name",
        "SERVICE_NAME",
    )];
    let mut store = ValueStore::new();

    let config = match Resolver::new().resolve(&mut entries, &mut store) {
        Ok(config) => config,
        Err(e) => {
            if let ConfigError::HelpRequested { usage } = e.root() {
                print!("{}", usage);
                return Ok(());
            }
            return Err(e).context("Failed to resolve configuration");
        }
    };

    debug!("Resolved configuration:\n{}", config.to_yaml()?);

    let service_name = store.get_string(SERVICE_NAME_FLAG);
    let mut server = Server::new(&config, &service_name, None)
        .await
        .context("Failed to create server")?;

    info!(prefix = server.log_prefix(), "Server ready, waiting for shutdown signal");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to install CTRL+C signal handler")?;
    info!("Shutdown signal received");

    server.close().await.context("Failed to close server")?;

    info!("Planetfall service shutdown complete");
    Ok(())
}
