//! Accord Daemon - partnership document lifecycle service
//!
//! The Accord daemon provides:
//! - `POST /progress` to advance a document through its lifecycle
//! - `GET /verify/{token}` for approvers following an emailed link
//! - Lifecycle history and catalog lookups

use accord_daemon::error::{DaemonError, DaemonResult};
use accord_daemon::{DaemonConfig, Server};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Accord Daemon CLI
#[derive(Parser)]
#[command(name = "accordd")]
#[command(about = "Accord Daemon - partnership document lifecycle service", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "ACCORD_CONFIG")]
    config: Option<String>,

    /// Listen address, overrides the configuration file
    #[arg(short, long, env = "ACCORD_LISTEN_ADDR")]
    listen: Option<String>,

    /// Log level
    #[arg(long, env = "ACCORD_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Enable JSON logging
    #[arg(long, env = "ACCORD_LOG_JSON")]
    json: bool,
}

#[tokio::main]
async fn main() -> DaemonResult<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| cli.log_level.clone().into());

    if cli.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    // Load configuration
    let mut config = DaemonConfig::load(cli.config.as_deref())
        .map_err(|e| DaemonError::Config(e.to_string()))?;

    // Override with CLI args
    if let Some(listen) = cli.listen {
        config.server.listen_addr = listen
            .parse()
            .map_err(|e| DaemonError::Config(format!("Invalid listen address: {}", e)))?;
    }

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        listen = %config.server.listen_addr,
        "Starting Accord daemon"
    );

    let server = Server::new(config).await?;
    server.run().await
}
