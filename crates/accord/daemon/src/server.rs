//! Server setup and lifecycle management

use crate::api::create_router;
use crate::api::rest::state::{AppState, Collaborators};
use crate::config::{DaemonConfig, StorageConfig};
use crate::error::{DaemonError, DaemonResult};
use accord_engine::{
    DisabledNotifier, HttpDocumentGenerator, HttpObjectStore, Notifier, SmtpNotifier,
    SmtpSettings,
};
use accord_storage::{InMemoryStorage, PostgresStorage, Storage};
use std::sync::Arc;
use tokio::net::TcpListener;

/// Accord Daemon Server
pub struct Server {
    config: DaemonConfig,
    state: AppState,
}

impl Server {
    /// Create a new server, connecting storage and building every external
    /// client once
    pub async fn new(config: DaemonConfig) -> DaemonResult<Self> {
        let storage = connect_storage(&config.storage).await?;
        let collaborators = build_collaborators(&config)?;
        let state = AppState::new(storage, collaborators, &config);
        Ok(Self { config, state })
    }

    /// Run the server until a shutdown signal arrives
    pub async fn run(self) -> DaemonResult<()> {
        let addr = self.config.server.listen_addr;
        let app = create_router(self.state, &self.config.server);

        let listener = TcpListener::bind(addr).await?;

        tracing::info!("Accord daemon listening on {}", addr);
        tracing::info!(
            "Verification links use {}",
            self.config.verification.public_base_url
        );

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| DaemonError::Server(e.to_string()))?;

        tracing::info!("Accord daemon shut down");
        Ok(())
    }
}

async fn connect_storage(config: &StorageConfig) -> DaemonResult<Arc<dyn Storage>> {
    match config {
        StorageConfig::Memory => {
            tracing::warn!("Using in-memory storage; all state is lost on exit");
            Ok(Arc::new(InMemoryStorage::new()))
        }
        StorageConfig::Postgres {
            url,
            max_connections,
            connect_timeout_secs,
        } => {
            let storage =
                PostgresStorage::new(url, *max_connections, *connect_timeout_secs).await?;
            tracing::info!(max_connections, "Connected to PostgreSQL");
            Ok(Arc::new(storage))
        }
    }
}

fn build_collaborators(config: &DaemonConfig) -> DaemonResult<Collaborators> {
    let gateway_timeout = config.engine.gateway_timeout();
    let generator = HttpDocumentGenerator::new(&config.gateway.generator_url, gateway_timeout)?;
    let objects = HttpObjectStore::new(&config.gateway.upload_url, gateway_timeout)?;

    let notifier: Arc<dyn Notifier> = match &config.mail {
        Some(mail) => {
            let notifier = SmtpNotifier::new(&SmtpSettings {
                host: mail.host.clone(),
                port: mail.port,
                username: mail.username.clone(),
                password: mail.password.clone(),
                from: mail.from.clone(),
            })?;
            tracing::info!(host = %mail.host, port = mail.port, "SMTP relay configured");
            Arc::new(notifier)
        }
        None => {
            tracing::warn!("No mail section configured; approver emails are disabled");
            Arc::new(DisabledNotifier)
        }
    };

    Ok(Collaborators {
        generator: Arc::new(generator),
        objects: Arc::new(objects),
        notifier,
    })
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown");
        }
    }
}
