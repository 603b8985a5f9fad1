//! Application state for API handlers

use crate::config::{DaemonConfig, VerificationConfig};
use accord_engine::{
    ApprovalDispatcher, DocumentGenerator, EngineConfig, Notifier, ObjectStore, TransitionEngine,
    VerificationService,
};
use accord_storage::Storage;
use std::sync::Arc;
use std::time::Duration;

/// Where `GET /verify/{token}` sends the approver
#[derive(Debug, Clone)]
pub struct RedirectTargets {
    pub approved: String,
    pub expired: String,
    pub invalid: String,
}

impl From<&VerificationConfig> for RedirectTargets {
    fn from(config: &VerificationConfig) -> Self {
        Self {
            approved: config.approved_url.clone(),
            expired: config.expired_url.clone(),
            invalid: config.invalid_url.clone(),
        }
    }
}

/// External collaborators, constructed once at startup
#[derive(Clone)]
pub struct Collaborators {
    pub generator: Arc<dyn DocumentGenerator>,
    pub objects: Arc<dyn ObjectStore>,
    pub notifier: Arc<dyn Notifier>,
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Storage backend
    pub storage: Arc<dyn Storage>,

    /// Transition engine
    pub engine: Arc<TransitionEngine>,

    /// Token issue/consume
    pub verifier: VerificationService,

    /// Approver email fan-out
    pub dispatcher: Arc<ApprovalDispatcher>,

    /// Verification outcome pages
    pub redirects: Arc<RedirectTargets>,

    /// Upper bound for a token lookup before falling back to the invalid page
    pub verify_timeout: Duration,

    /// Daemon version
    pub version: String,

    /// Daemon start time
    pub started_at: chrono::DateTime<chrono::Utc>,
}

impl AppState {
    /// Wire the engine and its services around one storage backend
    pub fn new(storage: Arc<dyn Storage>, collaborators: Collaborators, config: &DaemonConfig) -> Self {
        let engine = TransitionEngine::new(
            storage.clone(),
            collaborators.generator,
            collaborators.objects.clone(),
            EngineConfig {
                transaction_timeout: config.engine.transaction_timeout(),
                gateway_timeout: config.engine.gateway_timeout(),
            },
        );
        let verifier = VerificationService::new(
            storage.clone(),
            chrono::Duration::hours(config.verification.token_ttl_hours),
        );
        let dispatcher = ApprovalDispatcher::new(
            storage.clone(),
            verifier.clone(),
            collaborators.notifier,
            collaborators.objects,
            &config.verification.public_base_url,
            config.engine.notify_timeout(),
        );

        Self {
            storage,
            engine: Arc::new(engine),
            verifier,
            dispatcher: Arc::new(dispatcher),
            redirects: Arc::new(RedirectTargets::from(&config.verification)),
            verify_timeout: Duration::from_secs(config.server.request_timeout_secs),
            version: env!("CARGO_PKG_VERSION").to_string(),
            started_at: chrono::Utc::now(),
        }
    }

    /// Get uptime as a human-readable string
    pub fn uptime(&self) -> String {
        let secs = (chrono::Utc::now() - self.started_at).num_seconds();

        if secs < 60 {
            format!("{}s", secs)
        } else if secs < 3600 {
            format!("{}m {}s", secs / 60, secs % 60)
        } else if secs < 86400 {
            format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
        } else {
            format!("{}d {}h", secs / 86400, (secs % 86400) / 3600)
        }
    }
}
