//! Configuration for accord-daemon

use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Main daemon configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Storage configuration
    #[serde(default)]
    pub storage: StorageConfig,

    /// Transition engine timeouts
    #[serde(default)]
    pub engine: EngineSettings,

    /// Verification links and outcome pages
    #[serde(default)]
    pub verification: VerificationConfig,

    /// External generator and upload services
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// SMTP relay; email dispatch is disabled when absent
    #[serde(default)]
    pub mail: Option<MailConfig>,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address
    pub listen_addr: SocketAddr,

    /// Enable CORS
    #[serde(default = "default_true")]
    pub enable_cors: bool,

    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, 8080)),
            enable_cors: true,
            request_timeout_secs: default_request_timeout(),
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StorageConfig {
    /// In-memory storage (for development/testing)
    #[default]
    Memory,

    /// PostgreSQL storage
    Postgres {
        /// Connection URL
        url: String,

        /// Maximum connections in pool
        #[serde(default = "default_pool_size")]
        max_connections: u32,

        /// Connection timeout in seconds
        #[serde(default = "default_connection_timeout")]
        connect_timeout_secs: u64,
    },
}

/// Engine timeouts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Bound on the transactional part of one transition
    #[serde(default = "default_transaction_timeout")]
    pub transaction_timeout_secs: u64,

    /// Bound on each generator or upload call
    #[serde(default = "default_gateway_timeout")]
    pub gateway_timeout_secs: u64,

    /// Bound on each email send and attachment download
    #[serde(default = "default_notify_timeout")]
    pub notify_timeout_secs: u64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            transaction_timeout_secs: default_transaction_timeout(),
            gateway_timeout_secs: default_gateway_timeout(),
            notify_timeout_secs: default_notify_timeout(),
        }
    }
}

impl EngineSettings {
    pub fn transaction_timeout(&self) -> Duration {
        Duration::from_secs(self.transaction_timeout_secs)
    }

    pub fn gateway_timeout(&self) -> Duration {
        Duration::from_secs(self.gateway_timeout_secs)
    }

    pub fn notify_timeout(&self) -> Duration {
        Duration::from_secs(self.notify_timeout_secs)
    }
}

/// Verification configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationConfig {
    /// Public base URL of this daemon; links are `{base}/verify/{token}`
    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,

    #[serde(default = "default_token_ttl")]
    pub token_ttl_hours: i64,

    /// Outcome pages
    #[serde(default = "default_approved_url")]
    pub approved_url: String,
    #[serde(default = "default_expired_url")]
    pub expired_url: String,
    #[serde(default = "default_invalid_url")]
    pub invalid_url: String,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            public_base_url: default_public_base_url(),
            token_ttl_hours: default_token_ttl(),
            approved_url: default_approved_url(),
            expired_url: default_expired_url(),
            invalid_url: default_invalid_url(),
        }
    }
}

/// External service endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_generator_url")]
    pub generator_url: String,

    #[serde(default = "default_upload_url")]
    pub upload_url: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            generator_url: default_generator_url(),
            upload_url: default_upload_url(),
        }
    }
}

/// SMTP relay settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailConfig {
    pub host: String,

    #[serde(default = "default_smtp_port")]
    pub port: u16,

    pub username: String,

    pub password: String,

    /// Sender mailbox, e.g. `Accord <noreply@example.com>`
    pub from: String,
}

// Default value helpers
fn default_true() -> bool {
    true
}

fn default_request_timeout() -> u64 {
    60
}

fn default_pool_size() -> u32 {
    10
}

fn default_connection_timeout() -> u64 {
    5
}

fn default_transaction_timeout() -> u64 {
    30
}

fn default_gateway_timeout() -> u64 {
    20
}

fn default_notify_timeout() -> u64 {
    15
}

fn default_public_base_url() -> String {
    "http://127.0.0.1:8080".to_string()
}

fn default_token_ttl() -> i64 {
    24
}

fn default_approved_url() -> String {
    "http://localhost:3000/verification/approved".to_string()
}

fn default_expired_url() -> String {
    "http://localhost:3000/verification/expired".to_string()
}

fn default_invalid_url() -> String {
    "http://localhost:3000/verification/invalid".to_string()
}

fn default_generator_url() -> String {
    "http://127.0.0.1:5000".to_string()
}

fn default_upload_url() -> String {
    "http://127.0.0.1:5001".to_string()
}

fn default_smtp_port() -> u16 {
    587
}

impl DaemonConfig {
    /// Load configuration: defaults, then the optional file, then `ACCORD_*`
    /// environment variables (`ACCORD_MAIL__HOST` sets `mail.host`)
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();

        builder = builder.add_source(config::Config::try_from(&DaemonConfig::default())?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("ACCORD")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = DaemonConfig::default();
        assert_eq!(config.server.listen_addr.port(), 8080);
        assert!(matches!(config.storage, StorageConfig::Memory));
        assert!(config.mail.is_none());
        assert_eq!(config.verification.token_ttl_hours, 24);
    }

    #[test]
    fn test_engine_defaults() {
        let engine = EngineSettings::default();
        assert_eq!(engine.transaction_timeout(), Duration::from_secs(30));
        assert!(engine.gateway_timeout() < engine.transaction_timeout());
    }

    #[test]
    fn test_load_without_file_uses_defaults() {
        let config = DaemonConfig::load(None).unwrap();
        assert_eq!(config.gateway.generator_url, "http://127.0.0.1:5000");
        assert!(config.server.enable_cors);
    }

    #[test]
    fn test_postgres_storage_section() {
        let storage: StorageConfig = serde_json::from_value(serde_json::json!({
            "type": "postgres",
            "url": "postgres://localhost/accord"
        }))
        .unwrap();
        match storage {
            StorageConfig::Postgres {
                max_connections,
                connect_timeout_secs,
                ..
            } => {
                assert_eq!(max_connections, 10);
                assert_eq!(connect_timeout_secs, 5);
            }
            StorageConfig::Memory => panic!("expected postgres"),
        }
    }
}
