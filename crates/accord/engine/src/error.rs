//! Error types for the transition core

use accord_storage::StorageError;
use accord_types::TypeError;
use thiserror::Error;

/// Result type alias for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

/// Failures of an outbound collaborator (generator, object store, mailer)
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{service} responded with status {status}")]
    Status { service: &'static str, status: u16 },

    #[error("invalid response from {service}: {message}")]
    InvalidResponse {
        service: &'static str,
        message: String,
    },

    #[error("mail error: {0}")]
    Mail(String),

    #[error("{0} timed out")]
    Timeout(String),
}

/// Engine errors
#[derive(Debug, Error)]
pub enum EngineError {
    /// The action is not in the kind's table for the current status
    #[error(transparent)]
    InvalidAction(TypeError),

    /// Request is malformed
    #[error("Validation error: {0}")]
    Validation(String),

    /// Document (or its company) does not exist for the claimed kind
    #[error("Not found: {0}")]
    NotFound(String),

    /// The transactional part of a transition failed and was rolled back
    #[error("Transition failed: {0}")]
    Transition(String),

    /// A bounded step did not finish in time
    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),
}

impl From<TypeError> for EngineError {
    fn from(err: TypeError) -> Self {
        match err {
            TypeError::InvalidAction { .. } | TypeError::UnknownAction(_) => {
                EngineError::InvalidAction(err)
            }
            TypeError::UnknownKind(_) => EngineError::Validation(err.to_string()),
        }
    }
}

/// Outcomes of presenting a verification token that are not approvals
#[derive(Debug, Error)]
pub enum VerificationError {
    #[error("verification token not found")]
    NotFound,

    #[error("verification token expired")]
    Expired,

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}
