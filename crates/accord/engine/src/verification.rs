//! One-time approver verification tokens

use crate::error::{EngineError, EngineResult, VerificationError};
use accord_storage::{Storage, StorageError, TokenConsumption};
use accord_types::ApproverLinkId;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use rand::rngs::OsRng;
use rand::RngCore;
use std::sync::Arc;

/// Raw token length before hex encoding
pub const TOKEN_BYTES: usize = 32;

const ISSUE_ATTEMPTS: usize = 3;

/// Generate an unguessable token: 32 bytes from the OS RNG, hex encoded
pub fn generate_token() -> String {
    let mut raw = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut raw);
    hex::encode(raw)
}

/// Issues and consumes verification tokens on approver join rows
#[derive(Clone)]
pub struct VerificationService {
    storage: Arc<dyn Storage>,
    ttl: ChronoDuration,
}

impl VerificationService {
    pub fn new(storage: Arc<dyn Storage>, ttl: ChronoDuration) -> Self {
        Self { storage, ttl }
    }

    pub fn ttl(&self) -> ChronoDuration {
        self.ttl
    }

    /// Store a fresh token on the link, replacing any outstanding one
    pub async fn issue(&self, link_id: ApproverLinkId) -> EngineResult<String> {
        self.issue_at(link_id, Utc::now()).await
    }

    pub async fn issue_at(
        &self,
        link_id: ApproverLinkId,
        now: DateTime<Utc>,
    ) -> EngineResult<String> {
        let expires_at = now + self.ttl;
        for _ in 0..ISSUE_ATTEMPTS {
            let token = generate_token();
            match self
                .storage
                .store_verify_token(link_id, &token, expires_at)
                .await
            {
                Ok(()) => {
                    tracing::debug!(link_id = %link_id, expires_at = %expires_at, "Issued verification token");
                    return Ok(token);
                }
                // Collision with another link's token
                Err(StorageError::Conflict(_)) => continue,
                Err(StorageError::NotFound(_)) => {
                    return Err(EngineError::NotFound(link_id.to_string()))
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(EngineError::Transition(format!(
            "could not issue a unique token for {}",
            link_id
        )))
    }

    /// Consume a token presented by an approver
    pub async fn consume(&self, token: &str) -> Result<ApproverLinkId, VerificationError> {
        self.consume_at(token, Utc::now()).await
    }

    pub async fn consume_at(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<ApproverLinkId, VerificationError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(VerificationError::NotFound);
        }

        match self.storage.consume_verify_token(token, now).await? {
            TokenConsumption::Approved(link_id) => {
                tracing::info!(link_id = %link_id, "Approver verified");
                Ok(link_id)
            }
            TokenConsumption::Expired(link_id) => {
                tracing::info!(link_id = %link_id, "Verification token expired");
                Err(VerificationError::Expired)
            }
            TokenConsumption::Unknown => Err(VerificationError::NotFound),
        }
    }
}
