//! Approver verification handler

use crate::api::rest::state::AppState;
use accord_engine::VerificationError;
use axum::{
    extract::{Path, State},
    response::Redirect,
};

/// Consume a verification token and redirect to the matching outcome page.
/// Always answers with a redirect, whatever went wrong.
pub async fn verify_token(State(state): State<AppState>, Path(token): Path<String>) -> Redirect {
    let consumed = tokio::time::timeout(state.verify_timeout, state.verifier.consume(&token)).await;
    let target = match consumed {
        Ok(Ok(_)) => &state.redirects.approved,
        Ok(Err(VerificationError::Expired)) => &state.redirects.expired,
        Ok(Err(VerificationError::NotFound)) => {
            tracing::info!("Unknown or already used verification token");
            &state.redirects.invalid
        }
        Ok(Err(VerificationError::Storage(e))) => {
            tracing::error!(error = %e, "Verification lookup failed");
            &state.redirects.invalid
        }
        Err(_) => {
            tracing::error!(
                timeout_ms = state.verify_timeout.as_millis() as u64,
                "Verification lookup timed out"
            );
            &state.redirects.invalid
        }
    };
    Redirect::to(target)
}
