//! Health and catalog handlers

use crate::api::rest::state::AppState;
use accord_types::{Status, Step, STATUSES, STEPS};
use axum::{extract::State, Json};
use serde::Serialize;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthCheckResponse {
    pub status: String,
    pub service: String,
    pub storage_backend: String,
    pub version: String,
    pub uptime: String,
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthCheckResponse> {
    Json(HealthCheckResponse {
        status: "healthy".to_string(),
        service: "accordd".to_string(),
        storage_backend: state.storage.backend_label().to_string(),
        version: state.version.clone(),
        uptime: state.uptime(),
    })
}

/// Step catalog
pub async fn list_steps() -> Json<Vec<Step>> {
    Json(STEPS.to_vec())
}

/// Status catalog
pub async fn list_statuses() -> Json<Vec<Status>> {
    Json(STATUSES.to_vec())
}
