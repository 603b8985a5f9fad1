//! API Router configuration

use super::handlers;
use super::state::AppState;
use crate::config::ServerConfig;
use axum::{
    routing::{get, post},
    Router,
};
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

/// Create the main API router
pub fn create_router(state: AppState, server: &ServerConfig) -> Router {
    let json_routes = Router::new()
        // Health and catalogs
        .route("/health", get(handlers::health_check))
        .route("/catalog/steps", get(handlers::list_steps))
        .route("/catalog/statuses", get(handlers::list_statuses))
        // Transitions
        .route("/progress", post(handlers::advance_progress))
        .route("/progress/:kind/:id/history", get(handlers::progress_history))
        .layer(TimeoutLayer::new(Duration::from_secs(
            server.request_timeout_secs,
        )));

    // Approver verification bounds its own lookup and always redirects
    let verify_routes = Router::new().route("/verify/:token", get(handlers::verify_token));

    let router = json_routes
        .merge(verify_routes)
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()));

    let router = if server.enable_cors {
        router.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
    } else {
        router
    };

    router.with_state(state)
}
