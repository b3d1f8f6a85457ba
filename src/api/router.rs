use std::path::Path;

use axum::{
    middleware,
    routing::{any, get},
    Router,
};
use tower_http::{services::ServeFile, trace::TraceLayer};

use super::health;
use super::middleware::logging_middleware;
use super::proxy::{self, PROXY_PREFIX};
use super::state::AppState;
use super::v1;

/// Create the full router with application state
pub fn create_router(state: AppState, index_file: &Path) -> Router {
    Router::new()
        // Static entry page
        .route_service("/", ServeFile::new(index_file))
        // Health endpoints
        .route("/health", get(health::health_check))
        .route("/ready", get(health::ready_check))
        .route("/live", get(health::live_check))
        // Provisioning API
        .nest("/api/v1", v1::create_v1_router())
        // Backend passthrough
        .route(PROXY_PREFIX, any(proxy::proxy_handler))
        .route(&format!("{}/{{*path}}", PROXY_PREFIX), any(proxy::proxy_handler))
        .with_state(state)
        .layer(middleware::from_fn(logging_middleware))
        .layer(TraceLayer::new_for_http())
}
