//! Provisioning API endpoints

pub mod pull;
pub mod status;

use axum::{
    routing::{get, post},
    Router,
};

use super::state::AppState;

/// Create v1 API router
pub fn create_v1_router() -> Router<AppState> {
    Router::new()
        .route("/pull_model", post(pull::pull_model))
        .route("/pull_nodes", post(pull::pull_nodes))
        .route("/clone_model", post(pull::clone_model))
        .route("/status", get(status::get_status))
}
