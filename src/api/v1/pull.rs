//! On-demand pull endpoints. Each call runs to completion before responding.

use axum::extract::State;
use tracing::debug;

use crate::api::state::AppState;
use crate::api::types::{ApiError, Json, PullResponse};
use crate::domain::{RepositoryRequest, RepositoryWeightRequest, WeightRequest};

/// POST /api/v1/pull_model
pub async fn pull_model(
    State(state): State<AppState>,
    Json(request): Json<WeightRequest>,
) -> Result<Json<PullResponse>, ApiError> {
    debug!(url = %request.source_url, destination = %request.destination, "Pull model requested");

    let path = state.provisioning.pull_weight(request).await?;

    Ok(Json(PullResponse::new("Model pulled successfully", &path)))
}

/// POST /api/v1/pull_nodes
pub async fn pull_nodes(
    State(state): State<AppState>,
    Json(request): Json<RepositoryRequest>,
) -> Result<Json<PullResponse>, ApiError> {
    debug!(url = %request.url, "Pull nodes requested");

    let path = state.provisioning.pull_repository(request).await?;

    Ok(Json(PullResponse::new("Nodes pulled successfully", &path)))
}

/// POST /api/v1/clone_model
pub async fn clone_model(
    State(state): State<AppState>,
    Json(request): Json<RepositoryWeightRequest>,
) -> Result<Json<PullResponse>, ApiError> {
    debug!(url = %request.repository_url, destination = %request.destination, "Clone model requested");

    let path = state.provisioning.clone_weight(request).await?;

    Ok(Json(PullResponse::new("Model pulled successfully", &path)))
}
