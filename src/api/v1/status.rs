use axum::extract::State;

use crate::api::state::AppState;
use crate::api::types::Json;
use crate::domain::StatusSnapshot;

/// GET /api/v1/status
pub async fn get_status(State(state): State<AppState>) -> Json<StatusSnapshot> {
    Json(state.status.snapshot())
}
