//! Health check endpoints for container probes

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use serde::Serialize;

use super::state::AppState;
use crate::api::types::Json;
use crate::domain::LifecycleState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub version: String,
    pub state: LifecycleState,
}

#[derive(Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Starting,
}

/// Returns 200 while the process is running, with the provisioning state
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let response = HealthResponse {
        status: HealthStatus::Healthy,
        version: env!("CARGO_PKG_VERSION").to_string(),
        state: state.status.state(),
    };

    (StatusCode::OK, Json(response))
}

/// 200 once startup provisioning has finished, 503 before
pub async fn ready_check(State(state): State<AppState>) -> impl IntoResponse {
    let lifecycle = state.status.state();
    let (status_code, status) = match lifecycle {
        LifecycleState::Initialized => (StatusCode::OK, HealthStatus::Healthy),
        _ => (StatusCode::SERVICE_UNAVAILABLE, HealthStatus::Starting),
    };

    let response = HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION").to_string(),
        state: lifecycle,
    };

    (status_code, Json(response))
}

pub async fn live_check() -> impl IntoResponse {
    StatusCode::OK
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_response_serialization() {
        let response = HealthResponse {
            status: HealthStatus::Starting,
            version: "1.0.0".to_string(),
            state: LifecycleState::Initializing,
        };

        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("\"status\":\"starting\""));
        assert!(json.contains("\"state\":\"initializing\""));
    }
}
