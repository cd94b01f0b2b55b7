use crate::server::error::ApiResult;
use crate::server::state::AppState;
use axum::{Json, extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub store: String,
    pub subscribers: usize,
    pub version: String,
}

/// Reports store connectivity. Answers 503 when the store is down.
pub async fn health_check(
    State(state): State<AppState>,
) -> ApiResult<(StatusCode, Json<HealthResponse>)> {
    let health = state.service.health().await?;
    let (status, label) = if health.connected {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };

    Ok((
        status,
        Json(HealthResponse {
            status: label.to_string(),
            store: health.backend.to_string(),
            subscribers: health.subscribers,
            version: state.version.to_string(),
        }),
    ))
}
