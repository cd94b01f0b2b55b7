use crate::server::error::ApiResult;
use crate::server::state::AppState;
use crate::server::telemetry::{increment_batches, record_batch_duration, record_batch_result};
use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
};
use hss_provision::{BatchRequest, BatchResult, RangePreview, RangeRequest};
use std::time::Instant;

/// Expands the range and creates every identifier not already provisioned.
pub async fn create_batch(
    State(state): State<AppState>,
    body: Result<Json<BatchRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<BatchResult>)> {
    let Json(request) = body?;
    increment_batches();
    let started = Instant::now();

    let result = state.service.create_batch(request).await;
    record_batch_duration(started.elapsed().as_secs_f64() * 1000.0);
    let result = result?;

    record_batch_result(result.created_count as u64, result.skipped_count as u64);
    Ok((StatusCode::CREATED, Json(result)))
}

/// Expands the range only. Template fields in the body are ignored.
pub async fn preview_batch(
    State(state): State<AppState>,
    body: Result<Json<RangeRequest>, JsonRejection>,
) -> ApiResult<Json<RangePreview>> {
    let Json(request) = body?;
    Ok(Json(state.service.preview_batch(&request)?))
}
