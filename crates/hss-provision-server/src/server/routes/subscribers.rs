use crate::server::error::ApiResult;
use crate::server::state::AppState;
use axum::{
    Json,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::StatusCode,
};
use hss_provision::{CreateRequest, Subscriber, SubscriberKey, SubscriberPage, SubscriberPatch};
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub offset: Option<usize>,
    pub limit: Option<usize>,
}

pub async fn list_subscribers(
    State(state): State<AppState>,
    query: Result<Query<PageQuery>, QueryRejection>,
) -> ApiResult<Json<SubscriberPage>> {
    let Query(page) = query?;
    let page = state
        .service
        .list(
            page.offset.unwrap_or(0),
            page.limit.unwrap_or(state.default_page_size),
        )
        .await?;
    Ok(Json(page))
}

pub async fn create_subscriber(
    State(state): State<AppState>,
    body: Result<Json<CreateRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Subscriber>)> {
    let Json(request) = body?;
    let created = state.service.create_from(request).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn get_subscriber(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> ApiResult<Json<Subscriber>> {
    let subscriber = state.service.get(&SubscriberKey::parse(&key)).await?;
    Ok(Json(subscriber))
}

pub async fn update_subscriber(
    State(state): State<AppState>,
    Path(key): Path<String>,
    body: Result<Json<SubscriberPatch>, JsonRejection>,
) -> ApiResult<Json<Subscriber>> {
    let Json(patch) = body?;
    let updated = state
        .service
        .update(&SubscriberKey::parse(&key), patch)
        .await?;
    Ok(Json(updated))
}

pub async fn delete_subscriber(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> ApiResult<Json<Subscriber>> {
    let removed = state.service.delete(&SubscriberKey::parse(&key)).await?;
    Ok(Json(removed))
}

/// Stamps `last_seen`, as an attach or registration would.
pub async fn touch_subscriber(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> ApiResult<Json<Subscriber>> {
    let touched = state.service.touch(&SubscriberKey::parse(&key)).await?;
    Ok(Json(touched))
}
