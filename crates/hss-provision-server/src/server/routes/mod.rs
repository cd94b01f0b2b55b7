//! HTTP route handlers.

pub mod batch;
pub mod health;
pub mod subscribers;

use super::state::AppState;
use axum::{
    Router,
    routing::{get, post},
};

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route(
            "/api/subscribers",
            get(subscribers::list_subscribers).post(subscribers::create_subscriber),
        )
        // Static segments win over `{key}`.
        .route("/api/subscribers/batch", post(batch::create_batch))
        .route("/api/subscribers/batch/preview", post(batch::preview_batch))
        .route(
            "/api/subscribers/{key}",
            get(subscribers::get_subscriber)
                .put(subscribers::update_subscriber)
                .delete(subscribers::delete_subscriber),
        )
        .route("/api/subscribers/{key}/touch", post(subscribers::touch_subscriber))
        .with_state(state)
}
