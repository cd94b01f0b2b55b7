//! HTTP front end of the provisioning service.
//!
//! ## Structure
//!
//! - [`config`] - CLI/env configuration.
//! - [`error`] - error to status mapping.
//! - [`routes`] - axum handlers.
//! - [`state`] - shared handler state and store selection.
//! - [`telemetry`] - logging and optional metrics.

pub mod config;
pub mod error;
pub mod routes;
pub mod state;
pub mod telemetry;


use axum::Router;
use state::AppState;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Builds the application router with its middleware.
pub fn build_app(state: AppState, cors: bool) -> Router {
    let router = routes::create_router(state).layer(TraceLayer::new_for_http());

    if cors {
        router.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
    } else {
        router
    }
}
