//! HTTP mapping of provisioning errors.
//!
//! Every failure is returned as `{ "error", "code" }` JSON, plus a `details`
//! map of field path to message for validation failures.
//!
//! | error                | status |
//! |----------------------|--------|
//! | `Validation`         | 400    |
//! | malformed body/query | 400    |
//! | `NotFound`           | 404    |
//! | `Conflict`           | 409    |
//! | `Persistence`        | 503    |
//! | `Timeout`            | 504    |

use super::telemetry::increment_errors;
use axum::{
    Json,
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use hss_provision::{Error, FieldErrors};
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Provision(#[from] Error),

    /// The body or query string could not be decoded.
    #[error("Malformed request: {0}")]
    BadRequest(String),
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<FieldErrors>,
}

impl ApiError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::Provision(Error::Validation { .. }) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR")
            }
            Self::Provision(Error::Conflict { .. }) => (StatusCode::CONFLICT, "CONFLICT"),
            Self::Provision(Error::NotFound { .. }) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Self::Provision(Error::Persistence { .. }) => {
                (StatusCode::SERVICE_UNAVAILABLE, "PERSISTENCE_ERROR")
            }
            Self::Provision(Error::Timeout { .. }) => (StatusCode::GATEWAY_TIMEOUT, "TIMEOUT"),
            Self::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        increment_errors(code);
        if status.is_server_error() {
            tracing::error!(%status, code, error = %self, "request failed");
        } else {
            tracing::debug!(%status, code, error = %self, "request rejected");
        }

        let error = self.to_string();
        let details = match self {
            Self::Provision(Error::Validation { details, .. }) => Some(details),
            _ => None,
        };
        let body = ErrorResponse {
            error,
            code: code.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
