//! Error-to-response mapping.
//!
//! Every failure leaves the server as `{"message": "..."}` with the status
//! chosen here; handlers never build error bodies themselves.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::engine::ConfigError;

/// Body of every error response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub message: String,
}

/// Failure of an HTTP operation.
#[derive(Debug)]
pub enum ApiError {
    Config(ConfigError),
    /// Body was not a well-formed JSON document of the expected shape.
    InvalidBody(JsonRejection),
}

impl From<ConfigError> for ApiError {
    fn from(e: ConfigError) -> Self {
        ApiError::Config(e)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(e: JsonRejection) -> Self {
        ApiError::InvalidBody(e)
    }
}

/// Status code for an engine error.
pub fn status_for(error: &ConfigError) -> StatusCode {
    match error {
        ConfigError::DuplicateKeys(_)
        | ConfigError::LabelAlreadyExists(_)
        | ConfigError::InvalidConfig(_) => StatusCode::BAD_REQUEST,
        ConfigError::LabelNotFound(_) | ConfigError::VersionNotFound { .. } => {
            StatusCode::NOT_FOUND
        }
        ConfigError::Conflict { .. } => StatusCode::CONFLICT,
        ConfigError::StorageUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Config(e) => (status_for(&e), e.to_string()),
            ApiError::InvalidBody(rejection) => {
                tracing::debug!(error = %rejection.body_text(), "Rejected request body");
                let status = match rejection.status() {
                    StatusCode::PAYLOAD_TOO_LARGE => StatusCode::PAYLOAD_TOO_LARGE,
                    _ => StatusCode::BAD_REQUEST,
                };
                (status, "Invalid Config".to_string())
            }
        };
        (status, Json(ErrorBody { message })).into_response()
    }
}
