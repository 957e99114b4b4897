//! Decision API errors

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use pushgate_core::StoreError;
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Failure of a decision API call, rendered as `{"message": ..}`
#[derive(Error, Debug)]
pub enum ApiError {
    /// Missing or wrong bearer token
    #[error("Missing or invalid API key")]
    Unauthorized,

    /// The reviewer may not decide on this push
    #[error("{0}")]
    Forbidden(String),

    /// No record with this key
    #[error("{0} not found")]
    NotFound(String),

    /// Persistence failure
    #[error("store error: {0}")]
    Store(StoreError),
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(key) => ApiError::NotFound(key),
            other => ApiError::Store(other),
        }
    }
}

impl ApiError {
    /// HTTP status of this error
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Store(StoreError::InvalidKey(_)) => StatusCode::BAD_REQUEST,
            ApiError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, "Decision API failure");
        }
        (status, Json(json!({ "message": self.to_string() }))).into_response()
    }
}
