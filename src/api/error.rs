use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::feed::SnapshotError;
use crate::storage::StoreError;

/// Errors returned by request handlers, rendered as `{ error, kind }` JSON.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed or incomplete request body
    #[error("{0}")]
    BadRequest(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Store(StoreError::Validation(_)) => StatusCode::BAD_REQUEST,
            ApiError::Store(StoreError::Duplicate(_)) => StatusCode::CONFLICT,
            ApiError::Store(StoreError::NotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Store(_) | ApiError::Snapshot(_) | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "validation",
            ApiError::Store(e) => e.kind(),
            ApiError::Snapshot(_) => "snapshot",
            ApiError::Internal(_) => "internal",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let kind = self.kind();

        // Server-side details stay in the log
        let message = if status.is_server_error() {
            tracing::error!(error = %self, kind = kind, "Request failed");
            "Internal server error".to_string()
        } else {
            tracing::debug!(error = %self, kind = kind, status = status.as_u16(), "Request rejected");
            self.to_string()
        };

        (status, Json(json!({ "error": message, "kind": kind }))).into_response()
    }
}
