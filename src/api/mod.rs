//! HTTP API exposing the lifecycle operations as JSON endpoints.

pub mod server;

use crate::error::{ApiError, ErrorCode};
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tracing::error;

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.code {
            ErrorCode::WorkerNotFound
            | ErrorCode::DayNotFound
            | ErrorCode::TaskNotFound
            | ErrorCode::ExtraWorkNotFound => StatusCode::NOT_FOUND,
            ErrorCode::DayExists
            | ErrorCode::MissingRequiredField
            | ErrorCode::InvalidFieldValue => StatusCode::BAD_REQUEST,
            ErrorCode::DatabaseError | ErrorCode::InternalError => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        // Internals are logged, never surfaced to the caller.
        let body = if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!(code = ?self.code, message = %self.message, "internal error");
            ApiError::new(ErrorCode::InternalError, "Internal error")
        } else {
            self
        };

        (status, Json(body)).into_response()
    }
}
