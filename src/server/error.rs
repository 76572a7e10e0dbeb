use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;

use crate::error::Error;

/// Read-side error rendered as `{"success": false, "message": "..."}`.
///
/// Submissions never use this; they answer 200 with a
/// [`Confirmation`](crate::models::Confirmation) whatever happens.
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: msg.into(),
        }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: msg.into(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(json!({ "success": false, "message": self.message })),
        )
            .into_response()
    }
}

impl From<Error> for AppError {
    fn from(e: Error) -> Self {
        match &e {
            Error::NotFound(msg) => AppError::not_found(msg.clone()),
            _ => AppError::internal(e.to_string()),
        }
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(e: tokio::task::JoinError) -> Self {
        AppError::internal(format!("Task join error: {e}"))
    }
}
