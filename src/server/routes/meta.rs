use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use chrono::{SecondsFormat, Utc};
use serde_json::{json, Value};

use crate::server::error::AppError;

pub const SERVICE_NAME: &str = "distribution-records ingestion API";

/// GET /
pub async fn root() -> Json<Value> {
    Json(json!({
        "message": SERVICE_NAME,
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// GET /health
pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
    }))
}

/// OPTIONS on any path: empty 200. CORS headers are added by the router.
pub async fn preflight() -> StatusCode {
    StatusCode::OK
}

/// Anything no route matched.
pub async fn fallback(method: Method) -> Response {
    if method == Method::OPTIONS {
        StatusCode::OK.into_response()
    } else {
        AppError::not_found("Not found").into_response()
    }
}
