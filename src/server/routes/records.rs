use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::response::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::ingest::SYSTEM_ACTOR;
use crate::models::Confirmation;
use crate::server::error::AppError;
use crate::server::state::AppState;
use crate::store::SheetStore;

pub const DEFAULT_LIMIT: usize = 100;

/// Request headers that may name the submitting user, in priority order.
const ACTOR_HEADERS: &[&str] = &["x-forwarded-email", "x-forwarded-user", "x-actor"];

fn actor_from(headers: &HeaderMap) -> String {
    ACTOR_HEADERS
        .iter()
        .filter_map(|name| headers.get(*name))
        .filter_map(|v| v.to_str().ok())
        .map(str::trim)
        .find(|v| !v.is_empty())
        .unwrap_or(SYSTEM_ACTOR)
        .to_string()
}

/// POST / and POST /api/records
///
/// The body is read as text whatever its content type. The answer is always
/// 200 with a confirmation.
pub async fn create_record<S: SheetStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    body: Bytes,
) -> Json<Confirmation> {
    let raw = String::from_utf8_lossy(&body).into_owned();
    let actor = actor_from(&headers);
    let ingestor = state.ingestor.clone();
    let confirmation = tokio::task::spawn_blocking(move || ingestor.ingest_as(&raw, &actor))
        .await
        .unwrap_or_else(|e| {
            tracing::error!(error = %e, "ingestion task failed");
            Confirmation::failed(format!("failed to save record: {e}"))
        });
    Json(confirmation)
}

#[derive(Deserialize)]
pub struct ListParams {
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

/// GET /api/records?limit=100&offset=0
pub async fn list_records<S: SheetStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Query(params): Query<ListParams>,
) -> Result<Json<Value>, AppError> {
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT);
    let offset = params.offset.unwrap_or(0);
    let ingestor = state.ingestor.clone();
    let (data, total) =
        tokio::task::spawn_blocking(move || ingestor.list_records(limit, offset)).await??;

    Ok(Json(json!({
        "success": true,
        "data": data,
        "total": total,
        "offset": offset,
        "limit": limit,
    })))
}

/// GET /api/records/{id}
pub async fn get_record<S: SheetStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let ingestor = state.ingestor.clone();
    let record = tokio::task::spawn_blocking(move || ingestor.find_record(&id)).await??;

    match record {
        Some(r) => Ok(Json(json!({ "success": true, "data": r }))),
        None => Err(AppError::not_found("Record not found")),
    }
}
