//! REST API handlers
//!
//! Handlers only ever see the encrypted envelope. The key lives in the URL
//! fragment, which browsers do not send, so nothing here can log it.

use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use cinder_core::PasteId;
use cinder_paste::RateDecision;
use tracing::{debug, warn};

use crate::AppState;
use crate::api::{
    CreatePasteRequest, CreatePasteResponse, DeleteResponse, PasteResponse, ReadQuery,
};
use crate::client_id::ClientId;
use crate::error::ApiError;

/// POST /api/pastes
pub async fn create_paste(
    State(state): State<AppState>,
    client: ClientId,
    headers: HeaderMap,
    payload: Result<Json<CreatePasteRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CreatePasteResponse>), ApiError> {
    if let RateDecision::Limited { retry_after } = state.rate_limiter.check(client.as_str()).await? {
        warn!(client = client.as_str(), "Rejected create: rate limited");
        return Err(ApiError::RateLimited { retry_after });
    }

    let Json(request) = payload?;
    let created = state.lifecycle.create(request.into_new_paste()?).await?;

    let origin = state.origin_for(&headers);
    Ok((
        StatusCode::CREATED,
        Json(CreatePasteResponse::new(&created, &origin)),
    ))
}

/// GET /api/pastes/{id}
pub async fn get_paste(
    State(state): State<AppState>,
    Path(id): Path<String>,
    query: Result<Query<ReadQuery>, QueryRejection>,
) -> Result<Json<PasteResponse>, ApiError> {
    let Query(query) = query?;
    let id = PasteId::parse(&id).map_err(|_| ApiError::NotFound)?;

    let view = state.lifecycle.read(&id, query.password.as_deref()).await?;
    Ok(Json(PasteResponse::from(view)))
}

/// DELETE /api/pastes/{id}
///
/// Succeeds whether or not the paste existed.
pub async fn delete_paste(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DeleteResponse>, ApiError> {
    if let Ok(id) = PasteId::parse(&id) {
        let removed = state.lifecycle.delete(&id).await?;
        debug!(paste_id = %id, removed, "Delete requested");
    }
    Ok(Json(DeleteResponse { success: true }))
}

/// GET /health
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}
