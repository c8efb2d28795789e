//! Request handlers and their wire types

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ApiError;
use crate::model::{ScanRecord, ScanState};
use crate::orchestrator::Orchestrator;

const DEFAULT_LIST_LIMIT: usize = 20;
const MAX_LIST_LIMIT: usize = 100;

#[derive(Debug, Deserialize)]
pub struct CreateScanRequest {
    pub target: String,
    /// Executor kind. Falls back to the configured default when omitted.
    pub kind: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CreateScanResponse {
    pub id: Uuid,
    pub state: ScanState,
}

#[derive(Debug, Serialize)]
pub struct CancelScanResponse {
    pub id: Uuid,
    pub state: ScanState,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct ScanListResponse {
    pub scans: Vec<ScanRecord>,
    pub total: usize,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub scans: usize,
}

/// Liveness check. Touches the store so a wedged database shows up here
/// instead of on the first real request.
pub async fn health_check(
    State(orchestrator): State<Orchestrator>,
) -> Result<Json<HealthResponse>, ApiError> {
    let scans = orchestrator.store().count()?;
    Ok(Json(HealthResponse {
        status: "ok",
        version: crate::VERSION,
        scans,
    }))
}

/// Accept a scan and dispatch it in the background. Returns 202 with the id;
/// callers poll `GET /api/scans/{id}` for progress.
pub async fn create_scan(
    State(orchestrator): State<Orchestrator>,
    Json(request): Json<CreateScanRequest>,
) -> Result<(StatusCode, Json<CreateScanResponse>), ApiError> {
    let target = request.target.trim();
    if target.is_empty() {
        return Err(ApiError::bad_request("target must not be empty"));
    }
    let id = match request.kind.as_deref() {
        Some(kind) => orchestrator.start_with_kind(target, kind)?,
        None => orchestrator.start(target)?,
    };
    Ok((
        StatusCode::ACCEPTED,
        Json(CreateScanResponse {
            id,
            state: ScanState::Pending,
        }),
    ))
}

pub async fn list_scans(
    State(orchestrator): State<Orchestrator>,
    Query(query): Query<ListQuery>,
) -> Result<Json<ScanListResponse>, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_LIST_LIMIT).min(MAX_LIST_LIMIT);
    let scans = orchestrator.store().list_recent(limit)?;
    let total = orchestrator.store().count()?;
    Ok(Json(ScanListResponse { scans, total }))
}

pub async fn get_scan(
    State(orchestrator): State<Orchestrator>,
    Path(id): Path<Uuid>,
) -> Result<Json<ScanRecord>, ApiError> {
    let record = orchestrator.status(id)?;
    Ok(Json(record))
}

/// Cancel is idempotent: cancelling a finished scan reports its final state
/// rather than failing.
pub async fn cancel_scan(
    State(orchestrator): State<Orchestrator>,
    Path(id): Path<Uuid>,
) -> Result<Json<CancelScanResponse>, ApiError> {
    let state = orchestrator.cancel(id)?;
    Ok(Json(CancelScanResponse { id, state }))
}
