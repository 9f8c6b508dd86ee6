//! Dispatch API handlers.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use uuid::Uuid;

use orderflow_core::{
    BackingStoreReport, CacheStats, CheckReport, DispatchError, Marketplace, RunHandle,
    SessionError, SessionSummary,
};

use crate::state::AppState;

// ============================================================================
// Request/Response types
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct DispatchRequest {
    /// Raw `brand<TAB>token` lines. When absent or blank the existing
    /// input file is used.
    #[serde(default)]
    pub orders_text: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct ClearCacheResponse {
    pub cleared: usize,
    pub message: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, error: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
        }),
    )
}

impl From<DispatchError> for ErrorResponse {
    fn from(e: DispatchError) -> Self {
        Self {
            error: e.to_string(),
        }
    }
}

fn dispatch_error(e: DispatchError) -> ApiError {
    let status = match &e {
        DispatchError::Session(SessionError::NotFound(_)) => StatusCode::NOT_FOUND,
        DispatchError::Session(SessionError::Completed(_)) => StatusCode::CONFLICT,
        DispatchError::InputRead { .. } | DispatchError::InputWrite { .. } => {
            error!("Dispatch failed: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (status, Json(ErrorResponse::from(e)))
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/v1/dispatch/check
///
/// Classify orders without side effects.
pub async fn check(
    State(state): State<Arc<AppState>>,
    Json(request): Json<DispatchRequest>,
) -> Result<Json<CheckReport>, ApiError> {
    state
        .dispatcher()
        .check(request.orders_text.as_deref())
        .map(Json)
        .map_err(dispatch_error)
}

/// POST /api/v1/dispatch/run
///
/// Start a run. Returns as soon as the session exists; follow it with the
/// stream endpoint.
pub async fn run(
    State(state): State<Arc<AppState>>,
    Json(request): Json<DispatchRequest>,
) -> Result<(StatusCode, Json<RunHandle>), ApiError> {
    let handle = state
        .dispatcher()
        .run(request.orders_text.as_deref())
        .map_err(dispatch_error)?;
    info!(session_id = %handle.session_id, "Run accepted");
    Ok((StatusCode::ACCEPTED, Json(handle)))
}

/// GET /api/v1/dispatch/sessions/{id}
pub async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionSummary>, ApiError> {
    state
        .dispatcher()
        .session_status(id)
        .map(Json)
        .map_err(dispatch_error)
}

/// GET /api/v1/dispatch/backing-store/{marketplace}
pub async fn check_backing_store(
    State(state): State<Arc<AppState>>,
    Path(marketplace): Path<String>,
) -> Result<Json<BackingStoreReport>, ApiError> {
    let marketplace: Marketplace = marketplace
        .parse()
        .map_err(|e: orderflow_core::UnknownMarketplace| {
            api_error(StatusCode::BAD_REQUEST, e.to_string())
        })?;
    Ok(Json(state.dispatcher().check_backing_store(marketplace)))
}

/// GET /api/v1/dispatch/entity-cache
pub async fn get_cache_stats(State(state): State<Arc<AppState>>) -> Json<CacheStats> {
    Json(state.entity_cache().stats())
}

/// DELETE /api/v1/dispatch/entity-cache
pub async fn clear_cache(State(state): State<Arc<AppState>>) -> Json<ClearCacheResponse> {
    let cleared = state.entity_cache().clear();
    info!(cleared, "Entity id cache cleared via API");
    Json(ClearCacheResponse {
        cleared,
        message: format!("Cleared {} cached entity ids", cleared),
    })
}
