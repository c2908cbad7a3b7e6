//! Cache control endpoints.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use reservoir_core::ReloadOutcome;
use serde::Serialize;
use tracing::instrument;

use crate::error::AppError;
use crate::state::AppState;

/// Response para una invalidacion aceptada.
#[derive(Debug, Serialize)]
pub struct InvalidateResponse {
    pub name: String,
    pub message: String,
}

/// Response de un reload forzado.
#[derive(Debug, Serialize)]
pub struct ReloadResponse {
    pub name: String,
    pub outcome: String,
    pub count: usize,
}

/// Estado del cache.
#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub name: String,
    pub count: usize,
    pub reloading: bool,
    pub loads: Option<u64>,
    pub invalidations: Option<u64>,
    pub mem_size_bytes: Option<u64>,
    pub next_reload_in_ms: Option<u64>,
}

/// DELETE /cache
/// Pide un reload completo; respeta la ventana de agregacion.
#[instrument(skip_all)]
pub async fn invalidate_all(State(state): State<AppState>) -> Response {
    let cache = state.cache();
    cache.invalidate_all();

    tracing::info!(cache = %cache.name(), "Cache invalidation requested");

    (
        StatusCode::ACCEPTED,
        Json(InvalidateResponse {
            name: cache.name().to_string(),
            message: "Reload requested".to_string(),
        }),
    )
        .into_response()
}

/// POST /cache/reload
/// Reload forzado, espera el resultado.
#[instrument(skip_all)]
pub async fn reload(State(state): State<AppState>) -> Result<Response, AppError> {
    let cache = state.cache();
    let outcome = cache.reload_now().await;

    if outcome.is_rejected() {
        return Err(AppError::ReloadRejected {
            cache: cache.name().to_string(),
            outcome,
        });
    }

    if outcome == ReloadOutcome::Failed {
        tracing::warn!(cache = %cache.name(), "Forced reload failed, previous snapshot kept");
    }

    Ok(Json(ReloadResponse {
        name: cache.name().to_string(),
        outcome: outcome.to_string(),
        count: cache.len(),
    })
    .into_response())
}

/// GET /cache/stats
pub async fn stats(State(state): State<AppState>) -> Json<StatsResponse> {
    let cache = state.cache();
    let metrics = cache.metrics();

    Json(StatsResponse {
        name: cache.name().to_string(),
        count: cache.len(),
        reloading: cache.is_reloading(),
        loads: metrics.map(|m| m.loads()),
        invalidations: metrics.map(|m| m.invalidations()),
        mem_size_bytes: cache.mem_size(),
        next_reload_in_ms: cache.next_reload_in().map(|d| d.as_millis() as u64),
    })
}
