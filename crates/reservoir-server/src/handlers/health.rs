use axum::{Json, extract::State};
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub cache: String,
    pub entries: usize,
}

/// GET /health
///
/// Always UP once the server runs: the cache only exists after its first
/// successful load and keeps serving the last snapshot afterwards.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "UP".to_string(),
        cache: state.cache().name().to_string(),
        entries: state.cache().len(),
    })
}
