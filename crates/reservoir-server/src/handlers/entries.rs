//! Dataset read endpoints.

use std::collections::BTreeMap;

use axum::{
    extract::{Path, State},
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use tracing::instrument;

use crate::dataset::Entry;
use crate::error::AppError;
use crate::state::AppState;

/// Snapshot completo, con las keys ordenadas.
#[derive(Debug, Serialize)]
pub struct EntriesResponse<'a> {
    pub name: &'a str,
    pub count: usize,
    pub entries: BTreeMap<&'a str, &'a Entry>,
}

/// GET /entries
#[instrument(skip_all)]
pub async fn list_entries(State(state): State<AppState>) -> Response {
    let snapshot = state.cache().get_all();

    let entries: BTreeMap<&str, &Entry> = snapshot
        .iter()
        .map(|(key, value)| (key.as_str(), value.as_ref()))
        .collect();

    Json(EntriesResponse {
        name: state.cache().name(),
        count: entries.len(),
        entries,
    })
    .into_response()
}

/// GET /entries/{key}
#[instrument(skip_all, fields(key = %key))]
pub async fn get_entry(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Response, AppError> {
    let entry = state.cache().get(key.as_str()).ok_or_else(|| AppError::NotFound {
        cache: state.cache().name().to_string(),
        key: key.clone(),
    })?;

    Ok(Json(entry.as_ref()).into_response())
}
