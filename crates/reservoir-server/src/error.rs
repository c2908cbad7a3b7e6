use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use reservoir_core::ReloadOutcome;
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Key ausente en el snapshot actual
    #[error("entry '{key}' not found in cache '{cache}'")]
    NotFound { cache: String, key: String },

    /// Reload rechazado
    #[error("reload of cache '{cache}' rejected: {outcome}")]
    ReloadRejected { cache: String, outcome: ReloadOutcome },

    /// Error interno
    #[error("{0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let message = self.to_string();
        let (status, error) = match self {
            AppError::NotFound { .. } => (StatusCode::NOT_FOUND, "Not Found"),
            AppError::ReloadRejected { .. } => (StatusCode::CONFLICT, "Conflict"),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error"),
        };

        let body = Json(ErrorResponse {
            error: error.to_string(),
            message,
        });

        (status, body).into_response()
    }
}
