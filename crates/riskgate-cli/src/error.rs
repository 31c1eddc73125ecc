use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use riskgate_runtime::RuntimeError;

/// Request-level failure, rendered as `{"error": "..."}`.
#[derive(Debug)]
pub enum AppError {
    /// Malformed request body (400)
    BadRequest(String),
    /// Scoring could not complete (500)
    Scoring(RuntimeError),
}

impl From<RuntimeError> for AppError {
    fn from(err: RuntimeError) -> Self {
        AppError::Scoring(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(message) => {
                tracing::warn!(%message, "Rejected scoring request");
                (StatusCode::BAD_REQUEST, message)
            }
            AppError::Scoring(err) => {
                tracing::error!(error = %err, "Scoring failed");
                (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
