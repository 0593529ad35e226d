//! Error type for handlers, mapped onto HTTP responses.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tradegraph_agents::{AgentError, BridgeError, InitError};
use tradegraph_store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Malformed or invalid request body (422).
    #[error("Invalid request: {0}")]
    Validation(String),

    /// No authenticated principal on the request (401).
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Missing, or owned by another principal (404).
    #[error("Not found: {0}")]
    NotFound(String),

    /// Shared graph could not be constructed (500).
    #[error(transparent)]
    Init(#[from] InitError),

    /// The isolated analysis run failed or timed out (500, or 502 when the
    /// agent collaborator caused it).
    #[error("Analysis failed: {0}")]
    Analysis(#[from] BridgeError<AgentError>),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Analysis(BridgeError::Failed(cause)) if cause.is_upstream() => {
                StatusCode::BAD_GATEWAY
            }
            AppError::Init(_) | AppError::Analysis(_) | AppError::Store(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %self, "Request failed");
        }

        let body = axum::Json(json!({
            "error": self.to_string(),
            "status": status.as_u16(),
        }));

        (status, body).into_response()
    }
}

/// Result type alias for handlers.
pub type AppResult<T> = Result<T, AppError>;
