use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::llm_client::LlmError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
///
/// Every variant renders the proxy error shape `{"error": "<message>"}`, which is
/// what the chat and voice clients read.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Llm(#[from] LlmError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
            AppError::Llm(LlmError::MissingCredential) => {
                tracing::error!("Provider credential missing; set OPENAI_API_KEY");
                (StatusCode::INTERNAL_SERVER_ERROR, self.to_string())
            }
            AppError::Llm(e) => {
                tracing::error!("LLM error: {e}");
                (StatusCode::INTERNAL_SERVER_ERROR, e.user_message())
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
