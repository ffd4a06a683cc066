//! Axum route handlers for the completion and transcription proxies.

use axum::{extract::rejection::JsonRejection, extract::State, Json};
use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::errors::AppError;
use crate::llm_client::ChatMessage;
use crate::state::AppState;

/// Base64 inflates by 4/3; this admits a provider-limit (25 MB) recording plus JSON framing.
pub const MAX_AUDIO_BODY_BYTES: usize = 35 * 1024 * 1024;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct TranscriptionRequest {
    #[serde(default)]
    pub audio: String,
}

#[derive(Debug, Serialize)]
pub struct TranscriptionResponse {
    pub text: String,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /functions/v1/openai-chat
pub async fn handle_chat(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, AppError> {
    let Json(req) = payload.map_err(|rejection| {
        debug!("Rejected chat body: {rejection}");
        AppError::Validation("Invalid messages format.".to_string())
    })?;

    info!(
        "Chat request: {} messages -> {}",
        req.messages.len(),
        state.llm.chat_model()
    );

    let content = state.llm.complete(&req.messages).await?;
    Ok(Json(ChatResponse { content }))
}

/// POST /functions/v1/voice-to-text
pub async fn handle_voice_to_text(
    State(state): State<AppState>,
    payload: Result<Json<TranscriptionRequest>, JsonRejection>,
) -> Result<Json<TranscriptionResponse>, AppError> {
    let Json(req) = payload.map_err(|rejection| {
        debug!("Rejected transcription body: {rejection}");
        AppError::Validation("Invalid audio payload.".to_string())
    })?;

    let audio = decode_audio(&req.audio)?;
    info!("Transcription request: {} bytes of audio", audio.len());

    let text = state.llm.transcribe(audio).await?;
    Ok(Json(TranscriptionResponse { text }))
}

/// Accepts bare base64 or a full `data:<mime>;base64,<payload>` URL.
fn decode_audio(encoded: &str) -> Result<Vec<u8>, AppError> {
    let encoded = encoded.trim();
    let encoded = match encoded.split_once(";base64,") {
        Some((prefix, payload)) if prefix.starts_with("data:") => payload,
        _ => encoded,
    };
    if encoded.is_empty() {
        return Err(AppError::Validation("No audio data provided.".to_string()));
    }
    BASE64_STANDARD
        .decode(encoded)
        .map_err(|_| AppError::Validation("Audio is not valid base64.".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_audio_bare_base64() {
        assert_eq!(decode_audio("aGVsbG8=").unwrap(), b"hello");
    }

    #[test]
    fn test_decode_audio_data_url() {
        assert_eq!(
            decode_audio("data:audio/webm;base64,aGVsbG8=").unwrap(),
            b"hello"
        );
    }

    #[test]
    fn test_decode_audio_rejects_empty_and_garbage() {
        assert!(matches!(decode_audio("  "), Err(AppError::Validation(_))));
        assert!(matches!(
            decode_audio("not base64!!"),
            Err(AppError::Validation(_))
        ));
    }
}
