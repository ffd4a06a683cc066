//! Remote collaborators: the completion and transcription endpoints.
//!
//! Controllers hold these as trait objects so a surface can pick the provider at
//! startup and tests can substitute in-process fakes.

pub mod flowise;
pub mod proxy;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::audio::AudioPayload;
use crate::errors::TransportError;
use crate::models::{Message, Role};

/// Everything a completion backend may need to build its provider-specific body.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub system: Option<String>,
    /// Full transcript in send order, ending with the user turn being answered.
    pub transcript: Vec<Message>,
}

impl CompletionRequest {
    pub fn last_user_text(&self) -> Option<&str> {
        self.transcript
            .iter()
            .rev()
            .find(|m| m.role() == Role::User)
            .map(|m| m.content())
    }
}

#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Returns the assistant reply text.
    async fn complete(&self, request: &CompletionRequest) -> Result<String, TransportError>;
}

#[async_trait]
pub trait TranscriptionBackend: Send + Sync {
    /// Returns the transcribed text. Empty results are errors.
    async fn transcribe(&self, audio: &AudioPayload) -> Result<String, TransportError>;
}

/// Shared HTTP client construction: every request carries the fixed timeout.
pub(crate) fn http_client(timeout: Duration) -> Result<Client, TransportError> {
    Ok(Client::builder().timeout(timeout).build()?)
}

/// Pulls a string `error` field out of a JSON error body.
pub(crate) fn error_field(body: &str) -> Option<String> {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()?
        .get("error")?
        .as_str()
        .map(String::from)
}
