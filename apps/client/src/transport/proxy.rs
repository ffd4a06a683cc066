use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{error_field, http_client, CompletionBackend, CompletionRequest, TranscriptionBackend};
use crate::audio::AudioPayload;
use crate::errors::TransportError;

const BACKEND_NOT_FOUND: &str = "Chatbot backend not found (404). Please check that the \
    openai-chat endpoint is deployed.";

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct CompletionBody<'a> {
    messages: Vec<WireMessage<'a>>,
}

#[derive(Debug, Deserialize)]
struct CompletionReply {
    content: Option<String>,
}

#[derive(Debug, Serialize)]
struct TranscriptionBody<'a> {
    audio: &'a str,
}

/// Talks to the completion proxy: `{messages:[{role,content}...]}` → `{content}`.
pub struct ProxyCompletion {
    client: Client,
    url: String,
}

impl ProxyCompletion {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, TransportError> {
        Ok(Self {
            client: http_client(timeout)?,
            url: url.into(),
        })
    }
}

#[async_trait]
impl CompletionBackend for ProxyCompletion {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, TransportError> {
        let mut messages = Vec::with_capacity(request.transcript.len() + 1);
        if let Some(system) = &request.system {
            messages.push(WireMessage {
                role: "system",
                content: system,
            });
        }
        messages.extend(request.transcript.iter().map(|m| WireMessage {
            role: m.role().as_str(),
            content: m.content(),
        }));

        debug!("Posting {} messages to {}", messages.len(), self.url);
        let response = self
            .client
            .post(&self.url)
            .json(&CompletionBody { messages })
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            warn!("Completion proxy returned {status}: {body}");
            let message = if status == StatusCode::NOT_FOUND {
                BACKEND_NOT_FOUND.to_string()
            } else {
                error_field(&body)
                    .unwrap_or_else(|| format!("Edge Function error ({})", status.as_u16()))
            };
            return Err(TransportError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let reply: CompletionReply =
            serde_json::from_str(&body).map_err(|e| TransportError::Malformed(e.to_string()))?;
        reply
            .content
            .ok_or_else(|| TransportError::Malformed("missing `content` field".to_string()))
    }
}

/// Talks to the transcription proxy: `{audio: base64}` → `{text}`.
pub struct ProxyTranscription {
    client: Client,
    url: String,
}

impl ProxyTranscription {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, TransportError> {
        Ok(Self {
            client: http_client(timeout)?,
            url: url.into(),
        })
    }
}

#[async_trait]
impl TranscriptionBackend for ProxyTranscription {
    async fn transcribe(&self, audio: &AudioPayload) -> Result<String, TransportError> {
        let encoded = audio.to_base64();
        debug!(
            "Posting {} bytes of {} ({} base64 chars) to {}",
            audio.bytes.len(),
            audio.mime,
            encoded.len(),
            self.url
        );

        let response = self
            .client
            .post(&self.url)
            .json(&TranscriptionBody { audio: &encoded })
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            warn!("Transcription proxy returned {status}: {body}");
            return Err(TransportError::Status {
                status: status.as_u16(),
                message: error_field(&body).unwrap_or_else(|| "Transcription failed".to_string()),
            });
        }

        let value: serde_json::Value =
            serde_json::from_str(&body).map_err(|e| TransportError::Malformed(e.to_string()))?;
        match value.get("text").and_then(|t| t.as_str()) {
            Some(text) if !text.trim().is_empty() => Ok(text.to_string()),
            _ => Err(TransportError::Malformed(
                error_field(&body).unwrap_or_else(|| "Transcription failed".to_string()),
            )),
        }
    }
}
