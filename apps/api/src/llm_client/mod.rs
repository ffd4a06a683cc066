//! LLM client: the single point of entry for all provider API calls in Folio.
//!
//! ARCHITECTURAL RULE: No handler may call the provider API directly.
//! Both proxy endpoints (chat completion and transcription) go through this module.

use std::time::Duration;

use reqwest::{multipart, Client, Response};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::config::Config;

const UPSTREAM_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("OpenAI API key not set.")]
    MissingCredential,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

impl LlmError {
    /// The message relayed to proxy callers in the `{error}` body.
    pub fn user_message(&self) -> String {
        match self {
            LlmError::Api { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

/// One turn of a chat transcript, in the provider's wire shape.
/// `content` is forwarded as-is: a string, a content-part array or `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    #[serde(default)]
    pub content: serde_json::Value,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<ChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    #[serde(default)]
    text: String,
}

/// Container format of an uploaded recording, sniffed from its magic bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioContainer {
    Wav,
    Ogg,
    Webm,
}

impl AudioContainer {
    pub fn sniff(bytes: &[u8]) -> Self {
        if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WAVE" {
            AudioContainer::Wav
        } else if bytes.starts_with(b"OggS") {
            AudioContainer::Ogg
        } else {
            // Browsers' MediaRecorder default; also covers EBML-prefixed payloads.
            AudioContainer::Webm
        }
    }

    pub fn file_name(self) -> &'static str {
        match self {
            AudioContainer::Wav => "audio.wav",
            AudioContainer::Ogg => "audio.ogg",
            AudioContainer::Webm => "audio.webm",
        }
    }

    pub fn mime(self) -> &'static str {
        match self {
            AudioContainer::Wav => "audio/wav",
            AudioContainer::Ogg => "audio/ogg",
            AudioContainer::Webm => "audio/webm",
        }
    }
}

/// The single provider client used by both proxy endpoints.
/// Wraps the OpenAI-compatible chat-completions and audio-transcription APIs.
#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    api_key: Option<String>,
    base_url: String,
    chat_model: String,
    transcription_model: String,
    temperature: f32,
    max_tokens: u32,
}

impl LlmClient {
    pub fn new(config: &Config) -> Result<Self, LlmError> {
        Ok(Self {
            client: Client::builder().timeout(UPSTREAM_TIMEOUT).build()?,
            api_key: config.openai_api_key.clone(),
            base_url: config.openai_base_url.trim_end_matches('/').to_string(),
            chat_model: config.chat_model.clone(),
            transcription_model: config.transcription_model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }

    pub fn chat_model(&self) -> &str {
        &self.chat_model
    }

    fn api_key(&self) -> Result<&str, LlmError> {
        self.api_key.as_deref().ok_or(LlmError::MissingCredential)
    }

    /// Sends a transcript to the chat-completions API and returns the first choice's text.
    /// An empty string is returned when the provider answers without content.
    pub async fn complete(&self, messages: &[ChatMessage]) -> Result<String, LlmError> {
        let api_key = self.api_key()?;

        let request_body = ChatCompletionRequest {
            model: &self.chat_model,
            messages,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(api_key)
            .json(&request_body)
            .send()
            .await?;

        let completion: ChatCompletionResponse = decode_provider_json(response).await?;

        if let Some(usage) = &completion.usage {
            debug!(
                "Completion succeeded: prompt_tokens={}, completion_tokens={}",
                usage.prompt_tokens, usage.completion_tokens
            );
        }

        Ok(completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message)
            .and_then(|m| m.content)
            .unwrap_or_default())
    }

    /// Uploads a recording to the transcription API and returns the trimmed text.
    pub async fn transcribe(&self, audio: Vec<u8>) -> Result<String, LlmError> {
        let api_key = self.api_key()?;

        let container = AudioContainer::sniff(&audio);
        debug!(
            "Transcribing {} bytes as {}",
            audio.len(),
            container.mime()
        );

        let part = multipart::Part::bytes(audio)
            .file_name(container.file_name())
            .mime_str(container.mime())?;
        let form = multipart::Form::new()
            .part("file", part)
            .text("model", self.transcription_model.clone());

        let response = self
            .client
            .post(format!("{}/audio/transcriptions", self.base_url))
            .bearer_auth(api_key)
            .multipart(form)
            .send()
            .await?;

        let transcription: TranscriptionResponse = decode_provider_json(response).await?;
        Ok(transcription.text.trim().to_string())
    }
}

/// Reads a provider response body.
///
/// A body carrying `{"error": {"message": ...}}` is an API error whatever the status;
/// any other non-success status is an API error carrying the raw body.
async fn decode_provider_json<T: DeserializeOwned>(response: Response) -> Result<T, LlmError> {
    let status = response.status();
    let body = response.text().await?;

    let value: serde_json::Value = match serde_json::from_str(&body) {
        Ok(v) => v,
        Err(_) if !status.is_success() => {
            return Err(LlmError::Api {
                status: status.as_u16(),
                message: body,
            })
        }
        Err(e) => return Err(LlmError::Parse(e)),
    };

    if let Some(message) = provider_error_message(&value) {
        return Err(LlmError::Api {
            status: status.as_u16(),
            message,
        });
    }

    if !status.is_success() {
        return Err(LlmError::Api {
            status: status.as_u16(),
            message: body,
        });
    }

    Ok(serde_json::from_value(value)?)
}

fn provider_error_message(value: &serde_json::Value) -> Option<String> {
    let error = value.get("error")?;
    if error.is_null() {
        return None;
    }
    Some(
        error
            .get("message")
            .and_then(|m| m.as_str())
            .map(String::from)
            .unwrap_or_else(|| error.to_string()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sniff_wav() {
        let mut bytes = b"RIFF\0\0\0\0WAVEfmt ".to_vec();
        bytes.extend_from_slice(&[0u8; 16]);
        assert_eq!(AudioContainer::sniff(&bytes), AudioContainer::Wav);
    }

    #[test]
    fn test_sniff_ogg_and_default() {
        assert_eq!(AudioContainer::sniff(b"OggS\0\x02"), AudioContainer::Ogg);
        assert_eq!(
            AudioContainer::sniff(&[0x1A, 0x45, 0xDF, 0xA3]),
            AudioContainer::Webm
        );
        assert_eq!(AudioContainer::sniff(b""), AudioContainer::Webm);
    }

    #[test]
    fn test_partial_usage_does_not_fail_completion() {
        let completion: ChatCompletionResponse = serde_json::from_value(json!({
            "choices": [{ "message": { "content": "Hi" } }],
            "usage": { "total_tokens": 7 }
        }))
        .unwrap();
        let usage = completion.usage.unwrap();
        assert_eq!((usage.prompt_tokens, usage.completion_tokens), (0, 0));
    }

    #[test]
    fn test_message_content_is_forwarded_verbatim() {
        let messages: Vec<ChatMessage> = serde_json::from_value(json!([
            { "role": "user", "content": [{ "type": "text", "text": "Hi" }] },
            { "role": "assistant", "content": null }
        ]))
        .unwrap();
        assert_eq!(messages[0].content[0]["text"], "Hi");
        assert!(messages[1].content.is_null());
        assert_eq!(
            serde_json::to_value(&messages[1]).unwrap(),
            json!({ "role": "assistant", "content": null })
        );
    }

    #[test]
    fn test_provider_error_message_extraction() {
        let v = json!({ "error": { "message": "quota exceeded", "type": "insufficient_quota" } });
        assert_eq!(provider_error_message(&v).as_deref(), Some("quota exceeded"));

        let v = json!({ "error": null, "choices": [] });
        assert_eq!(provider_error_message(&v), None);

        let v = json!({ "error": "flat" });
        assert_eq!(provider_error_message(&v).as_deref(), Some("\"flat\""));
    }

    #[test]
    fn test_missing_credential_message() {
        assert_eq!(
            LlmError::MissingCredential.user_message(),
            "OpenAI API key not set."
        );
    }
}
