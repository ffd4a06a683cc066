use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, warn};

use super::{http_client, CompletionBackend, CompletionRequest};
use crate::errors::TransportError;

#[derive(Debug, Serialize)]
struct PredictionBody<'a> {
    question: &'a str,
}

/// Talks to a Flowise prediction endpoint. Only the latest user turn is sent;
/// the flow keeps its own memory.
pub struct FlowiseCompletion {
    client: Client,
    url: String,
}

impl FlowiseCompletion {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, TransportError> {
        Ok(Self {
            client: http_client(timeout)?,
            url: url.into(),
        })
    }
}

#[async_trait]
impl CompletionBackend for FlowiseCompletion {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, TransportError> {
        let question = request.last_user_text().unwrap_or_default();
        debug!("Posting question ({} chars) to Flowise", question.len());

        let response = self
            .client
            .post(&self.url)
            .json(&PredictionBody { question })
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            warn!("Flowise returned {status}: {body}");
            let mut message = format!("Flowise API error ({})", status.as_u16());
            if !body.is_empty() {
                message.push_str(": ");
                message.push_str(&body);
            }
            return Err(TransportError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let value: serde_json::Value =
            serde_json::from_str(&body).map_err(|e| TransportError::Malformed(e.to_string()))?;
        Ok(prediction_text(&value))
    }
}

/// `text`, then `response`, then the whole body serialized.
fn prediction_text(value: &serde_json::Value) -> String {
    ["text", "response"]
        .iter()
        .filter_map(|key| value.get(*key))
        .find(|v| !v.is_null())
        .map(|v| match v.as_str() {
            Some(s) => s.to_string(),
            None => v.to_string(),
        })
        .unwrap_or_else(|| value.to_string())
}
