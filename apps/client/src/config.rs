use std::str::FromStr;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};

use crate::surfaces::SurfaceKind;

pub const DEFAULT_SYSTEM_PREAMBLE: &str =
    "My name is Read Me. I can answer all questions about this resume.";

/// Which completion API the chat session talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionProvider {
    /// The Folio completion proxy (`{messages}` → `{content}`).
    Proxy,
    /// A Flowise prediction endpoint (`{question}` → `{text}`).
    Flowise,
}

impl FromStr for CompletionProvider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "proxy" | "openai" => Ok(CompletionProvider::Proxy),
            "flowise" => Ok(CompletionProvider::Flowise),
            other => Err(anyhow!("Unknown completion provider '{other}'")),
        }
    }
}

/// Client configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_url: String,
    pub completion_provider: CompletionProvider,
    pub flowise_url: Option<String>,
    /// `None` sends the transcript without a system turn.
    pub system_preamble: Option<String>,
    pub surface: SurfaceKind,
    /// Applied to every completion and transcription request.
    pub request_timeout: Duration,
    pub rust_log: String,
}

impl ClientConfig {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let completion_provider = std::env::var("FOLIO_COMPLETION_PROVIDER")
            .unwrap_or_else(|_| "proxy".to_string())
            .parse::<CompletionProvider>()?;

        let flowise_url = std::env::var("FLOWISE_URL")
            .ok()
            .filter(|v| !v.trim().is_empty());
        if completion_provider == CompletionProvider::Flowise && flowise_url.is_none() {
            bail!("FLOWISE_URL must be set when FOLIO_COMPLETION_PROVIDER=flowise");
        }

        // Unset selects the default preamble; set-but-empty disables it.
        let system_preamble = match std::env::var("FOLIO_SYSTEM_PREAMBLE") {
            Ok(v) if v.trim().is_empty() => None,
            Ok(v) => Some(v),
            Err(_) => Some(DEFAULT_SYSTEM_PREAMBLE.to_string()),
        };

        Ok(ClientConfig {
            api_url: std::env::var("FOLIO_API_URL")
                .unwrap_or_else(|_| "http://localhost:8080".to_string())
                .trim_end_matches('/')
                .to_string(),
            completion_provider,
            flowise_url,
            system_preamble,
            surface: std::env::var("FOLIO_SURFACE")
                .unwrap_or_else(|_| "sidebar".to_string())
                .parse::<SurfaceKind>()?,
            request_timeout: Duration::from_secs(
                std::env::var("FOLIO_REQUEST_TIMEOUT_SECS")
                    .unwrap_or_else(|_| "60".to_string())
                    .parse::<u64>()
                    .context("FOLIO_REQUEST_TIMEOUT_SECS must be a whole number of seconds")?,
            ),
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }

    pub fn completion_url(&self) -> String {
        format!("{}/functions/v1/openai-chat", self.api_url)
    }

    pub fn transcription_url(&self) -> String {
        format!("{}/functions/v1/voice-to-text", self.api_url)
    }
}
