use anyhow::{Context, Result};

const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Application configuration loaded from environment variables.
///
/// The provider key is optional. A missing key is reported per request as an
/// `{error}` body, not as a startup failure.
#[derive(Debug, Clone)]
pub struct Config {
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    pub chat_model: String,
    pub transcription_model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub portfolio_path: Option<String>,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            openai_api_key: optional_env("OPENAI_API_KEY"),
            openai_base_url: optional_env("OPENAI_BASE_URL")
                .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string()),
            chat_model: optional_env("OPENAI_CHAT_MODEL").unwrap_or_else(|| "gpt-4o".to_string()),
            transcription_model: optional_env("OPENAI_TRANSCRIPTION_MODEL")
                .unwrap_or_else(|| "whisper-1".to_string()),
            temperature: optional_env("OPENAI_TEMPERATURE")
                .unwrap_or_else(|| "0.8".to_string())
                .parse::<f32>()
                .context("OPENAI_TEMPERATURE must be a number")?,
            max_tokens: optional_env("OPENAI_MAX_TOKENS")
                .unwrap_or_else(|| "1000".to_string())
                .parse::<u32>()
                .context("OPENAI_MAX_TOKENS must be a positive integer")?,
            portfolio_path: optional_env("PORTFOLIO_PATH"),
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

/// Reads an env var, treating empty values as unset.
fn optional_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
impl Config {
    /// Config pointing at a local stand-in for the provider API.
    pub fn for_tests(openai_base_url: &str, openai_api_key: Option<&str>) -> Self {
        Config {
            openai_api_key: openai_api_key.map(String::from),
            openai_base_url: openai_base_url.to_string(),
            chat_model: "gpt-4o".to_string(),
            transcription_model: "whisper-1".to_string(),
            temperature: 0.8,
            max_tokens: 1000,
            portfolio_path: None,
            port: 0,
            rust_log: "debug".to_string(),
        }
    }
}
