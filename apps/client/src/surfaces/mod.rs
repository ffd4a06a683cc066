//! Chat surfaces: the full-page view and the sidebar with inline upload and voice.
//!
//! Both delegate to the same controllers; they differ only in which commands
//! they expose.

pub mod terminal;

use std::str::FromStr;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use tracing::info;

use crate::audio::AudioCapture;
use crate::chat::ChatSession;
use crate::config::{ClientConfig, CompletionProvider};
use crate::ingest::FileIngestion;
use crate::notify::Notifier;
use crate::resume::ResumeContext;
use crate::transport::flowise::FlowiseCompletion;
use crate::transport::proxy::{ProxyCompletion, ProxyTranscription};
use crate::transport::CompletionBackend;
use crate::voice::VoiceCapture;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceKind {
    Page,
    Sidebar,
}

impl SurfaceKind {
    pub fn allows_upload(self) -> bool {
        self == SurfaceKind::Sidebar
    }

    pub fn allows_voice(self) -> bool {
        self == SurfaceKind::Sidebar
    }

    pub fn title(self) -> &'static str {
        match self {
            SurfaceKind::Page => "Chat with my resume",
            SurfaceKind::Sidebar => "Resume assistant",
        }
    }
}

impl FromStr for SurfaceKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "page" | "full" => Ok(SurfaceKind::Page),
            "sidebar" => Ok(SurfaceKind::Sidebar),
            other => Err(anyhow!("Unknown surface '{other}' (expected page or sidebar)")),
        }
    }
}

/// The controllers one surface session works with. They share one resume context.
pub struct Controllers {
    pub chat: ChatSession,
    pub ingest: FileIngestion,
    pub voice: VoiceCapture,
    pub resume: ResumeContext,
}

/// Builds the controllers for `config`. Transcribed speech lands in the chat input.
pub fn wire(
    config: &ClientConfig,
    notifier: Arc<dyn Notifier>,
    capture: Box<dyn AudioCapture>,
) -> Result<Controllers> {
    let resume = ResumeContext::new();

    let backend: Arc<dyn CompletionBackend> = match config.completion_provider {
        CompletionProvider::Proxy => Arc::new(
            ProxyCompletion::new(config.completion_url(), config.request_timeout)
                .context("Failed to build completion client")?,
        ),
        CompletionProvider::Flowise => {
            let url = config
                .flowise_url
                .clone()
                .ok_or_else(|| anyhow!("FLOWISE_URL is not set"))?;
            Arc::new(
                FlowiseCompletion::new(url, config.request_timeout)
                    .context("Failed to build Flowise client")?,
            )
        }
    };
    info!("Completion provider: {:?}", config.completion_provider);

    let transcriber = Arc::new(
        ProxyTranscription::new(config.transcription_url(), config.request_timeout)
            .context("Failed to build transcription client")?,
    );

    let chat = ChatSession::new(
        backend,
        Arc::clone(&notifier),
        resume.clone(),
        config.system_preamble.clone(),
    );
    let ingest = FileIngestion::new(resume.clone(), Arc::clone(&notifier));

    let sink = chat.clone();
    let voice = VoiceCapture::new(
        capture,
        transcriber,
        notifier,
        Arc::new(move |text: String| sink.append_input(&text)),
    );

    Ok(Controllers {
        chat,
        ingest,
        voice,
        resume,
    })
}
