use std::sync::Arc;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use folio_client::audio::platform_capture;
use folio_client::config::ClientConfig;
use folio_client::surfaces::{self, terminal};

#[tokio::main]
async fn main() -> Result<()> {
    let config = ClientConfig::from_env()?;

    // Logs go to stderr so they don't interleave with the conversation on stdout
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "folio_client={level},folio_chat={level}",
                level = config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!(
        "Starting folio-chat v{} ({:?} surface, api {})",
        env!("CARGO_PKG_VERSION"),
        config.surface,
        config.api_url
    );

    let controllers = surfaces::wire(
        &config,
        Arc::new(terminal::TerminalNotifier),
        platform_capture(),
    )?;
    terminal::run(config.surface, controllers).await
}
