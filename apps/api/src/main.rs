mod config;
mod errors;
mod llm_client;
mod models;
mod portfolio;
mod proxy;
mod routes;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::llm_client::LlmClient;
use crate::portfolio::load_portfolio;
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on malformed numeric env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={}",
                env!("CARGO_PKG_NAME").replace('-', "_"),
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Folio API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize provider client
    let llm = LlmClient::new(&config)?;
    info!("LLM client initialized (model: {})", llm.chat_model());
    if config.openai_api_key.is_none() {
        warn!("OPENAI_API_KEY is not set; proxy endpoints will answer with an error body");
    }

    // Landing page content
    let portfolio = Arc::new(load_portfolio(config.portfolio_path.as_deref())?);

    // Build app state
    let state = AppState {
        llm,
        config: config.clone(),
        portfolio,
    };

    // Build router. Browser clients call the proxies cross-origin.
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
