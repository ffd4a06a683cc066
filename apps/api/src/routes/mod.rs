pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::portfolio::handlers as portfolio;
use crate::proxy::handlers::{self as proxy, MAX_AUDIO_BODY_BYTES};
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Proxy API (paths kept compatible with the edge-function clients)
        .route("/functions/v1/openai-chat", post(proxy::handle_chat))
        .route(
            "/functions/v1/voice-to-text",
            post(proxy::handle_voice_to_text).layer(DefaultBodyLimit::max(MAX_AUDIO_BODY_BYTES)),
        )
        // Portfolio API
        .route("/api/v1/portfolio", get(portfolio::handle_get_portfolio))
        .route("/api/v1/projects/:slug", get(portfolio::handle_get_project))
        .with_state(state)
}
