use std::sync::Arc;

use crate::config::Config;
use crate::llm_client::LlmClient;
use crate::models::portfolio::Portfolio;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub llm: LlmClient,
    pub config: Config,
    /// Immutable after startup.
    pub portfolio: Arc<Portfolio>,
}
