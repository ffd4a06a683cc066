use axum::{
    extract::{Path, State},
    Json,
};

use crate::errors::AppError;
use crate::models::portfolio::{Portfolio, Project};
use crate::state::AppState;

/// GET /api/v1/portfolio
pub async fn handle_get_portfolio(State(state): State<AppState>) -> Json<Portfolio> {
    Json(state.portfolio.as_ref().clone())
}

/// GET /api/v1/projects/:slug
pub async fn handle_get_project(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<Project>, AppError> {
    state
        .portfolio
        .projects
        .iter()
        .find(|p| p.slug == slug)
        .cloned()
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Project '{slug}'")))
}
