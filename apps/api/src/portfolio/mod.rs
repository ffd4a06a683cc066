//! Portfolio content for the landing page: hero/about copy and the project gallery.
//!
//! Loaded once at startup, either from `PORTFOLIO_PATH` or the bundled default.

pub mod handlers;

use std::collections::HashSet;

use anyhow::{bail, Context, Result};
use tracing::info;

use crate::models::portfolio::{MediaType, Portfolio};

const DEFAULT_PORTFOLIO: &str = include_str!("default_portfolio.json");

/// Reads and validates the portfolio. `None` selects the bundled default.
pub fn load_portfolio(path: Option<&str>) -> Result<Portfolio> {
    let raw = match path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read portfolio file '{path}'"))?,
        None => DEFAULT_PORTFOLIO.to_string(),
    };

    let portfolio = parse_portfolio(&raw)?;
    info!(
        "Portfolio loaded: {} projects, {} skills",
        portfolio.projects.len(),
        portfolio.profile.skills.len()
    );
    Ok(portfolio)
}

pub fn parse_portfolio(raw: &str) -> Result<Portfolio> {
    let mut portfolio: Portfolio =
        serde_json::from_str(raw).context("Portfolio file is not valid JSON")?;

    let mut seen = HashSet::new();
    for project in &mut portfolio.projects {
        if project.slug.is_empty() {
            project.slug = slugify(&project.title);
        }
        if !seen.insert(project.slug.clone()) {
            bail!("Duplicate project slug '{}'", project.slug);
        }
        if project.media_type == MediaType::Code && project.code.is_none() {
            bail!("Code project '{}' has no code snippet", project.slug);
        }
    }

    Ok(portfolio)
}

/// Lower-cases and joins alphanumeric runs with single dashes.
pub fn slugify(title: &str) -> String {
    title
        .split(|c: char| !c.is_alphanumeric())
        .filter(|part| !part.is_empty())
        .map(|part| part.to_lowercase())
        .collect::<Vec<_>>()
        .join("-")
}
