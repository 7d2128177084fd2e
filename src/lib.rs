// src/lib.rs
// Public library surface for integration tests and the Shuttle binary.

pub mod api;
pub mod cache;
pub mod config;
pub mod ingest;
pub mod metrics;
pub mod service;

pub use crate::api::{create_router, AppState};
pub use crate::ingest::types::Review;
pub use crate::service::{ReviewService, ReviewsPayload, ReviewsResponse};

use anyhow::Context;
use axum::Router;
use tracing::info;

use crate::config::ReviewsConfig;

/// Build the full app (reviews routes + `/metrics`) from resolved config.
pub fn app_with_config(cfg: &ReviewsConfig) -> anyhow::Result<Router> {
    let metrics = metrics::Metrics::init().context("installing prometheus recorder")?;
    let service = ReviewService::from_config(cfg).context("building review source")?;
    info!(
        target: "reviews",
        source = ?cfg.source,
        sheet_id = %cfg.sheet_id,
        ttl_ms = cfg.cache_ttl_ms,
        key_len = cfg.api_key.as_deref().map(str::len).unwrap_or(0),
        "review service configured"
    );
    Ok(create_router(AppState::new(service)).merge(metrics.router()))
}

/// Build the full app from `config/reviews.toml` + env.
pub async fn app() -> anyhow::Result<Router> {
    let cfg = ReviewsConfig::load()?;
    app_with_config(&cfg)
}
