// src/ingest/providers/mod.rs
pub mod fallback;
pub mod sheet_export;
pub mod sheets_api;

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{CACHE_CONTROL, PRAGMA};

use crate::config::{ReviewsConfig, SourceMode, UpstreamRequest};
use crate::ingest::types::{IngestError, TableSource};

pub use fallback::StaticProvider;
pub use sheet_export::SheetExportProvider;
pub use sheets_api::SheetsApiProvider;

const USER_AGENT: &str = "bakery-reviews/0.1 (+review proxy)";

pub(crate) fn build_client(timeout: Duration) -> Result<reqwest::Client, IngestError> {
    let client = reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .connect_timeout(timeout.min(Duration::from_secs(4)))
        .timeout(timeout)
        .build()?;
    Ok(client)
}

/// GET the endpoint as text, bypassing intermediary caches. Non-2xx is an error.
/// `extra` is appended to the endpoint's own query pairs.
pub(crate) async fn fetch_text(
    client: &reqwest::Client,
    req: &UpstreamRequest,
    extra: &[(&str, &str)],
) -> Result<String, IngestError> {
    let resp = client
        .get(req.url.clone())
        .query(&req.query)
        .query(extra)
        .header(CACHE_CONTROL, "no-cache, no-store")
        .header(PRAGMA, "no-cache")
        .send()
        .await?;
    let status = resp.status();
    if !status.is_success() {
        return Err(IngestError::Status {
            status: status.as_u16(),
            url: req.url.to_string(),
        });
    }
    Ok(resp.text().await?)
}

/// Pick the upstream source for this configuration.
pub fn build_source(cfg: &ReviewsConfig) -> Result<Arc<dyn TableSource>, IngestError> {
    match (cfg.source, cfg.api_key.as_deref()) {
        (SourceMode::Export, _) => Ok(Arc::new(SheetExportProvider::from_config(cfg)?)),
        (SourceMode::Api, Some(key)) => Ok(Arc::new(SheetsApiProvider::from_config(cfg, key)?)),
        (SourceMode::Api, None) => {
            tracing::info!(
                target: "reviews",
                "sheets api key not configured, serving built-in reviews"
            );
            Ok(Arc::new(StaticProvider::builtin()))
        }
    }
}
