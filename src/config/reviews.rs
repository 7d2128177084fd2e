// src/config/reviews.rs
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use std::{env, fs, path::Path, path::PathBuf};
use url::Url;

pub const DEFAULT_SHEET_ID: &str = "12LAXz4XRCDLk7NbEMmWPxZtpoDa9wfDqm34FpwKkDYk";
pub const DEFAULT_SHEET_GID: &str = "0";
/// Columns: Timestamp, Rating, Feedback, Suggestions, Name
pub const DEFAULT_API_RANGE: &str = "A:E";
pub const DEFAULT_EXPORT_BASE_URL: &str = "https://docs.google.com";
pub const DEFAULT_API_BASE_URL: &str = "https://sheets.googleapis.com";

/// How long a fetched payload is served without refresh.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

pub const DEFAULT_CONFIG_PATH: &str = "config/reviews.toml";
pub const ENV_CONFIG_PATH: &str = "REVIEWS_CONFIG_PATH";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SourceMode {
    /// Public export (wrapped JSON, then CSV).
    #[default]
    Export,
    /// Key-authenticated values API.
    Api,
}

impl SourceMode {
    fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "export" | "public" => Some(SourceMode::Export),
            "api" => Some(SourceMode::Api),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviewsConfig {
    pub sheet_id: String,
    pub sheet_gid: String,
    /// Tab name; when set it selects the tab instead of the gid for both export formats.
    pub sheet_name: Option<String>,
    pub source: SourceMode,
    /// Never serialized back out.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub api_range: String,
    pub cache_ttl_ms: u64,
    pub fetch_timeout_ms: u64,
    pub export_base_url: String,
    pub api_base_url: String,
}

impl Default for ReviewsConfig {
    fn default() -> Self {
        Self {
            sheet_id: DEFAULT_SHEET_ID.to_string(),
            sheet_gid: DEFAULT_SHEET_GID.to_string(),
            sheet_name: None,
            source: SourceMode::Export,
            api_key: None,
            api_range: DEFAULT_API_RANGE.to_string(),
            cache_ttl_ms: DEFAULT_CACHE_TTL.as_millis() as u64,
            fetch_timeout_ms: DEFAULT_FETCH_TIMEOUT.as_millis() as u64,
            export_base_url: DEFAULT_EXPORT_BASE_URL.to_string(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
        }
    }
}

impl ReviewsConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let mut cfg: ReviewsConfig = toml::from_str(s).context("parsing reviews config toml")?;
        cfg.normalize();
        Ok(cfg)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading reviews config from {}", path.display()))?;
        Self::from_toml_str(&content)
    }

    /// Resolve config: file ($REVIEWS_CONFIG_PATH, else config/reviews.toml if present),
    /// then env overrides.
    pub fn load() -> Result<Self> {
        let mut cfg = match env::var(ENV_CONFIG_PATH) {
            Ok(p) => {
                let pb = PathBuf::from(p);
                if !pb.exists() {
                    return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
                }
                Self::load_from(&pb)?
            }
            Err(_) => {
                let default = PathBuf::from(DEFAULT_CONFIG_PATH);
                if default.exists() {
                    Self::load_from(&default)?
                } else {
                    Self::default()
                }
            }
        };
        cfg.apply_env_overrides();
        Ok(cfg)
    }

    pub fn apply_env_overrides(&mut self) {
        let var = |k: &str| env::var(k).ok().filter(|v| !v.trim().is_empty());

        if let Some(v) = var("REVIEWS_SHEET_ID") {
            self.sheet_id = v.trim().to_string();
        }
        if let Some(v) = var("REVIEWS_SHEET_GID") {
            self.sheet_gid = v.trim().to_string();
        }
        if let Some(v) = var("REVIEWS_SHEET_NAME") {
            self.sheet_name = Some(v);
        }
        if let Some(mode) = var("REVIEWS_SOURCE").as_deref().and_then(SourceMode::parse) {
            self.source = mode;
        }
        if let Some(v) = var("GOOGLE_SHEETS_API_KEY") {
            self.api_key = Some(v);
        }
        if let Some(v) = var("REVIEWS_SHEETS_RANGE") {
            self.api_range = v.trim().to_string();
        }
        if let Some(ms) = var("REVIEWS_CACHE_TTL_MS").and_then(|v| v.trim().parse().ok()) {
            self.cache_ttl_ms = ms;
        }
        if let Some(ms) = var("REVIEWS_FETCH_TIMEOUT_MS").and_then(|v| v.trim().parse().ok()) {
            self.fetch_timeout_ms = ms;
        }
        if let Some(v) = var("REVIEWS_EXPORT_BASE_URL") {
            self.export_base_url = v;
        }
        if let Some(v) = var("REVIEWS_API_BASE_URL") {
            self.api_base_url = v;
        }
        self.normalize();
    }

    fn normalize(&mut self) {
        self.api_key = self
            .api_key
            .take()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty());
        self.sheet_name = self
            .sheet_name
            .take()
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());
        self.export_base_url = self.export_base_url.trim_end_matches('/').to_string();
        self.api_base_url = self.api_base_url.trim_end_matches('/').to_string();
        if self.fetch_timeout_ms == 0 {
            self.fetch_timeout_ms = DEFAULT_FETCH_TIMEOUT.as_millis() as u64;
        }
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_millis(self.cache_ttl_ms)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    /// Wrapped-JSON export.
    pub fn gviz_request(&self) -> Result<UpstreamRequest, url::ParseError> {
        let mut query = vec![("tqx", "out:json".to_string())];
        query.push(self.tab_selector());
        Ok(UpstreamRequest {
            url: endpoint(
                &self.export_base_url,
                &["spreadsheets", "d", &self.sheet_id, "gviz", "tq"],
            )?,
            query,
        })
    }

    /// CSV export of the same tab as [`Self::gviz_request`]. The plain export
    /// endpoint only takes a gid, so named tabs go through the query endpoint.
    pub fn csv_request(&self) -> Result<UpstreamRequest, url::ParseError> {
        match &self.sheet_name {
            Some(name) => Ok(UpstreamRequest {
                url: endpoint(
                    &self.export_base_url,
                    &["spreadsheets", "d", &self.sheet_id, "gviz", "tq"],
                )?,
                query: vec![("tqx", "out:csv".to_string()), ("sheet", name.clone())],
            }),
            None => Ok(UpstreamRequest {
                url: endpoint(
                    &self.export_base_url,
                    &["spreadsheets", "d", &self.sheet_id, "export"],
                )?,
                query: vec![
                    ("format", "csv".to_string()),
                    ("gid", self.sheet_gid.clone()),
                ],
            }),
        }
    }

    /// Values API (without the key; it is attached at request time).
    pub fn values_request(&self) -> Result<UpstreamRequest, url::ParseError> {
        Ok(UpstreamRequest {
            url: endpoint(
                &self.api_base_url,
                &["v4", "spreadsheets", &self.sheet_id, "values", &self.api_range],
            )?,
            query: Vec::new(),
        })
    }

    fn tab_selector(&self) -> (&'static str, String) {
        match &self.sheet_name {
            Some(name) => ("sheet", name.clone()),
            None => ("gid", self.sheet_gid.clone()),
        }
    }
}

/// Upstream endpoint: URL with encoded path segments plus query pairs for
/// `RequestBuilder::query`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamRequest {
    pub url: Url,
    pub query: Vec<(&'static str, String)>,
}

impl UpstreamRequest {
    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }
}

fn endpoint(base: &str, segments: &[&str]) -> Result<Url, url::ParseError> {
    let mut url = Url::parse(base)?;
    url.path_segments_mut()
        .map_err(|_| url::ParseError::RelativeUrlWithCannotBeABaseBase)?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}
