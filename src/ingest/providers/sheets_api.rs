// src/ingest/providers/sheets_api.rs
//! Key-authenticated values API (`{ "values": [[...], ...] }`, first row = header).

use async_trait::async_trait;
use metrics::counter;
use serde::Deserialize;

use crate::config::{ReviewsConfig, UpstreamRequest};
use crate::ingest::providers::{build_client, fetch_text};
use crate::ingest::types::{CellValue, IngestError, RawTable, TableSource};

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<serde_json::Value>>,
}

pub struct SheetsApiProvider {
    request: UpstreamRequest,
    api_key: String,
    client: reqwest::Client,
}

impl SheetsApiProvider {
    pub fn from_config(cfg: &ReviewsConfig, api_key: &str) -> Result<Self, IngestError> {
        Ok(Self {
            request: cfg.values_request()?,
            api_key: api_key.to_string(),
            client: build_client(cfg.fetch_timeout())?,
        })
    }

    pub fn parse_values(body: &str) -> Result<RawTable, IngestError> {
        let range: ValueRange = serde_json::from_str(body)?;
        let records = range
            .values
            .iter()
            .map(|row| row.iter().map(CellValue::from_json).collect())
            .collect();
        Ok(RawTable::from_records(records))
    }
}

#[async_trait]
impl TableSource for SheetsApiProvider {
    async fn fetch_table(&self) -> Result<RawTable, IngestError> {
        let query = [("key", self.api_key.as_str())];
        let res = match fetch_text(&self.client, &self.request, &query).await {
            Ok(body) => Self::parse_values(&body),
            // reqwest errors echo the request URL, which carries the key
            Err(IngestError::Transport(e)) => Err(IngestError::Transport(e.without_url())),
            Err(e) => Err(e),
        };
        if let Err(e) = &res {
            tracing::warn!(target: "reviews", error = %e, "sheets api fetch failed");
            counter!("reviews_upstream_errors_total", "format" => "values").increment(1);
        }
        res
    }

    fn name(&self) -> &'static str {
        "sheets-api"
    }
}
