// src/ingest/providers/sheet_export.rs
//! Public spreadsheet export: wrapped-JSON first, CSV when that fails.

use async_trait::async_trait;
use metrics::counter;

use crate::config::{ReviewsConfig, UpstreamRequest};
use crate::ingest::parse::ExportFormat;
use crate::ingest::providers::{build_client, fetch_text};
use crate::ingest::types::{IngestError, RawTable, TableSource};

pub struct SheetExportProvider {
    mode: Mode,
}

enum Mode {
    /// Canned bodies per format; `None` behaves like an unreachable upstream.
    Fixture {
        gviz: Option<String>,
        csv: Option<String>,
    },
    Http {
        gviz: UpstreamRequest,
        csv: UpstreamRequest,
        client: reqwest::Client,
    },
}

impl SheetExportProvider {
    pub fn from_config(cfg: &ReviewsConfig) -> Result<Self, IngestError> {
        Ok(Self {
            mode: Mode::Http {
                gviz: cfg.gviz_request()?,
                csv: cfg.csv_request()?,
                client: build_client(cfg.fetch_timeout())?,
            },
        })
    }

    pub fn from_fixtures(gviz: Option<&str>, csv: Option<&str>) -> Self {
        Self {
            mode: Mode::Fixture {
                gviz: gviz.map(str::to_string),
                csv: csv.map(str::to_string),
            },
        }
    }

    async fn fetch_body(&self, format: ExportFormat) -> Result<String, IngestError> {
        match &self.mode {
            Mode::Fixture { gviz, csv } => {
                let body = match format {
                    ExportFormat::Gviz => gviz,
                    ExportFormat::Csv => csv,
                };
                body.clone().ok_or_else(|| IngestError::Status {
                    status: 503,
                    url: format!("fixture:{}", format.label()),
                })
            }
            Mode::Http { gviz, csv, client } => {
                let req = match format {
                    ExportFormat::Gviz => gviz,
                    ExportFormat::Csv => csv,
                };
                fetch_text(client, req, &[]).await
            }
        }
    }

    async fn fetch_format(&self, format: ExportFormat) -> Result<RawTable, IngestError> {
        let body = self.fetch_body(format).await?;
        format.parse(&body)
    }
}

#[async_trait]
impl TableSource for SheetExportProvider {
    async fn fetch_table(&self) -> Result<RawTable, IngestError> {
        let mut last_err = None;
        for (attempt, format) in ExportFormat::ORDER.into_iter().enumerate() {
            if attempt > 0 {
                counter!("reviews_format_fallback_total").increment(1);
            }
            match self.fetch_format(format).await {
                Ok(table) => return Ok(table),
                Err(e) => {
                    tracing::warn!(
                        target: "reviews",
                        error = %e,
                        format = format.label(),
                        format_failure = e.is_format(),
                        "sheet export failed"
                    );
                    counter!("reviews_upstream_errors_total", "format" => format.label())
                        .increment(1);
                    last_err = Some(e);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| IngestError::Format("no export formats".to_string())))
    }

    fn name(&self) -> &'static str {
        "sheet-export"
    }
}
