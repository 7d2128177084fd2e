// src/ingest/types.rs
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One customer review as served to the page.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub name: String,
    pub review_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<u8>, // 0..=5
}

/// Raw cell value as it came from upstream (before any coercion).
#[derive(Debug, Clone, PartialEq, Default)]
pub enum CellValue {
    #[default]
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
}

impl CellValue {
    /// Render the cell as display text. Integral numbers drop the fractional part.
    pub fn as_text(&self) -> String {
        match self {
            CellValue::Empty => String::new(),
            CellValue::Text(s) => s.clone(),
            CellValue::Number(n) if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 => {
                format!("{}", *n as i64)
            }
            CellValue::Number(n) => n.to_string(),
            CellValue::Bool(b) => b.to_string(),
        }
    }

    pub fn from_json(v: &serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => CellValue::Empty,
            serde_json::Value::String(s) => CellValue::Text(s.clone()),
            serde_json::Value::Number(n) => n.as_f64().map(CellValue::Number).unwrap_or_default(),
            serde_json::Value::Bool(b) => CellValue::Bool(*b),
            other => CellValue::Text(other.to_string()),
        }
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::Text(s.to_string())
    }
}

/// Header labels plus raw rows. Rows may be shorter than the header.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
}

impl RawTable {
    /// Treat the first record as the header row, the rest as data.
    pub fn from_records(mut records: Vec<Vec<CellValue>>) -> Self {
        if records.len() < 2 {
            let columns = records
                .pop()
                .map(|h| h.iter().map(CellValue::as_text).collect())
                .unwrap_or_default();
            return Self {
                columns,
                rows: Vec::new(),
            };
        }
        let rows = records.split_off(1);
        let columns = records[0].iter().map(CellValue::as_text).collect();
        Self { columns, rows }
    }
}

/// Upstream failure taxonomy.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("upstream request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("upstream returned {status} for {url}")]
    Status { status: u16, url: String },

    #[error("unrecognized upstream format: {0}")]
    Format(String),

    #[error("upstream response too short ({len} bytes, need {min})")]
    TooShort { len: usize, min: usize },

    #[error("upstream json invalid: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid upstream url: {0}")]
    Url(#[from] url::ParseError),
}

impl IngestError {
    /// Format-class failures (as opposed to transport-class).
    pub fn is_format(&self) -> bool {
        matches!(
            self,
            IngestError::Format(_) | IngestError::TooShort { .. } | IngestError::Json(_)
        )
    }
}

#[async_trait::async_trait]
pub trait TableSource: Send + Sync {
    async fn fetch_table(&self) -> Result<RawTable, IngestError>;
    fn name(&self) -> &'static str;
}
