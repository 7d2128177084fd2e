// src/ingest/parse.rs
//! Parser strategies for the two export formats. Each is a pure
//! `&str -> RawTable` function so format negotiation can be tested without HTTP.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::mem::take;

use crate::ingest::types::{CellValue, IngestError, RawTable};

/// Responses shorter than this cannot hold a wrapped table.
pub const MIN_GVIZ_BYTES: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    /// `callback({...});` wrapped JSON table.
    Gviz,
    /// Plain comma-separated export.
    Csv,
}

impl ExportFormat {
    /// Ordered strategies: primary first.
    pub const ORDER: [ExportFormat; 2] = [ExportFormat::Gviz, ExportFormat::Csv];

    pub fn label(self) -> &'static str {
        match self {
            ExportFormat::Gviz => "gviz",
            ExportFormat::Csv => "csv",
        }
    }

    pub fn parse(self, body: &str) -> Result<RawTable, IngestError> {
        match self {
            ExportFormat::Gviz => parse_gviz(body),
            ExportFormat::Csv => parse_csv(body),
        }
    }
}

/// Try each strategy in order over the same body; first success wins.
pub fn parse_any(body: &str) -> Result<RawTable, IngestError> {
    let mut last = IngestError::Format("no parser strategies".to_string());
    for format in ExportFormat::ORDER {
        match format.parse(body) {
            Ok(t) => return Ok(t),
            Err(e) => last = e,
        }
    }
    Err(last)
}

/* ----------------------------
JSON-wrapped (gviz) format
---------------------------- */

static RE_WRAPPED: Lazy<Regex> = Lazy::new(|| {
    // identifier(...)  with optional trailing `;`
    Regex::new(r"(?s)[A-Za-z_$][\w$.]*\s*\(\s*(\{.*\})\s*\)\s*;?\s*$").expect("gviz wrapper regex")
});

#[derive(Debug, Deserialize)]
struct GvizDoc {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    errors: Vec<serde_json::Value>,
    table: Option<GvizTable>,
}

#[derive(Debug, Deserialize)]
struct GvizTable {
    #[serde(default)]
    cols: Vec<GvizCol>,
    #[serde(default)]
    rows: Vec<GvizRow>,
}

#[derive(Debug, Deserialize)]
struct GvizCol {
    #[serde(default)]
    label: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GvizRow {
    #[serde(default)]
    c: Vec<Option<GvizCell>>,
}

#[derive(Debug, Deserialize)]
struct GvizCell {
    #[serde(default)]
    v: serde_json::Value,
}

pub fn parse_gviz(body: &str) -> Result<RawTable, IngestError> {
    if body.trim().len() < MIN_GVIZ_BYTES {
        return Err(IngestError::TooShort {
            len: body.trim().len(),
            min: MIN_GVIZ_BYTES,
        });
    }
    let inner = RE_WRAPPED
        .captures(body)
        .and_then(|c| c.get(1))
        .ok_or_else(|| IngestError::Format("wrapped json call not found".to_string()))?
        .as_str();

    let doc: GvizDoc = serde_json::from_str(inner)?;
    if doc.status.as_deref() == Some("error") {
        return Err(IngestError::Format(format!(
            "gviz status=error ({} errors)",
            doc.errors.len()
        )));
    }
    let table = doc
        .table
        .ok_or_else(|| IngestError::Format("gviz document has no table".to_string()))?;

    let columns = table
        .cols
        .into_iter()
        .map(|c| c.label.unwrap_or_default())
        .collect();
    let rows = table
        .rows
        .into_iter()
        .map(|r| {
            r.c.into_iter()
                .map(|cell| cell.map(|c| CellValue::from_json(&c.v)).unwrap_or_default())
                .collect()
        })
        .collect();

    Ok(RawTable { columns, rows })
}

/* ----------------------------
Delimited text (CSV) format
---------------------------- */

/// Quote-aware CSV record splitter (CRLF tolerant). Blank records are skipped.
pub fn split_records(text: &str) -> Vec<Vec<String>> {
    let mut records = Vec::new();
    let mut field = String::new();
    let mut record = Vec::new();
    let mut in_quotes = false;
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '"' if in_quotes => {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    field.push('"');
                } else {
                    in_quotes = false;
                }
            }
            '"' if field.trim().is_empty() => {
                field.clear();
                in_quotes = true;
            }
            ',' if !in_quotes => record.push(take(&mut field)),
            '\n' | '\r' if !in_quotes => {
                if ch == '\r' && chars.peek() == Some(&'\n') {
                    chars.next();
                }
                record.push(take(&mut field));
                push_record(&mut records, take(&mut record));
            }
            _ => field.push(ch),
        }
    }
    record.push(field);
    push_record(&mut records, record);
    records
}

fn push_record(records: &mut Vec<Vec<String>>, record: Vec<String>) {
    let blank = record.iter().all(|f| f.trim().is_empty());
    if !blank {
        records.push(record.into_iter().map(|f| f.trim().to_string()).collect());
    }
}

pub fn parse_csv(body: &str) -> Result<RawTable, IngestError> {
    let records = split_records(body)
        .into_iter()
        .map(|r| r.into_iter().map(CellValue::Text).collect())
        .collect();
    Ok(RawTable::from_records(records))
}
