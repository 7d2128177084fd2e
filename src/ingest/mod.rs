// src/ingest/mod.rs
pub mod columns;
pub mod parse;
pub mod providers;
pub mod sanitize;
pub mod types;

use crate::ingest::columns::infer_columns;
use crate::ingest::sanitize::{looks_like_code, sanitize};
use crate::ingest::types::{CellValue, IngestError, RawTable, Review, TableSource};
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, histogram};
use once_cell::sync::{Lazy, OnceCell};
use regex::Regex;

/// Upper bound on reviews served to the page.
pub const MAX_REVIEWS: usize = 24;

/// One-time metrics registration (so series show up on /metrics).
pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("reviews_cache_hits_total", "Requests served from a fresh cache.");
        describe_counter!(
            "reviews_cache_misses_total",
            "Requests that refreshed from upstream."
        );
        describe_counter!(
            "reviews_cache_stale_total",
            "Requests served a stale cache after a failed refresh."
        );
        describe_counter!(
            "reviews_cache_errors_total",
            "Requests with no cache and a failed refresh."
        );
        describe_counter!(
            "reviews_upstream_errors_total",
            "Upstream fetch/parse failures, by format."
        );
        describe_counter!(
            "reviews_format_fallback_total",
            "Primary export failed and the CSV export was tried."
        );
        describe_counter!(
            "reviews_rows_dropped_total",
            "Rows discarded during mapping, by reason."
        );
        describe_histogram!("reviews_fetch_ms", "Upstream fetch + parse time in milliseconds.");
        describe_gauge!("reviews_cache_ttl_ms", "Configured cache TTL in milliseconds.");
        describe_gauge!(
            "reviews_last_refresh_ts",
            "Unix ts of the last successful refresh."
        );
    });
}

static RE_LEADING_NUMBER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[+-]?(\d+(\.\d*)?|\.\d+)([eE][+-]?\d+)?").expect("leading number regex")
});

/// Coerce a raw rating cell into `0..=5`, or `None` if it is not numeric.
pub fn coerce_rating(cell: &CellValue) -> Option<u8> {
    let n = match cell {
        CellValue::Number(n) => *n,
        CellValue::Text(s) => {
            let m = RE_LEADING_NUMBER.find(s.trim())?;
            m.as_str().parse::<f64>().ok()?
        }
        CellValue::Empty | CellValue::Bool(_) => return None,
    };
    if !n.is_finite() {
        return None;
    }
    Some(n.round().clamp(0.0, 5.0) as u8)
}

fn cell_at(row: &[CellValue], idx: usize) -> &CellValue {
    static EMPTY: CellValue = CellValue::Empty;
    row.get(idx).unwrap_or(&EMPTY)
}

/// Why a row produced no review.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    EmptyName,
    EmptyReview,
    Code,
}

impl DropReason {
    pub fn label(self) -> &'static str {
        match self {
            DropReason::EmptyName => "empty_name",
            DropReason::EmptyReview => "empty_review",
            DropReason::Code => "code",
        }
    }
}

/// Map one raw row to a review, or say why it was dropped.
pub fn map_row(
    row: &[CellValue],
    cols: &columns::ColumnMap,
) -> Result<Review, DropReason> {
    let review_text = sanitize(&cell_at(row, cols.review).as_text());
    if looks_like_code(&review_text) {
        return Err(DropReason::Code);
    }
    let name = sanitize(&cell_at(row, cols.name).as_text());
    if name.is_empty() {
        return Err(DropReason::EmptyName);
    }
    if review_text.is_empty() {
        return Err(DropReason::EmptyReview);
    }
    let rating = cols.rating.map(|i| cell_at(row, i)).and_then(coerce_rating);
    Ok(Review {
        name,
        review_text,
        rating,
    })
}

/// Infer columns, map + validate rows in order, cap at [`MAX_REVIEWS`].
pub fn map_rows(table: &RawTable) -> Vec<Review> {
    let cols = infer_columns(&table.columns);
    let mut out = Vec::with_capacity(table.rows.len().min(MAX_REVIEWS));
    for row in &table.rows {
        if out.len() >= MAX_REVIEWS {
            break;
        }
        match map_row(row, &cols) {
            Ok(r) => out.push(r),
            Err(reason) => {
                counter!("reviews_rows_dropped_total", "reason" => reason.label()).increment(1);
            }
        }
    }
    out
}

/// Fetch a table from `source` and turn it into reviews.
pub async fn fetch_reviews(source: &dyn TableSource) -> Result<Vec<Review>, IngestError> {
    ensure_metrics_described();
    let t0 = std::time::Instant::now();
    let table = source.fetch_table().await?;
    let reviews = map_rows(&table);
    histogram!("reviews_fetch_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
    tracing::info!(
        target: "reviews",
        source = source.name(),
        rows = table.rows.len(),
        kept = reviews.len(),
        "refreshed reviews from upstream"
    );
    Ok(reviews)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text_row(cells: &[&str]) -> Vec<CellValue> {
        cells.iter().map(|c| CellValue::from(*c)).collect()
    }

    fn table(headers: &[&str], rows: Vec<Vec<CellValue>>) -> RawTable {
        RawTable {
            columns: headers.iter().map(|h| h.to_string()).collect(),
            rows,
        }
    }

    #[test]
    fn header_inference_maps_row() {
        let t = table(
            &["Timestamp", "Stars", "Comment", "Suggestions", "Author"],
            vec![text_row(&["2024-01-01", "5", "Great cake!", "", "Jane"])],
        );
        assert_eq!(
            map_rows(&t),
            vec![Review {
                name: "Jane".into(),
                review_text: "Great cake!".into(),
                rating: Some(5),
            }]
        );
    }

    #[test]
    fn positional_fallback_maps_row() {
        let t = table(&["Col1", "Col2"], vec![text_row(&["Jane", "Great cake!"])]);
        let out = map_rows(&t);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].name, "Jane");
        assert_eq!(out[0].review_text, "Great cake!");
        assert_eq!(out[0].rating, None);
    }

    #[test]
    fn rating_coercion_rounds_and_clamps() {
        assert_eq!(coerce_rating(&"7.8".into()), Some(5));
        assert_eq!(coerce_rating(&"-3".into()), Some(0));
        assert_eq!(coerce_rating(&"abc".into()), None);
        assert_eq!(coerce_rating(&"".into()), None);
        assert_eq!(coerce_rating(&"4 stars".into()), Some(4));
        assert_eq!(coerce_rating(&"3.5".into()), Some(4));
        assert_eq!(coerce_rating(&CellValue::Number(2.2)), Some(2));
        assert_eq!(coerce_rating(&CellValue::Number(f64::NAN)), None);
        assert_eq!(coerce_rating(&CellValue::Empty), None);
    }

    #[test]
    fn script_rows_are_dropped_regardless_of_name() {
        let t = table(
            &["Name", "Review"],
            vec![
                text_row(&["Mallory", "function attack() { document.cookie }"]),
                text_row(&["Jane", "Lovely"]),
            ],
        );
        let out = map_rows(&t);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].name, "Jane");
    }

    #[test]
    fn code_check_sees_only_the_sanitized_text() {
        let padded = format!("Lovely cake{}thanks", " ".repeat(900));
        let t = table(
            &["Name", "Review"],
            vec![
                text_row(&["Jane", padded.as_str()]),
                text_row(&["Bob", "Great cake! // var x"]),
                text_row(&["Eve", "<p>var x = 1;</p>"]),
            ],
        );
        let out = map_rows(&t);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].review_text, "Lovely cake thanks");
        assert_eq!(out[1].review_text, "Great cake!");
    }

    #[test]
    fn empty_after_sanitize_is_dropped() {
        let cols = infer_columns(&["Name", "Review"]);
        assert_eq!(
            map_row(&text_row(&["<b></b>", "Nice"]), &cols),
            Err(DropReason::EmptyName)
        );
        assert_eq!(
            map_row(&text_row(&["Jane", "  <i> </i> "]), &cols),
            Err(DropReason::EmptyReview)
        );
        // short row: missing review cell
        assert_eq!(
            map_row(&text_row(&["Jane"]), &cols),
            Err(DropReason::EmptyReview)
        );
    }

    #[test]
    fn output_is_capped_in_row_order() {
        let rows = (0..30)
            .map(|i| {
                let name = format!("Guest {i}");
                text_row(&[name.as_str(), "Delicious"])
            })
            .collect();
        let out = map_rows(&table(&["Name", "Review"], rows));
        assert_eq!(out.len(), MAX_REVIEWS);
        assert_eq!(out[0].name, "Guest 0");
        assert_eq!(out[23].name, "Guest 23");
    }

    #[test]
    fn missing_rating_cell_is_absent_not_zero() {
        let t = table(&["Name", "Review", "Rating"], vec![text_row(&["Jane", "Yum"])]);
        assert_eq!(map_rows(&t)[0].rating, None);
    }
}
