// src/ingest/columns.rs
//! Header-label heuristics mapping arbitrary sheet columns onto review fields.

pub const NAME_SYNONYMS: &[&str] = &["name", "customer", "author"];
pub const REVIEW_SYNONYMS: &[&str] = &["review", "testimonial", "feedback", "comment", "message"];
pub const RATING_SYNONYMS: &[&str] = &["rating", "stars", "score"];

/// Resolved column indices for one table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnMap {
    pub name: usize,
    pub review: usize,
    pub rating: Option<usize>,
}

/// Infer field columns from header labels.
///
/// Categories are resolved in precedence order (name, review, rating); a
/// column taken by an earlier category is skipped by later ones. Unmatched
/// name/review fall back to columns 0/1; rating has no positional default.
pub fn infer_columns<S: AsRef<str>>(headers: &[S]) -> ColumnMap {
    let lowered: Vec<String> = headers
        .iter()
        .map(|h| h.as_ref().trim().to_lowercase())
        .collect();

    let mut taken: Vec<usize> = Vec::with_capacity(3);
    let mut find = |synonyms: &[&str]| -> Option<usize> {
        let idx = lowered
            .iter()
            .enumerate()
            .find(|(i, h)| !taken.contains(i) && synonyms.iter().any(|s| h.contains(s)))
            .map(|(i, _)| i)?;
        taken.push(idx);
        Some(idx)
    };

    let name = find(NAME_SYNONYMS);
    let review = find(REVIEW_SYNONYMS);
    let rating = find(RATING_SYNONYMS);

    ColumnMap {
        name: name.unwrap_or(0),
        review: review.unwrap_or(1),
        rating,
    }
}
