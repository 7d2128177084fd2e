// src/ingest/sanitize.rs
//! Text cleanup for third-party review cells.
//!
//! `sanitize` is a denylist strip (tags, comment-like spans, whitespace),
//! not an HTML sanitizer: output is always rendered as plain text by the
//! page. Entities are decoded after stripping, so encoded brackets stay text. `looks_like_code` is a display-quality filter for cells
//! that hold pasted script instead of prose.
//!
//! Comment stripping also eats `//` and `/* */` inside legitimate prose
//! (e.g. URLs). Kept as-is pending a product decision.

use once_cell::sync::Lazy;
use regex::Regex;

/// Cells longer than this are never treated as prose.
pub const MAX_REVIEW_CHARS: usize = 800;

static RE_TAGS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<[^>]*>").expect("tag regex"));
static RE_BLOCK_COMMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)/\*.*?\*/").expect("block comment regex"));
static RE_LINE_COMMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"//[^\n]*").expect("line comment regex"));
static RE_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("whitespace regex"));

static CODE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        // function declarations / expressions
        r"\bfunction\s*[\w$]*\s*\(",
        // DOM globals
        r"\bdocument\s*\.",
        r"\bwindow\s*\.",
        // arrow functions: `(a, b) =>` or `x =>`
        r"(\([^()]*\)|[\w$]+)\s*=>",
        // source map markers
        r"//[#@]\s*sourceMappingURL",
        // var declarations
        r"\bvar\s+[\w$]+",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("code pattern regex"))
    .collect()
});

/// Strip markup and comment-like spans, decode entities, collapse whitespace, trim.
pub fn sanitize(text: &str) -> String {
    let out = RE_TAGS.replace_all(text, "");
    let out = RE_BLOCK_COMMENT.replace_all(&out, "");
    let out = RE_LINE_COMMENT.replace_all(&out, "");
    let decoded = html_escape::decode_html_entities(&out);
    let out = RE_WS.replace_all(&decoded, " ");
    out.trim().to_string()
}

/// Heuristic: does this cell look like script debris rather than a review?
pub fn looks_like_code(text: &str) -> bool {
    if text.chars().count() > MAX_REVIEW_CHARS {
        return true;
    }
    CODE_PATTERNS.iter().any(|re| re.is_match(text))
}
