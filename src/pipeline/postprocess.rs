//! Optional cleanup of model text before transcription.
//!
//! Off unless [`crate::config::AnalysisConfig::sanitize_response`] is set.
//! Models sometimes wrap the whole reply in a ```` ```markdown ```` fence, which
//! transcribes as two stray paragraphs, or leave zero-width characters inside
//! headings. These rules remove only that; line breaks are left exactly as
//! received so the transcriber splits the same lines either way. The stored
//! [`crate::output::AnalysisResult`] always keeps the raw text.

use once_cell::sync::Lazy;
use regex::Regex;

/// Apply every sanitising rule.
pub fn sanitize(input: &str) -> String {
    let s = strip_markdown_fences(input);
    remove_invisible_chars(&s)
}

// ── Rule 1: Strip outer markdown fences ──────────────────────────────────────

static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```(?:markdown|md|text)?\r?\n(.*?)\r?\n```\s*$").unwrap());

fn strip_markdown_fences(input: &str) -> String {
    match RE_OUTER_FENCES.captures(input.trim()) {
        Some(caps) => caps[1].to_string(),
        None => input.to_string(),
    }
}

// ── Rule 2: Remove invisible Unicode characters ─────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
        ],
        "",
    )
}
