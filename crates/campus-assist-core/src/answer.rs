//! Answer-text helpers: extraction, citation markers, previews, and
//! sentence-boundary truncation.
//!
//! Knowledge-base entries converted from FAQs follow a `Q: … / A: …`
//! line convention. [`extract_answer`] is the single place that knows it.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::index::RetrievedCandidate;

/// Characters of candidate text kept in explain-trace previews.
pub const PREVIEW_CHARS: usize = 240;

static ANSWER_LINE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?mi)^\s*A:\s*(.+)$").expect("answer pattern is valid"));

static CITATION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[\d+\]").expect("citation pattern is valid"));

/// Return the answer part of a `Q:`/`A:` entry, or the whole text trimmed.
///
/// Only the first `A:` line is captured; continuation lines are dropped.
pub fn extract_answer(text: &str) -> String {
    match ANSWER_LINE_RE.captures(text).and_then(|c| c.get(1)) {
        Some(m) => m.as_str().trim().to_string(),
        None => text.trim().to_string(),
    }
}

/// Whether `text` already carries a `[n]` citation marker.
pub fn has_citation(text: &str) -> bool {
    CITATION_RE.is_match(text)
}

/// Append a `[1]` marker unless the text is already cited.
pub fn cite_first(text: &str) -> String {
    if has_citation(text) {
        text.trim().to_string()
    } else {
        format!("{} [1]", text).trim().to_string()
    }
}

/// First `max_chars` characters of `text`.
pub fn preview(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => text[..byte_idx].to_string(),
        None => text.to_string(),
    }
}

/// Shorten `text` to at most `max_chars` characters, preferring to end on a
/// sentence boundary. `max_chars == 0` means no limit.
///
/// The cut backs off to the last `.`, `!`, `?`, `؟` or newline inside the
/// kept prefix when that boundary lies in its second half; otherwise the
/// prefix is hard-cut and an ellipsis appended.
pub fn truncate_at_sentence(text: &str, max_chars: usize) -> String {
    if max_chars == 0 || text.chars().count() <= max_chars {
        return text.to_string();
    }
    let prefix = preview(text, max_chars);
    let half = prefix.len() / 2;
    let boundary = prefix
        .char_indices()
        .filter(|(i, c)| *i >= half && matches!(c, '.' | '!' | '?' | '؟' | '\n'))
        .map(|(i, c)| i + c.len_utf8())
        .last();
    match boundary {
        Some(end) => prefix[..end].trim_end().to_string(),
        None => format!("{}…", prefix.trim_end()),
    }
}

/// Numbered source context in rank order:
///
/// ```text
/// [1] Title
/// URL: https://…
/// full text
/// ```
///
/// Blocks are separated by a blank line.
pub fn build_context(candidates: &[RetrievedCandidate<'_>]) -> String {
    candidates
        .iter()
        .enumerate()
        .map(|(i, c)| {
            format!(
                "[{}] {}\nURL: {}\n{}",
                i + 1,
                c.item.title,
                c.item.url,
                c.item.text
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}
