//! Tokenization, stopword filtering, and language detection.
//!
//! Tokens are maximal runs of Unicode word characters (plus the whole
//! Arabic block, which includes diacritics and Arabic punctuation-like
//! marks that `\w` alone would split on), lowercased.
//!
//! Stopword filtering is script-specific: a token containing Arabic
//! characters is checked against the Arabic list, any other token against
//! the English list. Single-character tokens are always dropped. Because
//! each token is filtered on its own, `index_terms` is stable when applied
//! to its own output.
//!
//! A text that mixes scripts therefore loses its stopwords from both lists.
//! Choosing one list for the whole text (Arabic when any Arabic character is
//! present) would keep English stopwords in mixed documents, so their
//! `doc_len`, and the scores that divide by it, differ between the two
//! approaches. Single-script texts filter identically either way.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

use crate::models::{Lang, LangHint};

static TOKEN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\w\x{0600}-\x{06FF}]+").expect("token pattern is valid"));

static EN_STOP: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "the", "a", "an", "and", "or", "to", "of", "in", "on", "for", "with", "is", "are", "was",
        "were", "be", "been", "it", "this", "that", "i", "you", "we", "they", "he", "she", "my",
        "your", "our", "their", "can", "how", "what", "when", "where", "do", "does",
        // domain-generic words that match nearly every FAQ entry
        "student", "students", "university", "faculty", "campus", "office", "services",
    ]
    .into_iter()
    .collect()
});

static AR_STOP: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "في", "من", "على", "الى", "إلى", "عن", "هل", "ما", "متى", "كيف", "أين", "انا", "أنا", "انت",
        "أنت", "هو", "هي",
    ]
    .into_iter()
    .collect()
});

/// Whether `c` falls in one of the Arabic Unicode blocks
/// (Arabic, Arabic Supplement, Arabic Extended-A).
pub fn is_arabic_char(c: char) -> bool {
    matches!(c, '\u{0600}'..='\u{06FF}' | '\u{0750}'..='\u{077F}' | '\u{08A0}'..='\u{08FF}')
}

/// Whether any character of `text` is Arabic.
pub fn is_arabic(text: &str) -> bool {
    text.chars().any(is_arabic_char)
}

/// Split `text` into lowercased word tokens. No filtering.
pub fn tokenize(text: &str) -> Vec<String> {
    TOKEN_RE
        .find_iter(text)
        .map(|m| m.as_str().to_lowercase())
        .collect()
}

/// Whether a lowercased token should be dropped before scoring.
pub fn is_stopword(token: &str) -> bool {
    if token.chars().count() <= 1 {
        return true;
    }
    if is_arabic(token) {
        AR_STOP.contains(token)
    } else {
        EN_STOP.contains(token)
    }
}

/// Tokenize and drop stopwords and single-character tokens.
///
/// This is the pipeline used both for indexing documents and for queries.
pub fn index_terms(text: &str) -> Vec<String> {
    tokenize(text)
        .into_iter()
        .filter(|t| !is_stopword(t))
        .collect()
}

/// Decide the answer language for a message.
///
/// Arabic characters in the text always win, even over an explicit `en`
/// hint. Without Arabic evidence a hint naming an answer language is used;
/// otherwise English.
pub fn detect_lang(text: &str, hint: Option<LangHint>) -> Lang {
    if is_arabic(text) {
        return Lang::Ar;
    }
    hint.and_then(|h| h.as_lang()).unwrap_or(Lang::En)
}
