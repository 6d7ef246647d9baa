//! Core data models used throughout Campus Assist.
//!
//! These types represent the knowledge-base entries that flow into the
//! lexical index and the structured answers that flow out of the pipeline.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One entry of the knowledge base.
///
/// Immutable once loaded. The `kind` field keeps the raw persisted `type`
/// string; use [`KnowledgeItem::source_kind`] for the normalized category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeItem {
    pub id: String,
    pub title: String,
    pub url: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub text: String,
}

impl KnowledgeItem {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        url: impl Into<String>,
        kind: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            url: url.into(),
            kind: kind.into(),
            text: text.into(),
        }
    }

    /// The category coerced into the closed [`SourceKind`] set.
    pub fn source_kind(&self) -> SourceKind {
        SourceKind::normalize(&self.kind)
    }

    /// The citation record shown to the user for this item.
    pub fn to_source(&self) -> Source {
        Source {
            title: self.title.clone(),
            url: self.url.clone(),
            kind: self.source_kind(),
        }
    }
}

/// Closed set of knowledge-base categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    #[default]
    Official,
    Faq,
    Policy,
}

impl SourceKind {
    /// Map a raw persisted `type` onto the closed set. Unknown values are
    /// treated as `official`.
    pub fn normalize(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "faq" => SourceKind::Faq,
            "policy" => SourceKind::Policy,
            _ => SourceKind::Official,
        }
    }
}

/// Answer language. Arabic is detected from the text; English is the default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lang {
    Ar,
    En,
}

impl Lang {
    pub fn as_str(&self) -> &'static str {
        match self {
            Lang::Ar => "ar",
            Lang::En => "en",
        }
    }
}

impl fmt::Display for Lang {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Language a caller may declare on a request.
///
/// French is accepted as a hint (the UI offers it) but is never an answer
/// language; see [`crate::text::detect_lang`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LangHint {
    Ar,
    #[default]
    En,
    Fr,
}

impl LangHint {
    /// Parse a hint, case-insensitively. Returns `None` for anything else.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ar" => Some(LangHint::Ar),
            "en" => Some(LangHint::En),
            "fr" => Some(LangHint::Fr),
            _ => None,
        }
    }

    /// The answer language this hint names, if it names one.
    pub fn as_lang(&self) -> Option<Lang> {
        match self {
            LangHint::Ar => Some(Lang::Ar),
            LangHint::En => Some(Lang::En),
            LangHint::Fr => None,
        }
    }
}

/// A user question entering the pipeline.
#[derive(Debug, Clone)]
pub struct Query {
    pub message: String,
    pub hint: Option<LangHint>,
    /// Opaque; only used for logging.
    pub conversation_id: String,
}

impl Query {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            hint: None,
            conversation_id: String::new(),
        }
    }

    pub fn with_hint(mut self, hint: LangHint) -> Self {
        self.hint = Some(hint);
        self
    }

    pub fn with_conversation(mut self, id: impl Into<String>) -> Self {
        self.conversation_id = id.into();
        self
    }
}

/// A matched rule with its canned, localized answer.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleOutcome {
    pub intent: &'static str,
    pub confidence: f64,
    pub answer: String,
}

/// A cited source in an answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub title: String,
    pub url: String,
    #[serde(rename = "type")]
    pub kind: SourceKind,
}

/// A retrieval match shown in the explain trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopMatch {
    pub text: String,
    pub similarity: f64,
}

/// Outcome of the pipeline: a real answer, or a request for clarification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Answer,
    Fallback,
}

/// Trace of how an answer was produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Explain {
    pub detected_lang: Lang,
    pub rule_hit: bool,
    pub intent: String,
    pub intent_confidence: f64,
    pub retrieval_method: String,
    pub top_matches: Vec<TopMatch>,
    pub decision: Decision,
}

/// The structured response for one question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerResult {
    pub answer: String,
    pub lang: Lang,
    pub sources: Vec<Source>,
    pub explain: Explain,
}
