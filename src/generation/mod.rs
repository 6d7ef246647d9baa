//! Text-generation capabilities.
//!
//! Defines the [`Generator`] trait and two HTTP implementations:
//! - **[`OpenAiChat`]**: any OpenAI-compatible `/v1/chat/completions`
//!   endpoint (used for both `openai` and `mistral`).
//! - **[`Gemini`]**: Google's `generateContent` endpoint.
//!
//! # Availability
//!
//! A provider that is `disabled` or whose API key variable is unset is
//! simply absent ([`Generators`] holds `None`); that is not an error and
//! the answer pipeline moves on to its next tier.
//!
//! # Candidate Enumeration
//!
//! Providers rename and retire models. Instead of a single hard-coded
//! name, each provider holds an ordered list of model (and, for Gemini,
//! API-version) candidates and walks it with [`try_candidates`]:
//!
//! - "not found" style failures (HTTP 404, or a 400 saying the model is
//!   unknown/unsupported) → try the next candidate
//! - any other failure → stop and report it
//!
//! There is no time-based retry: every call carries the configured
//! timeout and a timeout is a plain failure.

mod gemini;
mod openai;

pub use gemini::Gemini;
pub use openai::OpenAiChat;

use anyhow::Result;
use campus_assist_core::models::Lang;
use std::sync::Arc;
use thiserror::Error;

use crate::config::{GenerationConfig, ProviderConfig};

/// Why a generation call produced no text.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("{0} is not configured")]
    NotConfigured(String),
    #[error("model '{model}' not found (HTTP {status}): {body}")]
    NotFound {
        model: String,
        status: u16,
        body: String,
    },
    #[error("provider error (HTTP {status}): {body}")]
    Upstream { status: u16, body: String },
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("invalid provider response: {0}")]
    InvalidResponse(String),
}

impl GenerationError {
    /// Whether another model/version candidate may succeed.
    pub fn is_not_found(&self) -> bool {
        matches!(self, GenerationError::NotFound { .. })
    }

    /// Short variant label used in operator-facing debug text.
    pub fn kind(&self) -> &'static str {
        match self {
            GenerationError::NotConfigured(_) => "NotConfigured",
            GenerationError::NotFound { .. } => "NotFound",
            GenerationError::Upstream { .. } => "UpstreamError",
            GenerationError::Transport(e) if e.is_timeout() => "Timeout",
            GenerationError::Transport(_) => "TransportError",
            GenerationError::InvalidResponse(_) => "InvalidResponse",
        }
    }

    /// Map a non-success HTTP response onto the taxonomy.
    pub(crate) fn from_status(model: &str, status: u16, body: String) -> Self {
        let lowered = body.to_lowercase();
        let unknown_model = lowered.contains("not found")
            || lowered.contains("not supported")
            || lowered.contains("does not exist")
            || lowered.contains("model_not_found");
        if status == 404 || (status == 400 && unknown_model) {
            GenerationError::NotFound {
                model: model.to_string(),
                status,
                body,
            }
        } else {
            GenerationError::Upstream { status, body }
        }
    }
}

/// Call each candidate in order until one succeeds or a failure is not
/// retryable. Returns the last error when every candidate fails.
pub fn try_candidates<C, T>(
    candidates: &[C],
    is_retryable: impl Fn(&GenerationError) -> bool,
    mut call: impl FnMut(&C) -> Result<T, GenerationError>,
) -> Result<T, GenerationError> {
    let mut last_err = None;
    for candidate in candidates {
        match call(candidate) {
            Ok(v) => return Ok(v),
            Err(e) if is_retryable(&e) => {
                tracing::debug!(error = %e, "candidate rejected, trying next");
                last_err = Some(e);
            }
            Err(e) => return Err(e),
        }
    }
    Err(last_err.unwrap_or_else(|| GenerationError::NotConfigured("model candidates".to_string())))
}

/// A text-generation backend.
///
/// Implementations only provide [`chat`](Generator::chat); the free-form
/// and source-grounded operations are prompt recipes on top of it.
pub trait Generator: Send + Sync {
    /// Provider label for logs (e.g. `"gemini"`).
    fn name(&self) -> &str;

    /// One system + user exchange.
    fn chat(&self, system: &str, user: &str) -> Result<String, GenerationError>;

    /// General answer not grounded in the knowledge base.
    fn complete(&self, lang: Lang, message: &str) -> Result<String, GenerationError> {
        self.chat(general_system_prompt(lang), message)
    }

    /// Answer constrained to the numbered `sources` context.
    fn answer_with_sources(
        &self,
        lang: Lang,
        question: &str,
        sources: &str,
    ) -> Result<String, GenerationError> {
        let (system, user) = grounded_prompts(lang, question, sources);
        self.chat(&system, &user)
    }
}

/// System prompt for general (non-grounded) answers.
pub fn general_system_prompt(lang: Lang) -> &'static str {
    match lang {
        Lang::Ar => {
            "أنت مساعد لخدمات الطلبة بالجامعة. \
             أجب بشكل عام ومفيد، وصرّح بوضوح أن الإجابة ليست مبنية على وثائق الجامعة الداخلية. \
             إذا كانت المعلومة قد تختلف حسب الكلية/الشعبة/المستوى، اطلب هذه التفاصيل."
        }
        Lang::En => {
            "You are a university student-services assistant. \
             Answer generally and helpfully, and clearly state the answer is NOT based on the university's internal documents. \
             If details may vary by faculty/program/level, ask for those details."
        }
    }
}

/// System and user prompts for source-grounded answers.
pub fn grounded_prompts(lang: Lang, question: &str, sources: &str) -> (String, String) {
    let system = match lang {
        Lang::Ar => {
            "أنت مساعد لخدمات الطلبة بالجامعة. \
             أجب فقط اعتماداً على المصادر المرقمة المقدمة، ولا تضف معلومات من خارجها. \
             أجب باللغة العربية. \
             استشهد بالمصادر التي تستعملها برقمها مثل [1] أو [2]. \
             إذا تعارضت المصادر، اطرح سؤال توضيح واحداً فقط."
        }
        Lang::En => {
            "You are a university student-services assistant. \
             Answer ONLY from the numbered sources provided; do not add outside information. \
             Answer in English. \
             Cite the sources you use by their number, like [1] or [2]. \
             If the sources conflict, ask a single clarifying question."
        }
    };
    let user = format!("User question:\n{}\n\nSources:\n{}", question, sources);
    (system.to_string(), user)
}

/// Generic prompts for the secondary provider.
pub fn source_answer_prompts(question: &str, sources: &str) -> (String, String) {
    let system = "You are a university student-services assistant. \
        Answer ONLY using the provided sources. If the sources do not contain the answer, say you don't know and ask a clarifying question. \
        Always answer in the user's language (Arabic if Arabic, otherwise English).";
    let user = format!(
        "User question:\n{}\n\nSources:\n{}\n\nReturn a helpful answer and cite sources by numbers like [1], [2] when relevant.",
        question, sources
    );
    (system.to_string(), user)
}

/// The configured generation capabilities.
#[derive(Clone, Default)]
pub struct Generators {
    /// Used for general fallback answers and grounded rewrites.
    pub general: Option<Arc<dyn Generator>>,
    /// Independent provider tried before the extractive answer.
    pub secondary: Option<Arc<dyn Generator>>,
}

impl Generators {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn from_config(config: &GenerationConfig) -> Result<Self> {
        Ok(Self {
            general: create_generator(&config.general)?,
            secondary: create_generator(&config.secondary)?,
        })
    }
}

impl std::fmt::Debug for Generators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Generators")
            .field("general", &self.general.as_ref().map(|g| g.name().to_string()))
            .field("secondary", &self.secondary.as_ref().map(|g| g.name().to_string()))
            .finish()
    }
}

/// Create the generator named by `config.provider`.
///
/// # Supported Providers
///
/// | Config Value | Generator | Default model |
/// |--------------|-----------|---------------|
/// | `"disabled"` | none | |
/// | `"openai"` | [`OpenAiChat`] | `gpt-4o-mini` |
/// | `"mistral"` | [`OpenAiChat`] | `mistral-small-latest` |
/// | `"gemini"` | [`Gemini`] | `gemini-1.5-flash` |
///
/// Returns `Ok(None)` when the provider is disabled or its API key
/// variable is unset or empty.
pub fn create_generator(config: &ProviderConfig) -> Result<Option<Arc<dyn Generator>>> {
    if !config.is_enabled() {
        return Ok(None);
    }
    let api_key = match std::env::var(config.key_env()) {
        Ok(key) if !key.trim().is_empty() => key.trim().to_string(),
        _ => {
            tracing::info!(
                provider = %config.provider,
                key_env = config.key_env(),
                "generation provider has no API key, treating as unavailable"
            );
            return Ok(None);
        }
    };

    let generator: Arc<dyn Generator> = match config.provider.as_str() {
        "openai" => Arc::new(OpenAiChat::new(
            "openai",
            config,
            "https://api.openai.com",
            &["gpt-4o-mini"],
            api_key,
        )?),
        "mistral" => Arc::new(OpenAiChat::new(
            "mistral",
            config,
            "https://api.mistral.ai",
            &["mistral-small-latest"],
            api_key,
        )?),
        "gemini" => Arc::new(Gemini::new(config, api_key)?),
        other => anyhow::bail!("Unknown generation provider: {}", other),
    };
    Ok(Some(generator))
}

/// Ordered, de-duplicated model candidates: the configured model (or the
/// first built-in default), then `fallback_models`, or the remaining
/// built-in defaults when none are configured.
pub(crate) fn model_candidates(config: &ProviderConfig, defaults: &[&str]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    let mut push = |m: &str| {
        let m = m.trim();
        if !m.is_empty() && !out.iter().any(|x| x == m) {
            out.push(m.to_string());
        }
    };
    match config.model.as_deref() {
        Some(m) => push(m),
        None => {
            if let Some(m) = defaults.first() {
                push(m)
            }
        }
    }
    if config.fallback_models.is_empty() {
        defaults.iter().for_each(|m| push(*m));
    } else {
        config.fallback_models.iter().for_each(|m| push(m.as_str()));
    }
    out
}

pub(crate) fn http_client(config: &ProviderConfig) -> Result<reqwest::blocking::Client> {
    Ok(reqwest::blocking::Client::builder()
        .timeout(std::time::Duration::from_secs(config.timeout_secs))
        .build()?)
}
