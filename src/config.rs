//! TOML configuration.
//!
//! Every section is optional; missing values fall back to the defaults
//! below. API keys are never stored in the file: each generation section
//! names the environment variable that holds its key.
//!
//! ```toml
//! [knowledge]
//! data_dir = "./data"
//! kb_filename = "kb_2025.jsonl"
//!
//! [retrieval]
//! top_k = 4
//! min_similarity = 0.25
//! min_token_overlap = 2
//!
//! [answer]
//! max_fallback_chars = 1200
//!
//! [generation.general]
//! provider = "gemini"
//! model = "gemini-1.5-flash"
//!
//! [generation.secondary]
//! provider = "mistral"
//!
//! [server]
//! bind = "127.0.0.1:8000"
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub knowledge: KnowledgeConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub answer: AnswerConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct KnowledgeConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Explicit knowledge-base file inside `data_dir`; takes priority over
    /// `kb_backup.jsonl` and `kb.jsonl`.
    #[serde(default)]
    pub kb_filename: Option<String>,
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            kb_filename: None,
        }
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Top-candidate score below which the general fallback tier is used.
    #[serde(default = "default_min_similarity")]
    pub min_similarity: f64,
    #[serde(default = "default_min_token_overlap")]
    pub min_token_overlap: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            min_similarity: default_min_similarity(),
            min_token_overlap: default_min_token_overlap(),
        }
    }
}

fn default_top_k() -> usize {
    4
}
fn default_min_similarity() -> f64 {
    0.25
}
fn default_min_token_overlap() -> usize {
    2
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AnswerConfig {
    /// Maximum characters of a general (non-grounded) answer; 0 = no limit.
    #[serde(default)]
    pub max_fallback_chars: usize,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct GenerationConfig {
    /// General capability: free-form answers and grounded rewrites.
    #[serde(default)]
    pub general: ProviderConfig,
    /// Independent provider tried before the extractive answer.
    #[serde(default)]
    pub secondary: ProviderConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ProviderConfig {
    /// `disabled`, `openai`, `gemini`, or `mistral`.
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    /// Tried in order after `model` when the provider reports the model
    /// as unknown.
    #[serde(default)]
    pub fallback_models: Vec<String>,
    /// API versions to try (Gemini only).
    #[serde(default)]
    pub api_versions: Vec<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    /// Environment variable holding the API key.
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            fallback_models: Vec::new(),
            api_versions: Vec::new(),
            base_url: None,
            api_key_env: None,
            timeout_secs: default_timeout_secs(),
            temperature: default_temperature(),
        }
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_timeout_secs() -> u64 {
    60
}
fn default_temperature() -> f64 {
    0.2
}

impl ProviderConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }

    /// Environment variable holding the key, defaulting per provider.
    pub fn key_env(&self) -> &str {
        if let Some(name) = self.api_key_env.as_deref() {
            return name;
        }
        match self.provider.as_str() {
            "gemini" => "GEMINI_API_KEY",
            "mistral" => "MISTRAL_API_KEY",
            _ => "OPENAI_API_KEY",
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8000".to_string()
}

impl Config {
    /// Configuration rooted at `data_dir`, everything else default.
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        let mut config = Config::default();
        config.knowledge.data_dir = data_dir.into();
        config
    }
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

/// Load configuration from `path`. A missing file yields the defaults.
pub fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        tracing::warn!(path = %path.display(), "config file not found, using defaults");
        return Ok(Config::default());
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}

fn validate(config: &Config) -> Result<()> {
    if config.retrieval.top_k == 0 {
        anyhow::bail!("retrieval.top_k must be >= 1");
    }
    if !(config.retrieval.min_similarity >= 0.0) {
        anyhow::bail!("retrieval.min_similarity must be >= 0.0");
    }

    for (section, p) in [
        ("generation.general", &config.generation.general),
        ("generation.secondary", &config.generation.secondary),
    ] {
        match p.provider.as_str() {
            "disabled" | "openai" | "gemini" | "mistral" => {}
            other => anyhow::bail!(
                "Unknown provider in {}: '{}'. Must be disabled, openai, gemini, or mistral.",
                section,
                other
            ),
        }
        if p.is_enabled() && p.timeout_secs == 0 {
            anyhow::bail!("{}.timeout_secs must be > 0", section);
        }
    }

    Ok(())
}
