//! The shared, request-facing facade.
//!
//! An [`Assistant`] owns the live [`KnowledgeBase`] and a reloadable
//! [`Settings`] snapshot (configuration plus generation providers). Each
//! request refreshes the knowledge base, loads the settings once, and runs
//! the [`Orchestrator`] against that fixed pair, so a concurrent reload of
//! either never shows a request a half-updated view.
//!
//! An assistant built with [`Assistant::from_config_file`] watches that
//! file: each request compares its modification time and length with the
//! last seen values and, on change, rebuilds the settings from it. An
//! invalid edit is logged and the previous settings keep serving.

use anyhow::{Context, Result};
use arc_swap::ArcSwap;
use campus_assist_core::answer::{preview, PREVIEW_CHARS};
use campus_assist_core::index::SearchParams;
use campus_assist_core::models::{AnswerResult, Lang, Query};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use crate::config::{load_config, Config};
use crate::generation::Generators;
use crate::knowledge_base::KnowledgeBase;
use crate::orchestrator::Orchestrator;

/// Configuration and the generators built from it, replaced as one unit.
#[derive(Debug)]
pub struct Settings {
    pub config: Config,
    pub generators: Generators,
}

pub struct Assistant {
    kb: KnowledgeBase,
    settings: ArcSwap<Settings>,
    config_watch: Option<ConfigWatch>,
}

/// Modification time and length of a file, `None` when it does not exist.
type FileStamp = Option<(Option<SystemTime>, u64)>;

struct ConfigWatch {
    path: PathBuf,
    seen: Mutex<FileStamp>,
}

fn file_stamp(path: &Path) -> FileStamp {
    std::fs::metadata(path)
        .ok()
        .map(|m| (m.modified().ok(), m.len()))
}

/// Non-secret runtime summary.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Status {
    pub version: String,
    pub kb_size: usize,
    pub kb_source: String,
    pub rag: RagStatus,
    pub generation: GenerationStatus,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RagStatus {
    pub top_k: usize,
    pub min_similarity: f64,
    pub min_token_overlap: usize,
}

/// Provider name per capability, `None` when unavailable.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationStatus {
    pub general: Option<String>,
    pub secondary: Option<String>,
}

/// One retrieval match, owned so it can outlive the snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub id: String,
    pub title: String,
    pub url: String,
    pub similarity: f64,
    pub excerpt: String,
}

impl Assistant {
    /// Load the knowledge base and build the configured generators.
    pub fn new(config: Config) -> Result<Self> {
        let generators = Generators::from_config(&config.generation)?;
        Self::with_generators(config, generators)
    }

    /// Like [`Assistant::new`] with explicitly supplied generators.
    pub fn with_generators(config: Config, generators: Generators) -> Result<Self> {
        let kb = KnowledgeBase::open(&config.knowledge).context("Failed to load knowledge base")?;
        tracing::info!(
            general = ?generators.general.as_ref().map(|g| g.name().to_string()),
            secondary = ?generators.secondary.as_ref().map(|g| g.name().to_string()),
            "generation providers"
        );
        Ok(Self {
            kb,
            settings: ArcSwap::from_pointee(Settings { config, generators }),
            config_watch: None,
        })
    }

    /// Load the config at `path` and keep watching it for edits.
    pub fn from_config_file(path: &Path) -> Result<Self> {
        // Stat before reading so an edit racing the read is seen next time.
        let seen = file_stamp(path);
        let mut assistant = Self::new(load_config(path)?)?;
        assistant.config_watch = Some(ConfigWatch {
            path: path.to_path_buf(),
            seen: Mutex::new(seen),
        });
        Ok(assistant)
    }

    /// Re-read the watched config file if it changed since the last check.
    ///
    /// No-op for assistants built without a config file.
    pub fn refresh_settings(&self) {
        let Some(watch) = &self.config_watch else {
            return;
        };
        let current = file_stamp(&watch.path);
        let mut seen = watch.seen.lock().unwrap_or_else(|e| e.into_inner());
        if *seen == current {
            return;
        }
        *seen = current;

        if let Err(e) = load_config(&watch.path).and_then(|config| self.reload_settings(config)) {
            tracing::warn!(
                path = %watch.path.display(),
                error = %format!("{:#}", e),
                "config reload failed, keeping previous settings"
            );
        }
    }

    /// Answer one question.
    ///
    /// The only error is a failed knowledge-base reload; generation
    /// problems are folded into the result.
    pub fn answer(&self, query: &Query) -> Result<AnswerResult> {
        let span = tracing::info_span!("answer", conversation_id = %query.conversation_id);
        let _enter = span.enter();

        self.refresh_settings();
        let snapshot = self.kb.refresh().context("Failed to reload knowledge base")?;
        let settings = self.settings.load_full();
        let orchestrator =
            Orchestrator::new(&snapshot.corpus, &settings.config, &settings.generators);
        Ok(orchestrator.answer(query))
    }

    /// Retrieval only, without rules or generation.
    pub fn search(&self, query: &str, lang: Option<Lang>, limit: usize) -> Result<Vec<SearchHit>> {
        self.refresh_settings();
        let snapshot = self.kb.refresh().context("Failed to reload knowledge base")?;
        let settings = self.settings.load();
        let hits = snapshot
            .corpus
            .search(&SearchParams {
                query,
                k: limit,
                lang,
                min_token_overlap: settings.config.retrieval.min_token_overlap,
            })
            .into_iter()
            .map(|c| SearchHit {
                id: c.item.id.clone(),
                title: c.item.title.clone(),
                url: c.item.url.clone(),
                similarity: c.similarity,
                excerpt: preview(&c.item.text, PREVIEW_CHARS),
            })
            .collect();
        Ok(hits)
    }

    /// Swap in new settings, rebuilding the generators from `config`.
    ///
    /// The knowledge-base location is fixed at construction and is not
    /// affected.
    pub fn reload_settings(&self, config: Config) -> Result<()> {
        let generators = Generators::from_config(&config.generation)?;
        self.replace_settings(config, generators);
        Ok(())
    }

    /// Swap in new settings with explicitly supplied generators.
    pub fn replace_settings(&self, config: Config, generators: Generators) {
        tracing::info!(?generators, "settings reloaded");
        self.settings.store(Arc::new(Settings { config, generators }));
    }

    pub fn settings(&self) -> Arc<Settings> {
        self.settings.load_full()
    }

    pub fn knowledge_base(&self) -> &KnowledgeBase {
        &self.kb
    }

    pub fn status(&self) -> Status {
        self.refresh_settings();
        let snapshot = self.kb.snapshot();
        let settings = self.settings.load();
        let retrieval = &settings.config.retrieval;
        Status {
            version: env!("CARGO_PKG_VERSION").to_string(),
            kb_size: snapshot.corpus.len(),
            kb_source: snapshot.origin.label(),
            rag: RagStatus {
                top_k: retrieval.top_k,
                min_similarity: retrieval.min_similarity,
                min_token_overlap: retrieval.min_token_overlap,
            },
            generation: GenerationStatus {
                general: settings.generators.general.as_ref().map(|g| g.name().to_string()),
                secondary: settings.generators.secondary.as_ref().map(|g| g.name().to_string()),
            },
        }
    }
}
