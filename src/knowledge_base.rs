//! Knowledge-base loading and hot reload.
//!
//! The knowledge base is a JSONL file, one record per line:
//!
//! ```json
//! {"id":"fees-en","title":"Tuition Fees","url":"https://…","type":"faq","text":"Q: …\nA: …"}
//! ```
//!
//! # Source Selection
//!
//! Inside `knowledge.data_dir`, the first existing file wins:
//!
//! 1. `knowledge.kb_filename` (explicit override)
//! 2. `kb_backup.jsonl`
//! 3. `kb.jsonl`
//!
//! With none present, a small built-in seed set is used.
//!
//! # Integrity
//!
//! Blank lines are skipped and records with blank `text` are dropped, but a
//! line that is not a JSON object aborts the load with [`KbError::Malformed`]
//! or [`KbError::NotAnObject`]. A record without an id gets `line-{n}`
//! from its line number. Duplicate ids keep the position of their first
//! occurrence and the content of their last, and each load that replaces
//! records logs a warning with the count.
//!
//! # Reload
//!
//! [`KnowledgeBase::refresh`] is called at the start of every request. It
//! re-resolves the source and compares its modification time and length with
//! the loaded snapshot; on change it builds a fresh [`Corpus`] and swaps the
//! whole [`KbSnapshot`] in a single atomic store. Readers holding the old
//! snapshot keep a consistent item list and index until they drop it.

use arc_swap::ArcSwap;
use campus_assist_core::index::Corpus;
use campus_assist_core::models::KnowledgeItem;
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::SystemTime;
use thiserror::Error;

use crate::config::KnowledgeConfig;

const DEFAULT_FILENAMES: [&str; 2] = ["kb_backup.jsonl", "kb.jsonl"];

/// Failure to load a persisted knowledge base.
#[derive(Debug, Error)]
pub enum KbError {
    #[error("failed to read knowledge base {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed knowledge-base record at {path}:{line}: {source}")]
    Malformed {
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },
    #[error("knowledge-base record at {path}:{line} is not a JSON object")]
    NotAnObject { path: PathBuf, line: usize },
}

/// Where the loaded items came from.
#[derive(Debug, Clone, PartialEq)]
pub enum KbOrigin {
    File {
        path: PathBuf,
        modified: Option<SystemTime>,
        len: u64,
    },
    Seed,
}

impl KbOrigin {
    /// Short human-readable label.
    pub fn label(&self) -> String {
        match self {
            KbOrigin::File { path, .. } => path.display().to_string(),
            KbOrigin::Seed => "built-in seed".to_string(),
        }
    }
}

/// A loaded collection and its index, replaced as one unit.
#[derive(Debug)]
pub struct KbSnapshot {
    pub origin: KbOrigin,
    pub corpus: Corpus,
}

/// The live knowledge base shared across requests.
pub struct KnowledgeBase {
    config: KnowledgeConfig,
    current: ArcSwap<KbSnapshot>,
    reload: Mutex<()>,
}

impl KnowledgeBase {
    /// Resolve and load the knowledge base. Malformed data is fatal.
    pub fn open(config: &KnowledgeConfig) -> Result<Self, KbError> {
        let snapshot = load_snapshot(config)?;
        tracing::info!(
            items = snapshot.corpus.len(),
            source = %snapshot.origin.label(),
            "knowledge base loaded"
        );
        Ok(Self {
            config: config.clone(),
            current: ArcSwap::from_pointee(snapshot),
            reload: Mutex::new(()),
        })
    }

    /// The snapshot currently served.
    pub fn snapshot(&self) -> Arc<KbSnapshot> {
        self.current.load_full()
    }

    /// Reload if the backing file changed, then return the current snapshot.
    ///
    /// On a load error the previous snapshot stays in place.
    pub fn refresh(&self) -> Result<Arc<KbSnapshot>, KbError> {
        let current = self.current.load_full();
        if resolve_origin(&self.config) == current.origin {
            return Ok(current);
        }

        let _guard = self.reload.lock().unwrap_or_else(|e| e.into_inner());
        // Another request may have reloaded while we waited.
        let current = self.current.load_full();
        let origin = resolve_origin(&self.config);
        if origin == current.origin {
            return Ok(current);
        }

        let snapshot = Arc::new(load_snapshot(&self.config)?);
        tracing::info!(
            items = snapshot.corpus.len(),
            previous = current.corpus.len(),
            source = %snapshot.origin.label(),
            "knowledge base reloaded"
        );
        self.current.store(snapshot.clone());
        Ok(snapshot)
    }
}

/// First existing candidate file inside `data_dir`.
pub fn resolve_kb_path(config: &KnowledgeConfig) -> Option<PathBuf> {
    let explicit = config
        .kb_filename
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty());
    explicit
        .into_iter()
        .chain(DEFAULT_FILENAMES)
        .map(|name| config.data_dir.join(name))
        .find(|p| p.is_file())
}

fn resolve_origin(config: &KnowledgeConfig) -> KbOrigin {
    match resolve_kb_path(config) {
        Some(path) => file_origin(path),
        None => KbOrigin::Seed,
    }
}

fn file_origin(path: PathBuf) -> KbOrigin {
    let meta = std::fs::metadata(&path).ok();
    KbOrigin::File {
        modified: meta.as_ref().and_then(|m| m.modified().ok()),
        len: meta.as_ref().map(|m| m.len()).unwrap_or(0),
        path,
    }
}

fn load_snapshot(config: &KnowledgeConfig) -> Result<KbSnapshot, KbError> {
    match resolve_kb_path(config) {
        Some(path) => {
            // Stat before reading so a write racing the read triggers
            // another reload on the next request.
            let origin = file_origin(path.clone());
            let items = load_file(&path)?;
            Ok(KbSnapshot {
                origin,
                corpus: Corpus::new(items),
            })
        }
        None => Ok(KbSnapshot {
            origin: KbOrigin::Seed,
            corpus: Corpus::new(seed_items()),
        }),
    }
}

/// Read and parse a JSONL knowledge-base file.
pub fn load_file(path: &Path) -> Result<Vec<KnowledgeItem>, KbError> {
    let content = std::fs::read_to_string(path).map_err(|source| KbError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_jsonl(&content, path)
}

/// Parse JSONL content. `path` is only used in error messages.
pub fn parse_jsonl(content: &str, path: &Path) -> Result<Vec<KnowledgeItem>, KbError> {
    let mut items: Vec<KnowledgeItem> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut overwritten = 0usize;

    for (i, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let value: Value = serde_json::from_str(line).map_err(|source| KbError::Malformed {
            path: path.to_path_buf(),
            line: i + 1,
            source,
        })?;
        let obj = value.as_object().ok_or_else(|| KbError::NotAnObject {
            path: path.to_path_buf(),
            line: i + 1,
        })?;

        let id = field(obj, "id")
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| format!("line-{}", i + 1));
        let item = KnowledgeItem {
            id,
            title: field(obj, "title").unwrap_or_else(|| "Source".to_string()),
            url: field(obj, "url").unwrap_or_default(),
            kind: field(obj, "type").unwrap_or_else(|| "official".to_string()),
            text: field(obj, "text").unwrap_or_default(),
        };
        if item.text.trim().is_empty() {
            continue;
        }

        match positions.get(&item.id) {
            Some(&pos) => {
                overwritten += 1;
                items[pos] = item;
            }
            None => {
                positions.insert(item.id.clone(), items.len());
                items.push(item);
            }
        }
    }

    if overwritten > 0 {
        tracing::warn!(
            path = %path.display(),
            overwritten,
            "duplicate knowledge-base ids, later records replaced earlier ones"
        );
    }

    Ok(items)
}

/// String value of a field; numbers and booleans are stringified, and
/// null or empty strings count as absent.
fn field(obj: &serde_json::Map<String, Value>, key: &str) -> Option<String> {
    match obj.get(key)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Minimal built-in knowledge base so the assistant works without data.
pub fn seed_items() -> Vec<KnowledgeItem> {
    vec![
        KnowledgeItem::new(
            "calendar-2024-2025-en",
            "Academic Calendar (Sample)",
            "https://university.example.edu/calendar",
            "official",
            "Academic year 2024-2025: Semester 1 starts on 2024-09-09. Winter break: 2024-12-21 to 2025-01-05. S1 exams: 2025-01-13 to 2025-01-24.",
        ),
        KnowledgeItem::new(
            "calendar-2024-2025-ar",
            "التقويم الأكاديمي (مثال)",
            "https://university.example.edu/calendar-ar",
            "official",
            "السنة الجامعية 2024-2025: بداية الفصل الأول 09-09-2024. عطلة الشتاء: 21-12-2024 إلى 05-01-2025. امتحانات الفصل الأول: 13-01-2025 إلى 24-01-2025.",
        ),
        KnowledgeItem::new(
            "admissions-en",
            "Admissions & Registration (Sample)",
            "https://university.example.edu/admissions",
            "policy",
            "Registration process: online pre-registration, then submit documents (ID copy, transcripts, photos). Office hours: Mon-Fri 09:00-12:00 and 14:00-16:00.",
        ),
        KnowledgeItem::new(
            "admissions-ar",
            "القبول والتسجيل (مثال)",
            "https://university.example.edu/admissions-ar",
            "policy",
            "مسطرة التسجيل: تسجيل أولي عبر الإنترنت ثم إيداع الملف (نسخة بطاقة التعريف، بيانات النقط، صور). أوقات العمل: الإثنين-الجمعة 09:00-12:00 و 14:00-16:00.",
        ),
    ]
}
