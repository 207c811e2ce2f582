use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use autocritic_critic::ActionCode;
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::record::{ActionCount, CritiqueRecord, LedgerStats, RecordFilter};

/// Default ledger file name, relative to the working directory
pub const DEFAULT_LEDGER_FILE: &str = "reflection.json";

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Ledger I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to serialize ledger: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Malformed ledger: {0}")]
    Malformed(String),
}

/// The whole ledger document. Unknown top-level keys are carried through
/// rewrites untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LedgerDocument {
    #[serde(default)]
    pub reflection_data: Vec<CritiqueRecord>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Append-only store of critique records, kept as a single JSON document.
///
/// Every append reads the whole document, pushes one record and writes the
/// whole document back. The read-modify-write runs under an in-process mutex
/// and an exclusive lock on a sidecar `.lock` file, and the new document
/// replaces the old one by rename.
pub struct LedgerStore {
    path: PathBuf,
    guard: Mutex<()>,
}

impl LedgerStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            guard: Mutex::new(()),
        }
    }

    /// Open the store at `path`, creating an empty document if absent.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, LedgerError> {
        let store = Self::new(path);
        store.init()?;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create an empty document if none exists yet.
    pub fn init(&self) -> Result<(), LedgerError> {
        self.with_lock(|| {
            if !self.path.exists() {
                debug!(path = %self.path.display(), "Initializing empty ledger");
                self.write_document(&LedgerDocument::default())?;
            }
            Ok(())
        })
    }

    /// Read the whole document. A missing file reads as empty.
    pub fn load(&self) -> Result<LedgerDocument, LedgerError> {
        if !self.path.exists() {
            return Ok(LedgerDocument::default());
        }
        let content = fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(LedgerDocument::default());
        }
        serde_json::from_str(&content)
            .map_err(|e| LedgerError::Malformed(format!("{}: {}", self.path.display(), e)))
    }

    /// Append one record. Returns the number of records now stored.
    pub fn append(&self, record: &CritiqueRecord) -> Result<usize, LedgerError> {
        self.with_lock(|| {
            let mut document = self.load()?;
            document.reflection_data.push(record.clone());
            self.write_document(&document)?;
            debug!(
                path = %self.path.display(),
                records = document.reflection_data.len(),
                "Appended critique record"
            );
            Ok(document.reflection_data.len())
        })
    }

    /// Records matching the filter, in insertion order.
    pub fn list(&self, filter: &RecordFilter) -> Result<Vec<CritiqueRecord>, LedgerError> {
        Ok(self
            .load()?
            .reflection_data
            .into_iter()
            .filter(|r| filter.matches(r))
            .collect())
    }

    /// Compute aggregate statistics over every record.
    pub fn stats(&self) -> Result<LedgerStats, LedgerError> {
        let records = self.load()?.reflection_data;
        let total_records = records.len();
        if total_records == 0 {
            return Ok(LedgerStats::default());
        }

        let mut stats = LedgerStats {
            total_records,
            ..Default::default()
        };
        let mut time_total = 0.0;
        let mut per_action: BTreeMap<ActionCode, usize> = BTreeMap::new();

        for record in &records {
            match record.outcome() {
                crate::RecordOutcome::Changed => stats.changed += 1,
                crate::RecordOutcome::Unchanged => stats.unchanged += 1,
                crate::RecordOutcome::Unrecoverable => stats.unrecoverable += 1,
            }
            if record.was_repaired() {
                stats.repaired += 1;
            }
            stats.total_calls += u64::from(record.llm_use);
            stats.prompt_tokens += record.llm_cost.prompt_token;
            stats.completion_tokens += record.llm_cost.completion_tokens;
            stats.total_cost_usd += record.llm_cost.cost_usd;
            time_total += record.time_cost;
            if let Some(action) = record.reflection_action {
                *per_action.entry(action).or_insert(0) += 1;
            }
        }

        stats.avg_time_cost_secs = time_total / total_records as f64;
        stats.by_action = per_action
            .into_iter()
            .map(|(action, count)| ActionCount { action, count })
            .collect();
        stats.by_action.sort_by(|a, b| b.count.cmp(&a.count));

        Ok(stats)
    }

    fn with_lock<T>(
        &self,
        f: impl FnOnce() -> Result<T, LedgerError>,
    ) -> Result<T, LedgerError> {
        let _guard = self.guard.lock().unwrap_or_else(|p| p.into_inner());

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let lock_file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(self.sidecar("lock"))?;
        lock_file.lock_exclusive()?;

        let result = f();
        let unlock = lock_file.unlock();
        let value = result?;
        unlock?;
        Ok(value)
    }

    fn write_document(&self, document: &LedgerDocument) -> Result<(), LedgerError> {
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
        document.serialize(&mut ser)?;

        let tmp_path = self.sidecar("tmp");
        {
            let mut tmp = File::create(&tmp_path)?;
            tmp.write_all(&buf)?;
            tmp.sync_all()?;
        }
        if let Err(err) = fs::rename(&tmp_path, &self.path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(err.into());
        }
        Ok(())
    }

    fn sidecar(&self, suffix: &str) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| DEFAULT_LEDGER_FILE.into());
        name.push(".");
        name.push(suffix);
        self.path.with_file_name(name)
    }
}
