use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Local, SecondsFormat, Utc};
use itertools::Itertools;
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::app_dirs::AppDirs;
use crate::error::{RaceError, Result};

/// Reserved key holding the keystroke frames of the best round.
pub const BEST_FRAMES_KEY: &str = "bestFrames";

/// Rounds shorter than this are kept in the log but never ranked.
pub const MIN_ELIGIBLE_SECONDS: f64 = 60.0;

pub const DEFAULT_TOP_N: usize = 10;

/// One finished round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultEntry {
    pub wpm: u64,
    pub cps: u64,
    pub cpm: u64,
    pub chars: usize,
    pub passed_seconds: f64,
    pub passed_ms: u64,
}

impl ResultEntry {
    pub fn is_eligible(&self) -> bool {
        self.passed_seconds >= MIN_ELIGIBLE_SECONDS
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum StoredValue {
    Entry(ResultEntry),
    Frames(Vec<u64>),
}

pub type Document = BTreeMap<String, StoredValue>;

/// Decodes a results document by key: `bestFrames` is always a list of
/// offsets and every other key a result entry.
pub fn parse_document(bytes: &[u8]) -> serde_json::Result<Document> {
    let raw: BTreeMap<String, serde_json::Value> = serde_json::from_slice(bytes)?;
    raw.into_iter()
        .map(|(key, value)| -> serde_json::Result<(String, StoredValue)> {
            let stored = if key == BEST_FRAMES_KEY {
                StoredValue::Frames(serde_json::from_value(value)?)
            } else {
                StoredValue::Entry(serde_json::from_value(value)?)
            };
            Ok((key, stored))
        })
        .collect()
}

/// Key under which a result finished at `at` is stored.
pub fn timestamp_key(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// A result together with the instant it was recorded.
#[derive(Debug, Clone, PartialEq)]
pub struct DatedResult {
    pub date: DateTime<Utc>,
    pub entry: ResultEntry,
}

impl DatedResult {
    pub fn local_date(&self) -> String {
        self.date
            .with_timezone(&Local)
            .format("%m/%d/%Y %H:%M")
            .to_string()
    }
}

/// Whole-document persistence for results.
pub trait DocumentStore: Send {
    fn load(&self) -> Result<Document>;
    fn save(&self, doc: &Document) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new() -> Result<Self> {
        AppDirs::results_path()
            .map(Self::with_path)
            .ok_or(RaceError::NoResultsDir)
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn ensure_exists(&self) -> Result<()> {
        if self.path.exists() {
            return Ok(());
        }
        info!("creating results document at {}", self.path.display());
        self.save(&Document::new())
    }
}

impl DocumentStore for JsonFileStore {
    fn load(&self) -> Result<Document> {
        self.ensure_exists()?;
        let bytes = fs::read(&self.path).map_err(|e| RaceError::io(&self.path, e))?;
        let doc = parse_document(&bytes).map_err(|e| RaceError::json(&self.path, e))?;
        debug!("loaded {} results keys from {}", doc.len(), self.path.display());
        Ok(doc)
    }

    fn save(&self, doc: &Document) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| RaceError::io(parent, e))?;
        }
        let data = serde_json::to_vec_pretty(doc).map_err(|e| RaceError::json(&self.path, e))?;
        fs::write(&self.path, data).map_err(|e| RaceError::io(&self.path, e))?;
        debug!("saved {} results keys to {}", doc.len(), self.path.display());
        Ok(())
    }
}

/// Keeps the document in memory only.
#[derive(Debug, Default)]
pub struct MemoryStore {
    doc: Mutex<Document>,
}

impl DocumentStore for MemoryStore {
    fn load(&self) -> Result<Document> {
        Ok(self
            .doc
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    fn save(&self, doc: &Document) -> Result<()> {
        *self.doc.lock().unwrap_or_else(PoisonError::into_inner) = doc.clone();
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    Cpm,
    Wpm,
    Date,
}

impl SortField {
    fn name(&self) -> &'static str {
        match self {
            SortField::Cpm => "cpm",
            SortField::Wpm => "wpm",
            SortField::Date => "date",
        }
    }
}

/// Sort order for result listings, written as `cpm`, `-wpm`, `date`, ...
/// A leading `-` means descending.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortBy {
    pub field: SortField,
    pub descending: bool,
}

impl SortBy {
    pub const BEST_FIRST: SortBy = SortBy {
        field: SortField::Cpm,
        descending: true,
    };

    pub fn describe(&self) -> String {
        let field = self.field.name();
        let order = if self.descending {
            "descending"
        } else {
            "ascending"
        };
        format!("{field} ({order})")
    }
}

impl Default for SortBy {
    fn default() -> Self {
        Self {
            field: SortField::Date,
            descending: true,
        }
    }
}

impl FromStr for SortBy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim();
        let (descending, name) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s),
        };
        let field = match name.to_ascii_lowercase().as_str() {
            "cpm" => SortField::Cpm,
            "wpm" => SortField::Wpm,
            "date" => SortField::Date,
            other => {
                return Err(format!(
                    "unknown sort key '{other}', expected one of cpm, wpm, date (prefix with - for descending)"
                ))
            }
        };
        Ok(Self { field, descending })
    }
}

impl fmt::Display for SortBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.field.name();
        if self.descending {
            write!(f, "-{name}")
        } else {
            write!(f, "{name}")
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResultsQuery {
    pub sort_by: SortBy,
    pub show_all: bool,
    pub top_n: usize,
}

impl Default for ResultsQuery {
    fn default() -> Self {
        Self {
            sort_by: SortBy::default(),
            show_all: false,
            top_n: DEFAULT_TOP_N,
        }
    }
}

/// Past rounds and the best round's frames.
pub struct ResultsRepository {
    store: Box<dyn DocumentStore>,
}

impl fmt::Debug for ResultsRepository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultsRepository").finish_non_exhaustive()
    }
}

impl ResultsRepository {
    pub fn new(store: Box<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub fn in_memory() -> Self {
        Self::new(Box::new(MemoryStore::default()))
    }

    pub fn add_entry(&self, key: &str, value: StoredValue) -> Result<()> {
        let mut doc = self.store.load()?;
        doc.insert(key.to_string(), value);
        self.store.save(&doc)
    }

    /// Stores a finished round and, when given, its frames as the new best
    /// run. Both land in a single save or not at all.
    pub fn record_round(
        &self,
        at: DateTime<Utc>,
        entry: ResultEntry,
        best_frames: Option<Vec<u64>>,
    ) -> Result<String> {
        let key = timestamp_key(at);
        let mut doc = self.store.load()?;
        doc.insert(key.clone(), StoredValue::Entry(entry));
        if let Some(frames) = best_frames {
            doc.insert(BEST_FRAMES_KEY.to_string(), StoredValue::Frames(frames));
        }
        self.store.save(&doc)?;
        Ok(key)
    }

    pub fn get_all(&self) -> Result<Document> {
        self.store.load()
    }

    pub fn clear_all(&self) -> Result<()> {
        info!("clearing all results");
        self.store.save(&Document::new())
    }

    fn eligible(&self) -> Result<Vec<DatedResult>> {
        let doc = self.store.load()?;
        Ok(doc
            .into_iter()
            .filter(|(key, _)| key.as_str() != BEST_FRAMES_KEY)
            .filter_map(|(key, value)| match value {
                StoredValue::Entry(entry) if entry.is_eligible() => {
                    let date = DateTime::parse_from_rfc3339(&key).ok()?.with_timezone(&Utc);
                    Some(DatedResult { date, entry })
                }
                _ => None,
            })
            .collect())
    }

    pub fn query(&self, query: ResultsQuery) -> Result<Vec<DatedResult>> {
        let sort_by = query.sort_by;
        let sorted = self.eligible()?.into_iter().sorted_by(|a, b| {
            let ord = match sort_by.field {
                SortField::Cpm => a.entry.cpm.cmp(&b.entry.cpm),
                SortField::Wpm => a.entry.wpm.cmp(&b.entry.wpm),
                SortField::Date => a.date.cmp(&b.date),
            };
            if sort_by.descending {
                ord.reverse()
            } else {
                ord
            }
        });

        Ok(if query.show_all {
            sorted.collect()
        } else {
            sorted.take(query.top_n).collect()
        })
    }

    pub fn best_result(&self) -> Result<Option<DatedResult>> {
        Ok(self
            .query(ResultsQuery {
                sort_by: SortBy::BEST_FIRST,
                show_all: false,
                top_n: 1,
            })?
            .into_iter()
            .next())
    }

    pub fn best_frames(&self) -> Result<Option<Vec<u64>>> {
        Ok(match self.store.load()?.remove(BEST_FRAMES_KEY) {
            Some(StoredValue::Frames(frames)) => Some(frames),
            _ => None,
        })
    }

    /// One line describing the best result, for the compact results view.
    pub fn best_result_summary(&self) -> Result<String> {
        Ok(match self.best_result()? {
            Some(best) => format!(
                "Best result: {} wpm, {} cpm, {} cps ({})",
                best.entry.wpm,
                best.entry.cpm,
                best.entry.cps,
                best.local_date()
            ),
            None => "No results recorded yet. Finish a full-minute round to set one.".to_string(),
        })
    }
}
