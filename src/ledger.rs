// src/ledger.rs
//! Dedup ledger: every (location, day, destination) triple that has ever been
//! alerted. Loaded once per cycle, appended to while registrants run, written
//! back once at the end as a whole-file replace. Entries are never removed here.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::candidate::{AlertCandidate, AppointmentDays};
use crate::registrant::{DestinationKey, Registrant};

pub const DEFAULT_LEDGER_PATH: &str = "state/ledger.json";

/// Composite dedup key. Also the persisted record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "StoredEntry")]
pub struct LedgerEntry {
    pub location_id: u64,
    /// ISO `YYYY-MM-DD` local day, or an offset date-time for slot-granular entries.
    pub day: String,
    pub destination: DestinationKey,
}

impl LedgerEntry {
    pub fn new(location_id: u64, day: NaiveDate, destination: DestinationKey) -> Self {
        Self {
            location_id,
            day: day.format("%Y-%m-%d").to_string(),
            destination,
        }
    }
}

/// Accepts every shape older versions wrote: camelCase names, `date` for the day,
/// `phone` for the destination.
#[derive(Deserialize)]
struct StoredEntry {
    #[serde(alias = "locationId")]
    location_id: u64,
    #[serde(alias = "date", alias = "localDate", alias = "dateTime")]
    day: String,
    #[serde(alias = "phone", alias = "destinationKey")]
    destination: String,
}

impl From<StoredEntry> for LedgerEntry {
    fn from(s: StoredEntry) -> Self {
        Self {
            location_id: s.location_id,
            day: normalize_day(&s.day),
            destination: DestinationKey(s.destination.trim().to_string()),
        }
    }
}

/// ISO and US `M/D/YYYY` dates map to ISO; anything else (date-times) is kept trimmed.
pub fn normalize_day(raw: &str) -> String {
    let s = raw.trim();
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return d.format("%Y-%m-%d").to_string();
    }
    if let Ok(d) = NaiveDate::parse_from_str(s, "%m/%d/%Y") {
        return d.format("%Y-%m-%d").to_string();
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.to_rfc3339();
    }
    s.to_string()
}

/// Entries a candidate would occupy: one per known day, or one for `today` when
/// no dates are known.
pub fn entries_for(candidate: &AlertCandidate, destination: &DestinationKey, today: NaiveDate) -> Vec<LedgerEntry> {
    match &candidate.days {
        AppointmentDays::Known(days) => days
            .iter()
            .map(|d| LedgerEntry::new(candidate.location_id, *d, destination.clone()))
            .collect(),
        AppointmentDays::Unknown => vec![LedgerEntry::new(candidate.location_id, today, destination.clone())],
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reservation {
    pub is_novel: bool,
    pub new_entries: Vec<LedgerEntry>,
}

#[async_trait::async_trait]
pub trait LedgerStore: Send + Sync {
    async fn load(&self) -> Result<Vec<LedgerEntry>>;
    /// Replace the stored set with `entries`.
    async fn save(&self, entries: &[LedgerEntry]) -> Result<()>;
}

/// JSON array on disk. Saves go to a sibling temp file which is then renamed over the target.
#[derive(Debug, Clone)]
pub struct JsonFileLedgerStore {
    path: PathBuf,
}

impl JsonFileLedgerStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait::async_trait]
impl LedgerStore for JsonFileLedgerStore {
    async fn load(&self) -> Result<Vec<LedgerEntry>> {
        let raw = match fs::read_to_string(&self.path).await {
            Ok(s) => s,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(target: "ledger", path = %self.path.display(), "no ledger yet, starting empty");
                return Ok(Vec::new());
            }
            Err(e) => {
                return Err(e).with_context(|| format!("read ledger {}", self.path.display()));
            }
        };
        if raw.trim().is_empty() {
            return Ok(Vec::new());
        }

        let items: Vec<serde_json::Value> =
            serde_json::from_str(&raw).with_context(|| format!("parse ledger {}", self.path.display()))?;
        let mut out = Vec::with_capacity(items.len());
        for item in items {
            match serde_json::from_value::<LedgerEntry>(item) {
                Ok(e) => out.push(e),
                Err(e) => tracing::warn!(target: "ledger", error = %e, "skipping unreadable ledger entry"),
            }
        }
        Ok(out)
    }

    async fn save(&self, entries: &[LedgerEntry]) -> Result<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .await
                .with_context(|| format!("create ledger dir {}", dir.display()))?;
        }
        let body = serde_json::to_vec_pretty(entries).context("serialize ledger")?;
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        fs::write(&tmp, body)
            .await
            .with_context(|| format!("write {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("replace ledger {}", self.path.display()))?;
        Ok(())
    }
}

#[derive(Debug, Default)]
struct LedgerState {
    entries: Vec<LedgerEntry>,
    index: HashSet<LedgerEntry>,
}

impl LedgerState {
    fn insert(&mut self, e: LedgerEntry) -> bool {
        if self.index.insert(e.clone()) {
            self.entries.push(e);
            true
        } else {
            false
        }
    }
}

/// Shared by all registrant pipelines of a cycle. The read-check-append sequence
/// runs under one lock.
#[derive(Debug, Default)]
pub struct DedupLedger {
    state: Mutex<LedgerState>,
}

impl DedupLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Duplicates in `entries` collapse; first occurrence keeps its position.
    pub fn from_entries(entries: impl IntoIterator<Item = LedgerEntry>) -> Self {
        let mut state = LedgerState::default();
        for e in entries {
            state.insert(e);
        }
        Self {
            state: Mutex::new(state),
        }
    }

    /// Read failures start an empty ledger: a possible repeat alert beats a silent miss.
    pub async fn load(store: &dyn LedgerStore) -> Self {
        match store.load().await {
            Ok(entries) => {
                let ledger = Self::from_entries(entries);
                tracing::info!(target: "ledger", entries = ledger.len(), "ledger loaded");
                ledger
            }
            Err(e) => {
                tracing::warn!(target: "ledger", error = %format!("{e:#}"), "ledger unreadable, starting empty");
                Self::new()
            }
        }
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, entry: &LedgerEntry) -> bool {
        self.state.lock().index.contains(entry)
    }

    pub fn snapshot(&self) -> Vec<LedgerEntry> {
        self.state.lock().entries.clone()
    }

    /// Reserve the candidate's entries for this registrant. Novel when at least one
    /// entry was not already present; only the missing ones are appended.
    pub fn check_and_reserve(&self, candidate: &AlertCandidate, registrant: &Registrant, today: NaiveDate) -> Reservation {
        let key = registrant.destination.key();
        let wanted = entries_for(candidate, &key, today);

        let mut state = self.state.lock();
        let new_entries: Vec<LedgerEntry> = wanted.into_iter().filter(|e| state.insert(e.clone())).collect();

        Reservation {
            is_novel: !new_entries.is_empty(),
            new_entries,
        }
    }

    /// Persist the full accumulated set. Call once per cycle after every registrant finished.
    pub async fn flush(&self, store: &dyn LedgerStore) -> Result<()> {
        let entries = self.snapshot();
        store.save(&entries).await?;
        metrics::gauge!("hunter_ledger_entries").set(entries.len() as f64);
        tracing::info!(target: "ledger", entries = entries.len(), "ledger flushed");
        Ok(())
    }
}
