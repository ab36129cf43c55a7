//! Host-owned reminder store.
//!
//! A single [`HostStore`] instance is constructed at startup from a
//! [`StoreBackend`] and flushed after every mutation. Backend faults are
//! soft: they are logged and the in-memory record stays authoritative.

use super::model::Reminder;
use anyhow::{Context, Result};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Persisted layout of the store file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreRecord {
    #[serde(default)]
    pub reminders: Vec<Reminder>,
    #[serde(default, alias = "bgEnabled")]
    pub background_presence_enabled: bool,
}

/// Key-value style persistence for the store record
pub trait StoreBackend: Send + Sync {
    /// `Ok(None)` when nothing has been persisted yet
    fn load(&self) -> Result<Option<StoreRecord>>;
    fn save(&self, record: &StoreRecord) -> Result<()>;
}

/// JSON file backend with atomic replace on save
pub struct JsonFileBackend {
    path: PathBuf,
}

impl JsonFileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        JsonFileBackend { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StoreBackend for JsonFileBackend {
    fn load(&self) -> Result<Option<StoreRecord>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let raw = std::fs::read_to_string(&self.path)
            .with_context(|| format!("reading {}", self.path.display()))?;
        if raw.trim().is_empty() {
            return Ok(None);
        }
        let record = serde_json::from_str(&raw)
            .with_context(|| format!("parsing {}", self.path.display()))?;
        Ok(Some(record))
    }

    fn save(&self, record: &StoreRecord) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(record)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json).with_context(|| format!("writing {}", tmp.display()))?;
        std::fs::rename(&tmp, &self.path)
            .with_context(|| format!("replacing {}", self.path.display()))?;
        Ok(())
    }
}

/// In-memory backend for tests and ephemeral hosts
#[derive(Clone, Default)]
pub struct MemoryBackend {
    record: Arc<Mutex<Option<StoreRecord>>>,
    fail_writes: Arc<AtomicBool>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_record(record: StoreRecord) -> Self {
        let backend = Self::default();
        if let Ok(mut slot) = backend.record.lock() {
            *slot = Some(record);
        }
        backend
    }

    /// Make every subsequent save fail
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Last successfully saved record
    pub fn saved(&self) -> Option<StoreRecord> {
        self.record.lock().ok().and_then(|r| r.clone())
    }
}

impl StoreBackend for MemoryBackend {
    fn load(&self) -> Result<Option<StoreRecord>> {
        Ok(self.saved())
    }

    fn save(&self, record: &StoreRecord) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            anyhow::bail!("simulated write failure");
        }
        let mut slot = self
            .record
            .lock()
            .map_err(|_| anyhow::anyhow!("memory backend poisoned"))?;
        *slot = Some(record.clone());
        Ok(())
    }
}

/// The host's single in-memory store plus its backend
pub struct HostStore {
    record: StoreRecord,
    backend: Box<dyn StoreBackend>,
}

impl HostStore {
    /// Load the persisted record; missing or corrupt storage yields an empty store
    pub fn load(backend: Box<dyn StoreBackend>) -> Self {
        let record = match backend.load() {
            Ok(Some(record)) => {
                debug!("Loaded {} persisted reminders", record.reminders.len());
                record
            }
            Ok(None) => StoreRecord::default(),
            Err(e) => {
                warn!("Failed loading reminder store, starting empty: {:#}", e);
                StoreRecord::default()
            }
        };
        HostStore { record, backend }
    }

    pub fn reminders(&self) -> &[Reminder] {
        &self.record.reminders
    }

    pub fn find(&self, id: &str) -> Option<&Reminder> {
        self.record.reminders.iter().find(|r| r.id == id)
    }

    pub fn replace_reminders(&mut self, reminders: Vec<Reminder>) {
        self.record.reminders = reminders;
    }

    /// Set `fired` on a reminder; returns false when the id is unknown
    pub fn mark_fired(&mut self, id: &str) -> bool {
        match self.record.reminders.iter_mut().find(|r| r.id == id) {
            Some(r) => {
                r.fired = true;
                true
            }
            None => false,
        }
    }

    pub fn background_presence_enabled(&self) -> bool {
        self.record.background_presence_enabled
    }

    pub fn set_background_presence_enabled(&mut self, enabled: bool) {
        self.record.background_presence_enabled = enabled;
    }

    /// Persist the current record; failures are logged and reported as `false`
    pub fn flush(&self) -> bool {
        match self.backend.save(&self.record) {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed saving reminder store: {:#}", e);
                false
            }
        }
    }
}
