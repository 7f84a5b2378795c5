//! Durable storage for binding overrides.
//!
//! Only the difference from the compiled-in defaults is ever written. The
//! record is a single JSON document; a missing record means "defaults only".

use crate::controls::{LogicalControl, PhysicalBinding};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

pub const RECORD_NAME: &str = "chordlab-bindings";
pub const RECORD_VERSION: u32 = 1;

const APP_NAME: &str = "chordlab";

pub type Overrides = BTreeMap<LogicalControl, PhysicalBinding>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedBindings {
    pub version: u32,
    #[serde(default)]
    pub overrides: Overrides,
}

impl PersistedBindings {
    pub fn new(overrides: Overrides) -> Self {
        Self {
            version: RECORD_VERSION,
            overrides,
        }
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let record: PersistedBindings = serde_json::from_str(text)?;
        if record.version != RECORD_VERSION {
            return Err(Error::UnsupportedVersion {
                found: record.version,
                expected: RECORD_VERSION,
            });
        }
        Ok(record)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// A load/save pair over one opaque record.
pub trait BindingPersistence {
    /// `Ok(None)` when nothing has been stored yet.
    fn load(&self) -> Result<Option<PersistedBindings>>;
    fn save(&mut self, record: &PersistedBindings) -> Result<()>;
}

/// Stores the record as `<dir>/chordlab-bindings.json`.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            path: dir.as_ref().join(format!("{RECORD_NAME}.json")),
        }
    }

    /// `~/.config/chordlab` on Linux, the platform equivalent elsewhere.
    pub fn in_user_config_dir() -> Self {
        Self::new(user_config_dir())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

pub fn user_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

impl BindingPersistence for JsonFileStore {
    fn load(&self) -> Result<Option<PersistedBindings>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let text = fs::read_to_string(&self.path)?;
        PersistedBindings::from_json(&text).map(Some)
    }

    fn save(&mut self, record: &PersistedBindings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, record.to_json()?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

#[derive(Debug, Default)]
struct MemoryRecord {
    text: Option<String>,
    fail_writes: bool,
    writes: usize,
}

/// In-process store. Clones share the same record, so a caller can keep a
/// handle after giving one to a [`BindingStore`](crate::bindings::BindingStore).
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the store with raw record text, valid or not.
    pub fn with_text(text: &str) -> Self {
        let store = Self::default();
        store.lock().text = Some(text.to_string());
        store
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryRecord> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn text(&self) -> Option<String> {
        self.lock().text.clone()
    }

    pub fn writes(&self) -> usize {
        self.lock().writes
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.lock().fail_writes = fail;
    }

    /// The stored overrides, if the record parses.
    pub fn overrides(&self) -> Option<Overrides> {
        self.text()
            .and_then(|text| PersistedBindings::from_json(&text).ok())
            .map(|record| record.overrides)
    }
}

impl BindingPersistence for MemoryStore {
    fn load(&self) -> Result<Option<PersistedBindings>> {
        match self.text() {
            Some(text) => PersistedBindings::from_json(&text).map(Some),
            None => Ok(None),
        }
    }

    fn save(&mut self, record: &PersistedBindings) -> Result<()> {
        let text = record.to_json()?;
        let mut inner = self.lock();
        if inner.fail_writes {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "storage unavailable",
            )));
        }
        inner.text = Some(text);
        inner.writes += 1;
        Ok(())
    }
}
