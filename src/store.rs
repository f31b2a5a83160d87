//! File-backed key-value state store.
//!
//! The persistence model mirrors origin-scoped local storage: string keys,
//! string values, a synchronous API, and one fixed key for the chat record.
//! Everything lives in a single JSON file. Failures never propagate out of
//! this module: a missing or malformed file reads as an empty store, and a
//! failed write leaves the in-memory state authoritative.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use thiserror::Error;

/// Fixed key the chat record (conversation + timing map) is stored under.
pub const CHAT_STATE_KEY: &str = "colloquy.chat";

/// Error type for store I/O. Internal only; callers see degraded behavior,
/// not errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("state file i/o failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("state file is not valid JSON: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Persistent string-keyed store backed by one JSON file.
#[derive(Debug)]
pub struct StateStore {
    path: PathBuf,
    entries: Mutex<HashMap<String, String>>,
}

impl StateStore {
    /// Open the store at `path`, loading whatever is already there.
    ///
    /// A missing or unreadable file yields an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match Self::read_entries(&path) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "starting with empty state store");
                HashMap::new()
            }
        };
        Self {
            path,
            entries: Mutex::new(entries),
        }
    }

    fn read_entries(path: &Path) -> Result<HashMap<String, String>, StoreError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Get the value stored under `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().unwrap().get(key).cloned()
    }

    /// Store `value` under `key` and flush to disk.
    pub fn set(&self, key: &str, value: &str) {
        let mut guard = self.entries.lock().unwrap();
        guard.insert(key.to_string(), value.to_string());
        if let Err(e) = self.flush(&guard) {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to persist state");
        }
    }

    /// Remove `key` and flush to disk.
    pub fn remove(&self, key: &str) {
        let mut guard = self.entries.lock().unwrap();
        if guard.remove(key).is_some() {
            if let Err(e) = self.flush(&guard) {
                tracing::warn!(path = %self.path.display(), error = %e, "failed to persist state");
            }
        }
    }

    /// Number of stored keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    /// Check if the store holds no keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // Write via a sibling temp file, then rename over the target.
    fn flush(&self, entries: &HashMap<String, String>) -> Result<(), StoreError> {
        let raw = serde_json::to_string_pretty(entries)?;
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, raw)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}
