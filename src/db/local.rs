// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Per-device key-value store.
//!
//! [`LocalStore`] is the source of truth for the UI and is injected into
//! whatever needs persistence. Reads never fail: a missing or corrupt blob
//! decodes to the empty default, because losing data beats a crash loop.

use crate::db::codec::{self, CodecError};
use crate::db::keys;
use crate::models::{AchievementLedger, NotificationPreference, VisitHistory};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Errors from the local store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Encoding error: {0}")]
    Codec(#[from] CodecError),

    #[error("Store lock poisoned")]
    Poisoned,
}

/// Raw string blobs keyed by name.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn put(&self, key: &str, value: &str) -> Result<(), StoreError>;
}

/// Blobs stored as one file per key in a directory.
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Open (creating if needed) a store rooted at `dir`.
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self, StoreError> {
        fs::create_dir_all(dir.as_ref())?;
        Ok(Self {
            dir: dir.as_ref().to_path_buf(),
        })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn put(&self, key: &str, value: &str) -> Result<(), StoreError> {
        // Write-then-rename so a crash mid-write never leaves a torn blob.
        let path = self.path_for(key);
        let tmp = self.dir.join(format!("{key}.json.tmp"));
        fs::write(&tmp, value)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }
}

/// In-memory blobs, for tests and ephemeral sessions.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(entries.get(key).cloned())
    }

    fn put(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Typed access to the persisted app state.
#[derive(Clone)]
pub struct LocalStore {
    kv: Arc<dyn KeyValueStore>,
}

impl LocalStore {
    pub fn new(kv: impl KeyValueStore + 'static) -> Self {
        Self { kv: Arc::new(kv) }
    }

    /// A store backed by files under `dir`.
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self, StoreError> {
        Ok(Self::new(FileStore::open(dir)?))
    }

    /// A store that lives only as long as the process.
    pub fn in_memory() -> Self {
        Self::new(MemoryStore::new())
    }

    /// Direct access to the raw blobs.
    pub fn raw(&self) -> &dyn KeyValueStore {
        self.kv.as_ref()
    }

    pub fn load_visits(&self) -> VisitHistory {
        self.load_or_default(keys::VISIT_HISTORY, codec::decode_visits)
    }

    pub fn save_visits(&self, history: &VisitHistory) -> Result<(), StoreError> {
        let payload = codec::encode_visits(history)?;
        self.kv.put(keys::VISIT_HISTORY, &payload)
    }

    pub fn load_achievements(&self) -> AchievementLedger {
        self.load_or_default(keys::ACHIEVEMENTS, codec::decode_ledger)
    }

    pub fn save_achievements(&self, ledger: &AchievementLedger) -> Result<(), StoreError> {
        let payload = codec::encode_ledger(ledger)?;
        self.kv.put(keys::ACHIEVEMENTS, &payload)
    }

    pub fn load_last_notified(&self) -> Option<String> {
        self.load_or_default(keys::LAST_NOTIFIED_REGION, |payload| {
            serde_json::from_str::<Option<String>>(payload).map_err(CodecError::from)
        })
    }

    pub fn save_last_notified(&self, region: Option<&str>) -> Result<(), StoreError> {
        let payload = serde_json::to_string(&region).map_err(CodecError::from)?;
        self.kv.put(keys::LAST_NOTIFIED_REGION, &payload)
    }

    /// Stored preference, if the user ever changed it.
    pub fn load_preference(&self) -> Option<NotificationPreference> {
        self.load_or_default(keys::NOTIFICATION_PREFERENCE, |payload| {
            serde_json::from_str::<Option<NotificationPreference>>(payload)
                .map_err(CodecError::from)
        })
    }

    pub fn save_preference(&self, preference: NotificationPreference) -> Result<(), StoreError> {
        let payload = serde_json::to_string(&preference).map_err(CodecError::from)?;
        self.kv.put(keys::NOTIFICATION_PREFERENCE, &payload)
    }

    fn load_or_default<T: Default>(
        &self,
        key: &str,
        decode: impl Fn(&str) -> Result<T, CodecError>,
    ) -> T {
        let payload = match self.kv.get(key) {
            Ok(Some(payload)) => payload,
            Ok(None) => return T::default(),
            Err(e) => {
                tracing::warn!(key, error = %e, "Failed to read stored blob, using defaults");
                return T::default();
            }
        };

        match decode(&payload) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(key, error = %e, "Corrupt stored blob, using defaults");
                T::default()
            }
        }
    }
}
