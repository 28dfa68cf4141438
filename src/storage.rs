use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::{PoisonError, RwLock};

use dashmap::DashMap;
use tracing::warn;

/// Storage keys, all namespaced so a shared store can host other state.
pub mod keys {
    pub const ACCESS_TOKEN: &str = "hrm.access_token";
    pub const REFRESH_TOKEN: &str = "hrm.refresh_token";
    pub const TOKEN_EXPIRES_AT: &str = "hrm.token_expires_at";
    pub const SESSION: &str = "hrm.session";
}

/// Durable key-value storage for client state. Writes are best-effort: a
/// failed persist is logged, never surfaced, matching how browser storage
/// behaves for the original front-end.
pub trait KeyValueStorage: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
    fn remove(&self, key: &str);
    fn clear(&self);
}

/// Ephemeral backend for tests and hosts that do not want persistence.
#[derive(Default)]
pub struct MemoryStorage {
    entries: DashMap<String, String>,
}

impl KeyValueStorage for MemoryStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).map(|entry| entry.clone())
    }

    fn set(&self, key: &str, value: &str) {
        self.entries.insert(key.to_string(), value.to_string());
    }

    fn remove(&self, key: &str) {
        self.entries.remove(key);
    }

    fn clear(&self) {
        self.entries.clear();
    }
}

/// File-backed store: one JSON document holding every entry, rewritten on
/// each mutation via a temp-file rename. Survives process restarts.
pub struct FileStorage {
    path: PathBuf,
    entries: RwLock<HashMap<String, String>>,
}

impl FileStorage {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str::<HashMap<String, String>>(&raw) {
                Ok(entries) => entries,
                Err(err) => {
                    // Corrupt state file: start empty and drop the file so we
                    // never rehydrate garbage on the next open.
                    warn!(path = %path.display(), ?err, "discarding corrupt client state file");
                    let _ = fs::remove_file(&path);
                    HashMap::new()
                }
            },
            Err(_) => HashMap::new(),
        };

        Self {
            path,
            entries: RwLock::new(entries),
        }
    }

    fn persist(&self, entries: &HashMap<String, String>) {
        let serialized = match serde_json::to_string(entries) {
            Ok(serialized) => serialized,
            Err(err) => {
                warn!(?err, "failed to serialize client state");
                return;
            }
        };

        let tmp = self.path.with_extension("tmp");
        if let Err(err) = fs::write(&tmp, serialized).and_then(|()| fs::rename(&tmp, &self.path)) {
            warn!(path = %self.path.display(), ?err, "failed to persist client state");
        }
    }
}

impl KeyValueStorage for FileStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn set(&self, key: &str, value: &str) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key.to_string(), value.to_string());
        self.persist(&entries);
    }

    fn remove(&self, key: &str) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if entries.remove(key).is_some() {
            self.persist(&entries);
        }
    }

    fn clear(&self) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.clear();
        self.persist(&entries);
    }
}
