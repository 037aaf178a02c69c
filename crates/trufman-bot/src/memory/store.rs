use super::BotMemory;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read {}: {source}", .path.display())]
    Read { path: PathBuf, source: io::Error },
    #[error("failed to write {}: {source}", .path.display())]
    Write { path: PathBuf, source: io::Error },
    #[error("record {key} is malformed: {source}")]
    Malformed {
        key: String,
        source: serde_json::Error,
    },
    #[error("failed to encode record {key}: {source}")]
    Encode {
        key: String,
        source: serde_json::Error,
    },
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Where seat records live between sessions.
pub trait MemoryStore: Send + Sync {
    fn load(&self, key: &str) -> Result<Option<BotMemory>, StoreError>;
    fn save(&self, key: &str, memory: &BotMemory) -> Result<(), StoreError>;
}

/// One JSON file per key under a directory.
#[derive(Debug, Clone)]
pub struct JsonDirStore {
    root: PathBuf,
}

impl JsonDirStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        let stem: String = key
            .chars()
            .map(|ch| {
                if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' {
                    ch
                } else {
                    '_'
                }
            })
            .collect();
        self.root.join(format!("{stem}.json"))
    }
}

impl MemoryStore for JsonDirStore {
    fn load(&self, key: &str) -> Result<Option<BotMemory>, StoreError> {
        let path = self.path_for(key);
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(StoreError::Read { path, source }),
        };
        BotMemory::from_json(&raw)
            .map(Some)
            .map_err(|source| StoreError::Malformed {
                key: key.to_string(),
                source,
            })
    }

    fn save(&self, key: &str, memory: &BotMemory) -> Result<(), StoreError> {
        let path = self.path_for(key);
        let json = serde_json::to_string_pretty(memory).map_err(|source| StoreError::Encode {
            key: key.to_string(),
            source,
        })?;
        fs::create_dir_all(&self.root).map_err(|source| StoreError::Write {
            path: self.root.clone(),
            source,
        })?;
        // Replaced atomically via rename.
        let staging = path.with_extension("json.tmp");
        fs::write(&staging, json).map_err(|source| StoreError::Write {
            path: staging.clone(),
            source,
        })?;
        fs::rename(&staging, &path).map_err(|source| StoreError::Write { path, source })
    }
}

/// Records kept as JSON text in a map; nothing touches the disk.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    records: Mutex<HashMap<String, String>>,
    saves: AtomicUsize,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn saves(&self) -> usize {
        self.saves.load(Ordering::Relaxed)
    }

    pub fn raw(&self, key: &str) -> Option<String> {
        self.records.lock().get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

impl MemoryStore for InMemoryStore {
    fn load(&self, key: &str) -> Result<Option<BotMemory>, StoreError> {
        let Some(raw) = self.raw(key) else {
            return Ok(None);
        };
        BotMemory::from_json(&raw)
            .map(Some)
            .map_err(|source| StoreError::Malformed {
                key: key.to_string(),
                source,
            })
    }

    fn save(&self, key: &str, memory: &BotMemory) -> Result<(), StoreError> {
        let json = memory.to_json().map_err(|source| StoreError::Encode {
            key: key.to_string(),
            source,
        })?;
        self.records.lock().insert(key.to_string(), json);
        self.saves.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}
