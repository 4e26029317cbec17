//! Mapping from document identity keys to remote page IDs.
//!
//! The engine reads and writes the mapping from worker threads, so stores
//! synchronize internally.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::StoreError;

/// Identity mapping collaborator.
pub trait IdentityStore: Send + Sync {
    /// Remote ID recorded for `key`.
    fn get(&self, key: &str) -> Option<String>;

    /// Record the remote ID of `key`.
    fn set(&self, key: &str, id: &str);

    /// Forget `key`.
    fn remove(&self, key: &str);

    /// All recorded `(key, id)` pairs, sorted by key.
    fn entries(&self) -> Vec<(String, String)>;
}

/// In-memory store.
#[derive(Debug, Default)]
pub struct MemoryIdentityStore {
    pages: RwLock<BTreeMap<String, String>>,
}

impl MemoryIdentityStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store with initial entries.
    pub fn with_entries<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            pages: RwLock::new(
                entries
                    .into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            ),
        }
    }
}

impl IdentityStore for MemoryIdentityStore {
    fn get(&self, key: &str) -> Option<String> {
        read(&self.pages).get(key).cloned()
    }

    fn set(&self, key: &str, id: &str) {
        write(&self.pages).insert(key.to_owned(), id.to_owned());
    }

    fn remove(&self, key: &str) {
        write(&self.pages).remove(key);
    }

    fn entries(&self) -> Vec<(String, String)> {
        read(&self.pages)
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

/// On-disk layout of the state file.
#[derive(Debug, Default, Serialize, Deserialize)]
struct StateFile {
    #[serde(default)]
    pages: BTreeMap<String, String>,
}

/// Store persisted as a JSON file.
///
/// ```json
/// {"pages": {"guide/intro.md": "12345"}}
/// ```
///
/// Changes are kept in memory until [`JsonIdentityStore::save`].
#[derive(Debug)]
pub struct JsonIdentityStore {
    path: PathBuf,
    inner: MemoryIdentityStore,
}

impl JsonIdentityStore {
    /// Load the store from `path`. A missing file yields an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let state = match fs::read_to_string(&path) {
            Ok(content) => {
                serde_json::from_str::<StateFile>(&content).map_err(|source| StoreError::Json {
                    path: path.clone(),
                    source,
                })?
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No state file at {}, starting empty", path.display());
                StateFile::default()
            }
            Err(source) => return Err(StoreError::Io { path, source }),
        };

        Ok(Self {
            path,
            inner: MemoryIdentityStore::with_entries(state.pages),
        })
    }

    /// Path of the state file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the mapping to disk atomically (temp file, then rename).
    pub fn save(&self) -> Result<(), StoreError> {
        let io_err = |source| StoreError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(io_err)?;
        }

        let state = StateFile {
            pages: self.inner.entries().into_iter().collect(),
        };
        let json = serde_json::to_string_pretty(&state).map_err(|source| StoreError::Json {
            path: self.path.clone(),
            source,
        })?;

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json + "\n").map_err(io_err)?;
        fs::rename(&tmp, &self.path).map_err(io_err)?;
        debug!("Saved {} page ids to {}", state.pages.len(), self.path.display());
        Ok(())
    }
}

impl IdentityStore for JsonIdentityStore {
    fn get(&self, key: &str) -> Option<String> {
        self.inner.get(key)
    }

    fn set(&self, key: &str, id: &str) {
        self.inner.set(key, id);
    }

    fn remove(&self, key: &str) {
        self.inner.remove(key);
    }

    fn entries(&self) -> Vec<(String, String)> {
        self.inner.entries()
    }
}

fn read<T>(lock: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(std::sync::PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(std::sync::PoisonError::into_inner)
}
