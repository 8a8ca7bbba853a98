//! Key/value storage capability
//!
//! The collector never touches global browser state directly. Identity and
//! attribution persistence go through [`KeyValueStore`], injected at
//! construction:
//! - durable store: visitor id, session id (with TTL), content cache
//! - tab-scoped store: saved attribution set, lives as long as the tracking
//!   context
//!
//! Entries written with a TTL expire against the injected [`Clock`].

use crate::config::{StorageBackend, StorageConfig};
use crate::error::{StorageError, StorageResult};
use ma_common::Clock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, warn};

/// Minimal storage surface shared by every backend
pub trait KeyValueStore: Send + Sync {
    /// Current value, `None` when absent or expired
    fn get(&self, key: &str) -> StorageResult<Option<String>>;

    /// Write (overwriting), expiring after `ttl` when given
    fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> StorageResult<()>;

    fn remove(&self, key: &str) -> StorageResult<()>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct StoredEntry {
    value: String,
    /// Epoch milliseconds; `None` never expires
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expires_at_ms: Option<i64>,
}

impl StoredEntry {
    fn new(value: &str, ttl: Option<Duration>, now_ms: i64) -> Self {
        Self {
            value: value.to_string(),
            expires_at_ms: ttl.map(|ttl| now_ms.saturating_add(ttl.as_millis() as i64)),
        }
    }

    fn is_expired(&self, now_ms: i64) -> bool {
        matches!(self.expires_at_ms, Some(at) if at <= now_ms)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> StorageResult<MutexGuard<'_, T>> {
    mutex
        .lock()
        .map_err(|_| StorageError::Unavailable("storage lock poisoned".to_string()))
}

/// In-memory store (tab-scoped semantics)
pub struct MemoryStore {
    entries: Mutex<HashMap<String, StoredEntry>>,
    clock: Arc<dyn Clock>,
}

impl MemoryStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            clock,
        }
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let now = self.clock.now_millis();
        let mut entries = lock(&self.entries)?;
        match entries.get(key) {
            Some(entry) if entry.is_expired(now) => {
                entries.remove(key);
                Ok(None)
            }
            Some(entry) => Ok(Some(entry.value.clone())),
            None => Ok(None),
        }
    }

    fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> StorageResult<()> {
        let entry = StoredEntry::new(value, ttl, self.clock.now_millis());
        lock(&self.entries)?.insert(key.to_string(), entry);
        Ok(())
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        lock(&self.entries)?.remove(key);
        Ok(())
    }
}

/// Durable store persisted as a JSON file
///
/// The whole map is held in memory and written through on every change.
/// Writes go to a sibling temp file which is then renamed over the target.
pub struct FileStore {
    path: PathBuf,
    entries: Mutex<HashMap<String, StoredEntry>>,
    clock: Arc<dyn Clock>,
}

impl FileStore {
    /// Open (or lazily create) the store at `path`
    ///
    /// An unreadable or corrupt file is logged and replaced by an empty map.
    pub fn open(path: impl Into<PathBuf>, clock: Arc<dyn Clock>) -> StorageResult<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let entries = match std::fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(entries) => entries,
                Err(e) => {
                    warn!("Discarding corrupt store {}: {}", path.display(), e);
                    HashMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            path,
            entries: Mutex::new(entries),
            clock,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, entries: &HashMap<String, StoredEntry>) -> StorageResult<()> {
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, serde_json::to_vec(entries)?)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let now = self.clock.now_millis();
        let mut entries = lock(&self.entries)?;
        match entries.get(key) {
            Some(entry) if entry.is_expired(now) => {
                entries.remove(key);
                self.persist(&entries)?;
                Ok(None)
            }
            Some(entry) => Ok(Some(entry.value.clone())),
            None => Ok(None),
        }
    }

    fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> StorageResult<()> {
        let entry = StoredEntry::new(value, ttl, self.clock.now_millis());
        let mut entries = lock(&self.entries)?;
        entries.insert(key.to_string(), entry);
        self.persist(&entries)
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        let mut entries = lock(&self.entries)?;
        if entries.remove(key).is_some() {
            self.persist(&entries)?;
        }
        Ok(())
    }
}

/// Store whose every access fails (storage blocked or disabled)
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableStore;

impl KeyValueStore for UnavailableStore {
    fn get(&self, _key: &str) -> StorageResult<Option<String>> {
        Err(StorageError::Unavailable("storage disabled".to_string()))
    }

    fn set(&self, _key: &str, _value: &str, _ttl: Option<Duration>) -> StorageResult<()> {
        Err(StorageError::Unavailable("storage disabled".to_string()))
    }

    fn remove(&self, _key: &str) -> StorageResult<()> {
        Err(StorageError::Unavailable("storage disabled".to_string()))
    }
}

/// Default location of the durable store file
pub fn default_store_path() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join("ma").join("tracker-store.json"))
}

/// Build the durable store selected by configuration
///
/// A file store that cannot be opened degrades to [`UnavailableStore`]:
/// identities are then regenerated per page view.
pub fn build_durable_store(
    config: &StorageConfig,
    clock: Arc<dyn Clock>,
) -> Arc<dyn KeyValueStore> {
    match config.backend {
        StorageBackend::Memory => Arc::new(MemoryStore::new(clock)),
        StorageBackend::Disabled => {
            debug!("Durable storage disabled by configuration");
            Arc::new(UnavailableStore)
        }
        StorageBackend::File => {
            let Some(path) = config.path.clone().or_else(default_store_path) else {
                warn!("No location for durable store, storage unavailable");
                return Arc::new(UnavailableStore);
            };
            match FileStore::open(&path, clock) {
                Ok(store) => Arc::new(store),
                Err(e) => {
                    warn!(
                        "Cannot open durable store {}: {} (storage unavailable)",
                        path.display(),
                        e
                    );
                    Arc::new(UnavailableStore)
                }
            }
        }
    }
}

/// Build the tab-scoped store
///
/// Always in memory; with the `disabled` backend it is blocked as well.
pub fn build_tab_store(config: &StorageConfig, clock: Arc<dyn Clock>) -> Arc<dyn KeyValueStore> {
    match config.backend {
        StorageBackend::Disabled => Arc::new(UnavailableStore),
        _ => Arc::new(MemoryStore::new(clock)),
    }
}
