//! Extension key-value storage.
//!
//! Keys are namespaced the way the extension addresses them
//! (`local:mainTabGroupId`). Values are JSON.

use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, trace};

use crate::common::collections::BTreeMap;

const CHANGE_CAPACITY: usize = 64;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("invalid storage key `{0}`, expected an area prefix such as `local:`")]
    InvalidKey(String),

    #[error("value stored under `{key}` has the wrong shape")]
    Decode {
        key: StorageKey,
        #[source]
        source: serde_json::Error,
    },

    #[error("storage file {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("storage file {path} is not a JSON object")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, strum::Display, strum::EnumString,
)]
#[strum(serialize_all = "lowercase")]
pub enum StorageArea {
    Local,
    Session,
    Sync,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StorageKey {
    area: StorageArea,
    name: String,
}

impl StorageKey {
    pub fn local(name: impl Into<String>) -> Self {
        StorageKey { area: StorageArea::Local, name: name.into() }
    }

    pub fn parse(raw: &str) -> Result<Self, StorageError> {
        let invalid = || StorageError::InvalidKey(raw.to_string());
        let (area, name) = raw.split_once(':').ok_or_else(invalid)?;
        let area = area.parse::<StorageArea>().map_err(|_| invalid())?;
        if name.is_empty() {
            return Err(invalid());
        }
        Ok(StorageKey { area, name: name.to_string() })
    }

    pub fn area(&self) -> StorageArea { self.area }

    pub fn name(&self) -> &str { &self.name }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.area, self.name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StorageChange {
    pub key: StorageKey,
    pub old_value: Option<Value>,
    pub new_value: Option<Value>,
}

#[allow(async_fn_in_trait)]
pub trait KeyValueStore {
    async fn get(&self, key: &StorageKey) -> Result<Option<Value>, StorageError>;

    async fn set(&self, key: &StorageKey, value: Value) -> Result<(), StorageError>;

    async fn remove(&self, key: &StorageKey) -> Result<(), StorageError>;

    /// Replaces the value under `key` with `new` (removing it when `None`)
    /// only if the stored value still equals `current`. A missing key
    /// compares equal to `null`. Returns whether the write happened.
    async fn compare_and_swap(
        &self,
        key: &StorageKey,
        current: &Value,
        new: Option<Value>,
    ) -> Result<bool, StorageError>;

    /// Subscribes to every change made through this store from now on.
    fn watch(&self) -> broadcast::Receiver<StorageChange>;
}

/// Typed access to one key, with the value returned while nothing usable is
/// stored.
#[derive(Debug, Clone)]
pub struct StorageItem<T> {
    key: StorageKey,
    fallback: T,
}

impl<T> StorageItem<T>
where T: Serialize + DeserializeOwned + Clone
{
    pub fn new(key: StorageKey, fallback: T) -> Self {
        StorageItem { key, fallback }
    }

    pub fn key(&self) -> &StorageKey { &self.key }

    pub async fn get_value(&self, store: &impl KeyValueStore) -> Result<T, StorageError> {
        match store.get(&self.key).await? {
            None | Some(Value::Null) => Ok(self.fallback.clone()),
            Some(value) => serde_json::from_value(value)
                .map_err(|source| StorageError::Decode { key: self.key.clone(), source }),
        }
    }

    pub async fn set_value(
        &self,
        store: &impl KeyValueStore,
        value: &T,
    ) -> Result<(), StorageError> {
        store.set(&self.key, self.encode(value)?).await
    }

    pub async fn remove_value(&self, store: &impl KeyValueStore) -> Result<(), StorageError> {
        store.remove(&self.key).await
    }

    /// Writes `new` only if the stored value still encodes to `current`.
    pub async fn replace(
        &self,
        store: &impl KeyValueStore,
        current: &T,
        new: &T,
    ) -> Result<bool, StorageError> {
        let current = self.encode(current)?;
        let new = self.encode(new)?;
        store.compare_and_swap(&self.key, &current, Some(new)).await
    }

    fn encode(&self, value: &T) -> Result<Value, StorageError> {
        serde_json::to_value(value)
            .map_err(|source| StorageError::Decode { key: self.key.clone(), source })
    }
}

struct Entries {
    values: Mutex<BTreeMap<StorageKey, Value>>,
    changes: broadcast::Sender<StorageChange>,
}

impl Entries {
    fn new(values: BTreeMap<StorageKey, Value>) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CAPACITY);
        Entries { values: Mutex::new(values), changes }
    }

    fn get(&self, key: &StorageKey) -> Option<Value> { self.values.lock().get(key).cloned() }

    /// Applies a write under the lock and hands the resulting map to
    /// `persist` before releasing it, so that writers reach the backing file
    /// in the order they won the lock.
    fn write(
        &self,
        key: &StorageKey,
        expected: Option<&Value>,
        new: Option<Value>,
        persist: impl FnOnce(&BTreeMap<StorageKey, Value>) -> Result<(), StorageError>,
    ) -> Result<bool, StorageError> {
        let mut values = self.values.lock();
        let old = values.get(key).cloned();
        if let Some(expected) = expected {
            if old.as_ref().unwrap_or(&Value::Null) != expected {
                trace!(%key, "compare-and-swap lost");
                return Ok(false);
            }
        }
        match &new {
            Some(value) => values.insert(key.clone(), value.clone()),
            None => values.remove(key),
        };
        persist(&values)?;
        drop(values);

        if old != new {
            let _ = self.changes.send(StorageChange {
                key: key.clone(),
                old_value: old,
                new_value: new,
            });
        }
        Ok(true)
    }
}

/// Storage that lives as long as the process. Clones share their contents.
#[derive(Clone)]
pub struct MemoryStore {
    entries: Arc<Entries>,
}

impl Default for MemoryStore {
    fn default() -> Self { MemoryStore::new() }
}

impl MemoryStore {
    pub fn new() -> Self { MemoryStore { entries: Arc::new(Entries::new(BTreeMap::new())) } }
}

impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &StorageKey) -> Result<Option<Value>, StorageError> {
        Ok(self.entries.get(key))
    }

    async fn set(&self, key: &StorageKey, value: Value) -> Result<(), StorageError> {
        self.entries.write(key, None, Some(value), |_| Ok(())).map(|_| ())
    }

    async fn remove(&self, key: &StorageKey) -> Result<(), StorageError> {
        self.entries.write(key, None, None, |_| Ok(())).map(|_| ())
    }

    async fn compare_and_swap(
        &self,
        key: &StorageKey,
        current: &Value,
        new: Option<Value>,
    ) -> Result<bool, StorageError> {
        self.entries.write(key, Some(current), new, |_| Ok(()))
    }

    fn watch(&self) -> broadcast::Receiver<StorageChange> { self.entries.changes.subscribe() }
}

/// Storage persisted as one JSON object keyed by `area:name`. The whole
/// file is rewritten on every change.
#[derive(Clone)]
pub struct FileStore {
    path: Arc<PathBuf>,
    entries: Arc<Entries>,
}

impl FileStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        let values = match fs::read_to_string(&path) {
            Ok(buf) => parse_file(&path, &buf)?,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "storage file does not exist yet");
                BTreeMap::new()
            }
            Err(source) => return Err(StorageError::Io { path, source }),
        };
        Ok(FileStore { path: Arc::new(path), entries: Arc::new(Entries::new(values)) })
    }

    pub fn path(&self) -> &Path { &self.path }

    fn persist(&self, values: &BTreeMap<StorageKey, Value>) -> Result<(), StorageError> {
        let object: serde_json::Map<String, Value> =
            values.iter().map(|(k, v)| (k.to_string(), v.clone())).collect();
        let io_err = |source| StorageError::Io { path: self.path.to_path_buf(), source };
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let buf = serde_json::to_string_pretty(&object)
            .map_err(|source| StorageError::Corrupt { path: self.path.to_path_buf(), source })?;
        fs::write(&*self.path, buf).map_err(io_err)
    }
}

fn parse_file(path: &Path, buf: &str) -> Result<BTreeMap<StorageKey, Value>, StorageError> {
    let object: serde_json::Map<String, Value> = serde_json::from_str(buf)
        .map_err(|source| StorageError::Corrupt { path: path.to_path_buf(), source })?;
    let mut values = BTreeMap::new();
    for (raw, value) in object {
        match StorageKey::parse(&raw) {
            Ok(key) => {
                values.insert(key, value);
            }
            Err(_) => debug!(key = %raw, "ignoring storage entry without a namespace"),
        }
    }
    Ok(values)
}

impl KeyValueStore for FileStore {
    async fn get(&self, key: &StorageKey) -> Result<Option<Value>, StorageError> {
        Ok(self.entries.get(key))
    }

    async fn set(&self, key: &StorageKey, value: Value) -> Result<(), StorageError> {
        self.entries.write(key, None, Some(value), |v| self.persist(v)).map(|_| ())
    }

    async fn remove(&self, key: &StorageKey) -> Result<(), StorageError> {
        self.entries.write(key, None, None, |v| self.persist(v)).map(|_| ())
    }

    async fn compare_and_swap(
        &self,
        key: &StorageKey,
        current: &Value,
        new: Option<Value>,
    ) -> Result<bool, StorageError> {
        self.entries.write(key, Some(current), new, |v| self.persist(v))
    }

    fn watch(&self) -> broadcast::Receiver<StorageChange> { self.entries.changes.subscribe() }
}
