//! Settings store backends.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::{Map, Value};
use tokio::fs;
use tokio::sync::Mutex;

use super::{SettingsStore, StoreError};

/// In-process store, mainly for tests and simulation.
#[derive(Debug, Default)]
pub struct MemorySettingsStore {
    values: RwLock<HashMap<String, Value>>,
    unavailable: AtomicBool,
}

impl MemorySettingsStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated with one record.
    pub fn with_value(key: &str, value: Value) -> Self {
        let store = Self::new();
        store.values.write().insert(key.to_string(), value);
        store
    }

    /// Makes every subsequent operation fail with `StoreError::Unavailable`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable {
                reason: "memory store marked unavailable".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl SettingsStore for MemorySettingsStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        self.check_available()?;
        Ok(self.values.read().get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
        self.check_available()?;
        self.values.write().insert(key.to_string(), value);
        Ok(())
    }
}

/// Store backed by a single JSON object on disk, one entry per key.
///
/// Writes go to a sibling temp file that is renamed over the target, so a
/// crash mid-write leaves the previous contents intact.
#[derive(Debug)]
pub struct JsonFileSettingsStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileSettingsStore {
    /// Creates a store for the given file. The file need not exist yet.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_entries(&self) -> Result<Map<String, Value>, StoreError> {
        let contents = match fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Map::new()),
            Err(e) => return Err(e.into()),
        };

        if contents.trim().is_empty() {
            return Ok(Map::new());
        }

        match serde_json::from_str::<Value>(&contents)? {
            Value::Object(entries) => Ok(entries),
            _ => Err(StoreError::Unavailable {
                reason: format!("{} does not contain a JSON object", self.path.display()),
            }),
        }
    }
}

#[async_trait]
impl SettingsStore for JsonFileSettingsStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        let mut entries = self.read_entries().await?;
        Ok(entries.remove(key))
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;

        // A corrupt file is replaced rather than blocking every future save.
        let mut entries = match self.read_entries().await {
            Ok(entries) => entries,
            Err(StoreError::Io(e)) => return Err(StoreError::Io(e)),
            Err(e) => {
                tracing::warn!("Overwriting unreadable settings file: {e}");
                Map::new()
            }
        };
        entries.insert(key.to_string(), value);

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        let temp_path = self.path.with_extension("json.tmp");
        let encoded = serde_json::to_vec_pretty(&Value::Object(entries))?;
        fs::write(&temp_path, encoded).await?;
        fs::rename(&temp_path, &self.path).await?;

        tracing::debug!("Wrote settings file {}", self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tempfile::TempDir;

    use super::*;

    #[tokio::test]
    async fn test_memory_store_round_trip_and_outage() {
        let store = MemorySettingsStore::new();
        assert!(store.get("k").await.unwrap().is_none());

        store.set("k", json!({ "mode": "max" })).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some(json!({ "mode": "max" })));

        store.set_unavailable(true);
        assert!(matches!(store.get("k").await, Err(StoreError::Unavailable { .. })));
        assert!(store.set("k", json!(null)).await.is_err());
    }

    #[tokio::test]
    async fn test_file_store_missing_file_reads_as_absent() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileSettingsStore::new(dir.path().join("settings.json"));
        assert!(store.get("anything").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_file_store_preserves_other_keys() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("settings.json");
        let store = JsonFileSettingsStore::new(&path);

        store.set("a", json!(1)).await.unwrap();
        store.set("b", json!({ "x": true })).await.unwrap();

        assert_eq!(store.get("a").await.unwrap(), Some(json!(1)));
        assert_eq!(store.get("b").await.unwrap(), Some(json!({ "x": true })));
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[tokio::test]
    async fn test_file_store_recovers_from_corrupt_file_on_write() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{ not json").unwrap();

        let store = JsonFileSettingsStore::new(&path);
        assert!(matches!(store.get("k").await, Err(StoreError::Serialization(_))));

        store.set("k", json!("v")).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some(json!("v")));
    }
}
