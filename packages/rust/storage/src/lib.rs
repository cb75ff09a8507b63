//! File-backed long-term memory.
//!
//! [`LongTermMemory`] is a JSON-object key/value store that outlives any
//! single pipeline run. The whole object is loaded on open and rewritten on
//! every mutation.
//!
//! **Access rules:**
//! - One handle per backing file per process; share it behind an `Arc`.
//! - Every mutation holds the handle's lock for the full
//!   modify → serialize → write → rename cycle, so concurrent writers
//!   through the same handle never interleave.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use insightflow_shared::{InsightFlowError, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

/// Durable key/value store backed by a single JSON object on disk.
#[derive(Debug)]
pub struct LongTermMemory {
    path: PathBuf,
    entries: Mutex<Map<String, Value>>,
}

impl LongTermMemory {
    /// Open the store at `path`, creating it as `{}` if it does not exist.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        if !path.exists() {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent).map_err(|e| InsightFlowError::io(parent, e))?;
            }
            persist(&path, &Map::new())?;
            tracing::info!(path = %path.display(), "initialized empty long-term memory");
        }

        let entries = load(&path)?;
        tracing::debug!(path = %path.display(), keys = entries.len(), "loaded long-term memory");

        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Raw JSON value stored under `key`.
    pub fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.lock()?.get(key).cloned())
    }

    /// Value stored under `key`, deserialized into `T`.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.get(key)? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    /// Store `value` under `key` and persist the whole object.
    pub fn set(&self, key: impl Into<String>, value: impl Serialize) -> Result<()> {
        let key = key.into();
        let value = serde_json::to_value(value)?;

        let mut entries = self.lock()?;
        let previous = entries.insert(key.clone(), value);
        if let Err(e) = persist(&self.path, &entries) {
            // Keep memory and disk in agreement when the write fails.
            match previous {
                Some(old) => entries.insert(key, old),
                None => entries.remove(&key),
            };
            return Err(e);
        }

        tracing::debug!(%key, "long-term memory updated");
        Ok(())
    }

    /// Remove `key`, returning its previous value. Persists only when something was removed.
    pub fn remove(&self, key: &str) -> Result<Option<Value>> {
        let mut entries = self.lock()?;
        let Some(old) = entries.remove(key) else {
            return Ok(None);
        };
        if let Err(e) = persist(&self.path, &entries) {
            entries.insert(key.to_string(), old);
            return Err(e);
        }
        Ok(Some(old))
    }

    /// All keys, sorted.
    pub fn keys(&self) -> Result<Vec<String>> {
        let mut keys: Vec<String> = self.lock()?.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }

    /// A copy of the whole stored object.
    pub fn snapshot(&self) -> Result<Value> {
        Ok(Value::Object(self.lock()?.clone()))
    }

    fn lock(&self) -> Result<MutexGuard<'_, Map<String, Value>>> {
        self.entries
            .lock()
            .map_err(|_| InsightFlowError::Storage("long-term memory lock poisoned".into()))
    }
}

/// Read and parse the backing file, which must hold a JSON object.
fn load(path: &Path) -> Result<Map<String, Value>> {
    let content = std::fs::read_to_string(path).map_err(|e| InsightFlowError::io(path, e))?;

    match serde_json::from_str::<Value>(&content) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(InsightFlowError::Storage(format!(
            "{} does not contain a JSON object",
            path.display()
        ))),
        Err(e) => Err(InsightFlowError::Storage(format!(
            "failed to parse {}: {e}",
            path.display()
        ))),
    }
}

/// Rewrite the backing file: write a sibling temp file, then rename over the target.
fn persist(path: &Path, entries: &Map<String, Value>) -> Result<()> {
    let json = serde_json::to_string_pretty(entries)?;

    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp = path.with_file_name(tmp_name);

    std::fs::write(&tmp, json).map_err(|e| InsightFlowError::io(&tmp, e))?;
    std::fs::rename(&tmp, path).map_err(|e| InsightFlowError::io(path, e))?;
    Ok(())
}
