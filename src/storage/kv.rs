//! Simple key-value preferences store
//!
//! A single JSON object on disk mapping string keys to JSON values. Every
//! mutation rewrites the file atomically.

use std::collections::BTreeMap;
use std::path::PathBuf;

use parking_lot::Mutex;
use serde::{de::DeserializeOwned, Serialize};

use super::file_io::{read_json, write_json_atomic};
use crate::error::{VaultError, VaultResult};

/// File-backed key-value store
pub struct KeyValueStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl KeyValueStore {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            lock: Mutex::new(()),
        }
    }

    fn read_all(&self) -> VaultResult<BTreeMap<String, serde_json::Value>> {
        read_json(&self.path).map_err(|e| {
            VaultError::Io(format!("Failed to read {}: {}", self.path.display(), e))
        })
    }

    /// Read and deserialize the value under `key`
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> VaultResult<Option<T>> {
        let _guard = self.lock.lock();
        match self.read_all()?.remove(key) {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    /// Store `value` under `key`, replacing any previous value
    pub fn set<T: Serialize>(&self, key: &str, value: &T) -> VaultResult<()> {
        let _guard = self.lock.lock();
        let mut entries = self.read_all()?;
        entries.insert(key.to_string(), serde_json::to_value(value)?);
        write_json_atomic(&self.path, &entries)
            .map_err(|e| VaultError::Io(format!("Failed to write preferences: {}", e)))
    }

    /// Remove `key`; returns whether it was present
    pub fn remove(&self, key: &str) -> VaultResult<bool> {
        let _guard = self.lock.lock();
        let mut entries = self.read_all()?;
        if entries.remove(key).is_none() {
            return Ok(false);
        }
        write_json_atomic(&self.path, &entries)
            .map_err(|e| VaultError::Io(format!("Failed to write preferences: {}", e)))?;
        Ok(true)
    }
}
