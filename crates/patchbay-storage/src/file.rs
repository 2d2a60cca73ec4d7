//! JSON snapshot file backend.
//!
//! The whole store is kept in memory and rewritten to disk after every
//! mutation (write to a sibling temp file, then rename). Values are stored
//! base64-encoded so arbitrary bytes survive the JSON round trip.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{StorageError, StorageResult};
use crate::kv::{KvStore, validate_component};

type Snapshot = BTreeMap<String, BTreeMap<String, Vec<u8>>>;

/// Persistent key-value store backed by a single JSON file.
#[derive(Debug)]
pub struct FileKvStore {
    path: PathBuf,
    data: Mutex<Snapshot>,
}

impl FileKvStore {
    /// Open the store at `path`, loading the snapshot if the file exists.
    ///
    /// Parent directories are created on first write.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Io`] if the file exists but cannot be read,
    /// and [`StorageError::Serialization`] if it is not a valid snapshot.
    pub async fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref().to_path_buf();
        let data = match tokio::fs::read(&path).await {
            Ok(bytes) => decode_snapshot(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Snapshot::new(),
            Err(source) => {
                return Err(StorageError::Io {
                    path: path.display().to_string(),
                    source,
                });
            },
        };
        debug!(path = %path.display(), namespaces = data.len(), "Opened file KV store");
        Ok(Self {
            path,
            data: Mutex::new(data),
        })
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self, data: &Snapshot) -> StorageResult<()> {
        let io_err = |source: std::io::Error| StorageError::Io {
            path: self.path.display().to_string(),
            source,
        };

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
        }

        let bytes = encode_snapshot(data)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes).await.map_err(io_err)?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(io_err)
    }
}

fn encode_snapshot(data: &Snapshot) -> StorageResult<Vec<u8>> {
    let encoded: BTreeMap<&str, BTreeMap<&str, String>> = data
        .iter()
        .map(|(ns, entries)| {
            let entries = entries
                .iter()
                .map(|(k, v)| (k.as_str(), STANDARD.encode(v)))
                .collect();
            (ns.as_str(), entries)
        })
        .collect();
    serde_json::to_vec_pretty(&encoded).map_err(|e| StorageError::Serialization(e.to_string()))
}

fn decode_snapshot(bytes: &[u8]) -> StorageResult<Snapshot> {
    let encoded: BTreeMap<String, BTreeMap<String, String>> =
        serde_json::from_slice(bytes).map_err(|e| StorageError::Serialization(e.to_string()))?;

    let mut data = Snapshot::new();
    for (ns, entries) in encoded {
        let mut decoded = BTreeMap::new();
        for (key, value) in entries {
            let value = STANDARD
                .decode(value)
                .map_err(|e| StorageError::Serialization(format!("{ns}/{key}: {e}")))?;
            decoded.insert(key, value);
        }
        data.insert(ns, decoded);
    }
    Ok(data)
}

#[async_trait]
impl KvStore for FileKvStore {
    async fn get(&self, namespace: &str, key: &str) -> StorageResult<Option<Vec<u8>>> {
        validate_component("namespace", namespace)?;
        validate_component("key", key)?;
        let data = self.data.lock().await;
        Ok(data.get(namespace).and_then(|ns| ns.get(key)).cloned())
    }

    async fn set(&self, namespace: &str, key: &str, value: Vec<u8>) -> StorageResult<()> {
        validate_component("namespace", namespace)?;
        validate_component("key", key)?;
        let mut data = self.data.lock().await;
        data.entry(namespace.to_owned())
            .or_default()
            .insert(key.to_owned(), value);
        self.persist(&data).await
    }

    async fn delete(&self, namespace: &str, key: &str) -> StorageResult<bool> {
        validate_component("namespace", namespace)?;
        validate_component("key", key)?;
        let mut data = self.data.lock().await;
        let existed = data
            .get_mut(namespace)
            .is_some_and(|ns| ns.remove(key).is_some());
        if existed {
            self.persist(&data).await?;
        }
        Ok(existed)
    }

    async fn list_keys(&self, namespace: &str) -> StorageResult<Vec<String>> {
        validate_component("namespace", namespace)?;
        let data = self.data.lock().await;
        Ok(data
            .get(namespace)
            .map(|ns| ns.keys().cloned().collect())
            .unwrap_or_default())
    }
}
