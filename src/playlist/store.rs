//! Key/value persistence boundary.
//!
//! The platform store only needs `get`, `set` and `remove` over string keys
//! and values. `MemoryStore` backs tests and ephemeral sessions; `FileStore`
//! keeps one file per key under the data directory.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// String key/value store.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Value stored under `key`, if any.
    async fn get(&self, key: &str) -> Result<Option<String>>;
    /// Store `value` under `key`, replacing any previous value.
    async fn set(&self, key: &str, value: &str) -> Result<()>;
    /// Remove `key`; removing an absent key is not an error.
    async fn remove(&self, key: &str) -> Result<()>;
}

/// In-memory store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.lock().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.entries.lock().remove(key);
        Ok(())
    }
}

/// Directory-backed store, one `<key>.json` file per key.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Store rooted at `root`; the directory is created on first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory holding the entries.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let name: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.root.join(format!("{name}.json"))
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        match fs_err::tokio::read_to_string(self.path_for(key)).await {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::store(key, e.to_string())),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        fs_err::tokio::create_dir_all(&self.root)
            .await
            .map_err(|e| Error::store(key, e.to_string()))?;

        // Readers never observe a partially written value.
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        fs_err::tokio::write(&tmp, value)
            .await
            .map_err(|e| Error::store(key, e.to_string()))?;
        fs_err::tokio::rename(&tmp, &path)
            .await
            .map_err(|e| Error::store(key, e.to_string()))
    }

    async fn remove(&self, key: &str) -> Result<()> {
        match fs_err::tokio::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::store(key, e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]

    use super::*;

    async fn exercise(store: &dyn KeyValueStore) {
        assert_eq!(store.get("playlist_a").await.unwrap(), None);
        store.set("playlist_a", "one").await.unwrap();
        store.set("playlist_a", "two").await.unwrap();
        assert_eq!(store.get("playlist_a").await.unwrap().as_deref(), Some("two"));
        store.remove("playlist_a").await.unwrap();
        store.remove("playlist_a").await.unwrap();
        assert_eq!(store.get("playlist_a").await.unwrap(), None);
    }

    #[tokio::test]
    async fn memory_store_semantics() {
        exercise(&MemoryStore::new()).await;
    }

    #[tokio::test]
    async fn file_store_semantics() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("nested"));
        exercise(&store).await;
    }

    #[tokio::test]
    async fn file_store_sanitizes_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        store.set("playlist_../../escape", "x").await.unwrap();
        assert_eq!(store.get("playlist_../../escape").await.unwrap().as_deref(), Some("x"));
        assert!(store.path_for("playlist_../../escape").starts_with(dir.path()));
    }
}
