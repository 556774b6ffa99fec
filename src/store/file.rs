//! JSON-file key-value backend
//!
//! The durable counterpart of [`super::MemoryStore`]: all keys live in one
//! JSON document and every mutation rewrites the document through a temporary
//! file followed by a rename, so a crash mid-write cannot leave a torn
//! record on disk.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use super::{KeyValueStore, StorageError};

/// Key-value store persisted as a single JSON document.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn read_entries(&self) -> Result<BTreeMap<String, String>, StorageError> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let contents = fs::read_to_string(&self.path)?;
        if contents.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        Ok(serde_json::from_str(&contents)?)
    }

    fn write_entries(&self, entries: &BTreeMap<String, String>) -> Result<(), StorageError> {
        let parent = self.path.parent().unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(parent)?;

        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(entries)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.read_entries()?.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut entries = self.read_entries()?;
        entries.insert(key.to_string(), value.to_string());
        self.write_entries(&entries)
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut entries = self.read_entries()?;
        if entries.remove(key).is_some() {
            self.write_entries(&entries)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TokenRecord;
    use crate::store::TokenStore;
    use std::sync::Arc;

    #[tokio::test]
    async fn round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");

        let record = TokenRecord {
            access_token: "abc".to_string(),
            refresh_token: Some("def".to_string()),
            id_token: Some("ghi".to_string()),
            token_type: Some("Bearer".to_string()),
            scopes: Some(vec!["openid".to_string()]),
            expires_at: None,
        };

        {
            let store = TokenStore::new(Arc::new(FileStore::new(&path)));
            store.save(&record).await.unwrap();
        }

        // A fresh store over the same path sees the persisted record.
        let store = TokenStore::new(Arc::new(FileStore::new(&path)));
        assert_eq!(store.load().await.unwrap(), Some(record));
    }

    #[tokio::test]
    async fn missing_file_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("absent.json"));
        assert_eq!(store.get("accessToken").await.unwrap(), None);
        store.remove("accessToken").await.unwrap();
    }

    #[tokio::test]
    async fn corrupt_file_surfaces_storage_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        fs::write(&path, "{ not json").unwrap();

        let store = FileStore::new(&path);
        assert!(store.get("accessToken").await.is_err());
    }
}
