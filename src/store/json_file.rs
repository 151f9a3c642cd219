//! JSON file cursor store.
//!
//! All accounts share one JSON object (`{"alice": 123, "bob": 456}`). Each
//! write reads the file, merges the one key, and replaces the file via a
//! temp-file rename, so other accounts' cursors survive.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::DatabaseError;
use crate::store::traits::CursorStore;

pub struct JsonFileCursorStore {
    path: PathBuf,
    /// Serializes read-modify-write cycles within this process.
    write_lock: Mutex<()>,
}

impl JsonFileCursorStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<BTreeMap<String, i64>, DatabaseError> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(e.into()),
        };
        if raw.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&raw).map_err(|e| {
            DatabaseError::Serialization(format!(
                "Invalid cursor file {}: {e}",
                self.path.display()
            ))
        })
    }

    async fn save(&self, cursors: &BTreeMap<String, i64>) -> Result<(), DatabaseError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let body = serde_json::to_vec_pretty(cursors)
            .map_err(|e| DatabaseError::Serialization(e.to_string()))?;

        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, body).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        debug!(path = %self.path.display(), accounts = cursors.len(), "Cursor file written");
        Ok(())
    }
}

#[async_trait]
impl CursorStore for JsonFileCursorStore {
    fn backend(&self) -> &str {
        "file"
    }

    async fn get_cursor(&self, account: &str) -> Result<Option<i64>, DatabaseError> {
        Ok(self.load().await?.get(account).copied())
    }

    async fn set_cursor(&self, account: &str, id: i64) -> Result<(), DatabaseError> {
        let _guard = self.write_lock.lock().await;
        let mut cursors = self.load().await?;
        let entry = cursors.entry(account.to_string()).or_insert(id);
        *entry = (*entry).max(id);
        self.save(&cursors).await
    }

    async fn compare_and_set(
        &self,
        account: &str,
        expected: Option<i64>,
        id: i64,
    ) -> Result<bool, DatabaseError> {
        let _guard = self.write_lock.lock().await;
        let mut cursors = self.load().await?;
        let current = cursors.get(account).copied();
        if current != expected {
            return Ok(false);
        }
        cursors.insert(account.to_string(), current.map_or(id, |c| c.max(id)));
        self.save(&cursors).await?;
        Ok(true)
    }

    async fn all_cursors(&self) -> Result<BTreeMap<String, i64>, DatabaseError> {
        self.load().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_file_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileCursorStore::new(dir.path().join("cursors.json"));
        assert_eq!(store.get_cursor("alice").await.unwrap(), None);
        assert!(store.all_cursors().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn write_merges_with_other_accounts() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cursors.json");
        std::fs::write(&path, r#"{"bob": 77}"#).unwrap();

        let store = JsonFileCursorStore::new(&path);
        store.set_cursor("alice", 100).await.unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["alice"], 100);
        assert_eq!(raw["bob"], 77);
    }

    #[tokio::test]
    async fn set_cursor_is_monotonic() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileCursorStore::new(dir.path().join("c.json"));
        store.set_cursor("alice", 50).await.unwrap();
        store.set_cursor("alice", 20).await.unwrap();
        assert_eq!(store.get_cursor("alice").await.unwrap(), Some(50));
    }

    #[tokio::test]
    async fn creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileCursorStore::new(dir.path().join("nested/deeper/c.json"));
        store.set_cursor("alice", 1).await.unwrap();
        assert!(store.path().exists());
    }

    #[tokio::test]
    async fn compare_and_set_against_file_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("c.json");
        let store = JsonFileCursorStore::new(&path);
        assert!(store.compare_and_set("alice", None, 5).await.unwrap());

        // Another process advanced the cursor behind our back.
        std::fs::write(&path, r#"{"alice": 8}"#).unwrap();
        assert!(!store.compare_and_set("alice", Some(5), 9).await.unwrap());
        assert_eq!(store.get_cursor("alice").await.unwrap(), Some(8));
    }

    #[tokio::test]
    async fn corrupt_file_is_a_serialization_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("c.json");
        std::fs::write(&path, "not json").unwrap();
        let store = JsonFileCursorStore::new(&path);
        assert!(matches!(
            store.get_cursor("alice").await,
            Err(DatabaseError::Serialization(_))
        ));
    }
}
