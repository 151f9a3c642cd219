//! libSQL backend: async `CursorStore` implementation.
//!
//! Supports local file and in-memory databases. One row per account in
//! the `cursors` table; monotonic writes are enforced in SQL with `MAX()`.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::info;

use crate::error::DatabaseError;
use crate::store::migrations;
use crate::store::traits::CursorStore;

/// libSQL cursor store.
///
/// Stores a single connection that is reused for all operations.
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlCursorStore {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlCursorStore {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let store = Self::from_database(db).await?;
        info!(path = %path.display(), "Cursor database opened");
        Ok(store)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;

        Self::from_database(db).await
    }

    async fn from_database(db: LibSqlDatabase) -> Result<Self, DatabaseError> {
        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        migrations::run_migrations(&conn).await?;
        Ok(Self {
            db: Arc::new(db),
            conn,
        })
    }

    /// Get the connection.
    fn conn(&self) -> &Connection {
        &self.conn
    }
}

#[async_trait]
impl CursorStore for LibSqlCursorStore {
    fn backend(&self) -> &str {
        "libsql"
    }

    async fn get_cursor(&self, account: &str) -> Result<Option<i64>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT since_id FROM cursors WHERE account = ?1",
                params![account],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_cursor: {e}")))?;

        match rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("get_cursor: {e}")))?
        {
            Some(row) => {
                let id: i64 = row
                    .get(0)
                    .map_err(|e| DatabaseError::Serialization(format!("since_id: {e}")))?;
                Ok(Some(id))
            }
            None => Ok(None),
        }
    }

    async fn set_cursor(&self, account: &str, id: i64) -> Result<(), DatabaseError> {
        self.conn()
            .execute(
                "INSERT INTO cursors (account, since_id, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(account) DO UPDATE SET
                     since_id = MAX(cursors.since_id, excluded.since_id),
                     updated_at = excluded.updated_at",
                params![account, id, Utc::now().to_rfc3339()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("set_cursor: {e}")))?;
        Ok(())
    }

    async fn compare_and_set(
        &self,
        account: &str,
        expected: Option<i64>,
        id: i64,
    ) -> Result<bool, DatabaseError> {
        let now = Utc::now().to_rfc3339();
        let affected = match expected {
            None => self
                .conn()
                .execute(
                    "INSERT INTO cursors (account, since_id, updated_at) VALUES (?1, ?2, ?3)
                     ON CONFLICT(account) DO NOTHING",
                    params![account, id, now],
                )
                .await,
            Some(expected) => self
                .conn()
                .execute(
                    "UPDATE cursors SET since_id = MAX(since_id, ?2), updated_at = ?3
                     WHERE account = ?1 AND since_id = ?4",
                    params![account, id, now, expected],
                )
                .await,
        }
        .map_err(|e| DatabaseError::Query(format!("compare_and_set: {e}")))?;

        Ok(affected == 1)
    }

    async fn all_cursors(&self) -> Result<BTreeMap<String, i64>, DatabaseError> {
        let mut rows = self
            .conn()
            .query("SELECT account, since_id FROM cursors ORDER BY account", ())
            .await
            .map_err(|e| DatabaseError::Query(format!("all_cursors: {e}")))?;

        let mut cursors = BTreeMap::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("all_cursors: {e}")))?
        {
            let account: String = row
                .get(0)
                .map_err(|e| DatabaseError::Serialization(format!("account: {e}")))?;
            let id: i64 = row
                .get(1)
                .map_err(|e| DatabaseError::Serialization(format!("since_id: {e}")))?;
            cursors.insert(account, id);
        }
        Ok(cursors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn migrations_are_idempotent() {
        let store = LibSqlCursorStore::new_memory().await.unwrap();
        migrations::run_migrations(store.conn()).await.unwrap();
        assert_eq!(
            migrations::get_current_version(store.conn()).await.unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn set_and_get_cursor() {
        let store = LibSqlCursorStore::new_memory().await.unwrap();
        assert_eq!(store.get_cursor("alice").await.unwrap(), None);
        store.set_cursor("alice", 42).await.unwrap();
        assert_eq!(store.get_cursor("alice").await.unwrap(), Some(42));
    }

    #[tokio::test]
    async fn set_cursor_never_moves_backwards() {
        let store = LibSqlCursorStore::new_memory().await.unwrap();
        store.set_cursor("alice", 42).await.unwrap();
        store.set_cursor("alice", 7).await.unwrap();
        assert_eq!(store.get_cursor("alice").await.unwrap(), Some(42));
    }

    #[tokio::test]
    async fn other_accounts_are_preserved() {
        let store = LibSqlCursorStore::new_memory().await.unwrap();
        store.set_cursor("bob", 1).await.unwrap();
        store.set_cursor("alice", 2).await.unwrap();
        store.set_cursor("alice", 3).await.unwrap();

        let all = store.all_cursors().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all["alice"], 3);
        assert_eq!(all["bob"], 1);
    }

    #[tokio::test]
    async fn compare_and_set_semantics() {
        let store = LibSqlCursorStore::new_memory().await.unwrap();
        assert!(store.compare_and_set("alice", None, 10).await.unwrap());
        assert!(!store.compare_and_set("alice", None, 11).await.unwrap());
        assert!(!store.compare_and_set("alice", Some(9), 11).await.unwrap());
        assert!(store.compare_and_set("alice", Some(10), 11).await.unwrap());
        assert_eq!(store.get_cursor("alice").await.unwrap(), Some(11));
    }

    #[tokio::test]
    async fn local_file_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data/cursors.db");
        {
            let store = LibSqlCursorStore::new_local(&path).await.unwrap();
            store.set_cursor("alice", 99).await.unwrap();
        }
        let store = LibSqlCursorStore::new_local(&path).await.unwrap();
        assert_eq!(store.get_cursor("alice").await.unwrap(), Some(99));
    }
}
