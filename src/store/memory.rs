//! In-memory cursor store (tests, dry runs).

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::DatabaseError;
use crate::store::traits::CursorStore;

#[derive(Default)]
pub struct InMemoryCursorStore {
    cursors: RwLock<HashMap<String, i64>>,
}

impl InMemoryCursorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with cursors.
    pub fn with_cursors<I, S>(cursors: I) -> Self
    where
        I: IntoIterator<Item = (S, i64)>,
        S: Into<String>,
    {
        Self {
            cursors: RwLock::new(cursors.into_iter().map(|(k, v)| (k.into(), v)).collect()),
        }
    }
}

#[async_trait]
impl CursorStore for InMemoryCursorStore {
    fn backend(&self) -> &str {
        "memory"
    }

    async fn get_cursor(&self, account: &str) -> Result<Option<i64>, DatabaseError> {
        Ok(self.cursors.read().await.get(account).copied())
    }

    async fn set_cursor(&self, account: &str, id: i64) -> Result<(), DatabaseError> {
        let mut cursors = self.cursors.write().await;
        let entry = cursors.entry(account.to_string()).or_insert(id);
        *entry = (*entry).max(id);
        Ok(())
    }

    async fn compare_and_set(
        &self,
        account: &str,
        expected: Option<i64>,
        id: i64,
    ) -> Result<bool, DatabaseError> {
        let mut cursors = self.cursors.write().await;
        let current = cursors.get(account).copied();
        if current != expected {
            return Ok(false);
        }
        cursors.insert(account.to_string(), current.map_or(id, |c| c.max(id)));
        Ok(true)
    }

    async fn all_cursors(&self) -> Result<BTreeMap<String, i64>, DatabaseError> {
        Ok(self
            .cursors
            .read()
            .await
            .iter()
            .map(|(k, v)| (k.clone(), *v))
            .collect())
    }
}
