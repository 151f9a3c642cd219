//! `CursorStore` trait: per-account resumption cursors.

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::error::DatabaseError;

/// Backend-agnostic store of the last processed post id per account.
///
/// Cursors never move backwards: writing a value not greater than the
/// stored one leaves it unchanged. Writing one account never touches
/// another account's cursor.
#[async_trait]
pub trait CursorStore: Send + Sync {
    /// Backend name for logging.
    fn backend(&self) -> &str;

    /// Current cursor for `account`, or `None` if the account has never run.
    async fn get_cursor(&self, account: &str) -> Result<Option<i64>, DatabaseError>;

    /// Advance the cursor (last writer wins, bounded by monotonicity).
    async fn set_cursor(&self, account: &str, id: i64) -> Result<(), DatabaseError>;

    /// Advance the cursor only if it still equals `expected`.
    ///
    /// Returns `false` when another writer changed it first.
    async fn compare_and_set(
        &self,
        account: &str,
        expected: Option<i64>,
        id: i64,
    ) -> Result<bool, DatabaseError>;

    /// Every stored cursor, keyed by account.
    async fn all_cursors(&self) -> Result<BTreeMap<String, i64>, DatabaseError>;
}
