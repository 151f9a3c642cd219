//! Shared types for the rule pipeline.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::FeedError;

// ── Item ────────────────────────────────────────────────────────────

/// A single post from the home timeline.
///
/// Ids are monotonically increasing per feed, so they double as the
/// ordering key and the cursor value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: i64,
    /// Display text of the post.
    pub text: String,
    /// Handle of the posting account, without the leading `@`.
    pub author_handle: String,
}

impl Item {
    pub fn new(id: i64, text: impl Into<String>, author_handle: impl Into<String>) -> Self {
        Self {
            id,
            text: text.into(),
            author_handle: author_handle.into(),
        }
    }

    /// Length in characters, not bytes.
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

// ── Action ──────────────────────────────────────────────────────────

/// One side effect to run against the timeline service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    /// Mark the post as liked.
    Favorite { item_id: i64 },
    /// Set the account display name.
    UpdateProfileName { name: String },
    /// Post a reply referencing `in_reply_to`.
    PostReply { in_reply_to: i64, text: String },
}

impl Action {
    pub fn kind(&self) -> ActionKind {
        match self {
            Self::Favorite { .. } => ActionKind::Favorite,
            Self::UpdateProfileName { .. } => ActionKind::UpdateProfileName,
            Self::PostReply { .. } => ActionKind::PostReply,
        }
    }

    /// Short label for logging.
    pub fn label(&self) -> &'static str {
        self.kind().label()
    }

    /// The post this action refers to, if any.
    pub fn item_id(&self) -> Option<i64> {
        match self {
            Self::Favorite { item_id } => Some(*item_id),
            Self::UpdateProfileName { .. } => None,
            Self::PostReply { in_reply_to, .. } => Some(*in_reply_to),
        }
    }
}

/// Discriminant of [`Action`], used in errors and failure policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    Favorite,
    UpdateProfileName,
    PostReply,
}

impl ActionKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::Favorite => "favorite",
            Self::UpdateProfileName => "update_profile_name",
            Self::PostReply => "post_reply",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ── Collaborator traits ─────────────────────────────────────────────

/// Source of timeline items: pure I/O, no matching logic.
#[async_trait]
pub trait FeedSource: Send + Sync {
    /// Source name for logging.
    fn name(&self) -> &str;

    /// Fetch items posted after `since_id` (all available when `None`).
    ///
    /// Implementations must return items newest-first. The runner checks
    /// this and reorders with a warning, since the batch cursor is taken
    /// from the first item.
    async fn fetch_recent(
        &self,
        account: &str,
        since_id: Option<i64>,
    ) -> Result<Vec<Item>, FeedError>;
}

/// Executes derived actions against the remote service.
#[async_trait]
pub trait ActionExecutor: Send + Sync {
    async fn execute(&self, action: &Action) -> Result<(), FeedError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn char_len_counts_characters_not_bytes() {
        let item = Item::new(1, "名前変更", "alice");
        assert_eq!(item.char_len(), 4);
        assert_eq!(item.text.len(), 12);
    }

    #[test]
    fn action_labels_and_item_ids() {
        let fav = Action::Favorite { item_id: 7 };
        let rename = Action::UpdateProfileName { name: "x".into() };
        let reply = Action::PostReply {
            in_reply_to: 9,
            text: "@a hi".into(),
        };

        assert_eq!(fav.label(), "favorite");
        assert_eq!(rename.label(), "update_profile_name");
        assert_eq!(reply.label(), "post_reply");

        assert_eq!(fav.item_id(), Some(7));
        assert_eq!(rename.item_id(), None);
        assert_eq!(reply.item_id(), Some(9));
    }

    #[test]
    fn action_serialization_is_tagged() {
        let action = Action::PostReply {
            in_reply_to: 42,
            text: "@alice done".into(),
        };
        let json = serde_json::to_value(&action).unwrap();
        assert_eq!(json["action"], "post_reply");
        assert_eq!(json["in_reply_to"], 42);
        assert_eq!(json["text"], "@alice done");
    }

    #[test]
    fn action_kind_display() {
        assert_eq!(ActionKind::UpdateProfileName.to_string(), "update_profile_name");
    }
}
