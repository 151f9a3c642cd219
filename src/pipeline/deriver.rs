//! Action derivation: turns a (post, fired rule) pair into side effects.
//!
//! Rename rules emit, in order: favorite, rename, then an optional reply
//! carrying the new name. NG rules emit only a reply and never touch the
//! profile.

use std::sync::LazyLock;

use regex::Regex;

use crate::pipeline::rules::TriggerRule;
use crate::pipeline::types::{Action, Item};

/// Profile display-name limit of the timeline service, in characters.
pub const MAX_NAME_CHARS: usize = 50;

/// Placeholder in a reply template replaced by the derived name.
const NAME_SLOT: &str = "%s";

/// One or more `@handle ` mentions at the start of a reply-style post.
static LEADING_MENTIONS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:@[^\s@]+ +)+").expect("leading-mention pattern is valid"));

/// Strip leading `@handle ` mentions so a reply never renames the profile
/// to a mention.
pub fn strip_leading_mentions(text: &str) -> &str {
    match LEADING_MENTIONS.find(text) {
        Some(m) => &text[m.end()..],
        None => text,
    }
}

/// Name the profile would be renamed to for `text` under `rule`.
pub fn derive_name(text: &str, rule: &TriggerRule) -> String {
    let name = strip_leading_mentions(text);
    if rule.omit_word {
        name.replace(&rule.word, "")
    } else {
        name.to_string()
    }
}

/// Fill the name slot of `template` and address it to `handle`.
pub fn format_reply(handle: &str, template: &str, name: Option<&str>) -> String {
    let body = match name {
        Some(name) => template.replacen(NAME_SLOT, name, 1),
        None => template.to_string(),
    };
    format!("@{handle} {body}")
}

/// Derive the ordered actions for `item` fired by `rule`.
///
/// Returns an empty list when the derived name is blank or longer than
/// [`MAX_NAME_CHARS`], or when an NG rule has no reply configured.
pub fn derive(item: &Item, rule: &TriggerRule) -> Vec<Action> {
    if rule.kind.is_ng() {
        return rule
            .reply()
            .map(|template| Action::PostReply {
                in_reply_to: item.id,
                text: format_reply(&item.author_handle, template, None),
            })
            .into_iter()
            .collect();
    }

    let name = derive_name(&item.text, rule);
    if name.trim().is_empty() || name.chars().count() > MAX_NAME_CHARS {
        return Vec::new();
    }

    let reply = rule
        .reply()
        .map(|template| format_reply(&item.author_handle, template, Some(&name)));

    let mut actions = vec![
        Action::Favorite { item_id: item.id },
        Action::UpdateProfileName { name },
    ];
    if let Some(text) = reply {
        actions.push(Action::PostReply {
            in_reply_to: item.id,
            text,
        });
    }
    actions
}
