//! Trigger rules and the matcher.
//!
//! A rule set is an ordered list of trigger rules plus two policies the
//! caller must pick explicitly:
//! - [`MatchMode`]: stop at the first firing rule, or let every rule fire
//! - [`LengthGate`]: which rule kinds skip posts longer than the name limit
//!
//! Matching is a pure function of the post text and the rules.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ConfigError;
use crate::pipeline::deriver::MAX_NAME_CHARS;
use crate::pipeline::types::Item;

/// How a rule's word is matched against post text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TriggerKind {
    /// Text starts with the word.
    Prefix,
    /// Text ends with the word.
    Suffix,
    /// Text contains the word anywhere. Replies only, never renames.
    Ng,
    /// Unrecognized kind from config. Never matches.
    Unknown(String),
}

impl TriggerKind {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Prefix => "prefix",
            Self::Suffix => "suffix",
            Self::Ng => "ng",
            Self::Unknown(raw) => raw,
        }
    }

    pub fn is_ng(&self) -> bool {
        matches!(self, Self::Ng)
    }
}

impl From<String> for TriggerKind {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "prefix" => Self::Prefix,
            "suffix" => Self::Suffix,
            "ng" | "contains" => Self::Ng,
            _ => Self::Unknown(raw),
        }
    }
}

impl From<TriggerKind> for String {
    fn from(kind: TriggerKind) -> Self {
        kind.as_str().to_string()
    }
}

/// A single trigger rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerRule {
    #[serde(rename = "triggerType")]
    pub kind: TriggerKind,
    #[serde(rename = "triggerWord")]
    pub word: String,
    /// Strip every occurrence of `word` from the derived name.
    #[serde(rename = "omitTriggerWord", default)]
    pub omit_word: bool,
    /// Reply text. `%s` is replaced by the derived name (non-NG rules only).
    #[serde(
        rename = "replyFormat",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub reply_template: Option<String>,
}

impl TriggerRule {
    pub fn new(kind: TriggerKind, word: impl Into<String>) -> Self {
        Self {
            kind,
            word: word.into(),
            omit_word: false,
            reply_template: None,
        }
    }

    pub fn omitting_word(mut self) -> Self {
        self.omit_word = true;
        self
    }

    pub fn with_reply(mut self, template: impl Into<String>) -> Self {
        self.reply_template = Some(template.into());
        self
    }

    /// Non-empty reply template, if any.
    pub fn reply(&self) -> Option<&str> {
        self.reply_template.as_deref().filter(|t| !t.is_empty())
    }

    /// Whether this rule's predicate holds for `text`.
    pub fn matches(&self, text: &str) -> bool {
        match self.kind {
            TriggerKind::Prefix => text.starts_with(&self.word),
            TriggerKind::Suffix => text.ends_with(&self.word),
            TriggerKind::Ng => text.contains(&self.word),
            TriggerKind::Unknown(_) => false,
        }
    }
}

/// First rule, in order, whose predicate holds for `text`.
pub fn first_match<'a>(text: &str, rules: &'a [TriggerRule]) -> Option<&'a TriggerRule> {
    rules.iter().find(|rule| rule.matches(text))
}

/// Whether a post may fire more than one rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    /// Stop evaluating rules for a post once one fires.
    First,
    /// Evaluate every rule against every post.
    All,
}

/// Which rules skip posts whose text exceeds [`MAX_NAME_CHARS`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LengthGate {
    /// Long posts are skipped for every rule.
    All,
    /// Long posts are skipped except by NG rules.
    ExemptNg,
    /// No pre-match gate; only the derived-name limit applies.
    Off,
}

impl LengthGate {
    /// Whether a post of `char_len` characters is withheld from `kind`.
    pub fn blocks(self, kind: &TriggerKind, char_len: usize) -> bool {
        if char_len <= MAX_NAME_CHARS {
            return false;
        }
        match self {
            Self::All => true,
            Self::ExemptNg => !kind.is_ng(),
            Self::Off => false,
        }
    }
}

/// Ordered rules plus their evaluation policies. Immutable for a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleSet {
    pub match_mode: MatchMode,
    pub length_gate: LengthGate,
    pub rules: Vec<TriggerRule>,
}

impl RuleSet {
    pub fn new(match_mode: MatchMode, length_gate: LengthGate, rules: Vec<TriggerRule>) -> Self {
        Self {
            match_mode,
            length_gate,
            rules,
        }
    }

    /// Parse a rule-set document.
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let rule_set: Self = serde_json::from_str(raw)
            .map_err(|e| ConfigError::ParseError(format!("rule set: {e}")))?;

        for rule in &rule_set.rules {
            if rule.word.is_empty() {
                return Err(ConfigError::InvalidValue {
                    key: "triggerWord".into(),
                    message: "trigger word must not be empty".into(),
                });
            }
        }
        Ok(rule_set)
    }
}

/// Applies a [`RuleSet`] to posts.
pub struct RulesEngine {
    rule_set: RuleSet,
}

impl RulesEngine {
    pub fn new(rule_set: RuleSet) -> Self {
        Self { rule_set }
    }

    pub fn rule_set(&self) -> &RuleSet {
        &self.rule_set
    }

    /// Rules that fire for `item`, in configured order.
    ///
    /// Applies the length gate per rule kind, then the predicate. In
    /// [`MatchMode::First`] at most one rule is returned.
    pub fn evaluate(&self, item: &Item) -> Vec<&TriggerRule> {
        let char_len = item.char_len();
        let mut fired = Vec::new();

        for rule in &self.rule_set.rules {
            if self.rule_set.length_gate.blocks(&rule.kind, char_len) {
                debug!(
                    id = item.id,
                    chars = char_len,
                    kind = rule.kind.as_str(),
                    "Post over length gate, rule skipped"
                );
                continue;
            }

            if !rule.matches(&item.text) {
                continue;
            }

            debug!(
                id = item.id,
                kind = rule.kind.as_str(),
                word = %rule.word,
                "Post matched trigger rule"
            );
            fired.push(rule);

            if self.rule_set.match_mode == MatchMode::First {
                break;
            }
        }

        fired
    }
}
