//! Configuration types.
//!
//! Everything comes from `UPDATE_NAME_*` environment variables except the
//! rule set, which is a JSON document at `UPDATE_NAME_RULES_PATH`.

use std::path::PathBuf;
use std::str::FromStr;

use secrecy::SecretString;

use crate::channels::timeline::{DEFAULT_API_BASE, DEFAULT_PAGE_SIZE, TimelineConfig};
use crate::error::ConfigError;
use crate::pipeline::rules::RuleSet;
use crate::pipeline::runner::FailurePolicy;

const DEFAULT_DB_PATH: &str = "./data/update-name.db";
const DEFAULT_CURSOR_FILE: &str = "./data/cursors.json";

/// Where cursors are persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CursorBackend {
    LibSql { path: PathBuf },
    File { path: PathBuf },
    /// Process-local; cursors are lost on exit.
    Memory,
}

/// Job configuration.
#[derive(Debug, Clone)]
pub struct JobConfig {
    /// Account whose timeline is read. Also the cursor key.
    pub account: String,
    /// Path to the rule-set JSON document.
    pub rules_path: PathBuf,
    /// Timeline API endpoint and credentials.
    pub timeline: TimelineConfig,
    pub cursor_backend: CursorBackend,
    /// What to do when an action fails.
    pub failure_policy: FailurePolicy,
    /// Log planned actions instead of executing them. Implies no cursor write.
    pub dry_run: bool,
    /// Write the cursor after a successful run.
    pub persist_cursor: bool,
    /// Cron expression; `None` runs once and exits.
    pub schedule: Option<String>,
}

impl JobConfig {
    /// Load from process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load using `lookup` to resolve variable names.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
        };

        let account = required("UPDATE_NAME_ACCOUNT")?;
        let rules_path = PathBuf::from(required("UPDATE_NAME_RULES_PATH")?);
        let access_token = SecretString::from(required("UPDATE_NAME_ACCESS_TOKEN")?);

        let base_url = lookup("UPDATE_NAME_API_BASE")
            .map(|s| s.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());

        let page_size = match lookup("UPDATE_NAME_PAGE_SIZE") {
            Some(raw) => parse_value::<u32>("UPDATE_NAME_PAGE_SIZE", &raw)?,
            None => DEFAULT_PAGE_SIZE,
        };
        if page_size == 0 {
            return Err(ConfigError::InvalidValue {
                key: "UPDATE_NAME_PAGE_SIZE".into(),
                message: "must be at least 1".into(),
            });
        }

        let cursor_backend = match lookup("UPDATE_NAME_CURSOR_BACKEND").as_deref() {
            None | Some("libsql") => CursorBackend::LibSql {
                path: lookup("UPDATE_NAME_DB_PATH")
                    .unwrap_or_else(|| DEFAULT_DB_PATH.to_string())
                    .into(),
            },
            Some("file") => CursorBackend::File {
                path: lookup("UPDATE_NAME_CURSOR_FILE")
                    .unwrap_or_else(|| DEFAULT_CURSOR_FILE.to_string())
                    .into(),
            },
            Some("memory") => CursorBackend::Memory,
            Some(other) => {
                return Err(ConfigError::InvalidValue {
                    key: "UPDATE_NAME_CURSOR_BACKEND".into(),
                    message: format!("unknown backend '{other}' (libsql, file, memory)"),
                });
            }
        };

        let failure_policy = match lookup("UPDATE_NAME_ON_ACTION_ERROR") {
            Some(raw) => parse_value("UPDATE_NAME_ON_ACTION_ERROR", &raw)?,
            None => FailurePolicy::default(),
        };

        let dry_run = match lookup("UPDATE_NAME_DRY_RUN") {
            Some(raw) => parse_bool("UPDATE_NAME_DRY_RUN", &raw)?,
            None => false,
        };

        let persist_cursor = match lookup("UPDATE_NAME_PERSIST_CURSOR") {
            Some(raw) => parse_bool("UPDATE_NAME_PERSIST_CURSOR", &raw)?,
            None => true,
        };

        let schedule = lookup("UPDATE_NAME_SCHEDULE")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        if let Some(expr) = &schedule {
            cron::Schedule::from_str(expr).map_err(|e| ConfigError::InvalidValue {
                key: "UPDATE_NAME_SCHEDULE".into(),
                message: format!("invalid cron: {e}"),
            })?;
        }

        Ok(Self {
            account,
            rules_path,
            timeline: TimelineConfig {
                base_url,
                access_token,
                page_size,
            },
            cursor_backend,
            failure_policy,
            dry_run,
            persist_cursor,
            schedule,
        })
    }

    /// Read and parse the rule-set document.
    pub async fn load_rule_set(&self) -> Result<RuleSet, ConfigError> {
        let raw = tokio::fs::read_to_string(&self.rules_path).await?;
        RuleSet::from_json(&raw)
    }
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        key: key.to_string(),
        message: e.to_string(),
    })
}

fn parse_bool(key: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("expected a boolean, got '{other}'"),
        }),
    }
}
