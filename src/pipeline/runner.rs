//! Job runner: one incremental pass over an account's timeline.
//!
//! Flow:
//! 1. `CursorStore::get_cursor()`: where the last run stopped
//! 2. `FeedSource::fetch_recent()`: posts newer than the cursor
//! 3. `BatchProcessor::process()`: plan actions and the next cursor
//! 4. `ActionExecutor::execute()`: sequentially, in planned order
//! 5. `CursorStore::compare_and_set()`: only after the whole batch ran
//!
//! A fatal action failure returns before step 5, so the next run sees the
//! same batch again. Side effects already executed are not rolled back.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use tracing::{Instrument, debug, error, info, info_span, warn};
use uuid::Uuid;

use crate::error::PipelineError;
use crate::pipeline::processor::BatchProcessor;
use crate::pipeline::rules::RuleSet;
use crate::pipeline::types::{ActionExecutor, ActionKind, FeedSource, Item};
use crate::store::CursorStore;

/// Which action failures abort the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Any failure aborts the rest of the batch.
    #[default]
    Abort,
    /// Only profile renames are fatal; favorite and reply failures are logged.
    AbortOnRename,
    /// Log every failure and keep going.
    Continue,
}

impl FailurePolicy {
    pub fn is_fatal(self, kind: ActionKind) -> bool {
        match self {
            Self::Abort => true,
            Self::AbortOnRename => kind == ActionKind::UpdateProfileName,
            Self::Continue => false,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Abort => "abort",
            Self::AbortOnRename => "abort-on-rename",
            Self::Continue => "continue",
        }
    }
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "abort" => Ok(Self::Abort),
            "abort-on-rename" => Ok(Self::AbortOnRename),
            "continue" => Ok(Self::Continue),
            other => Err(format!(
                "unknown policy '{other}' (abort, abort-on-rename, continue)"
            )),
        }
    }
}

/// Per-run switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    pub failure_policy: FailurePolicy,
    /// Plan and log actions without executing them or writing the cursor.
    pub dry_run: bool,
    pub persist_cursor: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            failure_policy: FailurePolicy::Abort,
            dry_run: false,
            persist_cursor: true,
        }
    }
}

/// Summary of a completed run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Posts processed after dropping those at or below the cursor.
    pub fetched: usize,
    pub matched_items: usize,
    pub actions_planned: usize,
    pub actions_executed: usize,
    /// Failures tolerated by the failure policy.
    pub actions_failed: usize,
    pub new_cursor: Option<i64>,
    pub cursor_persisted: bool,
}

pub struct JobRunner {
    account: String,
    feed: Arc<dyn FeedSource>,
    executor: Arc<dyn ActionExecutor>,
    cursors: Arc<dyn CursorStore>,
    processor: BatchProcessor,
    options: RunOptions,
}

impl JobRunner {
    pub fn new(
        account: impl Into<String>,
        rule_set: RuleSet,
        feed: Arc<dyn FeedSource>,
        executor: Arc<dyn ActionExecutor>,
        cursors: Arc<dyn CursorStore>,
    ) -> Self {
        Self {
            account: account.into(),
            feed,
            executor,
            cursors,
            processor: BatchProcessor::new(rule_set),
            options: RunOptions::default(),
        }
    }

    pub fn with_options(mut self, options: RunOptions) -> Self {
        self.options = options;
        self
    }

    pub fn account(&self) -> &str {
        &self.account
    }

    /// Run one incremental pass.
    pub async fn run_once(&self) -> Result<RunReport, PipelineError> {
        let span = info_span!("run", run_id = %Uuid::new_v4(), account = %self.account);
        self.run_inner().instrument(span).await
    }

    async fn run_inner(&self) -> Result<RunReport, PipelineError> {
        let cursor = self
            .cursors
            .get_cursor(&self.account)
            .await
            .map_err(|source| PipelineError::Cursor {
                account: self.account.clone(),
                source,
            })?;

        let items = self
            .feed
            .fetch_recent(&self.account, cursor)
            .await
            .map_err(|e| {
                error!(source = self.feed.name(), error = %e, "Timeline fetch failed");
                PipelineError::Fetch(e)
            })?;

        let items = normalize_batch(items, cursor);
        let outcome = self.processor.process(&items);

        let mut report = RunReport {
            fetched: items.len(),
            matched_items: outcome.matched_items,
            actions_planned: outcome.actions.len(),
            new_cursor: outcome.new_cursor,
            ..Default::default()
        };

        for action in &outcome.actions {
            if self.options.dry_run {
                info!(action = action.label(), detail = ?action, "Dry run: action not executed");
                continue;
            }

            match self.executor.execute(action).await {
                Ok(()) => {
                    debug!(action = action.label(), item_id = ?action.item_id(), "Action executed");
                    report.actions_executed += 1;
                }
                Err(e) if self.options.failure_policy.is_fatal(action.kind()) => {
                    error!(
                        action = action.label(),
                        item_id = ?action.item_id(),
                        error = %e,
                        "Action failed: aborting run, cursor not advanced"
                    );
                    return Err(PipelineError::Action {
                        kind: action.kind(),
                        item_id: action.item_id(),
                        source: e,
                    });
                }
                Err(e) => {
                    warn!(
                        action = action.label(),
                        item_id = ?action.item_id(),
                        policy = %self.options.failure_policy,
                        error = %e,
                        "Action failed: continuing"
                    );
                    report.actions_failed += 1;
                }
            }
        }

        if let Some(new_cursor) = outcome.new_cursor {
            if self.options.persist_cursor && !self.options.dry_run {
                self.persist_cursor(cursor, new_cursor).await?;
                report.cursor_persisted = true;
            } else {
                debug!(new_cursor, "Cursor persistence disabled for this run");
            }
        }

        info!(
            fetched = report.fetched,
            matched = report.matched_items,
            planned = report.actions_planned,
            executed = report.actions_executed,
            failed = report.actions_failed,
            cursor = ?report.new_cursor,
            persisted = report.cursor_persisted,
            "Run complete"
        );
        Ok(report)
    }

    async fn persist_cursor(&self, read: Option<i64>, new_cursor: i64) -> Result<(), PipelineError> {
        let to_pipeline = |source| PipelineError::Cursor {
            account: self.account.clone(),
            source,
        };

        let swapped = self
            .cursors
            .compare_and_set(&self.account, read, new_cursor)
            .await
            .map_err(to_pipeline)?;

        if !swapped {
            warn!(
                expected = ?read,
                new_cursor,
                backend = self.cursors.backend(),
                "Cursor changed during run: overlapping invocation, writing monotonically"
            );
            self.cursors
                .set_cursor(&self.account, new_cursor)
                .await
                .map_err(to_pipeline)?;
        }
        Ok(())
    }
}

/// Drop posts at or below `cursor` and ensure newest-first order.
///
/// The batch cursor is the first post's id, so an oldest-first feed would
/// otherwise leave the cursor behind the newest post.
pub fn normalize_batch(mut items: Vec<Item>, cursor: Option<i64>) -> Vec<Item> {
    if let Some(cursor) = cursor {
        let before = items.len();
        items.retain(|item| item.id > cursor);
        if items.len() != before {
            debug!(
                dropped = before - items.len(),
                cursor, "Dropped posts already covered by the cursor"
            );
        }
    }

    let newest_first = items.windows(2).all(|pair| pair[0].id > pair[1].id);
    if !newest_first {
        warn!(count = items.len(), "Feed was not newest-first: reordering batch");
        items.sort_by(|a, b| b.id.cmp(&a.id));
        items.dedup_by_key(|item| item.id);
    }
    items
}
