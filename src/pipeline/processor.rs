//! Batch processor: matches a fetched batch and plans its actions.
//!
//! Pure computation: no I/O, no clock, no failure path. The runner
//! executes the planned actions and persists the cursor.
//!
//! Flow per post:
//! 1. `RulesEngine::evaluate()`: length gate + predicates, per match mode
//! 2. `deriver::derive()`: actions for each fired rule
//!
//! When an NG rule fires, rename rules fired by the same post are dropped:
//! the post only gets the NG reply.

use tracing::debug;

use crate::pipeline::deriver;
use crate::pipeline::rules::{RuleSet, RulesEngine};
use crate::pipeline::types::{Action, Item};

/// Result of processing one batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    /// Actions to execute, in order.
    pub actions: Vec<Action>,
    /// Id of the first (newest) post, or `None` for an empty batch.
    pub new_cursor: Option<i64>,
    /// Posts that produced at least one action.
    pub matched_items: usize,
}

pub struct BatchProcessor {
    rules: RulesEngine,
}

impl BatchProcessor {
    pub fn new(rule_set: RuleSet) -> Self {
        Self {
            rules: RulesEngine::new(rule_set),
        }
    }

    pub fn rules(&self) -> &RulesEngine {
        &self.rules
    }

    /// Plan actions for a newest-first batch.
    ///
    /// The cursor is always the first post's id, matched or not, so a
    /// backlog of non-matching posts is never fetched again.
    pub fn process(&self, items: &[Item]) -> BatchOutcome {
        let mut outcome = BatchOutcome {
            new_cursor: items.first().map(|item| item.id),
            ..Default::default()
        };

        for item in items {
            let actions = self.plan_item(item);
            if actions.is_empty() {
                continue;
            }
            debug!(id = item.id, actions = actions.len(), "Planned actions for post");
            outcome.matched_items += 1;
            outcome.actions.extend(actions);
        }

        outcome
    }

    fn plan_item(&self, item: &Item) -> Vec<Action> {
        let fired = self.rules.evaluate(item);
        let ng_fired = fired.iter().any(|rule| rule.kind.is_ng());

        fired
            .into_iter()
            .filter(|rule| !ng_fired || rule.kind.is_ng())
            .flat_map(|rule| deriver::derive(item, rule))
            .collect()
    }
}
