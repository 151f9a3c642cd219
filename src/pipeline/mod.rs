//! Rule pipeline.
//!
//! Every run flows through:
//! 1. `FeedSource::fetch_recent()`: posts newer than the account cursor
//! 2. `RulesEngine::evaluate()`: length gate + trigger predicates
//! 3. `deriver::derive()`: favorite / rename / reply actions per match
//! 4. `BatchProcessor::process()`: ordered action plan + next cursor
//! 5. `JobRunner`: executes the plan, then persists the cursor

pub mod deriver;
pub mod processor;
pub mod rules;
pub mod runner;
pub mod types;
