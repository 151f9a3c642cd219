//! update-name: renames a profile from trigger posts on its home timeline.

pub mod channels;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod schedule;
pub mod store;
