//! Remote service adapters.

pub mod timeline;

pub use timeline::{HttpTimelineClient, TimelineConfig};
