//! Bounded in-memory content caching

mod content_cache;

pub use content_cache::{CacheStatsSnapshot, ContentCache};
