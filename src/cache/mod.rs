//! Cache Module
//!
//! Provides in-memory caching with TTL expiration and LRU eviction.

mod entry;
mod lru;
mod service;
mod stats;
mod store;


// Re-export public types
pub use entry::{current_timestamp_ms, CacheEntry, Ttl};
pub use lru::LruList;
pub use service::KbCache;
pub use stats::{CacheStats, OperationCounts, StatsCollector};
pub use store::CacheStore;

pub(crate) use service::Shared;
