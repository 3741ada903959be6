//! KB Cache - An in-process cache engine for knowledge-base queries
//!
//! Provides TTL expiration (fixed or sliding), LRU eviction, canonical key
//! generation from query options, and pattern-based invalidation.

pub mod cache;
pub mod config;
pub mod error;
pub mod keys;
pub mod pattern;
mod tasks;

pub use cache::{CacheStats, KbCache, Ttl};
pub use config::CacheConfig;
pub use error::{CacheError, Result};
pub use pattern::InvalidationPattern;
