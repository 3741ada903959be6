//! Error types for the cache engine
//!
//! Provides unified error handling using thiserror.
//!
//! Reads never fail: a missing, expired or corrupted entry is a miss, not an
//! error. The variants below cover the few operations that take caller input
//! which can be malformed.

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the cache engine.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Query options could not be turned into a canonical key
    #[error("Key generation failed: {0}")]
    KeyGeneration(String),

    /// Invalidation pattern could not be compiled
    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        CacheError::KeyGeneration(err.to_string())
    }
}

impl From<regex::Error> for CacheError {
    fn from(err: regex::Error) -> Self {
        CacheError::InvalidPattern(err.to_string())
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache engine.
pub type Result<T> = std::result::Result<T, CacheError>;
