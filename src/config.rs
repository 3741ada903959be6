//! Configuration Module
//!
//! Cache construction parameters, loadable from environment variables.

use std::env;
use std::time::Duration;

use crate::cache::Ttl;

/// Cache configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// TTL applied when `set` is called without one
    pub default_ttl: Ttl,
    /// Maximum number of live entries, 0 = unbounded
    pub max_size: usize,
    /// Period of the background expiration sweep, zero = paused
    pub cleanup_interval: Duration,
    /// Whether a successful `get` pushes the deadline out by a full TTL
    pub sliding_expiration: bool,
}

impl CacheConfig {
    /// Creates a new CacheConfig by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `KB_CACHE_DEFAULT_TTL_MS` - Default TTL in milliseconds; `<= 0`
    ///   expires immediately, `inf` or `never` disables expiry (default: 300000)
    /// - `KB_CACHE_MAX_SIZE` - Maximum entries, 0 = unbounded (default: 1000)
    /// - `KB_CACHE_CLEANUP_INTERVAL_MS` - Sweep period in milliseconds (default: 60000)
    /// - `KB_CACHE_SLIDING_EXPIRATION` - `true`/`1` to enable (default: false)
    ///
    /// Unparseable values fall back to the default.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            default_ttl: env::var("KB_CACHE_DEFAULT_TTL_MS")
                .ok()
                .and_then(|v| parse_ttl(&v))
                .unwrap_or(defaults.default_ttl),
            max_size: env::var("KB_CACHE_MAX_SIZE")
                .ok()
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(defaults.max_size),
            cleanup_interval: env::var("KB_CACHE_CLEANUP_INTERVAL_MS")
                .ok()
                .and_then(|v| v.trim().parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.cleanup_interval),
            sliding_expiration: env::var("KB_CACHE_SLIDING_EXPIRATION")
                .ok()
                .and_then(|v| parse_bool(&v))
                .unwrap_or(defaults.sliding_expiration),
        }
    }

    pub fn with_default_ttl(mut self, ttl: impl Into<Ttl>) -> Self {
        self.default_ttl = ttl.into();
        self
    }

    pub fn with_max_size(mut self, max_size: usize) -> Self {
        self.max_size = max_size;
        self
    }

    pub fn with_cleanup_interval(mut self, interval: Duration) -> Self {
        self.cleanup_interval = interval;
        self
    }

    pub fn with_sliding_expiration(mut self, enabled: bool) -> Self {
        self.sliding_expiration = enabled;
        self
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl: Ttl::After(Duration::from_millis(300_000)),
            max_size: 1000,
            cleanup_interval: Duration::from_secs(60),
            sliding_expiration: false,
        }
    }
}

fn parse_ttl(raw: &str) -> Option<Ttl> {
    let raw = raw.trim();
    match raw.to_ascii_lowercase().as_str() {
        "inf" | "infinity" | "never" => Some(Ttl::Never),
        _ => raw.parse::<i64>().ok().map(Ttl::from_millis),
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
