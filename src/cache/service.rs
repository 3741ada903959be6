//! Cache Service Module
//!
//! Thread-safe cache handle shared by every caller in the process.
//!
//! All state sits behind one mutex that is also taken by the background
//! sweeper. Each operation is synchronous and holds the lock only for the
//! duration of the underlying store call.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, MutexGuard};
use serde::Serialize;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::{CacheStats, CacheStore, Ttl};
use crate::config::CacheConfig;
use crate::error::Result;
use crate::keys;
use crate::pattern::InvalidationPattern;
use crate::tasks::spawn_sweeper;

const DESTROYED: &str = "cache used after destroy()";

// == Shared State ==
/// State shared between a [`KbCache`] and its sweeper.
pub(crate) struct Shared<V> {
    state: Mutex<State<V>>,
}

struct State<V> {
    store: CacheStore<V>,
    destroyed: bool,
}

impl<V> Shared<V> {
    pub(crate) fn new(store: CacheStore<V>) -> Self {
        Self {
            state: Mutex::new(State {
                store,
                destroyed: false,
            }),
        }
    }

    /// Runs one expiration sweep.
    ///
    /// Returns None once the cache has been destroyed.
    pub(crate) fn sweep(&self) -> Option<usize> {
        let mut state = self.state.lock();
        if state.destroyed {
            return None;
        }
        Some(state.store.purge_expired())
    }

    /// Marks the state destroyed and drops every entry.
    ///
    /// Returns false if it was already destroyed.
    pub(crate) fn mark_destroyed(&self) -> bool {
        let mut state = self.state.lock();
        if state.destroyed {
            return false;
        }
        state.destroyed = true;
        state.store.clear();
        true
    }

    #[cfg(test)]
    pub(crate) fn stored_len(&self) -> usize {
        self.state.lock().store.len()
    }
}

struct Sweeper {
    interval: watch::Sender<Duration>,
    task: JoinHandle<()>,
}

// == KB Cache ==
/// In-process cache with TTL expiration, LRU eviction, pattern invalidation
/// and statistics.
///
/// Share it between callers with an `Arc`. Values are stored as `Arc<V>` and
/// handed back as clones of the same `Arc`.
///
/// Once [`destroy`](KbCache::destroy) has run, every other method panics.
/// Dropping the cache destroys it.
///
/// # Example
/// ```
/// use std::time::Duration;
/// use kb_cache::{CacheConfig, KbCache};
/// use serde_json::json;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let cache: KbCache<serde_json::Value> =
///     KbCache::new(CacheConfig::default().with_max_size(100));
///
/// let key = cache.generate_key("entries", &json!({"page": 1})).unwrap();
/// cache.set(key.as_str(), json!(["row"]), None);
/// assert!(cache.get(&key).is_some());
///
/// cache.invalidate_pattern("entries:*").unwrap();
/// assert!(!cache.has(&key));
/// cache.destroy();
/// # }
/// ```
pub struct KbCache<V> {
    shared: Arc<Shared<V>>,
    sweeper: Mutex<Option<Sweeper>>,
}

impl<V> KbCache<V>
where
    V: Send + Sync + 'static,
{
    // == Constructor ==
    /// Creates a cache and starts its expiration sweeper on the current
    /// tokio runtime.
    ///
    /// # Panics
    /// Panics if called outside a tokio runtime.
    pub fn new(config: CacheConfig) -> Self {
        Self::new_in(config, &Handle::current())
    }

    /// Creates a cache whose sweeper runs on `runtime`.
    pub fn new_in(config: CacheConfig, runtime: &Handle) -> Self {
        let shared = Arc::new(Shared::new(CacheStore::new(&config)));
        let (interval, rx) = watch::channel(config.cleanup_interval);
        let task = spawn_sweeper(Arc::downgrade(&shared), rx, runtime);

        info!(
            max_size = config.max_size,
            default_ttl = ?config.default_ttl,
            cleanup_interval_ms = config.cleanup_interval.as_millis() as u64,
            sliding_expiration = config.sliding_expiration,
            "Cache created"
        );

        Self {
            shared,
            sweeper: Mutex::new(Some(Sweeper { interval, task })),
        }
    }
}

impl<V> KbCache<V> {
    // == Set ==
    /// Stores `value` under `key`.
    ///
    /// `ttl` falls back to the configured default; see [`CacheStore::set`].
    pub fn set(&self, key: impl Into<String>, value: impl Into<Arc<V>>, ttl: Option<Ttl>) {
        self.state().store.set(key.into(), value.into(), ttl);
    }

    // == Get ==
    /// Returns the live value stored under `key`.
    pub fn get(&self, key: &str) -> Option<Arc<V>> {
        self.state().store.get(key)
    }

    // == Has ==
    /// Checks for a live value without refreshing recency or TTL and without
    /// counting a hit or miss.
    pub fn has(&self, key: &str) -> bool {
        self.state().store.has(key)
    }

    // == Delete ==
    pub fn delete(&self, key: &str) -> bool {
        self.state().store.delete(key)
    }

    // == Clear ==
    /// Drops every entry, keeping statistics.
    pub fn clear(&self) {
        self.state().store.clear();
    }

    // == Size ==
    /// Number of live entries.
    pub fn size(&self) -> usize {
        self.state().store.size()
    }

    /// Live keys, most recently used first.
    pub fn keys(&self) -> Vec<String> {
        self.state().store.keys()
    }

    /// Remaining lifetime of a live entry; `Some(None)` if it never expires.
    pub fn ttl_remaining(&self, key: &str) -> Option<Option<Duration>> {
        self.state().store.ttl_remaining(key)
    }

    /// Runs an expiration sweep now, returning the number of entries removed.
    pub fn purge_expired(&self) -> usize {
        self.state().store.purge_expired()
    }

    // == Generate Key ==
    /// Derives a stable key for `options` under `namespace`.
    ///
    /// See [`keys::generate_key`].
    pub fn generate_key<T>(&self, namespace: &str, options: &T) -> Result<String>
    where
        T: Serialize + ?Sized,
    {
        drop(self.state());
        keys::generate_key(namespace, options)
    }

    // == Invalidate Pattern ==
    /// Removes every entry matching `pattern` under a single lock
    /// acquisition, returning how many were removed.
    ///
    /// Strings containing `*` are globs, other strings exact keys; pass a
    /// [`regex::Regex`] for regular expressions.
    pub fn invalidate_pattern(&self, pattern: impl Into<InvalidationPattern>) -> Result<usize> {
        let pattern = pattern.into();
        self.state().store.invalidate(&pattern)
    }

    // == Statistics ==
    /// Returns a statistics snapshot. Expired entries are purged first so
    /// `size` reflects live entries.
    pub fn get_statistics(&self) -> CacheStats {
        let mut state = self.state();
        state.store.purge_expired();
        state.store.stats()
    }

    /// Zeroes hit/miss counters, operation counts and timings.
    pub fn reset_statistics(&self) {
        self.state().store.reset_stats();
    }

    // == Cleanup Interval ==
    /// Changes the sweep period. Takes effect immediately; zero pauses the
    /// sweeper.
    pub fn set_cleanup_interval(&self, interval: Duration) {
        drop(self.state());
        if let Some(sweeper) = self.sweeper.lock().as_ref() {
            sweeper.interval.send_replace(interval);
            debug!(interval_ms = interval.as_millis() as u64, "Cleanup interval updated");
        }
    }

    // == Destroy ==
    /// Drops all entries and stops the sweeper.
    ///
    /// Idempotent. Returns after any in-flight sweep has finished, since both
    /// take the same lock.
    pub fn destroy(&self) {
        if !self.shared.mark_destroyed() {
            return;
        }
        if let Some(sweeper) = self.sweeper.lock().take() {
            sweeper.task.abort();
        }
        info!("Cache destroyed");
    }

    /// Returns true once [`destroy`](KbCache::destroy) has run.
    pub fn is_destroyed(&self) -> bool {
        self.shared.state.lock().destroyed
    }

    fn state(&self) -> MutexGuard<'_, State<V>> {
        let state = self.shared.state.lock();
        if state.destroyed {
            drop(state);
            panic!("{}", DESTROYED);
        }
        state
    }
}

impl<V> Drop for KbCache<V> {
    fn drop(&mut self) {
        self.destroy();
    }
}
