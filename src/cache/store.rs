//! Cache Store Module
//!
//! Main cache engine combining recency-ordered storage with TTL expiration,
//! LRU eviction, pattern invalidation and statistics.
//!
//! `CacheStore` is single-threaded; [`KbCache`](crate::cache::KbCache) wraps
//! it in a mutex for shared use.

use std::collections::BTreeSet;
use std::mem::size_of;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::cache::{current_timestamp_ms, CacheEntry, CacheStats, LruList, StatsCollector, Ttl};
use crate::config::CacheConfig;
use crate::error::Result;
use crate::pattern::{InvalidationPattern, KeyMatcher};

// == Cache Store ==
/// Cache storage with LRU eviction and TTL support.
pub struct CacheStore<V> {
    /// Entries in recency order
    entries: LruList<V>,
    /// (deadline, slot) for every entry that can expire, earliest first
    deadlines: BTreeSet<(u64, usize)>,
    /// Performance statistics
    stats: StatsCollector,
    /// Maximum number of entries allowed, 0 = unbounded
    max_size: usize,
    /// TTL for entries written without an explicit one
    default_ttl: Ttl,
    /// Whether reads extend the deadline
    sliding_expiration: bool,
    /// Total bytes of stored keys
    key_bytes: usize,
}

impl<V> CacheStore<V> {
    // == Constructor ==
    /// Creates a new CacheStore from configuration.
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            entries: LruList::new(),
            deadlines: BTreeSet::new(),
            stats: StatsCollector::new(),
            max_size: config.max_size,
            default_ttl: config.default_ttl,
            sliding_expiration: config.sliding_expiration,
            key_bytes: 0,
        }
    }

    // == Set ==
    /// Stores a value under `key`, replacing any previous value.
    ///
    /// If the key is new and the cache is at capacity, the least recently used
    /// entry is evicted first. A zero TTL drops any previous value and leaves
    /// nothing behind, since the write could never be observed.
    ///
    /// # Arguments
    /// * `key` - The key to store
    /// * `value` - The value to store
    /// * `ttl` - Optional TTL (uses the configured default if None)
    pub fn set(&mut self, key: String, value: Arc<V>, ttl: Option<Ttl>) {
        let started = Instant::now();
        let ttl = ttl.unwrap_or(self.default_ttl);

        if ttl.is_immediate() {
            if let Some(slot) = self.entries.slot_of(&key) {
                self.remove_slot(slot);
            }
            self.stats.record_set(started.elapsed());
            return;
        }

        let now = current_timestamp_ms();
        let is_overwrite = self
            .entries
            .slot_of(&key)
            .is_some_and(|slot| self.entries.entry(slot).is_some());

        if !is_overwrite {
            while self.max_size > 0 && self.entries.len() >= self.max_size {
                if !self.evict_lru(now) {
                    break;
                }
            }
        }

        let entry = CacheEntry::new_at(value, ttl, now);
        let deadline = entry.expires_at;
        let key_len = key.len();
        let (slot, replaced) = self.entries.insert(key, entry);

        match replaced {
            Some(old) => {
                if let Some(old_deadline) = old.expires_at {
                    self.deadlines.remove(&(old_deadline, slot));
                }
            }
            None => self.key_bytes += key_len,
        }
        if let Some(deadline) = deadline {
            self.deadlines.insert((deadline, slot));
        }

        self.stats.record_set(started.elapsed());
    }

    // == Get ==
    /// Retrieves a value by key.
    ///
    /// A hit marks the entry most recently used and, under sliding
    /// expiration, restarts its TTL. Expired entries are removed and counted
    /// as misses.
    pub fn get(&mut self, key: &str) -> Option<Arc<V>> {
        let started = Instant::now();
        let now = current_timestamp_ms();

        let Some(slot) = self.live_slot(key, now) else {
            self.stats.record_miss(started.elapsed());
            return None;
        };

        let sliding = self.sliding_expiration;
        let Some(entry) = self.entries.entry_mut(slot) else {
            self.stats.record_miss(started.elapsed());
            return None;
        };
        let old_deadline = entry.expires_at;
        entry.touch(now, sliding);
        let new_deadline = entry.expires_at;
        let value = Arc::clone(&entry.value);

        if old_deadline != new_deadline {
            if let Some(d) = old_deadline {
                self.deadlines.remove(&(d, slot));
            }
            if let Some(d) = new_deadline {
                self.deadlines.insert((d, slot));
            }
        }
        self.entries.move_to_front(slot);

        self.stats.record_hit(started.elapsed());
        Some(value)
    }

    // == Has ==
    /// Checks whether a live value is stored under `key`.
    ///
    /// This is a probe: it leaves recency, deadlines and hit/miss counters
    /// untouched. An expired entry found here is removed.
    pub fn has(&mut self, key: &str) -> bool {
        let now = current_timestamp_ms();
        self.live_slot(key, now).is_some()
    }

    // == Delete ==
    /// Removes an entry by key.
    ///
    /// Returns true if an entry was removed.
    pub fn delete(&mut self, key: &str) -> bool {
        let removed = match self.entries.slot_of(key) {
            Some(slot) => self.remove_slot(slot).is_some() || self.repair_index(key),
            None => false,
        };
        self.stats.record_delete();
        removed
    }

    // == Clear ==
    /// Removes every entry. Statistics are kept.
    pub fn clear(&mut self) {
        let dropped = self.entries.len();
        self.entries.clear();
        self.deadlines.clear();
        self.key_bytes = 0;
        self.stats.record_clear();
        debug!(dropped, "cache cleared");
    }

    // == Size ==
    /// Returns the number of live entries, purging expired ones first.
    pub fn size(&mut self) -> usize {
        self.purge_expired();
        self.entries.len()
    }

    // == Length ==
    /// Returns the number of stored entries, including expired entries not
    /// yet purged.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    // == Keys ==
    /// Returns live keys from most to least recently used.
    pub fn keys(&mut self) -> Vec<String> {
        self.purge_expired();
        self.entries.iter().map(|(_, key, _)| key.to_string()).collect()
    }

    // == TTL Remaining ==
    /// Returns the remaining lifetime of a live entry without touching it.
    ///
    /// `Some(None)` means the entry never expires; `None` means no live entry.
    pub fn ttl_remaining(&mut self, key: &str) -> Option<Option<Duration>> {
        let now = current_timestamp_ms();
        let slot = self.live_slot(key, now)?;
        let entry = self.entries.entry(slot)?;
        Some(entry.ttl_remaining_ms(now).map(Duration::from_millis))
    }

    // == Invalidate Pattern ==
    /// Removes every entry whose key matches `pattern`.
    ///
    /// Returns the number of entries removed.
    pub fn invalidate(&mut self, pattern: &InvalidationPattern) -> Result<usize> {
        let matcher = pattern.compile()?;

        let removed = match matcher {
            KeyMatcher::Exact(key) => match self.entries.slot_of(key) {
                Some(slot) => usize::from(self.remove_slot(slot).is_some()),
                None => 0,
            },
            KeyMatcher::Regex(ref re) => {
                let slots: Vec<usize> = self
                    .entries
                    .iter()
                    .filter(|(_, key, _)| re.is_match(key))
                    .map(|(slot, _, _)| slot)
                    .collect();
                slots
                    .into_iter()
                    .filter(|&slot| self.remove_slot(slot).is_some())
                    .count()
            }
        };

        self.stats.record_invalidation(removed);
        debug!(?pattern, removed, "invalidated entries by pattern");
        Ok(removed)
    }

    // == Purge Expired ==
    /// Removes all expired entries from the cache.
    ///
    /// Only expired entries are visited. Returns the number removed.
    pub fn purge_expired(&mut self) -> usize {
        let now = current_timestamp_ms();
        let due: Vec<(u64, usize)> = self.deadlines.range(..=(now, usize::MAX)).copied().collect();

        let mut removed = 0;
        for (deadline, slot) in due {
            let current = self.entries.entry(slot).and_then(|entry| entry.expires_at);
            if current == Some(deadline) {
                if self.remove_slot(slot).is_some() {
                    removed += 1;
                }
            } else {
                // Stale deadline left behind by a repaired slot.
                self.deadlines.remove(&(deadline, slot));
            }
        }

        self.stats.record_expirations(removed);
        removed
    }

    // == Stats ==
    /// Returns current cache statistics.
    pub fn stats(&self) -> CacheStats {
        self.stats
            .snapshot(self.entries.len(), self.max_size, self.memory_usage())
    }

    /// Zeroes statistics without touching entries.
    pub fn reset_stats(&mut self) {
        self.stats.reset();
    }

    // == Memory Usage ==
    /// Rough estimate of the bytes held by the cache.
    ///
    /// Counts key text twice (list node and index), fixed per-entry
    /// bookkeeping and the inline size of one `V` per entry. Heap data owned
    /// by values is not visible here.
    pub fn memory_usage(&self) -> usize {
        let per_entry = size_of::<CacheEntry<V>>()
            + size_of::<V>()
            + size_of::<String>() * 2
            + size_of::<Option<usize>>() * 3
            + size_of::<(u64, usize)>();
        self.key_bytes * 2 + self.entries.len() * per_entry
    }

    // == Internal Helpers ==
    /// Resolves `key` to the slot of a live entry, removing it if expired.
    fn live_slot(&mut self, key: &str, now: u64) -> Option<usize> {
        let slot = self.entries.slot_of(key)?;
        let expired = match self.entries.entry(slot) {
            Some(entry) => entry.is_expired_at(now),
            None => {
                self.repair_index(key);
                return None;
            }
        };

        if expired {
            self.remove_slot(slot);
            self.stats.record_expirations(1);
            return None;
        }
        Some(slot)
    }

    fn remove_slot(&mut self, slot: usize) -> Option<(String, CacheEntry<V>)> {
        let (key, entry) = self.entries.remove(slot)?;
        if let Some(deadline) = entry.expires_at {
            self.deadlines.remove(&(deadline, slot));
        }
        self.key_bytes = self.key_bytes.saturating_sub(key.len());
        Some((key, entry))
    }

    fn evict_lru(&mut self, now: u64) -> bool {
        let Some(slot) = self.entries.lru_slot() else {
            return false;
        };
        match self.remove_slot(slot) {
            Some((key, entry)) => {
                if entry.is_expired_at(now) {
                    self.stats.record_expirations(1);
                } else {
                    self.stats.record_eviction();
                    debug!(%key, "evicted least recently used entry");
                }
                true
            }
            None => false,
        }
    }

    fn repair_index(&mut self, key: &str) -> bool {
        let repaired = self.entries.forget(key);
        if repaired {
            warn!(%key, "dropped index entry with no backing slot");
            self.key_bytes = self.key_bytes.saturating_sub(key.len());
        }
        repaired
    }

    #[cfg(test)]
    pub(crate) fn corrupt(&mut self, key: &str) {
        self.entries.corrupt_slot(key);
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use std::thread::sleep;

    fn store(max_size: usize) -> CacheStore<String> {
        CacheStore::new(&CacheConfig::default().with_max_size(max_size))
    }

    fn put(store: &mut CacheStore<String>, key: &str, value: &str) {
        store.set(key.to_string(), Arc::new(value.to_string()), None);
    }

    fn ms(n: u64) -> Option<Ttl> {
        Some(Ttl::After(Duration::from_millis(n)))
    }

    #[test]
    fn test_store_new() {
        let mut store = store(100);
        assert_eq!(store.len(), 0);
        assert!(store.is_empty());
        assert_eq!(store.size(), 0);
    }

    #[test]
    fn test_store_set_and_get() {
        let mut store = store(100);

        put(&mut store, "key1", "value1");
        let value = store.get("key1").unwrap();

        assert_eq!(*value, "value1");
        assert_eq!(store.size(), 1);
    }

    #[test]
    fn test_store_get_nonexistent() {
        let mut store = store(100);
        assert!(store.get("nonexistent").is_none());
    }

    #[test]
    fn test_store_returns_same_allocation() {
        let mut store: CacheStore<Value> = CacheStore::new(&CacheConfig::default());
        let value = Arc::new(json!({"rows": [1, 2, 3]}));

        store.set("k".to_string(), Arc::clone(&value), None);

        assert!(Arc::ptr_eq(&store.get("k").unwrap(), &value));
    }

    #[test]
    fn test_store_null_like_values_round_trip() {
        let mut store: CacheStore<Option<String>> = CacheStore::new(&CacheConfig::default());
        store.set("none".to_string(), Arc::new(None), None);

        assert_eq!(store.get("none").as_deref(), Some(&None));
        assert!(store.has("none"));

        let mut unit: CacheStore<()> = CacheStore::new(&CacheConfig::default());
        unit.set("unit".to_string(), Arc::new(()), None);
        assert!(unit.get("unit").is_some());
    }

    #[test]
    fn test_store_delete() {
        let mut store = store(100);

        put(&mut store, "key1", "value1");
        assert!(store.delete("key1"));

        assert!(store.is_empty());
        assert!(store.get("key1").is_none());
        assert!(!store.delete("key1"));
    }

    #[test]
    fn test_store_overwrite() {
        let mut store = store(100);

        put(&mut store, "key1", "value1");
        put(&mut store, "key1", "value2");

        assert_eq!(*store.get("key1").unwrap(), "value2");
        assert_eq!(store.size(), 1);
    }

    #[test]
    fn test_store_overwrite_resets_ttl() {
        let mut store = store(100);

        store.set("k".to_string(), Arc::new("a".to_string()), ms(40));
        store.set("k".to_string(), Arc::new("b".to_string()), Some(Ttl::Never));
        sleep(Duration::from_millis(60));

        assert_eq!(*store.get("k").unwrap(), "b");
        assert_eq!(store.ttl_remaining("k"), Some(None));
    }

    #[test]
    fn test_store_ttl_expiration() {
        let mut store = store(100);

        store.set("key1".to_string(), Arc::new("value1".to_string()), ms(50));
        assert!(store.get("key1").is_some());

        sleep(Duration::from_millis(150));

        assert!(store.get("key1").is_none());
        assert!(store.is_empty(), "Expired entry should be removed on read");
    }

    #[test]
    fn test_store_infinite_ttl() {
        let mut store = CacheStore::new(&CacheConfig::default().with_default_ttl(Duration::from_millis(10)));

        store.set("forever".to_string(), Arc::new(1u8), Some(Ttl::Never));
        store.set("brief".to_string(), Arc::new(2u8), None);
        sleep(Duration::from_millis(40));

        assert!(store.get("forever").is_some());
        assert!(store.get("brief").is_none());
    }

    #[test]
    fn test_store_zero_ttl_is_unobservable() {
        let mut store = store(100);

        put(&mut store, "k", "old");
        store.set("k".to_string(), Arc::new("new".to_string()), Some(Ttl::from_millis(0)));
        store.set("neg".to_string(), Arc::new("x".to_string()), Some(Ttl::from_millis(-100)));

        assert!(!store.has("k"));
        assert!(store.get("k").is_none());
        assert!(store.get("neg").is_none());
        assert_eq!(store.size(), 0);
    }

    #[test]
    fn test_store_sliding_expiration() {
        let config = CacheConfig::default()
            .with_default_ttl(Duration::from_millis(100))
            .with_sliding_expiration(true);
        let mut store = CacheStore::new(&config);
        store.set("k".to_string(), Arc::new(1u32), None);

        sleep(Duration::from_millis(50));
        assert!(store.get("k").is_some());
        sleep(Duration::from_millis(30));
        assert!(store.get("k").is_some());
        sleep(Duration::from_millis(40));
        // 120ms after the write, 40ms after the last read
        assert!(store.has("k"));

        sleep(Duration::from_millis(120));
        assert!(store.get("k").is_none());
    }

    #[test]
    fn test_store_fixed_expiration_ignores_reads() {
        let config = CacheConfig::default().with_default_ttl(Duration::from_millis(100));
        let mut store = CacheStore::new(&config);
        store.set("k".to_string(), Arc::new(1u32), None);

        sleep(Duration::from_millis(50));
        assert!(store.get("k").is_some());
        sleep(Duration::from_millis(80));

        assert!(store.get("k").is_none());
    }

    #[test]
    fn test_store_lru_eviction() {
        let mut store = store(3);

        put(&mut store, "key1", "value1");
        put(&mut store, "key2", "value2");
        put(&mut store, "key3", "value3");

        // Cache is full, adding key4 should evict key1 (oldest)
        put(&mut store, "key4", "value4");

        assert_eq!(store.size(), 3);
        assert!(store.get("key1").is_none());
        assert!(store.get("key2").is_some());
        assert!(store.get("key3").is_some());
        assert!(store.get("key4").is_some());
        assert_eq!(store.stats().evictions, 1);
    }

    #[test]
    fn test_store_lru_touch_on_get() {
        let mut store = store(3);

        put(&mut store, "key1", "value1");
        put(&mut store, "key2", "value2");
        put(&mut store, "key3", "value3");

        store.get("key1").unwrap();
        put(&mut store, "key4", "value4");

        assert!(store.has("key1"));
        assert!(!store.has("key2"));
        assert!(store.has("key3"));
        assert!(store.has("key4"));
    }

    #[test]
    fn test_store_has_does_not_refresh_recency() {
        let mut store = store(2);

        put(&mut store, "a", "1");
        put(&mut store, "b", "2");
        assert!(store.has("a"));
        put(&mut store, "c", "3");

        assert!(!store.has("a"), "has() must not protect an entry from eviction");
        assert!(store.has("b"));
        assert_eq!(store.stats().operations.gets, 0);
    }

    #[test]
    fn test_store_has_does_not_slide_ttl() {
        let config = CacheConfig::default()
            .with_default_ttl(Duration::from_millis(100))
            .with_sliding_expiration(true);
        let mut store = CacheStore::new(&config);
        store.set("k".to_string(), Arc::new(0u8), None);

        sleep(Duration::from_millis(50));
        assert!(store.has("k"));
        sleep(Duration::from_millis(70));

        assert!(!store.has("k"));
    }

    #[test]
    fn test_store_overwrite_at_capacity_does_not_evict() {
        let mut store = store(2);

        put(&mut store, "a", "1");
        put(&mut store, "b", "2");
        put(&mut store, "a", "3");

        assert_eq!(store.size(), 2);
        assert_eq!(store.stats().evictions, 0);
        assert_eq!(store.keys(), vec!["a", "b"]);
    }

    #[test]
    fn test_store_unbounded() {
        let mut store = store(0);
        for i in 0..500 {
            put(&mut store, &format!("k{i}"), "v");
        }
        assert_eq!(store.size(), 500);
    }

    #[test]
    fn test_store_keys_in_recency_order() {
        let mut store = store(10);
        put(&mut store, "a", "1");
        put(&mut store, "b", "2");
        put(&mut store, "c", "3");
        store.get("a");

        assert_eq!(store.keys(), vec!["a", "c", "b"]);
    }

    #[test]
    fn test_store_clear_keeps_stats() {
        let mut store = store(10);
        put(&mut store, "a", "1");
        store.get("a");
        store.get("missing");

        store.clear();

        assert_eq!(store.size(), 0);
        let stats = store.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.operations.clears, 1);

        // Recency tracking restarts cleanly
        put(&mut store, "b", "2");
        assert_eq!(store.keys(), vec!["b"]);
    }

    #[test]
    fn test_store_stats() {
        let mut store = store(100);

        put(&mut store, "key1", "value1");
        for _ in 0..3 {
            store.get("key1").unwrap();
        }
        store.get("nope");
        store.get("nada");
        store.delete("key1");

        let stats = store.stats();
        assert_eq!(stats.hits, 3);
        assert_eq!(stats.misses, 2);
        assert!((stats.hit_rate - 0.6).abs() < f64::EPSILON);
        assert_eq!(stats.operations.gets, 5);
        assert_eq!(stats.operations.sets, 1);
        assert_eq!(stats.operations.deletes, 1);
        assert_eq!(stats.size, 0);
        assert_eq!(stats.max_size, 100);
    }

    #[test]
    fn test_store_reset_stats_keeps_entries() {
        let mut store = store(100);
        put(&mut store, "a", "1");
        store.get("a");
        store.get("b");

        store.reset_stats();

        let stats = store.stats();
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.misses, 0);
        assert_eq!(stats.operations.gets, 0);
        assert_eq!(stats.size, 1);
        assert!(store.has("a"));
    }

    #[test]
    fn test_store_memory_usage_tracks_entries() {
        let mut store = store(100);
        assert_eq!(store.memory_usage(), 0);

        put(&mut store, "short", "v");
        let one = store.memory_usage();
        put(&mut store, &"k".repeat(1_000), "v");

        assert!(one > 0);
        assert!(store.memory_usage() > one + 1_000);

        store.clear();
        assert_eq!(store.memory_usage(), 0);
    }

    #[test]
    fn test_store_purge_expired() {
        let mut store = store(100);

        store.set("key1".to_string(), Arc::new("value1".to_string()), ms(30));
        store.set("key2".to_string(), Arc::new("value2".to_string()), ms(10_000));
        store.set("key3".to_string(), Arc::new("value3".to_string()), Some(Ttl::Never));

        sleep(Duration::from_millis(60));

        assert_eq!(store.purge_expired(), 1);
        assert_eq!(store.len(), 2);
        assert!(store.get("key2").is_some());
        assert_eq!(store.stats().expirations, 1);
    }

    #[test]
    fn test_store_purge_after_sliding_read() {
        let config = CacheConfig::default()
            .with_default_ttl(Duration::from_millis(100))
            .with_sliding_expiration(true);
        let mut store = CacheStore::new(&config);
        store.set("k".to_string(), Arc::new(0u8), None);

        sleep(Duration::from_millis(50));
        store.get("k");
        sleep(Duration::from_millis(50));

        assert_eq!(store.purge_expired(), 0, "Moved deadline must be honoured by the sweep");
        sleep(Duration::from_millis(80));
        assert_eq!(store.purge_expired(), 1);
    }

    #[test]
    fn test_store_invalidate_patterns() {
        let mut store = store(100);
        for key in [
            "entries:page1:VSAM",
            "entries:page2:VSAM",
            "entries:page1:JCL",
            "filters:categories",
        ] {
            put(&mut store, key, "v");
        }

        assert_eq!(store.invalidate(&"*:page1:*".into()).unwrap(), 2);
        assert_eq!(store.keys(), vec!["filters:categories", "entries:page2:VSAM"]);

        assert_eq!(store.invalidate(&"filters:categories".into()).unwrap(), 1);
        assert_eq!(store.invalidate(&"filters:categories".into()).unwrap(), 0);

        let re = InvalidationPattern::regex("VSAM$").unwrap();
        assert_eq!(store.invalidate(&re).unwrap(), 1);
        assert!(store.is_empty());

        let stats = store.stats();
        assert_eq!(stats.operations.invalidations, 4);
        assert_eq!(stats.invalidated, 4);
        assert_eq!(stats.operations.deletes, 0);
    }

    #[test]
    fn test_store_corrupted_entry_is_a_miss() {
        let mut store = store(100);
        put(&mut store, "a", "1");
        put(&mut store, "b", "2");

        store.corrupt("a");

        assert!(store.get("a").is_none());
        assert_eq!(store.stats().misses, 1);
        assert_eq!(store.size(), 1);
        assert!(store.get("b").is_some());

        put(&mut store, "a", "3");
        assert_eq!(*store.get("a").unwrap(), "3");
    }

    #[test]
    fn test_store_large_key() {
        let mut store = store(100);
        let key = "x".repeat(64 * 1024);

        put(&mut store, &key, "value");
        assert!(store.has(&key));
    }
}
