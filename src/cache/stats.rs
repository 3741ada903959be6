//! Cache Statistics Module
//!
//! Tracks cache performance metrics: hits, misses, evictions, operation
//! counts and average operation latency.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

// == Operation Counts ==
/// Number of calls per public mutating or reading operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OperationCounts {
    pub gets: u64,
    pub sets: u64,
    pub deletes: u64,
    pub clears: u64,
    pub invalidations: u64,
}

// == Cache Stats ==
/// Point-in-time snapshot of cache statistics.
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    /// Number of successful cache retrievals
    pub hits: u64,
    /// Number of failed cache retrievals (key not found or expired)
    pub misses: u64,
    /// hits / (hits + misses), 0.0 before the first lookup
    pub hit_rate: f64,
    /// Current number of live entries
    pub size: usize,
    /// Configured capacity, 0 = unbounded
    pub max_size: usize,
    /// Rough estimate of bytes held by entries and bookkeeping
    pub memory_usage: usize,
    /// Number of entries evicted due to LRU policy
    pub evictions: u64,
    /// Number of entries dropped because their TTL elapsed
    pub expirations: u64,
    /// Number of entries removed by pattern invalidation
    pub invalidated: u64,
    pub operations: OperationCounts,
    pub average_get_time: Duration,
    pub average_set_time: Duration,
    /// When counting started (construction or last reset)
    pub since: DateTime<Utc>,
}

// == Stats Collector ==
/// Mutable counters owned by the store.
#[derive(Debug, Clone)]
pub struct StatsCollector {
    hits: u64,
    misses: u64,
    evictions: u64,
    expirations: u64,
    invalidated: u64,
    operations: OperationCounts,
    get_time_total: Duration,
    set_time_total: Duration,
    since: DateTime<Utc>,
}

impl Default for StatsCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl StatsCollector {
    // == Constructor ==
    /// Creates a collector with all counters at zero.
    pub fn new() -> Self {
        Self {
            hits: 0,
            misses: 0,
            evictions: 0,
            expirations: 0,
            invalidated: 0,
            operations: OperationCounts::default(),
            get_time_total: Duration::ZERO,
            set_time_total: Duration::ZERO,
            since: Utc::now(),
        }
    }

    // == Hit Rate ==
    /// Returns hits / (hits + misses), or 0.0 if no lookups have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    // == Recorders ==
    /// Records a `get` that found a live value.
    pub fn record_hit(&mut self, elapsed: Duration) {
        self.hits += 1;
        self.record_get(elapsed);
    }

    /// Records a `get` that found nothing usable.
    pub fn record_miss(&mut self, elapsed: Duration) {
        self.misses += 1;
        self.record_get(elapsed);
    }

    pub fn record_set(&mut self, elapsed: Duration) {
        self.operations.sets += 1;
        self.set_time_total += elapsed;
    }

    pub fn record_delete(&mut self) {
        self.operations.deletes += 1;
    }

    pub fn record_clear(&mut self) {
        self.operations.clears += 1;
    }

    pub fn record_eviction(&mut self) {
        self.evictions += 1;
    }

    pub fn record_expirations(&mut self, count: usize) {
        self.expirations += count as u64;
    }

    /// Records one pattern invalidation and the entries it removed.
    pub fn record_invalidation(&mut self, removed: usize) {
        self.operations.invalidations += 1;
        self.invalidated += removed as u64;
    }

    fn record_get(&mut self, elapsed: Duration) {
        self.operations.gets += 1;
        self.get_time_total += elapsed;
    }

    // == Reset ==
    /// Zeroes every counter and timing.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    // == Snapshot ==
    /// Builds a snapshot, combining counters with store-level figures.
    pub fn snapshot(&self, size: usize, max_size: usize, memory_usage: usize) -> CacheStats {
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            hit_rate: self.hit_rate(),
            size,
            max_size,
            memory_usage,
            evictions: self.evictions,
            expirations: self.expirations,
            invalidated: self.invalidated,
            operations: self.operations,
            average_get_time: average(self.get_time_total, self.operations.gets),
            average_set_time: average(self.set_time_total, self.operations.sets),
            since: self.since,
        }
    }
}

fn average(total: Duration, count: u64) -> Duration {
    if count == 0 {
        return Duration::ZERO;
    }
    let nanos = total.as_nanos() / count as u128;
    Duration::from_nanos(nanos.min(u64::MAX as u128) as u64)
}
