//! Cache Entry Module
//!
//! Defines the structure for individual cache entries with TTL support.

use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use chrono::Utc;

// == Time To Live ==
/// Lifetime of a cache entry.
///
/// A zero duration is valid and yields an entry that is expired the moment it
/// is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Ttl {
    /// The entry never expires
    Never,
    /// The entry expires this long after it was written (or last read, under
    /// sliding expiration)
    After(Duration),
}

impl Ttl {
    /// Builds a TTL from a signed millisecond count.
    ///
    /// Zero and negative values map to an immediate expiry.
    pub fn from_millis(ms: i64) -> Self {
        if ms <= 0 {
            Ttl::After(Duration::ZERO)
        } else {
            Ttl::After(Duration::from_millis(ms as u64))
        }
    }

    /// Returns true if entries written with this TTL are never observable.
    pub fn is_immediate(&self) -> bool {
        matches!(self, Ttl::After(d) if d.is_zero())
    }

    /// Computes the deadline (Unix milliseconds) for an entry stamped at `now`.
    ///
    /// Sub-millisecond durations round up to one millisecond so that only a
    /// true zero expires on write.
    pub fn deadline_from(&self, now: u64) -> Option<u64> {
        match self {
            Ttl::Never => None,
            Ttl::After(d) => {
                let mut ms = d.as_millis().min(u64::MAX as u128) as u64;
                if ms == 0 && !d.is_zero() {
                    ms = 1;
                }
                Some(now.saturating_add(ms))
            }
        }
    }
}

impl From<Duration> for Ttl {
    fn from(d: Duration) -> Self {
        Ttl::After(d)
    }
}

// == Cache Entry ==
/// Represents a single cache entry with value and metadata.
///
/// The value is held behind an `Arc` and handed back by reference, so any
/// payload (including `None`, `()` or a self-referencing graph) round-trips
/// without being copied.
#[derive(Debug)]
pub struct CacheEntry<V> {
    /// The stored value
    pub value: Arc<V>,
    /// Creation timestamp (Unix milliseconds)
    pub created_at: u64,
    /// Last successful read (Unix milliseconds); starts at `created_at`
    pub last_accessed_at: u64,
    /// Lifetime the entry was written with
    pub ttl: Ttl,
    /// Expiration timestamp (Unix milliseconds), None = no expiration
    pub expires_at: Option<u64>,
}

impl<V> CacheEntry<V> {
    // == Constructor ==
    /// Creates a new cache entry stamped with the current time.
    pub fn new(value: Arc<V>, ttl: Ttl) -> Self {
        Self::new_at(value, ttl, current_timestamp_ms())
    }

    /// Creates a new cache entry stamped with `now`.
    pub fn new_at(value: Arc<V>, ttl: Ttl, now: u64) -> Self {
        Self {
            value,
            created_at: now,
            last_accessed_at: now,
            ttl,
            expires_at: ttl.deadline_from(now),
        }
    }

    // == Is Expired ==
    /// Checks if the entry has expired.
    ///
    /// An entry is expired once the current time reaches its expiration time,
    /// so a zero TTL is expired as soon as it is written.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(current_timestamp_ms())
    }

    /// Checks expiry against an explicit clock reading.
    pub fn is_expired_at(&self, now: u64) -> bool {
        match self.expires_at {
            Some(expires) => now >= expires,
            None => false,
        }
    }

    // == Touch ==
    /// Records a successful read at `now`.
    ///
    /// With `sliding` set the deadline moves to `now + ttl`.
    pub fn touch(&mut self, now: u64, sliding: bool) {
        self.last_accessed_at = now;
        if sliding {
            self.expires_at = self.ttl.deadline_from(now);
        }
    }

    // == Time To Live ==
    /// Returns remaining TTL in milliseconds, or None if no expiration is set.
    ///
    /// # Returns
    /// - `Some(0)` if the entry has expired (TTL elapsed)
    /// - `Some(remaining_ms)` if the entry has TTL and hasn't expired
    /// - `None` if the entry has no TTL (never expires)
    pub fn ttl_remaining_ms(&self, now: u64) -> Option<u64> {
        self.expires_at.map(|expires| expires.saturating_sub(now))
    }
}

// == Utility Functions ==
/// Returns the current time in Unix milliseconds.
///
/// The wall clock is read once; later readings add monotonic elapsed time to
/// it, so deadlines are unaffected by system clock adjustments.
pub fn current_timestamp_ms() -> u64 {
    static ANCHOR: OnceLock<(Instant, u64)> = OnceLock::new();

    let (started, wall_ms) =
        *ANCHOR.get_or_init(|| (Instant::now(), Utc::now().timestamp_millis().max(0) as u64));
    let elapsed_ms = started.elapsed().as_millis().min(u64::MAX as u128) as u64;
    wall_ms.saturating_add(elapsed_ms)
}
