//! Cache Entry Module
//!
//! Defines the structure for individual cache entries with TTL and access bookkeeping.

use std::time::Duration;

use tokio::time::Instant;

// == Cache Entry ==
/// Represents a single cache entry with value and metadata.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    /// The stored value
    pub value: V,
    /// Creation time (monotonic)
    pub inserted_at: Instant,
    /// Entry-specific time-to-live
    pub ttl: Duration,
    /// Number of successful reads, starting at 1 on insertion
    pub access_count: u64,
    /// Time of the latest successful read
    pub last_accessed_at: Instant,
    /// Size computed once at insertion
    pub estimated_size_bytes: u64,
    /// Insertion sequence number, breaks ties between equal timestamps
    pub(crate) seq: u64,
}

impl<V> CacheEntry<V> {
    // == Constructor ==
    /// Creates a new cache entry stamped with the current time.
    ///
    /// # Arguments
    /// * `value` - The value to store
    /// * `ttl` - Time-to-live for this entry
    /// * `estimated_size_bytes` - Size reported by the size estimator
    /// * `seq` - Insertion sequence number
    pub fn new(value: V, ttl: Duration, estimated_size_bytes: u64, seq: u64) -> Self {
        let now = Instant::now();
        Self {
            value,
            inserted_at: now,
            ttl,
            access_count: 1,
            last_accessed_at: now,
            estimated_size_bytes,
            seq,
        }
    }

    // == Is Expired ==
    /// Checks if the entry has expired.
    ///
    /// An entry is expired once `now > inserted_at + ttl`; at exactly
    /// `inserted_at + ttl` it is still live.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Instant::now())
    }

    pub(crate) fn is_expired_at(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.inserted_at) > self.ttl
    }

    // == Record Access ==
    /// Updates access bookkeeping after a successful read.
    pub fn record_access(&mut self) {
        self.access_count += 1;
        self.last_accessed_at = Instant::now();
    }

    // == Time To Live ==
    /// Returns the remaining time-to-live, zero once expired.
    pub fn ttl_remaining(&self) -> Duration {
        self.ttl
            .saturating_sub(Instant::now().saturating_duration_since(self.inserted_at))
    }
}
