//! Cache Statistics Module
//!
//! Tracks cache performance metrics including hits, misses, evictions and
//! slow accesses.

use std::collections::HashMap;
use std::time::Duration;

use serde::Serialize;

/// Any single access slower than this counts as slow
pub const SLOW_ACCESS_THRESHOLD: Duration = Duration::from_millis(100);
/// Number of slow keys reported in a snapshot
pub const TOP_SLOW_KEYS: usize = 10;
/// Maximum number of keys tracked in the slow-access table
pub const SLOW_KEY_CAPACITY: usize = 100;

// == Slow Key ==
/// A key and how many of its accesses crossed the slow threshold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlowKey {
    pub key: String,
    pub slow_accesses: u64,
}

// == Cache Stats ==
/// Point-in-time snapshot of cache performance metrics.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CacheStats {
    /// Number of reads served from the store
    pub hits: u64,
    /// Number of reads that found no live entry
    pub misses: u64,
    /// Number of entries removed to satisfy a capacity bound
    pub evictions: u64,
    /// Current number of live entries
    pub size: usize,
    /// Total estimated size of live entries
    pub memory_usage_bytes: u64,
    /// hits / (hits + misses), 0.0 when no requests have been made
    pub hit_rate: f64,
    /// Running average latency of `get` calls in milliseconds
    pub average_access_ms: f64,
    /// Keys with the most slow accesses, most frequent first
    pub slow_keys: Vec<SlowKey>,
}

// == Stats Collector ==
/// Accumulates counters; [`StatsCollector::snapshot`] turns them into [`CacheStats`].
#[derive(Debug, Default)]
pub struct StatsCollector {
    hits: u64,
    misses: u64,
    evictions: u64,
    access_count: u64,
    total_access_time: Duration,
    slow_accesses: HashMap<String, u64>,
}

impl StatsCollector {
    // == Constructor ==
    /// Creates a new collector with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    // == Record Hit ==
    /// Increments the hit counter.
    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    // == Record Miss ==
    /// Increments the miss counter.
    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    // == Record Eviction ==
    /// Increments the eviction counter.
    pub fn record_eviction(&mut self) {
        self.evictions += 1;
    }

    // == Record Access Time ==
    /// Folds one access latency into the running average and the slow-key table.
    pub fn record_access_time(&mut self, key: &str, elapsed: Duration) {
        self.access_count += 1;
        self.total_access_time += elapsed;

        if elapsed <= SLOW_ACCESS_THRESHOLD {
            return;
        }

        if let Some(count) = self.slow_accesses.get_mut(key) {
            *count += 1;
            return;
        }

        if self.slow_accesses.len() >= SLOW_KEY_CAPACITY {
            // Make room by dropping the least slow key
            let coldest = self
                .slow_accesses
                .iter()
                .min_by(|a, b| a.1.cmp(b.1).then_with(|| b.0.cmp(a.0)))
                .map(|(k, _)| k.clone());
            if let Some(coldest) = coldest {
                self.slow_accesses.remove(&coldest);
            }
        }
        self.slow_accesses.insert(key.to_string(), 1);
    }

    // == Hit Rate ==
    /// Calculates the cache hit rate from the current totals.
    ///
    /// Returns hits / (hits + misses), or 0.0 if no requests have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    pub fn average_access_ms(&self) -> f64 {
        if self.access_count == 0 {
            0.0
        } else {
            self.total_access_time.as_secs_f64() * 1000.0 / self.access_count as f64
        }
    }

    /// Returns the slowest keys, most slow accesses first, ties by key.
    pub fn top_slow_keys(&self, n: usize) -> Vec<SlowKey> {
        let mut keys: Vec<SlowKey> = self
            .slow_accesses
            .iter()
            .map(|(key, count)| SlowKey {
                key: key.clone(),
                slow_accesses: *count,
            })
            .collect();
        keys.sort_by(|a, b| {
            b.slow_accesses
                .cmp(&a.slow_accesses)
                .then_with(|| a.key.cmp(&b.key))
        });
        keys.truncate(n);
        keys
    }

    // == Snapshot ==
    /// Builds a stats snapshot for a store holding `size` entries.
    pub fn snapshot(&self, size: usize, memory_usage_bytes: u64) -> CacheStats {
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            evictions: self.evictions,
            size,
            memory_usage_bytes,
            hit_rate: self.hit_rate(),
            average_access_ms: self.average_access_ms(),
            slow_keys: self.top_slow_keys(TOP_SLOW_KEYS),
        }
    }
}
