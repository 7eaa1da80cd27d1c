//! Cache Module
//!
//! Provides in-memory caching with TTL expiration, pluggable eviction,
//! memory accounting and request coalescing.

mod coalescer;
mod entry;
mod eviction;
mod lru;
mod memo;
mod size;
mod stats;
mod store;


// Re-export public types
pub use coalescer::{RequestCoalescer, SharedComputation};
pub use entry::CacheEntry;
pub use eviction::{select_memory_victim, select_victim};
pub use lru::LruTracker;
pub use memo::{EntryInfo, MemoCache, WarmUpItem, PREFETCH_BATCH_SIZE};
pub use size::estimate_size;
pub use stats::{CacheStats, SlowKey, StatsCollector, SLOW_ACCESS_THRESHOLD, TOP_SLOW_KEYS};
pub use store::EntryStore;
