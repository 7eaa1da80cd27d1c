//! Memo Cache - An in-process TTL cache for expensive asynchronous lookups
//!
//! Provides TTL expiration, LRU/LFU/FIFO eviction, memory-bounded storage and
//! request coalescing so that concurrent misses for one key run its factory once.

pub mod cache;
pub mod config;
pub mod error;
pub mod tasks;

pub use cache::{CacheStats, EntryInfo, MemoCache, SlowKey, WarmUpItem};
pub use config::{CacheConfig, CacheOptions, EvictionPolicy, OversizePolicy, RuntimeConfig};
pub use error::{CacheError, FactoryError, Result};
pub use tasks::spawn_sweep_task;
