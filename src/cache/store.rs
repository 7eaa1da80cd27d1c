//! Entry Store Module
//!
//! Authoritative key -> entry mapping combining HashMap storage with access
//! order tracking, memory accounting and bounded eviction.

use std::collections::HashMap;

use serde::Serialize;
use tracing::debug;

use crate::cache::eviction::{select_memory_victim, select_victim};
use crate::cache::size::estimate_size;
use crate::cache::{CacheEntry, LruTracker};
use crate::config::{CacheConfig, OversizePolicy};
use crate::error::{CacheError, Result};

// == Entry Store ==
/// Cache storage with pluggable eviction and TTL support.
#[derive(Debug)]
pub struct EntryStore<V> {
    /// Key-value storage
    entries: HashMap<String, CacheEntry<V>>,
    /// Access order tracker
    lru: LruTracker,
    /// Sum of `estimated_size_bytes` over all entries
    memory_usage: u64,
    /// Next insertion sequence number
    next_seq: u64,
}

impl<V> Default for EntryStore<V> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
            lru: LruTracker::new(),
            memory_usage: 0,
            next_seq: 0,
        }
    }
}

impl<V> EntryStore<V> {
    // == Constructor ==
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    // == Insert ==
    /// Stores a value, evicting entries first if a bound would be exceeded.
    ///
    /// An existing entry under the same key is replaced outright: the new
    /// entry gets fresh timestamps, TTL and size, and an access count of 1.
    ///
    /// Returns the number of entries evicted to make room. Expired entries
    /// are purged first and do not count. With `max_entries` of zero
    /// nothing is stored.
    ///
    /// # Errors
    /// `EntryTooLarge` when the value alone exceeds `max_memory_bytes` and
    /// the config asks for [`OversizePolicy::Reject`]. The store is untouched.
    pub fn insert(&mut self, key: String, value: V, config: &CacheConfig) -> Result<usize>
    where
        V: Serialize,
    {
        let size = estimate_size(&value);

        if let (Some(limit), OversizePolicy::Reject) = (config.max_memory_bytes, config.oversize) {
            if size > limit {
                return Err(CacheError::EntryTooLarge { key, size, limit });
            }
        }

        self.remove(&key);

        // Expired entries go before any live entry is considered as a victim
        let over_count = config
            .max_entries
            .is_some_and(|max_entries| self.entries.len() >= max_entries);
        let over_memory = config
            .max_memory_bytes
            .is_some_and(|limit| self.memory_usage + size > limit);
        if over_count || over_memory {
            let purged = self.purge_expired();
            if purged > 0 {
                debug!("Purged {} expired entries before evicting", purged);
            }
        }

        let mut evicted = 0;

        // Count bound: make room for exactly one more entry
        if let Some(max_entries) = config.max_entries {
            while self.entries.len() >= max_entries {
                let Some(victim) = select_victim(config.eviction_policy, &self.entries, &self.lru)
                else {
                    break;
                };
                debug!("Evicting {} ({:?}, entry bound {})", victim, config.eviction_policy, max_entries);
                self.remove(&victim);
                evicted += 1;
            }
            if max_entries == 0 {
                debug!("Not storing {}, entry bound is zero", key);
                return Ok(evicted);
            }
        }

        // Memory bound: free oldest-first until the new entry fits or nothing is left
        if let Some(limit) = config.max_memory_bytes {
            while self.memory_usage + size > limit {
                let Some(victim) = select_memory_victim(&self.lru) else {
                    break;
                };
                debug!("Evicting {} (memory bound {} bytes)", victim, limit);
                self.remove(&victim);
                evicted += 1;
            }
        }

        let seq = self.next_seq;
        self.next_seq += 1;

        self.lru.touch(&key);
        self.entries
            .insert(key, CacheEntry::new(value, config.ttl, size, seq));
        self.memory_usage += size;

        Ok(evicted)
    }

    // == Lookup ==
    /// Retrieves a value by key, recording the access.
    ///
    /// An expired entry is removed and reported as absent; its access
    /// bookkeeping is left untouched.
    pub fn lookup(&mut self, key: &str) -> Option<V>
    where
        V: Clone,
    {
        if self.remove_if_expired(key) {
            return None;
        }

        let entry = self.entries.get_mut(key)?;
        entry.record_access();
        self.lru.touch(key);
        Some(entry.value.clone())
    }

    // == Contains ==
    /// Checks for a live entry without recording an access.
    ///
    /// Removes the entry if it has expired.
    pub fn contains(&mut self, key: &str) -> bool {
        !self.remove_if_expired(key) && self.entries.contains_key(key)
    }

    /// Returns the entry without touching it, expired or not.
    pub fn peek(&self, key: &str) -> Option<&CacheEntry<V>> {
        self.entries.get(key)
    }

    // == Remove ==
    /// Removes an entry by key. Returns whether an entry was present.
    pub fn remove(&mut self, key: &str) -> bool {
        match self.entries.remove(key) {
            Some(entry) => {
                self.lru.remove(key);
                self.memory_usage -= entry.estimated_size_bytes;
                true
            }
            None => false,
        }
    }

    /// Removes every entry whose key satisfies `predicate`.
    ///
    /// Returns the removed keys.
    pub fn remove_where<P>(&mut self, mut predicate: P) -> Vec<String>
    where
        P: FnMut(&str) -> bool,
    {
        let keys: Vec<String> = self
            .entries
            .keys()
            .filter(|key| predicate(key))
            .cloned()
            .collect();

        for key in &keys {
            self.remove(key);
        }
        keys
    }

    // == Clear ==
    /// Removes all entries.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.lru.clear();
        self.memory_usage = 0;
    }

    // == Cleanup Expired ==
    /// Removes all expired entries from the store.
    ///
    /// Returns the number of entries removed.
    pub fn purge_expired(&mut self) -> usize {
        let now = tokio::time::Instant::now();
        let expired: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired_at(now))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            self.remove(key);
        }
        expired.len()
    }

    // == Iterate ==
    /// Iterates entries from least to most recently used, expired ones included.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &CacheEntry<V>)> {
        self.lru
            .iter()
            .filter_map(|key| self.entries.get_key_value(key))
    }

    // == Length ==
    /// Returns the current number of entries, expired ones included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the total estimated size of stored entries.
    pub fn memory_usage(&self) -> u64 {
        self.memory_usage
    }

    fn remove_if_expired(&mut self, key: &str) -> bool {
        let expired = self
            .entries
            .get(key)
            .is_some_and(|entry| entry.is_expired());
        if expired {
            debug!("Entry {} expired", key);
            self.remove(key);
        }
        expired
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EvictionPolicy;
    use std::time::Duration;

    fn config(max_entries: Option<usize>, max_memory_bytes: Option<u64>) -> CacheConfig {
        CacheConfig {
            ttl: Duration::from_secs(300),
            max_entries,
            max_memory_bytes,
            eviction_policy: EvictionPolicy::Lru,
            oversize: OversizePolicy::Admit,
        }
    }

    fn set(store: &mut EntryStore<String>, key: &str, value: &str, config: &CacheConfig) -> usize {
        store
            .insert(key.to_string(), value.to_string(), config)
            .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_insert_and_lookup() {
        let mut store = EntryStore::new();
        let cfg = config(None, None);

        set(&mut store, "key1", "value1", &cfg);

        assert_eq!(store.lookup("key1"), Some("value1".to_string()));
        assert_eq!(store.len(), 1);
        assert_eq!(store.peek("key1").unwrap().access_count, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_lookup_nonexistent() {
        let mut store: EntryStore<String> = EntryStore::new();
        assert_eq!(store.lookup("nonexistent"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_remove() {
        let mut store = EntryStore::new();
        let cfg = config(None, None);

        set(&mut store, "key1", "value1", &cfg);

        assert!(store.remove("key1"));
        assert!(!store.remove("key1"));
        assert!(store.is_empty());
        assert_eq!(store.memory_usage(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_overwrite_resets_entry() {
        let mut store = EntryStore::new();
        let cfg = config(None, None);

        set(&mut store, "key1", "v1", &cfg);
        store.lookup("key1");
        store.lookup("key1");
        set(&mut store, "key1", "value2", &cfg);

        let entry = store.peek("key1").unwrap();
        assert_eq!(entry.value, "value2");
        assert_eq!(entry.access_count, 1);
        assert_eq!(store.len(), 1);
        // "value2" encodes to 8 bytes
        assert_eq!(store.memory_usage(), 8);
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_ttl_expiration() {
        let mut store = EntryStore::new();
        let cfg = CacheConfig {
            ttl: Duration::from_secs(1),
            ..config(None, None)
        };

        set(&mut store, "key1", "value1", &cfg);
        assert!(store.contains("key1"));

        tokio::time::advance(Duration::from_millis(1100)).await;

        assert!(!store.contains("key1"));
        assert_eq!(store.len(), 0, "expired entry should be removed on access");
        assert_eq!(store.lookup("key1"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_lookup_does_not_touch_expired_entry() {
        let mut store = EntryStore::new();
        let cfg = CacheConfig {
            ttl: Duration::from_secs(1),
            ..config(None, None)
        };

        set(&mut store, "key1", "value1", &cfg);
        tokio::time::advance(Duration::from_secs(2)).await;

        assert_eq!(store.lookup("key1"), None);
        assert!(store.peek("key1").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_count_eviction() {
        let mut store = EntryStore::new();
        let cfg = config(Some(3), None);

        set(&mut store, "key1", "value1", &cfg);
        set(&mut store, "key2", "value2", &cfg);
        set(&mut store, "key3", "value3", &cfg);

        // Cache is full, adding key4 should evict key1 (oldest)
        assert_eq!(set(&mut store, "key4", "value4", &cfg), 1);

        assert_eq!(store.len(), 3);
        assert!(!store.contains("key1"));
        assert!(store.contains("key2"));
        assert!(store.contains("key4"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_overwrite_at_capacity_does_not_evict() {
        let mut store = EntryStore::new();
        let cfg = config(Some(2), None);

        set(&mut store, "a", "1", &cfg);
        set(&mut store, "b", "2", &cfg);

        assert_eq!(set(&mut store, "a", "3", &cfg), 0);
        assert!(store.contains("a"));
        assert!(store.contains("b"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_shrunk_bound_evicts_down() {
        let mut store = EntryStore::new();
        let wide = config(Some(10), None);
        for key in ["a", "b", "c", "d"] {
            set(&mut store, key, "v", &wide);
        }

        let narrow = config(Some(2), None);
        assert_eq!(set(&mut store, "e", "v", &narrow), 3);
        assert_eq!(store.len(), 2);
        assert!(store.contains("d"));
        assert!(store.contains("e"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_memory_eviction() {
        let mut store = EntryStore::new();
        // Each 8-char value encodes to 10 bytes
        let cfg = config(None, Some(25));

        set(&mut store, "a", "aaaaaaaa", &cfg);
        set(&mut store, "b", "bbbbbbbb", &cfg);
        assert_eq!(store.memory_usage(), 20);

        assert_eq!(set(&mut store, "c", "cccccccc", &cfg), 1);
        assert!(!store.contains("a"));
        assert_eq!(store.memory_usage(), 20);
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_memory_eviction_ignores_policy() {
        let mut store = EntryStore::new();
        let cfg = CacheConfig {
            eviction_policy: EvictionPolicy::Lfu,
            ..config(None, Some(25))
        };

        set(&mut store, "a", "aaaaaaaa", &cfg);
        set(&mut store, "b", "bbbbbbbb", &cfg);
        // b is used more, but a is more recently touched
        store.lookup("b");
        store.lookup("b");
        store.lookup("a");

        set(&mut store, "c", "cccccccc", &cfg);
        assert!(store.contains("a"));
        assert!(!store.contains("b"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_oversized_entry_admitted() {
        let mut store = EntryStore::new();
        let cfg = config(None, Some(25));

        set(&mut store, "a", "aaaaaaaa", &cfg);
        let evicted = set(&mut store, "big", &"x".repeat(100), &cfg);

        assert_eq!(evicted, 1);
        assert_eq!(store.len(), 1);
        assert!(store.contains("big"));
        assert_eq!(store.memory_usage(), 102);
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_oversized_entry_rejected() {
        let mut store = EntryStore::new();
        let cfg = CacheConfig {
            oversize: OversizePolicy::Reject,
            ..config(None, Some(25))
        };

        set(&mut store, "a", "aaaaaaaa", &cfg);
        let result = store.insert("big".to_string(), "x".repeat(100), &cfg);

        assert!(matches!(
            result,
            Err(CacheError::EntryTooLarge { size: 102, limit: 25, .. })
        ));
        assert!(store.contains("a"));
        assert!(!store.contains("big"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_remove_where() {
        let mut store = EntryStore::new();
        let cfg = config(None, None);

        set(&mut store, "thumbnail:doc1", "t", &cfg);
        set(&mut store, "metadata:doc1", "m", &cfg);
        set(&mut store, "thumbnail:doc2", "t", &cfg);

        let mut removed = store.remove_where(|key| key.ends_with(":doc1"));
        removed.sort();

        assert_eq!(removed, vec!["metadata:doc1", "thumbnail:doc1"]);
        assert_eq!(store.len(), 1);
        assert_eq!(store.memory_usage(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_purge_expired() {
        let mut store = EntryStore::new();
        let short = CacheConfig {
            ttl: Duration::from_secs(1),
            ..config(None, None)
        };
        let long = CacheConfig {
            ttl: Duration::from_secs(10),
            ..config(None, None)
        };

        set(&mut store, "key1", "value1", &short);
        set(&mut store, "key2", "value2", &long);

        tokio::time::advance(Duration::from_millis(1100)).await;

        assert_eq!(store.purge_expired(), 1);
        assert_eq!(store.len(), 1);
        assert!(store.contains("key2"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_zero_entry_bound_stores_nothing() {
        let mut store = EntryStore::new();
        let wide = config(None, None);
        set(&mut store, "a", "1", &wide);

        let zero = config(Some(0), None);
        assert_eq!(set(&mut store, "b", "2", &zero), 1);

        assert!(store.is_empty());
        assert_eq!(store.memory_usage(), 0);
        assert_eq!(set(&mut store, "c", "3", &zero), 0);
        assert!(!store.contains("c"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_count_bound_drops_expired_before_live() {
        let mut store = EntryStore::new();
        let short = CacheConfig {
            ttl: Duration::from_secs(1),
            ..config(Some(2), None)
        };
        let long = config(Some(2), None);

        // key1 is the LRU victim, but key2 has expired
        set(&mut store, "key1", "value1", &long);
        set(&mut store, "key2", "value2", &short);
        tokio::time::advance(Duration::from_secs(2)).await;

        assert_eq!(set(&mut store, "key3", "value3", &long), 0);
        assert!(store.contains("key1"));
        assert!(store.contains("key3"));
        assert_eq!(store.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_memory_bound_drops_expired_before_live() {
        let mut store = EntryStore::new();
        // Each 8-char value encodes to 10 bytes
        let short = CacheConfig {
            ttl: Duration::from_secs(1),
            ..config(None, Some(25))
        };
        let long = config(None, Some(25));

        set(&mut store, "a", "aaaaaaaa", &long);
        set(&mut store, "b", "bbbbbbbb", &short);
        tokio::time::advance(Duration::from_secs(2)).await;

        assert_eq!(set(&mut store, "c", "cccccccc", &long), 0);
        assert!(store.contains("a"));
        assert!(!store.contains("b"));
        assert_eq!(store.memory_usage(), 20);
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_iter_in_access_order() {
        let mut store = EntryStore::new();
        let cfg = config(None, None);

        set(&mut store, "a", "1", &cfg);
        set(&mut store, "b", "2", &cfg);
        store.lookup("a");

        let keys: Vec<&String> = store.iter().map(|(key, _)| key).collect();
        assert_eq!(keys, vec!["b", "a"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_clear() {
        let mut store = EntryStore::new();
        let cfg = config(None, None);

        set(&mut store, "a", "1", &cfg);
        set(&mut store, "b", "2", &cfg);
        store.clear();

        assert!(store.is_empty());
        assert_eq!(store.memory_usage(), 0);
        assert!(!store.contains("a"));
    }
}
