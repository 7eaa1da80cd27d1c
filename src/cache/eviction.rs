//! Eviction Module
//!
//! Picks victim entries according to the configured eviction policy.
//!
//! LRU reads the head of the access order tracker. LFU and FIFO scan every
//! live entry, so they cost O(n) per eviction.

use std::collections::HashMap;

use crate::cache::{CacheEntry, LruTracker};
use crate::config::EvictionPolicy;

// == Select Victim ==
/// Chooses the key to evict under `policy`, or None if nothing is evictable.
///
/// Candidates are scanned from least to most recently used, so whenever two
/// entries tie on the policy's criteria the less recently used one loses.
/// - LRU: head of the access order
/// - LFU: lowest `access_count`, then earliest `last_accessed_at`
/// - FIFO: earliest `inserted_at`, then insertion sequence
pub fn select_victim<V>(
    policy: EvictionPolicy,
    entries: &HashMap<String, CacheEntry<V>>,
    order: &LruTracker,
) -> Option<String> {
    let candidates = order
        .iter()
        .filter_map(|key| entries.get(key).map(|entry| (key, entry)));

    let victim = match policy {
        EvictionPolicy::Lru => order.peek_oldest(),
        EvictionPolicy::Lfu => candidates
            .min_by_key(|(_, entry)| (entry.access_count, entry.last_accessed_at))
            .map(|(key, _)| key),
        EvictionPolicy::Fifo => candidates
            .min_by_key(|(_, entry)| (entry.inserted_at, entry.seq))
            .map(|(key, _)| key),
    };

    victim.cloned()
}

// == Select Memory Victim ==
/// Chooses the key to evict when freeing memory.
///
/// Memory is a hard limit, so this always follows access order regardless of
/// the configured policy.
pub fn select_memory_victim(order: &LruTracker) -> Option<String> {
    order.peek_oldest().cloned()
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn setup(keys: &[&str]) -> (HashMap<String, CacheEntry<()>>, LruTracker) {
        let mut entries = HashMap::new();
        let mut order = LruTracker::new();
        for (seq, key) in keys.iter().enumerate() {
            entries.insert(
                key.to_string(),
                CacheEntry::new((), Duration::from_secs(60), 0, seq as u64),
            );
            order.touch(key);
        }
        (entries, order)
    }

    fn read(entries: &mut HashMap<String, CacheEntry<()>>, order: &mut LruTracker, key: &str) {
        entries.get_mut(key).unwrap().record_access();
        order.touch(key);
    }

    #[tokio::test(start_paused = true)]
    async fn test_lru_picks_least_recently_touched() {
        let (mut entries, mut order) = setup(&["a", "b", "c"]);
        read(&mut entries, &mut order, "a");

        let victim = select_victim(EvictionPolicy::Lru, &entries, &order);
        assert_eq!(victim.as_deref(), Some("b"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_lfu_picks_least_frequently_used() {
        let (mut entries, mut order) = setup(&["a", "b"]);
        for _ in 0..5 {
            read(&mut entries, &mut order, "a");
        }
        read(&mut entries, &mut order, "b");

        // b was read last, but a has far more reads
        let victim = select_victim(EvictionPolicy::Lfu, &entries, &order);
        assert_eq!(victim.as_deref(), Some("b"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_lfu_tie_breaks_on_last_access() {
        let (mut entries, mut order) = setup(&["a", "b"]);
        tokio::time::advance(Duration::from_millis(10)).await;
        read(&mut entries, &mut order, "b");
        tokio::time::advance(Duration::from_millis(10)).await;
        read(&mut entries, &mut order, "a");

        // Both read twice, b longer ago
        let victim = select_victim(EvictionPolicy::Lfu, &entries, &order);
        assert_eq!(victim.as_deref(), Some("b"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_lfu_full_tie_falls_back_to_access_order() {
        let (entries, order) = setup(&["a", "b", "c"]);

        let victim = select_victim(EvictionPolicy::Lfu, &entries, &order);
        assert_eq!(victim.as_deref(), Some("a"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fifo_ignores_access_pattern() {
        let (mut entries, mut order) = setup(&["a", "b", "c"]);
        for _ in 0..3 {
            read(&mut entries, &mut order, "a");
        }

        let victim = select_victim(EvictionPolicy::Fifo, &entries, &order);
        assert_eq!(victim.as_deref(), Some("a"));
    }

    #[test]
    fn test_no_victim_when_empty() {
        let entries: HashMap<String, CacheEntry<()>> = HashMap::new();
        let order = LruTracker::new();

        for policy in [EvictionPolicy::Lru, EvictionPolicy::Lfu, EvictionPolicy::Fifo] {
            assert_eq!(select_victim(policy, &entries, &order), None);
        }
        assert_eq!(select_memory_victim(&order), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_memory_victim_follows_access_order() {
        let (mut entries, mut order) = setup(&["a", "b"]);
        read(&mut entries, &mut order, "a");

        assert_eq!(select_memory_victim(&order).as_deref(), Some("b"));
    }
}
