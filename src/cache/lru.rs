//! LRU Tracker Module
//!
//! Tracks access order of live keys for LRU eviction.

use std::collections::{BTreeMap, HashMap};

// == LRU Tracker ==
/// Tracks access order for LRU eviction strategy.
///
/// Every touch stamps the key with a fresh, strictly increasing tick:
/// - Head (lowest tick) = Least recently used
/// - Tail (highest tick) = Most recently used
///
/// Touch, remove and finding the oldest key are all O(log n).
#[derive(Debug, Default)]
pub struct LruTracker {
    /// Key -> tick of its latest touch
    ticks: HashMap<String, u64>,
    /// Tick -> key, in access order
    order: BTreeMap<u64, String>,
    /// Next tick to hand out
    next_tick: u64,
}

impl LruTracker {
    // == Constructor ==
    /// Creates a new empty LRU tracker.
    pub fn new() -> Self {
        Self::default()
    }

    // == Touch ==
    /// Marks a key as most recently used (moves it to the tail).
    pub fn touch(&mut self, key: &str) {
        let tick = self.next_tick;
        self.next_tick += 1;

        match self.ticks.get_mut(key) {
            Some(old) => {
                if let Some(k) = self.order.remove(&*old) {
                    self.order.insert(tick, k);
                }
                *old = tick;
            }
            None => {
                self.ticks.insert(key.to_string(), tick);
                self.order.insert(tick, key.to_string());
            }
        }
    }

    // == Remove ==
    /// Removes a key from the tracker.
    pub fn remove(&mut self, key: &str) {
        if let Some(tick) = self.ticks.remove(key) {
            self.order.remove(&tick);
        }
    }

    // == Peek Oldest ==
    /// Returns the least recently used key without removing it.
    pub fn peek_oldest(&self) -> Option<&String> {
        self.order.values().next()
    }

    // == Iterate ==
    /// Iterates keys from least to most recently used.
    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.order.values()
    }

    pub fn clear(&mut self) {
        self.ticks.clear();
        self.order.clear();
    }

    // == Length ==
    /// Returns the number of tracked keys.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
