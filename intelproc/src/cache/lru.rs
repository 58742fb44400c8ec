// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! LRU cache bounded by total byte size rather than entry count

use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;

#[derive(Debug)]
struct LruSlot<V> {
    value: V,
    size_bytes: usize,
    last_access: u64,
}

/// Counters for a [`ByteBoundedLru`]
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LruStats {
    pub hits: u64,
    pub misses: u64,
    pub insertions: u64,
    pub evictions: u64,
    /// Inserts refused because the value alone exceeds the budget
    pub rejected: u64,
    pub entries: usize,
    pub current_bytes: usize,
}

impl LruStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// LRU map whose capacity is a byte budget.
///
/// Sizes are supplied by the caller at insertion time and are never
/// recomputed, so a value mutated after insertion keeps its original size.
#[derive(Debug)]
pub struct ByteBoundedLru<K, V> {
    entries: HashMap<K, LruSlot<V>>,
    /// access tick -> key, oldest first
    recency: BTreeMap<u64, K>,
    tick: u64,
    max_bytes: usize,
    current_bytes: usize,
    stats: LruStats,
}

impl<K: Clone + Eq + Hash, V> ByteBoundedLru<K, V> {
    pub fn new(max_bytes: usize) -> Self {
        Self {
            entries: HashMap::new(),
            recency: BTreeMap::new(),
            tick: 0,
            max_bytes,
            current_bytes: 0,
            stats: LruStats::default(),
        }
    }

    fn next_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }

    /// Look up `key`, marking it most recently used.
    pub fn get(&mut self, key: &K) -> Option<&V> {
        let tick = self.next_tick();
        match self.entries.get_mut(key) {
            Some(slot) => {
                self.recency.remove(&slot.last_access);
                slot.last_access = tick;
                self.recency.insert(tick, key.clone());
                self.stats.hits += 1;
                Some(&slot.value)
            }
            None => {
                self.stats.misses += 1;
                None
            }
        }
    }

    /// Look up `key` without touching recency or counters.
    pub fn peek(&self, key: &K) -> Option<&V> {
        self.entries.get(key).map(|slot| &slot.value)
    }

    pub fn contains(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    /// Insert `value` accounted as `size_bytes`, evicting least recently used
    /// entries until it fits. Returns false if the value is larger than the
    /// whole budget, in which case nothing is stored.
    pub fn insert(&mut self, key: K, value: V, size_bytes: usize) -> bool {
        if size_bytes > self.max_bytes {
            self.stats.rejected += 1;
            return false;
        }

        self.remove(&key);
        self.evict_until_fits(size_bytes);

        let tick = self.next_tick();
        self.recency.insert(tick, key.clone());
        self.entries.insert(
            key,
            LruSlot {
                value,
                size_bytes,
                last_access: tick,
            },
        );
        self.current_bytes += size_bytes;
        self.stats.insertions += 1;
        true
    }

    fn evict_until_fits(&mut self, incoming_size: usize) {
        while self.current_bytes + incoming_size > self.max_bytes {
            let oldest = match self.recency.iter().next() {
                Some((&tick, _)) => tick,
                None => break,
            };
            if let Some(key) = self.recency.remove(&oldest) {
                if let Some(slot) = self.entries.remove(&key) {
                    self.current_bytes = self.current_bytes.saturating_sub(slot.size_bytes);
                    self.stats.evictions += 1;
                    log::debug!(
                        "Evicted memo entry of {} bytes ({} bytes in use)",
                        slot.size_bytes,
                        self.current_bytes
                    );
                }
            }
        }
    }

    pub fn remove(&mut self, key: &K) -> Option<V> {
        let slot = self.entries.remove(key)?;
        self.recency.remove(&slot.last_access);
        self.current_bytes = self.current_bytes.saturating_sub(slot.size_bytes);
        Some(slot.value)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn current_bytes(&self) -> usize {
        self.current_bytes
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.recency.clear();
        self.current_bytes = 0;
    }

    pub fn stats(&self) -> LruStats {
        LruStats {
            entries: self.entries.len(),
            current_bytes: self.current_bytes,
            ..self.stats.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evicts_least_recently_used_by_bytes() {
        let mut lru = ByteBoundedLru::new(100);
        assert!(lru.insert("a", 1, 40));
        assert!(lru.insert("b", 2, 40));

        // touch "a" so that "b" becomes the eviction candidate
        assert_eq!(lru.get(&"a"), Some(&1));
        assert!(lru.insert("c", 3, 40));

        assert!(lru.contains(&"a"));
        assert!(!lru.contains(&"b"));
        assert!(lru.contains(&"c"));
        assert_eq!(lru.current_bytes(), 80);
        assert_eq!(lru.stats().evictions, 1);
    }

    #[test]
    fn test_rejects_oversized_values() {
        let mut lru = ByteBoundedLru::new(10);
        assert!(!lru.insert("big", 0, 11));
        assert!(lru.is_empty());
        assert_eq!(lru.stats().rejected, 1);
    }

    #[test]
    fn test_reinsert_replaces_size_accounting() {
        let mut lru = ByteBoundedLru::new(100);
        lru.insert("a", 1, 60);
        lru.insert("a", 2, 30);
        assert_eq!(lru.len(), 1);
        assert_eq!(lru.current_bytes(), 30);
        assert_eq!(lru.peek(&"a"), Some(&2));
    }

    #[test]
    fn test_remove_releases_bytes() {
        let mut lru = ByteBoundedLru::new(100);
        lru.insert("a", 1, 60);
        assert_eq!(lru.remove(&"a"), Some(1));
        assert_eq!(lru.current_bytes(), 0);
        assert_eq!(lru.remove(&"a"), None);
    }

    #[test]
    fn test_large_insert_evicts_several_entries() {
        let mut lru = ByteBoundedLru::new(100);
        for (i, key) in ["a", "b", "c", "d"].into_iter().enumerate() {
            lru.insert(key, i, 25);
        }
        lru.insert("e", 4, 70);
        assert!(!lru.contains(&"a"));
        assert!(!lru.contains(&"b"));
        assert!(!lru.contains(&"c"));
        assert!(lru.contains(&"d"));
        assert_eq!(lru.current_bytes(), 95);
    }

    #[test]
    fn test_hit_rate() {
        let mut lru = ByteBoundedLru::new(100);
        lru.insert(1, "one", 1);
        lru.get(&1);
        lru.get(&2);
        let stats = lru.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hit_rate(), 0.5);
    }
}
