// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Keyed cache with a byte-bounded memo of non-destructive reads

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use super::lru::{ByteBoundedLru, LruStats};
use super::CacheValue;

static NEXT_GENERATION: AtomicU64 = AtomicU64::new(1);

/// Identity fixed when a cache is constructed.
///
/// Two caches never share an identity, even when created within the same
/// clock tick, so memoized reads of one are never served by the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheIdentity {
    pub created_at: DateTime<Utc>,
    pub generation: u64,
}

impl CacheIdentity {
    fn fresh() -> Self {
        Self {
            created_at: Utc::now(),
            generation: NEXT_GENERATION.fetch_add(1, Ordering::Relaxed),
        }
    }
}

/// Memo key: the cache key qualified by the owning cache's identity and type
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MemoKey<K> {
    pub key: K,
    pub identity: CacheIdentity,
    pub cache_type: &'static str,
}

/// Memo that may be shared between several caches of the same value type
pub type SharedMemo<K, V> = Arc<Mutex<ByteBoundedLru<MemoKey<K>, Arc<V>>>>;

pub fn new_shared_memo<K: Clone + Eq + Hash, V>(max_bytes: usize) -> SharedMemo<K, V> {
    Arc::new(Mutex::new(ByteBoundedLru::new(max_bytes)))
}

/// Authoritative key -> value map plus a memo of `get_without_modifying`.
///
/// Values are immutable once added. To change one, check it out with
/// [`pop`](Self::pop) (or [`with_checked_out`](Self::with_checked_out)),
/// mutate it and add it back; the memo sizes values only when they are
/// memoized.
#[derive(Debug)]
pub struct IntelligenceProcessorCache<K, V> {
    entries: HashMap<K, Arc<V>>,
    identity: CacheIdentity,
    cache_type: &'static str,
    memo: SharedMemo<K, V>,
}

impl<K, V> IntelligenceProcessorCache<K, V>
where
    K: Debug + Clone + Eq + Hash,
    V: CacheValue,
{
    /// Create a cache with a private memo of `memo_max_bytes`.
    pub fn new(cache_type: &'static str, memo_max_bytes: usize) -> Self {
        Self::with_shared_memo(cache_type, new_shared_memo(memo_max_bytes))
    }

    /// Create a cache whose memo is shared with other caches.
    pub fn with_shared_memo(cache_type: &'static str, memo: SharedMemo<K, V>) -> Self {
        Self {
            entries: HashMap::new(),
            identity: CacheIdentity::fresh(),
            cache_type,
            memo,
        }
    }

    fn memo_key(&self, key: &K) -> MemoKey<K> {
        MemoKey {
            key: key.clone(),
            identity: self.identity,
            cache_type: self.cache_type,
        }
    }

    /// Read a value without removing it. Present values are memoized;
    /// misses are not.
    pub fn get_without_modifying(&self, key: &K) -> Option<Arc<V>> {
        let memo_key = self.memo_key(key);
        if let Some(value) = self.memo.lock().get(&memo_key) {
            log::debug!("Memo hit in {} for {:?}", self.cache_type, key);
            return Some(Arc::clone(value));
        }

        let value = Arc::clone(self.entries.get(key)?);
        let size_bytes = value.size_bytes();
        if !self
            .memo
            .lock()
            .insert(memo_key, Arc::clone(&value), size_bytes)
        {
            log::debug!(
                "Value of {} bytes in {} exceeds the memo budget; serving without memoizing",
                size_bytes,
                self.cache_type
            );
        }
        Some(value)
    }

    /// Remove and return the value for `key` from both the map and the memo.
    pub fn pop(&mut self, key: &K) -> Option<V> {
        self.memo.lock().remove(&self.memo_key(key));
        self.entries.remove(key).map(Arc::unwrap_or_clone)
    }

    /// Insert or replace the value for `key`. The memo is left untouched.
    pub fn add(&mut self, key: K, value: V) {
        self.entries.insert(key, Arc::new(value));
    }

    /// Delete `key` from the map and the memo. Returns whether it was present.
    pub fn remove(&mut self, key: &K) -> bool {
        self.memo.lock().remove(&self.memo_key(key));
        self.entries.remove(key).is_some()
    }

    pub fn contains(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    /// Check out the value for `key` (built with `init` when absent), apply
    /// `f` to it and check it back in. The value is re-added on every exit
    /// path, including a panic inside `f`.
    pub fn with_checked_out<R>(
        &mut self,
        key: &K,
        init: impl FnOnce() -> V,
        f: impl FnOnce(&mut V) -> R,
    ) -> R {
        let value = self.pop(key).unwrap_or_else(init);
        let mut guard = CheckOut {
            cache: self,
            key: Some(key.clone()),
            value: None,
        };
        f(guard.value.insert(value))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.entries.keys()
    }

    /// Remove every entry whose key matches `predicate`. Returns the count.
    pub fn remove_matching(&mut self, predicate: impl Fn(&K) -> bool) -> usize {
        let doomed: Vec<K> = self
            .entries
            .keys()
            .filter(|key| predicate(key))
            .cloned()
            .collect();
        for key in &doomed {
            self.remove(key);
        }
        doomed.len()
    }

    pub fn cache_type(&self) -> &'static str {
        self.cache_type
    }

    pub fn identity(&self) -> CacheIdentity {
        self.identity
    }

    /// Memo counters. Shared memos report totals across all their caches.
    pub fn memo_stats(&self) -> LruStats {
        self.memo.lock().stats()
    }

    pub(crate) fn shared_memo(&self) -> SharedMemo<K, V> {
        Arc::clone(&self.memo)
    }
}

struct CheckOut<'a, K, V>
where
    K: Debug + Clone + Eq + Hash,
    V: CacheValue,
{
    cache: &'a mut IntelligenceProcessorCache<K, V>,
    key: Option<K>,
    value: Option<V>,
}

impl<K, V> Drop for CheckOut<'_, K, V>
where
    K: Debug + Clone + Eq + Hash,
    V: CacheValue,
{
    fn drop(&mut self) {
        if let (Some(key), Some(value)) = (self.key.take(), self.value.take()) {
            self.cache.add(key, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Blob(Vec<u8>);

    impl CacheValue for Blob {
        fn size_bytes(&self) -> usize {
            self.0.len()
        }
    }

    fn cache() -> IntelligenceProcessorCache<String, Blob> {
        IntelligenceProcessorCache::new("test_cache", 1024)
    }

    #[test]
    fn test_pop_add_cycle() {
        let mut cache = cache();
        let key = "k".to_string();
        cache.add(key.clone(), Blob(vec![1]));

        assert_eq!(cache.pop(&key), Some(Blob(vec![1])));
        assert!(!cache.contains(&key));

        cache.add(key.clone(), Blob(vec![2]));
        assert_eq!(*cache.get_without_modifying(&key).unwrap(), Blob(vec![2]));
    }

    #[test]
    fn test_pop_evicts_memoized_read() {
        let mut cache = cache();
        let key = "k".to_string();
        cache.add(key.clone(), Blob(vec![1, 2, 3]));
        assert!(cache.get_without_modifying(&key).is_some());
        assert_eq!(cache.memo_stats().entries, 1);

        let mut value = cache.pop(&key).unwrap();
        assert_eq!(cache.memo_stats().entries, 0);
        value.0.push(4);
        cache.add(key.clone(), value);

        assert_eq!(
            *cache.get_without_modifying(&key).unwrap(),
            Blob(vec![1, 2, 3, 4])
        );
        assert_eq!(cache.memo_stats().current_bytes, 4);
    }

    #[test]
    fn test_misses_are_not_memoized() {
        let mut cache = cache();
        let key = "k".to_string();
        assert!(cache.get_without_modifying(&key).is_none());

        cache.add(key.clone(), Blob(vec![7]));
        assert_eq!(*cache.get_without_modifying(&key).unwrap(), Blob(vec![7]));
    }

    #[test]
    fn test_shared_memo_isolated_by_identity() {
        let memo = new_shared_memo(1024);
        let mut first = IntelligenceProcessorCache::with_shared_memo("test_cache", memo.clone());
        let mut second = IntelligenceProcessorCache::with_shared_memo("test_cache", memo.clone());
        assert_ne!(first.identity(), second.identity());

        let key = "k".to_string();
        first.add(key.clone(), Blob(vec![1]));
        second.add(key.clone(), Blob(vec![2]));

        assert_eq!(*first.get_without_modifying(&key).unwrap(), Blob(vec![1]));
        assert_eq!(*second.get_without_modifying(&key).unwrap(), Blob(vec![2]));
        assert_eq!(memo.lock().len(), 2);
    }

    #[test]
    fn test_oversized_value_served_but_not_memoized() {
        let mut cache = IntelligenceProcessorCache::new("test_cache", 4);
        let key = "k".to_string();
        cache.add(key.clone(), Blob(vec![0; 16]));

        assert_eq!(cache.get_without_modifying(&key).unwrap().0.len(), 16);
        let stats = cache.memo_stats();
        assert_eq!(stats.entries, 0);
        assert_eq!(stats.rejected, 1);
    }

    #[test]
    fn test_remove_clears_map_and_memo() {
        let mut cache = cache();
        let key = "k".to_string();
        cache.add(key.clone(), Blob(vec![1]));
        cache.get_without_modifying(&key);

        assert!(cache.remove(&key));
        assert!(!cache.contains(&key));
        assert!(cache.get_without_modifying(&key).is_none());
        assert!(!cache.remove(&key));
    }

    #[test]
    fn test_with_checked_out_initializes_and_readds() {
        let mut cache = cache();
        let key = "k".to_string();
        let len = cache.with_checked_out(
            &key,
            || Blob(Vec::new()),
            |blob| {
                blob.0.extend([1, 2]);
                blob.0.len()
            },
        );
        assert_eq!(len, 2);
        assert_eq!(*cache.get_without_modifying(&key).unwrap(), Blob(vec![1, 2]));
    }

    #[test]
    fn test_with_checked_out_readds_on_panic() {
        let mut cache = cache();
        let key = "k".to_string();
        cache.add(key.clone(), Blob(vec![1]));

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            cache.with_checked_out(
                &key,
                || Blob(Vec::new()),
                |blob| {
                    blob.0.push(2);
                    panic!("mutation failed");
                },
            )
        }));
        assert!(result.is_err());
        assert!(cache.contains(&key));
        assert_eq!(*cache.get_without_modifying(&key).unwrap(), Blob(vec![1, 2]));
    }

    #[test]
    fn test_remove_matching() {
        let mut cache = cache();
        for key in ["a1", "a2", "b1"] {
            cache.add(key.to_string(), Blob(vec![0]));
        }
        assert_eq!(cache.remove_matching(|key| key.starts_with('a')), 2);
        assert_eq!(cache.len(), 1);
        assert!(cache.contains(&"b1".to_string()));
    }
}
