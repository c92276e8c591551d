//! Bounded LRU retention with optional per-entry TTL.
//!
//! An `IndexMap` gives O(1) lookup while preserving insertion order, so the
//! front of the map is always the recency-oldest key and eviction is a
//! `shift_remove_index(0)`. Each stored value is wrapped in an [`Entry`]
//! carrying an optional expiry, rather than layering a second LRU variant
//! on top for TTL support.

use std::hash::Hash;
use std::time::{Duration, Instant};

use indexmap::IndexMap;
use parking_lot::RwLock;

/// A stored value plus its optional absolute expiry.
#[derive(Debug, Clone)]
struct Entry<V> {
    value: V,
    expires_at: Option<Instant>,
}

impl<V> Entry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// Thread-safe, bounded LRU store with lazy TTL expiry.
///
/// `K` must be `Hash + Eq + Clone` because the recency order and the map
/// key are maintained together; `V` must be `Clone` so that [`LruStore::get`]
/// can return a defensive copy rather than a reference into the guarded map.
pub struct LruStore<K, V>
where
    K: Hash + Eq + Clone,
{
    maxsize: Option<usize>,
    inner: RwLock<IndexMap<K, Entry<V>>>,
}

impl<K, V> LruStore<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    /// Creates a store bounded to `maxsize` entries, or unbounded if `None`.
    #[must_use]
    pub fn new(maxsize: Option<usize>) -> Self {
        Self {
            maxsize,
            inner: RwLock::new(IndexMap::new()),
        }
    }

    /// Returns whether `key` is present and unexpired.
    ///
    /// An expired entry is removed as a side effect of this call: it is
    /// reaped lazily, no later than the next read that observes it. Does
    /// not promote recency.
    pub fn contains(&self, key: &K) -> bool {
        let now = Instant::now();
        let mut inner = self.inner.write();
        match inner.get(key) {
            Some(entry) if entry.is_expired(now) => {
                inner.shift_remove(key);
                false
            }
            Some(_) => true,
            None => false,
        }
    }

    /// Returns a clone of the stored value and promotes `key` to
    /// recency-newest.
    ///
    /// Returns `None` if `key` is absent or expired (removing it as a side
    /// effect in the expired case), so callers never need to call
    /// `contains` first.
    pub fn get(&self, key: &K) -> Option<V> {
        let now = Instant::now();
        let mut inner = self.inner.write();
        let Some(entry) = inner.get(key) else {
            return None;
        };
        if entry.is_expired(now) {
            inner.shift_remove(key);
            return None;
        }
        let value = entry.value.clone();
        // Promote to recency-newest: remove then reinsert at the back.
        let expires_at = entry.expires_at;
        inner.shift_remove(key);
        inner.insert(
            key.clone(),
            Entry {
                value: value.clone(),
                expires_at,
            },
        );
        Some(value)
    }

    /// Inserts or updates `key`, promoting it to recency-newest.
    ///
    /// If the insertion pushes `size()` past `maxsize`, evicts exactly one
    /// recency-oldest key.
    pub fn put(&self, key: K, value: V, expires_at: Option<Instant>) {
        let mut inner = self.inner.write();
        inner.shift_remove(&key);
        inner.insert(key, Entry { value, expires_at });
        if let Some(maxsize) = self.maxsize {
            if inner.len() > maxsize {
                inner.shift_remove_index(0);
            }
        }
    }

    /// Inserts `key` with no expiry and a window `ttl` from now, or no
    /// expiry if `ttl` is `None`. Convenience wrapper over [`LruStore::put`].
    pub fn put_with_ttl(&self, key: K, value: V, ttl: Option<Duration>) {
        self.put(key, value, ttl.map(|d| Instant::now() + d));
    }

    /// Removes `key` if present. Absent is not an error.
    pub fn delete(&self, key: &K) {
        self.inner.write().shift_remove(key);
    }

    /// Removes every entry.
    pub fn clear(&self) {
        self.inner.write().clear();
    }

    /// Returns the current number of entries, including any not yet
    /// lazily reaped expired entries.
    pub fn size(&self) -> usize {
        self.inner.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    #[test]
    fn read_your_write() {
        let store: LruStore<&str, &str> = LruStore::new(Some(10));
        store.put("k", "v", None);
        assert_eq!(store.get(&"k"), Some("v"));
    }

    #[test]
    fn bounded_by_maxsize() {
        let store: LruStore<i32, i32> = LruStore::new(Some(3));
        for i in 0..10 {
            store.put(i, i, None);
        }
        assert_eq!(store.size(), 3);
        // Most recently inserted keys survive.
        assert!(store.contains(&9));
        assert!(store.contains(&8));
        assert!(store.contains(&7));
        assert!(!store.contains(&0));
    }

    #[test]
    fn get_promotes_recency_past_insertion_order() {
        let store: LruStore<i32, i32> = LruStore::new(Some(2));
        store.put(1, 1, None);
        store.put(2, 2, None);
        // Touch 1 so it becomes newest; 2 is now oldest.
        store.get(&1);
        store.put(3, 3, None);
        assert!(store.contains(&1));
        assert!(store.contains(&3));
        assert!(!store.contains(&2));
    }

    #[test]
    fn ttl_expiry_makes_entry_absent() {
        let store: LruStore<&str, &str> = LruStore::new(None);
        store.put_with_ttl("k", "v", Some(Duration::from_millis(5)));
        sleep(Duration::from_millis(20));
        assert!(!store.contains(&"k"));
        assert_eq!(store.get(&"k"), None);
    }

    #[test]
    fn put_again_updates_value_and_promotes() {
        let store: LruStore<&str, i32> = LruStore::new(Some(2));
        store.put("a", 1, None);
        store.put("b", 2, None);
        store.put("a", 10, None);
        assert_eq!(store.get(&"a"), Some(10));
        store.put("c", 3, None);
        // "b" was oldest after "a" was re-promoted, so it is evicted.
        assert!(!store.contains(&"b"));
    }

    #[test]
    fn delete_absent_key_is_not_an_error() {
        let store: LruStore<&str, &str> = LruStore::new(None);
        store.delete(&"missing");
        assert_eq!(store.size(), 0);
    }

    #[test]
    fn clear_removes_everything() {
        let store: LruStore<i32, i32> = LruStore::new(None);
        for i in 0..5 {
            store.put(i, i, None);
        }
        store.clear();
        assert_eq!(store.size(), 0);
    }
}
