//! Reader/writer-locked map

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;

use parking_lot::RwLock;

/// A map safe to share between any number of threads
///
/// Reads (`get`, `keys`, `len`, `for_each`) take the shared lock and may run
/// in parallel with each other; writes (`set`, `delete`) take the exclusive
/// lock for their whole duration.
///
/// The type is intentionally not `Clone`. The lock and the data it guards
/// live in one place and every accessor borrows that place, so there is no
/// way to end up holding a second, independent lock over the same entries.
/// Share it with `&ConcurrentMap` or `Arc<ConcurrentMap>`.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use synckit::ConcurrentMap;
///
/// let map = Arc::new(ConcurrentMap::new());
/// let writer = Arc::clone(&map);
/// std::thread::spawn(move || writer.set("GET /users", 200))
///     .join()
///     .unwrap();
///
/// assert_eq!(map.get(&"GET /users"), Some(200));
/// ```
pub struct ConcurrentMap<K, V> {
    inner: RwLock<HashMap<K, V>>,
}

impl<K, V> ConcurrentMap<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Create an empty map
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }

    /// Create an empty map with room for `capacity` entries
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: RwLock::new(HashMap::with_capacity(capacity)),
        }
    }

    /// Insert or overwrite `key`, returning the previous value
    pub fn set(&self, key: K, value: V) -> Option<V> {
        self.inner.write().insert(key, value)
    }

    /// Look up `key`, returning a clone of its value
    pub fn get(&self, key: &K) -> Option<V> {
        self.inner.read().get(key).cloned()
    }

    /// Whether `key` is present
    pub fn contains_key(&self, key: &K) -> bool {
        self.inner.read().contains_key(key)
    }

    /// Remove `key`, returning the value it held
    pub fn delete(&self, key: &K) -> Option<V> {
        self.inner.write().remove(key)
    }

    /// Point-in-time snapshot of every key
    ///
    /// Mutations that happen after this returns are not reflected in the
    /// snapshot, and cannot corrupt it.
    pub fn keys(&self) -> Vec<K> {
        self.inner.read().keys().cloned().collect()
    }

    /// Point-in-time snapshot of every entry
    pub fn snapshot(&self) -> Vec<(K, V)> {
        self.inner
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    /// Whether the map holds no entries
    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    /// Visit every entry under the shared lock
    ///
    /// Other readers proceed concurrently while the visitor runs; writers
    /// wait until it returns, so the visitor sees one consistent state.
    ///
    /// # Forbidden pattern
    ///
    /// The visitor must not call back into the same map. A `set` or `delete`
    /// asks for the exclusive lock while this call still holds the shared one
    /// and deadlocks the calling thread; even a nested read can deadlock once
    /// a writer is queued, because the lock is fair. Collect what you need and
    /// act after `for_each` returns, or iterate over
    /// [`snapshot`](Self::snapshot) instead.
    pub fn for_each<F>(&self, mut visit: F)
    where
        F: FnMut(&K, &V),
    {
        let guard = self.inner.read();
        for (k, v) in guard.iter() {
            visit(k, v);
        }
    }

    /// Remove every entry
    pub fn clear(&self) {
        self.inner.write().clear();
    }
}

impl<K, V> Default for ConcurrentMap<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> FromIterator<(K, V)> for ConcurrentMap<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            inner: RwLock::new(iter.into_iter().collect()),
        }
    }
}

impl<K, V> fmt::Debug for ConcurrentMap<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Don't take the lock here: Debug may be called from a visitor.
        f.debug_struct("ConcurrentMap").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_set_and_get() {
        let map = ConcurrentMap::new();
        map.set("hello".to_string(), "world".to_string());

        assert_eq!(map.get(&"hello".to_string()), Some("world".to_string()));
    }

    #[test]
    fn test_get_missing_key() {
        let map: ConcurrentMap<String, i32> = ConcurrentMap::new();
        assert_eq!(map.get(&"missing".to_string()), None);
        assert!(!map.contains_key(&"missing".to_string()));
    }

    #[test]
    fn test_set_returns_previous_value() {
        let map = ConcurrentMap::new();
        assert_eq!(map.set("k", 1), None);
        assert_eq!(map.set("k", 2), Some(1));
        assert_eq!(map.get(&"k"), Some(2));
    }

    #[test]
    fn test_delete() {
        let map = ConcurrentMap::new();
        map.set("key", "value");

        assert_eq!(map.delete(&"key"), Some("value"));
        assert_eq!(map.get(&"key"), None);
        assert_eq!(map.delete(&"key"), None);
    }

    #[test]
    fn test_keys_snapshot() {
        let map = ConcurrentMap::new();
        map.set("c", 3);
        map.set("a", 1);
        map.set("b", 2);

        let mut keys = map.keys();
        keys.sort();
        assert_eq!(keys, vec!["a", "b", "c"]);

        // Later writes don't leak into an already-taken snapshot
        map.set("d", 4);
        assert_eq!(keys.len(), 3);
    }

    #[test]
    fn test_len_and_is_empty() {
        let map = ConcurrentMap::new();
        assert_eq!(map.len(), 0);
        assert!(map.is_empty());

        map.set("a", 1);
        map.set("b", 2);
        assert_eq!(map.len(), 2);
        assert!(!map.is_empty());

        map.clear();
        assert!(map.is_empty());
    }

    #[test]
    fn test_for_each_visits_every_entry() {
        let map: ConcurrentMap<u32, u32> = (0..10).map(|i| (i, i * 10)).collect();

        let mut sum = 0;
        let mut visited = 0;
        map.for_each(|_, v| {
            sum += v;
            visited += 1;
        });

        assert_eq!(visited, 10);
        assert_eq!(sum, 450);
    }

    #[test]
    fn test_mutate_after_collecting_in_for_each() {
        let map: ConcurrentMap<u32, u32> = (0..6).map(|i| (i, i)).collect();

        let mut odd = Vec::new();
        map.for_each(|k, v| {
            if v % 2 == 1 {
                odd.push(*k);
            }
        });
        for k in odd {
            map.delete(&k);
        }

        let mut keys = map.keys();
        keys.sort();
        assert_eq!(keys, vec![0, 2, 4]);
    }

    #[test]
    fn test_snapshot_is_detached_from_the_map() {
        let map = ConcurrentMap::new();
        map.set("a", 1);

        for (k, v) in map.snapshot() {
            // Writing while iterating a snapshot is fine
            map.set(k, v + 1);
        }
        assert_eq!(map.get(&"a"), Some(2));
    }

    #[test]
    fn test_shared_handle_sees_writes_from_other_threads() {
        let map = Arc::new(ConcurrentMap::new());

        let handles: Vec<_> = (0..4)
            .map(|t| {
                let map = Arc::clone(&map);
                thread::spawn(move || {
                    for i in 0..25 {
                        map.set(format!("t{t}-{i}"), i);
                    }
                })
            })
            .collect();

        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(map.len(), 100);
        assert_eq!(map.get(&"t3-24".to_string()), Some(24));
    }
}
