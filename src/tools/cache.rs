//! Small TTL+LRU cache shared by the cacheable read-only tool handlers
//! (`list_files`, `search_files` — spec §4.B). Grounded on the `lru` crate
//! the way `examples/swedishembedded-sven` uses it for its own bounded
//! in-memory caches, wrapped with an insertion timestamp for the TTL half
//! of the contract.

use lru::LruCache;
use parking_lot::Mutex;
use std::hash::Hash;
use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

pub struct TtlCache<K, V> {
    inner: Mutex<LruCache<K, (Instant, V)>>,
    ttl: Duration,
}

impl<K: Hash + Eq, V: Clone> TtlCache<K, V> {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            inner: Mutex::new(LruCache::new(NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::new(1).unwrap()))),
            ttl,
        }
    }

    /// Returns the cached value if present and not yet expired; evicts it
    /// (so a later miss doesn't pay for a second lookup) if it has.
    pub fn get(&self, key: &K) -> Option<V> {
        let mut inner = self.inner.lock();
        let hit = inner.get(key).filter(|(inserted, _)| inserted.elapsed() < self.ttl).map(|(_, v)| v.clone());
        if hit.is_none() {
            inner.pop(key);
        }
        hit
    }

    pub fn put(&self, key: K, value: V) {
        self.inner.lock().put(key, (Instant::now(), value));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hit_then_expiry() {
        let cache: TtlCache<String, i32> = TtlCache::new(2, Duration::from_millis(20));
        cache.put("a".to_string(), 1);
        assert_eq!(cache.get(&"a".to_string()), Some(1));
        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(cache.get(&"a".to_string()), None);
    }

    #[test]
    fn evicts_lru_beyond_capacity() {
        let cache: TtlCache<i32, i32> = TtlCache::new(1, Duration::from_secs(60));
        cache.put(1, 10);
        cache.put(2, 20);
        assert_eq!(cache.get(&1), None);
        assert_eq!(cache.get(&2), Some(20));
    }
}
