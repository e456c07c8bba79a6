// TTL cache over DashMap
//
// Bounded map with per-entry expiry. Reads remove expired entries lazily;
// purge_expired exists for callers that want a periodic sweep.

use dashmap::DashMap;
use std::time::{Duration, Instant};

pub struct TtlCache<V: Clone> {
    map: DashMap<String, (Instant, V)>,
    ttl: Duration,
    capacity: usize,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            map: DashMap::new(),
            ttl,
            capacity,
        }
    }

    pub fn get(&self, key: &str) -> Option<V> {
        let expired = match self.map.get(key) {
            Some(entry) => {
                let (inserted, value) = entry.value();
                if inserted.elapsed() < self.ttl {
                    return Some(value.clone());
                }
                true
            }
            None => false,
        };
        if expired {
            self.map.remove(key);
        }
        None
    }

    pub fn insert(&self, key: String, value: V) {
        if self.map.len() >= self.capacity {
            self.purge_expired();
            // Still full: drop an arbitrary entry so the bound holds
            if self.map.len() >= self.capacity {
                if let Some(victim) = self.map.iter().next().map(|e| e.key().clone()) {
                    self.map.remove(&victim);
                }
            }
        }
        self.map.insert(key, (Instant::now(), value));
    }

    pub fn purge_expired(&self) {
        let ttl = self.ttl;
        self.map.retain(|_, (inserted, _)| inserted.elapsed() < ttl);
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn clear(&self) {
        self.map.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_get() {
        let cache: TtlCache<String> = TtlCache::new(10, Duration::from_secs(60));
        cache.insert("k".to_string(), "v".to_string());
        assert_eq!(cache.get("k"), Some("v".to_string()));
        assert_eq!(cache.get("missing"), None);
    }

    #[test]
    fn test_expiry() {
        let cache: TtlCache<u32> = TtlCache::new(10, Duration::from_millis(0));
        cache.insert("k".to_string(), 1);
        // Zero TTL: entry is already expired on read
        assert_eq!(cache.get("k"), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_capacity_bound() {
        let cache: TtlCache<u32> = TtlCache::new(3, Duration::from_secs(60));
        for i in 0..10 {
            cache.insert(format!("k{i}"), i);
        }
        assert!(cache.len() <= 3);
    }

    #[test]
    fn test_purge_expired() {
        let cache: TtlCache<u32> = TtlCache::new(10, Duration::from_millis(0));
        cache.insert("a".to_string(), 1);
        cache.insert("b".to_string(), 2);
        cache.purge_expired();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_clear() {
        let cache: TtlCache<u32> = TtlCache::new(10, Duration::from_secs(60));
        cache.insert("a".to_string(), 1);
        cache.clear();
        assert!(cache.is_empty());
    }
}
