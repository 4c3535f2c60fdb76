//! Resource cache implementation

use std::collections::HashMap;
use std::hash::Hash;
use std::time::Duration;

use tokio::time::Instant;

use super::config::CacheConfig;
use super::entry::CacheEntry;
use crate::stats::CacheStats;

/// Keyed cache with TTL expiry, a capacity bound and priority-aware LRU
/// eviction
///
/// Invariants:
/// - the number of resident entries never exceeds `capacity`
/// - an entry is never returned once `now - created_at >= ttl`
/// - eviction removes the lowest-priority entry, oldest `last_used` first
///   among equal priorities
pub struct ResourceCache<K, V> {
    /// Map of key to entry
    entries: HashMap<K, CacheEntry<K, V>>,

    /// Configuration
    config: CacheConfig,

    /// Next recency sequence number
    next_seq: u64,

    hits: u64,
    misses: u64,
    evictions: u64,
    expirations: u64,
}

impl<K, V> ResourceCache<K, V>
where
    K: Eq + Hash + Clone,
{
    /// Create a cache with default configuration
    pub fn new() -> Self {
        Self::with_config(CacheConfig::default())
    }

    /// Create a cache with custom configuration
    pub fn with_config(config: CacheConfig) -> Self {
        let config = CacheConfig {
            capacity: config.capacity.max(1),
            ..config
        };

        Self {
            entries: HashMap::with_capacity(config.capacity.min(1024)),
            config,
            next_seq: 0,
            hits: 0,
            misses: 0,
            evictions: 0,
            expirations: 0,
        }
    }

    /// Get the cache configuration
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Maximum resident entries
    pub fn capacity(&self) -> usize {
        self.config.capacity
    }

    fn bump_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    /// Look up a value, refreshing its recency
    ///
    /// Expired entries are treated as absent and purged on the spot.
    pub fn get(&mut self, key: &K) -> Option<&V> {
        let now = Instant::now();

        let expired = match self.entries.get(key) {
            None => {
                self.misses += 1;
                return None;
            }
            Some(entry) => entry.is_expired_at(now),
        };

        if expired {
            self.entries.remove(key);
            self.expirations += 1;
            self.misses += 1;
            return None;
        }

        let seq = self.bump_seq();
        self.hits += 1;
        self.entries.get_mut(key).map(|entry| {
            entry.touch(now, seq);
            &entry.value
        })
    }

    /// Look up a live value without touching recency or statistics
    pub fn peek(&self, key: &K) -> Option<&V> {
        let now = Instant::now();
        self.entries
            .get(key)
            .filter(|entry| !entry.is_expired_at(now))
            .map(|entry| &entry.value)
    }

    /// Check whether a live entry exists for `key`
    pub fn contains_key(&self, key: &K) -> bool {
        self.peek(key).is_some()
    }

    /// Insert with the default TTL and priority 0
    pub fn insert(&mut self, key: K, value: V) -> Option<(K, V)> {
        let ttl = self.config.ttl;
        self.set(key, value, ttl, 0)
    }

    /// Insert or replace an entry
    ///
    /// Replacing an existing key never counts as growth. When inserting a new
    /// key into a full cache, expired entries are purged first; if the cache
    /// is still full, exactly one entry is evicted by the priority/LRU rule
    /// and returned so the caller can release it.
    pub fn set(&mut self, key: K, value: V, ttl: Duration, priority: i32) -> Option<(K, V)> {
        let now = Instant::now();
        let seq = self.bump_seq();

        if let Some(entry) = self.entries.get_mut(&key) {
            *entry = CacheEntry::new(key, value, ttl, priority, now, seq);
            return None;
        }

        let mut evicted = None;

        if self.entries.len() >= self.config.capacity {
            self.purge_expired(now);
        }

        if self.entries.len() >= self.config.capacity {
            evicted = self.evict_one();
        }

        self.entries
            .insert(key.clone(), CacheEntry::new(key, value, ttl, priority, now, seq));

        evicted
    }

    /// Change the priority of a live entry
    ///
    /// Returns false if the key is absent.
    pub fn set_priority(&mut self, key: &K, priority: i32) -> bool {
        match self.entries.get_mut(key) {
            Some(entry) => {
                entry.priority = priority;
                true
            }
            None => false,
        }
    }

    /// Refresh an entry's recency without counting a lookup
    pub fn touch(&mut self, key: &K) -> bool {
        let now = Instant::now();
        let seq = self.bump_seq();
        match self.entries.get_mut(key) {
            Some(entry) => {
                entry.touch(now, seq);
                true
            }
            None => false,
        }
    }

    /// Key of the entry the eviction rule would remove next
    pub fn victim(&self) -> Option<&K> {
        self.entries
            .values()
            .min_by_key(|entry| entry.rank())
            .map(|entry| &entry.key)
    }

    /// Evict the entry the eviction rule selects
    pub fn evict_one(&mut self) -> Option<(K, V)> {
        let key = self.victim()?.clone();
        let entry = self.entries.remove(&key)?;
        self.evictions += 1;
        Some((entry.key, entry.value))
    }

    /// Remove an entry
    pub fn remove(&mut self, key: &K) -> Option<V> {
        self.entries.remove(key).map(|entry| entry.value)
    }

    /// Remove every entry whose key matches the predicate
    pub fn remove_where<F>(&mut self, mut predicate: F) -> Vec<(K, V)>
    where
        F: FnMut(&K) -> bool,
    {
        let keys: Vec<K> = self
            .entries
            .keys()
            .filter(|key| predicate(key))
            .cloned()
            .collect();

        keys.into_iter()
            .filter_map(|key| self.entries.remove(&key))
            .map(|entry| (entry.key, entry.value))
            .collect()
    }

    /// Remove every entry
    pub fn clear(&mut self) -> Vec<(K, V)> {
        self.entries
            .drain()
            .map(|(_, entry)| (entry.key, entry.value))
            .collect()
    }

    /// Remove all expired entries
    ///
    /// Intended to run on a fixed interval rather than on every access.
    pub fn sweep(&mut self) -> Vec<(K, V)> {
        self.purge_expired(Instant::now())
    }

    fn purge_expired(&mut self, now: Instant) -> Vec<(K, V)> {
        let expired: Vec<K> = self
            .entries
            .values()
            .filter(|entry| entry.is_expired_at(now))
            .map(|entry| entry.key.clone())
            .collect();

        let removed: Vec<(K, V)> = expired
            .into_iter()
            .filter_map(|key| self.entries.remove(&key))
            .map(|entry| (entry.key, entry.value))
            .collect();

        self.expirations += removed.len() as u64;
        removed
    }

    /// Number of resident entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache holds no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Keys of all resident entries
    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.entries.keys()
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            size: self.entries.len(),
            hits: self.hits,
            misses: self.misses,
            evictions: self.evictions,
            expirations: self.expirations,
            ..CacheStats::new(self.config.capacity)
        }
    }
}

impl<K, V> Default for ResourceCache<K, V>
where
    K: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> std::fmt::Debug for ResourceCache<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceCache")
            .field("len", &self.entries.len())
            .field("capacity", &self.config.capacity)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache(capacity: usize, ttl_ms: u64) -> ResourceCache<&'static str, i32> {
        ResourceCache::with_config(CacheConfig::new(capacity, Duration::from_millis(ttl_ms)))
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_within_ttl() {
        let mut cache = cache(4, 1000);
        cache.insert("a", 1);

        tokio::time::advance(Duration::from_millis(999)).await;
        assert_eq!(cache.get(&"a"), Some(&1));

        tokio::time::advance(Duration::from_millis(1)).await;
        assert_eq!(cache.get(&"a"), None);
        assert_eq!(cache.len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expiry_then_capacity_scenario() {
        let mut cache = cache(1, 1000);
        cache.insert("a", 1);

        tokio::time::advance(Duration::from_millis(1100)).await;
        assert_eq!(cache.get(&"a"), None);

        assert!(cache.insert("b", 2).is_none());
        let evicted = cache.insert("c", 3);

        assert_eq!(evicted, Some(("b", 2)));
        assert_eq!(cache.get(&"c"), Some(&3));
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_evicts_lowest_priority_first() {
        let mut cache = cache(3, 60_000);
        let ttl = Duration::from_secs(60);

        cache.set("keep-high", 1, ttl, 5);
        cache.set("low", 2, ttl, 0);
        cache.set("mid", 3, ttl, 1);

        // "low" is newest-touched but still goes first
        cache.get(&"low");
        let evicted = cache.set("new", 4, ttl, 1);

        assert_eq!(evicted, Some(("low", 2)));
        assert!(cache.contains_key(&"keep-high"));
        assert!(cache.contains_key(&"mid"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_lru_within_equal_priority() {
        let mut cache = cache(3, 60_000);
        cache.insert("a", 1);
        cache.insert("b", 2);
        cache.insert("c", 3);

        // Same clock tick everywhere: order comes from the access sequence
        cache.get(&"a");
        assert_eq!(cache.victim(), Some(&"b"));

        let evicted = cache.insert("d", 4);
        assert_eq!(evicted, Some(("b", 2)));

        cache.get(&"c");
        assert_eq!(cache.victim(), Some(&"a"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_overwrite_does_not_grow() {
        let mut cache = cache(2, 60_000);
        cache.insert("a", 1);
        cache.insert("b", 2);

        assert!(cache.insert("a", 10).is_none());
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(&"a"), Some(&10));
        assert_eq!(cache.stats().evictions, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_capacity_never_exceeded() {
        let mut cache = cache(3, 500);
        for i in 0..50 {
            let key: &'static str = Box::leak(format!("k{}", i).into_boxed_str());
            cache.set(key, i, Duration::from_millis(100 + (i as u64 % 7) * 100), i % 3);
            assert!(cache.len() <= 3);
            tokio::time::advance(Duration::from_millis(37)).await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_cache_purges_expired_before_evicting() {
        let mut cache = cache(2, 60_000);
        cache.set("short", 1, Duration::from_millis(100), 9);
        cache.set("long", 2, Duration::from_secs(60), 0);

        tokio::time::advance(Duration::from_millis(200)).await;
        let evicted = cache.insert("new", 3);

        assert!(evicted.is_none());
        assert!(cache.contains_key(&"long"));
        let stats = cache.stats();
        assert_eq!(stats.expirations, 1);
        assert_eq!(stats.evictions, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_removes_only_expired() {
        let mut cache = cache(8, 1000);
        cache.insert("old", 1);
        tokio::time::advance(Duration::from_millis(600)).await;
        cache.insert("young", 2);
        tokio::time::advance(Duration::from_millis(600)).await;

        let removed = cache.sweep();

        assert_eq!(removed, vec![("old", 1)]);
        assert_eq!(cache.len(), 1);
        assert!(cache.contains_key(&"young"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stats_track_hits_and_misses() {
        let mut cache = cache(2, 1000);
        cache.insert("a", 1);

        cache.get(&"a");
        cache.get(&"a");
        cache.get(&"missing");
        cache.insert("b", 2);
        cache.insert("c", 3);

        let stats = cache.stats();
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.evictions, 1);
        assert_eq!(stats.size, 2);
        assert_eq!(stats.capacity, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_peek_does_not_refresh() {
        let mut cache = cache(2, 60_000);
        cache.insert("a", 1);
        cache.insert("b", 2);

        assert_eq!(cache.peek(&"a"), Some(&1));
        assert_eq!(cache.victim(), Some(&"a"));
        assert_eq!(cache.stats().hits, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_priority_changes_victim() {
        let mut cache = cache(2, 60_000);
        cache.insert("a", 1);
        cache.insert("b", 2);

        assert!(cache.set_priority(&"a", 1));
        assert_eq!(cache.victim(), Some(&"b"));
        assert!(!cache.set_priority(&"zzz", 1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_remove_where_and_clear() {
        let mut cache: ResourceCache<String, i32> = ResourceCache::new();
        cache.insert("user:1".to_string(), 1);
        cache.insert("user:2".to_string(), 2);
        cache.insert("team:1".to_string(), 3);

        let mut removed = cache.remove_where(|k| k.starts_with("user:"));
        removed.sort();
        assert_eq!(removed.len(), 2);
        assert_eq!(cache.len(), 1);

        assert_eq!(cache.remove(&"team:1".to_string()), Some(3));
        assert!(cache.is_empty());

        cache.insert("x".to_string(), 9);
        assert_eq!(cache.clear().len(), 1);
        assert!(cache.is_empty());
    }
}
