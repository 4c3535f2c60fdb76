//! Cache entry type

use std::time::Duration;

use tokio::time::Instant;

/// A single cached value with its bookkeeping
#[derive(Debug, Clone)]
pub struct CacheEntry<K, V> {
    /// Entry key
    pub key: K,

    /// Cached value
    pub value: V,

    /// When the entry was inserted
    pub created_at: Instant,

    /// When the entry was last read or written
    pub last_used: Instant,

    /// Lifetime measured from `created_at`
    pub ttl: Duration,

    /// Eviction priority (lower is evicted first)
    pub priority: i32,

    /// Monotonic recency sequence; breaks `last_used` ties
    pub(super) access_seq: u64,
}

impl<K, V> CacheEntry<K, V> {
    pub(super) fn new(key: K, value: V, ttl: Duration, priority: i32, now: Instant, seq: u64) -> Self {
        Self {
            key,
            value,
            created_at: now,
            last_used: now,
            ttl,
            priority,
            access_seq: seq,
        }
    }

    /// Whether the entry's TTL has elapsed at `now`
    pub fn is_expired_at(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.created_at) >= self.ttl
    }

    pub(super) fn touch(&mut self, now: Instant, seq: u64) {
        self.last_used = now;
        self.access_seq = seq;
    }

    /// Eviction rank: smaller ranks are evicted first
    pub(super) fn rank(&self) -> (i32, Instant, u64) {
        (self.priority, self.last_used, self.access_seq)
    }
}
