//! Statistics snapshots for caches and pools

/// Cache-level statistics
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CacheStats {
    /// Entries currently resident (expired entries not yet purged included)
    pub size: usize,
    /// Maximum resident entries
    pub capacity: usize,
    /// Lookups answered from the cache
    pub hits: u64,
    /// Lookups that found nothing (or an expired entry)
    pub misses: u64,
    /// Entries removed to make room
    pub evictions: u64,
    /// Entries removed because their TTL elapsed
    pub expirations: u64,
}

impl CacheStats {
    /// Create an empty stats snapshot
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            ..Default::default()
        }
    }

    /// Fraction of lookups that were hits
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total > 0 {
            self.hits as f64 / total as f64
        } else {
            0.0
        }
    }
}

/// Request de-duplicator statistics
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DedupStats {
    /// Result cache statistics
    pub cache: CacheStats,
    /// Fetches currently outstanding
    pub in_flight: usize,
}

/// Embed pool statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Handles currently in the pool
    pub total: usize,
    /// Handles currently displayed by a consumer
    pub active: usize,
    /// Handles parked off-screen
    pub idle: usize,
    /// Maximum handles
    pub capacity: usize,
    /// Handles created since the pool was built
    pub created: u64,
    /// Acquisitions served by an existing handle for the same channel
    pub reused: u64,
    /// Handles rebound from one channel to another
    pub rebinds: u64,
    /// Rebinds that displaced an active handle
    pub takeovers: u64,
    /// Handles retired by the idle sweep or explicit clear
    pub retired: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_stats_new() {
        let stats = CacheStats::new(16);
        assert_eq!(stats.capacity, 16);
        assert_eq!(stats.size, 0);
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.misses, 0);
        assert_eq!(stats.evictions, 0);
    }

    #[test]
    fn test_hit_rate_zero_lookups() {
        let stats = CacheStats::new(4);
        assert_eq!(stats.hit_rate(), 0.0);
    }

    #[test]
    fn test_hit_rate() {
        let mut stats = CacheStats::new(4);
        stats.hits = 3;
        stats.misses = 1;

        assert!((stats.hit_rate() - 0.75).abs() < f64::EPSILON);
    }

    #[test]
    fn test_pool_stats_default() {
        let stats = PoolStats::default();
        assert_eq!(stats.total, 0);
        assert_eq!(stats.active + stats.idle, stats.total);
    }
}
