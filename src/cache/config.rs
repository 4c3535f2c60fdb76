//! Cache configuration

use std::time::Duration;

/// Cache configuration options
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum resident entries (at least 1)
    pub capacity: usize,

    /// Default time-to-live for entries inserted without an explicit TTL
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: 256,
            ttl: Duration::from_secs(5 * 60),
        }
    }
}

impl CacheConfig {
    /// Create a config with the given capacity and TTL
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            capacity: capacity.max(1),
            ttl,
        }
    }

    /// Set maximum resident entries
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    /// Set default TTL
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CacheConfig::default();

        assert_eq!(config.capacity, 256);
        assert_eq!(config.ttl, Duration::from_secs(300));
    }

    #[test]
    fn test_capacity_clamped() {
        assert_eq!(CacheConfig::default().capacity(0).capacity, 1);
        assert_eq!(CacheConfig::new(0, Duration::from_secs(1)).capacity, 1);
    }

    #[test]
    fn test_builder_chaining() {
        let config = CacheConfig::default()
            .capacity(8)
            .ttl(Duration::from_millis(1500));

        assert_eq!(config.capacity, 8);
        assert_eq!(config.ttl, Duration::from_millis(1500));
    }
}
