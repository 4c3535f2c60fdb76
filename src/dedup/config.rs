//! De-duplicator configuration and per-request options

use std::time::Duration;

use crate::backoff::Backoff;
use crate::cache::CacheConfig;

/// Retry policy for failing fetches
///
/// Delay before retry `n` is `min(base_delay * 2^(n-1), max_delay)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Additional attempts after the first failure
    pub max_retries: u32,
    /// Delay before the first retry
    pub base_delay: Duration,
    /// Upper bound for a single delay
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(5000),
        }
    }
}

impl RetryPolicy {
    /// Policy that never retries
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    /// Set additional attempts after the first failure
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Set base and cap of the backoff
    pub fn delays(mut self, base: Duration, max: Duration) -> Self {
        self.base_delay = base;
        self.max_delay = max.max(base);
        self
    }

    /// Backoff curve for this policy
    pub fn backoff(&self) -> Backoff {
        Backoff::exponential(self.base_delay, self.max_delay)
    }
}

/// Request de-duplicator configuration
#[derive(Debug, Clone)]
pub struct DedupConfig {
    /// Result cache configuration (capacity and default TTL)
    pub cache: CacheConfig,

    /// Default retry policy
    pub retry: RetryPolicy,

    /// Suggested interval for [`Sweep`](crate::sweep::Sweep) scheduling
    pub sweep_interval: Duration,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            retry: RetryPolicy::default(),
            sweep_interval: Duration::from_secs(10 * 60),
        }
    }
}

impl DedupConfig {
    /// Set result cache capacity
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.cache = self.cache.capacity(capacity);
        self
    }

    /// Set default result TTL
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.cache = self.cache.ttl(ttl);
        self
    }

    /// Set default retry policy
    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Set sweep interval
    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }
}

/// Per-request options
///
/// Unset fields fall back to the de-duplicator's configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestOptions {
    /// Result lifetime
    pub ttl: Option<Duration>,
    /// Skip the cached value (an in-flight fetch is still shared)
    pub force_refresh: bool,
    /// Additional attempts after the first failure
    pub max_retries: Option<u32>,
}

impl RequestOptions {
    /// Options with every field defaulted
    pub fn new() -> Self {
        Self::default()
    }

    /// Set result lifetime
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Bypass the cached value
    pub fn force_refresh(mut self) -> Self {
        self.force_refresh = true;
        self
    }

    /// Set additional attempts after the first failure
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.max_retries = Some(retries);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_retry_policy() {
        let policy = RetryPolicy::default();

        assert_eq!(policy.max_retries, 2);
        assert_eq!(policy.backoff().delay(1), Duration::from_millis(1000));
        assert_eq!(policy.backoff().delay(2), Duration::from_millis(2000));
        assert_eq!(policy.backoff().delay(5), Duration::from_millis(5000));
    }

    #[test]
    fn test_delays_cap_never_below_base() {
        let policy = RetryPolicy::default().delays(Duration::from_secs(3), Duration::from_secs(1));

        assert_eq!(policy.max_delay, Duration::from_secs(3));
    }

    #[test]
    fn test_default_dedup_config() {
        let config = DedupConfig::default();

        assert_eq!(config.cache.ttl, Duration::from_secs(300));
        assert_eq!(config.sweep_interval, Duration::from_secs(600));
        assert_eq!(config.retry, RetryPolicy::default());
    }

    #[test]
    fn test_request_options_builder() {
        let options = RequestOptions::new()
            .ttl(Duration::from_secs(120))
            .force_refresh()
            .max_retries(0);

        assert_eq!(options.ttl, Some(Duration::from_secs(120)));
        assert!(options.force_refresh);
        assert_eq!(options.max_retries, Some(0));
    }
}
