//! Embed pool configuration

use std::time::Duration;

/// Options passed to the widget factory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbedOptions {
    /// Start playback once loaded
    pub autoplay: bool,
    /// Start muted
    pub muted: bool,
    /// Show player controls
    pub controls: bool,
}

impl EmbedOptions {
    /// Options for handles acquired for display
    pub fn display() -> Self {
        Self {
            autoplay: false,
            muted: true,
            controls: true,
        }
    }

    /// Options for speculative off-screen warm-up
    pub fn preload() -> Self {
        Self {
            autoplay: false,
            muted: true,
            controls: false,
        }
    }
}

impl Default for EmbedOptions {
    fn default() -> Self {
        Self::display()
    }
}

/// Embed pool configuration options
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Maximum handles (at least 1)
    pub pool_size: usize,

    /// Delay between `release` and the handle going inactive
    pub release_grace: Duration,

    /// Inactive handles idle longer than this are retired by `sweep`
    pub idle_timeout: Duration,

    /// Suggested interval for [`Sweep`](crate::sweep::Sweep) scheduling
    pub sweep_interval: Duration,

    /// Debounce before scheduled preloads fire
    pub preload_delay: Duration,

    /// Spacing between successive scheduled preloads
    pub preload_spacing: Duration,

    /// Cap on parked handles warmed by `preload` at any one time
    pub max_preloaded: usize,

    /// Load widgets on acquisition instead of waiting for visibility
    pub eager_load: bool,

    /// Factory options for displayed handles
    pub display: EmbedOptions,

    /// Factory options for preloaded handles
    pub preload: EmbedOptions,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            pool_size: 5,
            release_grace: Duration::from_secs(1),
            idle_timeout: Duration::from_secs(10 * 60),
            sweep_interval: Duration::from_secs(3 * 60),
            preload_delay: Duration::from_secs(1),
            preload_spacing: Duration::from_millis(200),
            max_preloaded: 3,
            eager_load: false,
            display: EmbedOptions::display(),
            preload: EmbedOptions::preload(),
        }
    }
}

impl PoolConfig {
    /// Create a config with the given pool size
    pub fn with_size(pool_size: usize) -> Self {
        Self {
            pool_size: pool_size.max(1),
            ..Default::default()
        }
    }

    /// Set maximum handles
    pub fn pool_size(mut self, size: usize) -> Self {
        self.pool_size = size.max(1);
        self
    }

    /// Set release grace delay
    pub fn release_grace(mut self, grace: Duration) -> Self {
        self.release_grace = grace;
        self
    }

    /// Set idle retirement threshold
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Set sweep interval
    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// Set preload debounce delay
    pub fn preload_delay(mut self, delay: Duration) -> Self {
        self.preload_delay = delay;
        self
    }

    /// Set spacing between scheduled preloads
    pub fn preload_spacing(mut self, spacing: Duration) -> Self {
        self.preload_spacing = spacing;
        self
    }

    /// Set the cap on preloaded parked handles
    pub fn max_preloaded(mut self, max: usize) -> Self {
        self.max_preloaded = max;
        self
    }

    /// Load widgets immediately on acquisition
    pub fn eager_load(mut self) -> Self {
        self.eager_load = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PoolConfig::default();

        assert_eq!(config.pool_size, 5);
        assert_eq!(config.release_grace, Duration::from_secs(1));
        assert_eq!(config.idle_timeout, Duration::from_secs(600));
        assert_eq!(config.sweep_interval, Duration::from_secs(180));
        assert_eq!(config.preload_delay, Duration::from_secs(1));
        assert_eq!(config.max_preloaded, 3);
        assert!(!config.eager_load);
        assert!(config.preload.muted);
        assert!(!config.preload.controls);
    }

    #[test]
    fn test_pool_size_clamped() {
        assert_eq!(PoolConfig::with_size(0).pool_size, 1);
        assert_eq!(PoolConfig::default().pool_size(0).pool_size, 1);
    }

    #[test]
    fn test_builder_chaining() {
        let config = PoolConfig::with_size(2)
            .release_grace(Duration::ZERO)
            .idle_timeout(Duration::from_secs(300))
            .preload_delay(Duration::from_millis(500))
            .preload_spacing(Duration::from_millis(50))
            .max_preloaded(1)
            .eager_load();

        assert_eq!(config.pool_size, 2);
        assert_eq!(config.release_grace, Duration::ZERO);
        assert_eq!(config.idle_timeout, Duration::from_secs(300));
        assert_eq!(config.preload_delay, Duration::from_millis(500));
        assert_eq!(config.preload_spacing, Duration::from_millis(50));
        assert_eq!(config.max_preloaded, 1);
        assert!(config.eager_load);
    }
}
