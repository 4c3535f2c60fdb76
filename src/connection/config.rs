//! Connection configuration

use std::time::Duration;

use bytes::Bytes;

use crate::backoff::Backoff;

/// Default keep-alive probe
const DEFAULT_PING: &[u8] = br#"{"type":"ping"}"#;

/// Connection manager configuration options
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Upper bound for a single connect attempt
    pub connect_timeout: Duration,

    /// Base reconnect delay; attempt `n` waits `n * reconnect_interval`
    pub reconnect_interval: Duration,

    /// Cap for any single reconnect delay
    pub max_reconnect_delay: Duration,

    /// Reconnects allowed before the connection is given up
    pub max_reconnect_attempts: u32,

    /// Default keep-alive interval
    pub keep_alive_interval: Duration,

    /// Payload sent as a keep-alive probe
    pub ping_payload: Bytes,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            reconnect_interval: Duration::from_secs(2),
            max_reconnect_delay: Duration::from_secs(10),
            max_reconnect_attempts: 3,
            keep_alive_interval: Duration::from_secs(30),
            ping_payload: Bytes::from_static(DEFAULT_PING),
        }
    }
}

impl ConnectionConfig {
    /// Set connect timeout
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set base reconnect interval
    pub fn reconnect_interval(mut self, interval: Duration) -> Self {
        self.reconnect_interval = interval;
        self
    }

    /// Set reconnect delay cap
    pub fn max_reconnect_delay(mut self, delay: Duration) -> Self {
        self.max_reconnect_delay = delay;
        self
    }

    /// Set maximum reconnect attempts
    pub fn max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.max_reconnect_attempts = attempts;
        self
    }

    /// Set default keep-alive interval
    pub fn keep_alive_interval(mut self, interval: Duration) -> Self {
        self.keep_alive_interval = interval;
        self
    }

    /// Set keep-alive payload
    pub fn ping_payload(mut self, payload: impl Into<Bytes>) -> Self {
        self.ping_payload = payload.into();
        self
    }

    /// Reconnect delay policy
    pub fn backoff(&self) -> Backoff {
        Backoff::linear(self.reconnect_interval, self.max_reconnect_delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ConnectionConfig::default();

        assert_eq!(config.connect_timeout, Duration::from_secs(5));
        assert_eq!(config.reconnect_interval, Duration::from_secs(2));
        assert_eq!(config.max_reconnect_attempts, 3);
        assert_eq!(&config.ping_payload[..], br#"{"type":"ping"}"#);
    }

    #[test]
    fn test_reconnect_delays_linear_and_capped() {
        let backoff = ConnectionConfig::default().backoff();

        assert_eq!(backoff.delay(1), Duration::from_secs(2));
        assert_eq!(backoff.delay(3), Duration::from_secs(6));
        assert_eq!(backoff.delay(5), Duration::from_secs(10));
        assert_eq!(backoff.delay(9), Duration::from_secs(10));
    }

    #[test]
    fn test_builder_chaining() {
        let config = ConnectionConfig::default()
            .connect_timeout(Duration::from_millis(500))
            .max_reconnect_attempts(1)
            .ping_payload(&b"hb"[..]);

        assert_eq!(config.connect_timeout, Duration::from_millis(500));
        assert_eq!(config.max_reconnect_attempts, 1);
        assert_eq!(&config.ping_payload[..], b"hb");
    }
}
