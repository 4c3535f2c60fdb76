//! Connection state machine
//!
//! ```text
//!   Disconnected ──open──► Connecting ──success──► Open
//!        ▲                  │    ▲                  │  │
//!        │          timeout │    │ delay            │  │ remote closing
//!        │◄─────────────────┘    │                  │  ▼
//!        │                  Reconnecting ◄──error───┘ Closing
//!        │                       │  ▲                  │
//!        │◄── attempts exhausted ┘  └── abnormal close ┤
//!        │◄──────────────── normal close (1000) ───────┘
//! ```

use tokio::time::Instant;

/// Lifecycle state of one keyed connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// No link; remote closed normally
    Disconnected,
    /// Connect attempt in progress
    Connecting,
    /// Link established
    Open,
    /// Remote started closing the link
    Closing,
    /// Waiting before the next connect attempt
    Reconnecting,
}

impl ConnectionState {
    /// Whether a connect attempt is pending or scheduled
    pub fn is_pending(&self) -> bool {
        matches!(self, ConnectionState::Connecting | ConnectionState::Reconnecting)
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ConnectionState::Disconnected => "DISCONNECTED",
            ConnectionState::Connecting => "CONNECTING",
            ConnectionState::Open => "OPEN",
            ConnectionState::Closing => "CLOSING",
            ConnectionState::Reconnecting => "RECONNECTING",
        };
        f.write_str(name)
    }
}

/// Detailed status of one keyed connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionStatus {
    /// Current state
    pub state: ConnectionState,
    /// Reconnects since the last successful open
    pub reconnect_attempts: u32,
    /// Start of the most recent connect attempt
    pub last_connect_at: Instant,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_states() {
        assert!(ConnectionState::Connecting.is_pending());
        assert!(ConnectionState::Reconnecting.is_pending());
        assert!(!ConnectionState::Open.is_pending());
        assert!(!ConnectionState::Closing.is_pending());
    }

    #[test]
    fn test_display() {
        assert_eq!(ConnectionState::Open.to_string(), "OPEN");
        assert_eq!(ConnectionState::Reconnecting.to_string(), "RECONNECTING");
    }
}
