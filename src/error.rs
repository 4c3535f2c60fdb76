//! Error types
//!
//! Cache and pool lookups never fail: absence is a valid return. Only pool
//! readiness waits and connection attempts produce errors, and each error is
//! delivered to the caller awaiting that one key. Fetch errors are generic and
//! flow back from [`RequestDeduplicator`](crate::dedup::RequestDeduplicator)
//! unchanged.
//!
//! Errors are `Clone` because a single failure may be observed by every
//! waiter of a shared in-flight future.

use std::time::Duration;

use crate::pool::HandleId;

/// Result alias for crate operations
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Embed pool error
    Pool(PoolError),
    /// Connection manager error
    Connection(ConnectionError),
}

/// Errors raised by [`EmbedPool`](crate::pool::EmbedPool)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    /// Pool is at capacity and no victim could be selected
    ResourceExhausted { pool_size: usize },
    /// Handle is not (or no longer) part of the pool
    UnknownHandle(HandleId),
    /// Handle did not signal readiness in time
    ReadyTimeout { handle: HandleId, timeout: Duration },
    /// Handle was retired while a caller was waiting on it
    Retired(HandleId),
    /// Handle was rebound to another channel since the snapshot was taken
    Stale(HandleId),
}

/// Errors raised by [`ConnectionManager`](crate::connection::ConnectionManager)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    /// Connection did not open within the configured timeout
    Timeout { key: String, timeout: Duration },
    /// Reconnect attempts exhausted
    Rejected {
        key: String,
        attempts: u32,
        reason: String,
    },
    /// Connection was closed explicitly while the attempt was pending
    Closed(String),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Pool(e) => write!(f, "Pool error: {}", e),
            Error::Connection(e) => write!(f, "Connection error: {}", e),
        }
    }
}

impl std::fmt::Display for PoolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PoolError::ResourceExhausted { pool_size } => {
                write!(f, "Pool exhausted ({} handles, no victim)", pool_size)
            }
            PoolError::UnknownHandle(id) => write!(f, "Unknown handle: {}", id),
            PoolError::ReadyTimeout { handle, timeout } => write!(
                f,
                "Handle {} not ready after {}ms",
                handle,
                timeout.as_millis()
            ),
            PoolError::Retired(id) => write!(f, "Handle retired: {}", id),
            PoolError::Stale(id) => write!(f, "Handle rebound since snapshot: {}", id),
        }
    }
}

impl std::fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionError::Timeout { key, timeout } => write!(
                f,
                "Connection timeout after {}ms: {}",
                timeout.as_millis(),
                key
            ),
            ConnectionError::Rejected {
                key,
                attempts,
                reason,
            } => write!(
                f,
                "Connection rejected after {} reconnect attempts: {} ({})",
                attempts, key, reason
            ),
            ConnectionError::Closed(key) => write!(f, "Connection closed: {}", key),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Pool(e) => Some(e),
            Error::Connection(e) => Some(e),
        }
    }
}

impl std::error::Error for PoolError {}

impl std::error::Error for ConnectionError {}

impl From<PoolError> for Error {
    fn from(e: PoolError) -> Self {
        Error::Pool(e)
    }
}

impl From<ConnectionError> for Error {
    fn from(e: ConnectionError) -> Self {
        Error::Connection(e)
    }
}
