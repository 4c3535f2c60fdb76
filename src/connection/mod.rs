//! Resilient keyed persistent connections
//!
//! [`ConnectionManager`] keeps at most one link per key open through a
//! pluggable [`Connector`]. Connect attempts are bounded by a timeout,
//! failures are retried with linear backoff up to a fixed number of times,
//! and open links can be kept alive with periodic probes.
//!
//! Only the caller awaiting [`ConnectionManager::open`] ever sees an error.
//! Failures on a link that is already open trigger a silent background
//! reconnect that is visible only through [`ConnectionManager::status`].

pub mod config;
pub mod manager;
pub mod state;
pub mod transport;

pub use config::ConnectionConfig;
pub use manager::ConnectionManager;
pub use state::{ConnectionState, ConnectionStatus};
pub use transport::{Connector, Established, Link, LinkEvent, NORMAL_CLOSURE};
