//! Transport contract
//!
//! The manager does not speak any wire protocol. A [`Connector`] opens a link
//! and hands back the link together with a channel of remote events; the
//! manager only sends keep-alive probes and closes links.

use std::io;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;

use super::config::ConnectionConfig;

/// Close code of a normal, intentional closure
pub const NORMAL_CLOSURE: u16 = 1000;

/// Event reported by an open link
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// Remote started the closing handshake
    Closing,
    /// Link closed with the given code
    Closed { code: u16 },
    /// Link failed
    Error(String),
}

impl LinkEvent {
    /// Whether this event ends the link without asking for a reconnect
    pub fn is_normal_closure(&self) -> bool {
        matches!(self, LinkEvent::Closed { code } if *code == NORMAL_CLOSURE)
    }
}

/// An open persistent link
pub trait Link: Send + Sync + 'static {
    /// Send a payload over the link
    fn send(&self, payload: Bytes) -> io::Result<()>;

    /// Close the link with a normal closure
    fn close(&self);
}

/// A freshly opened link and its event stream
///
/// The event channel closing without a `Closed` event is treated as an
/// abnormal closure.
pub struct Established<L> {
    pub link: Arc<L>,
    pub events: mpsc::Receiver<LinkEvent>,
}

/// Opens links for keys
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Link type produced
    type Link: Link;

    /// Open a link for `key`
    async fn connect(&self, key: &str, config: &ConnectionConfig) -> io::Result<Established<Self::Link>>;
}
