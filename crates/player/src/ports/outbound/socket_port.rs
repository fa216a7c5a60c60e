//! Socket Port - the raw text-frame transport under the connection manager
//!
//! A connector opens one socket and hands back a pair of channels. Dropping
//! `outbound` closes the socket; `inbound` ends after a `Closed` event.

use async_trait::async_trait;
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConnectionError {
    #[error("Not connected")]
    NotConnected,
    #[error("Failed to connect: {0}")]
    ConnectFailed(String),
    #[error("Failed to serialize message: {0}")]
    Serialize(String),
    /// The session task has stopped; the handle is unusable.
    #[error("Connection session closed")]
    SessionClosed,
}

/// Something the socket reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketEvent {
    Frame(String),
    /// `code` is `None` when the peer went away without a close frame.
    Closed { code: Option<u16>, reason: String },
    /// Reported, but only the following `Closed` ends the socket.
    Error(String),
}

/// Both halves of one open socket.
#[derive(Debug)]
pub struct SocketChannels {
    pub outbound: mpsc::UnboundedSender<String>,
    pub inbound: mpsc::UnboundedReceiver<SocketEvent>,
}

#[async_trait]
pub trait SocketConnector: Send + Sync {
    async fn open(&self, url: &str) -> Result<SocketChannels, ConnectionError>;
}
