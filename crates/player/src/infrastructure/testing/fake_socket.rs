//! In-memory socket connector.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, Semaphore};

use crate::ports::outbound::{ConnectionError, SocketChannels, SocketConnector, SocketEvent};

/// The test's end of one opened socket.
pub struct FakeSocket {
    /// Frames the client wrote
    pub sent: mpsc::UnboundedReceiver<String>,
    events: mpsc::UnboundedSender<SocketEvent>,
}

impl FakeSocket {
    pub fn push_frame(&self, text: &str) {
        let _ = self.events.send(SocketEvent::Frame(text.to_string()));
    }

    pub fn close(&self, code: Option<u16>) {
        let _ = self.events.send(SocketEvent::Closed {
            code,
            reason: String::new(),
        });
    }
}

/// Hands every opened socket to the test through a channel.
pub struct FakeConnector {
    sockets: mpsc::UnboundedSender<FakeSocket>,
    opens: AtomicUsize,
    failing: AtomicBool,
    gate: Option<Semaphore>,
}

impl FakeConnector {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<FakeSocket>) {
        Self::build(None)
    }

    /// Opens block until `release` lets them through.
    pub fn gated() -> (Arc<Self>, mpsc::UnboundedReceiver<FakeSocket>) {
        Self::build(Some(Semaphore::new(0)))
    }

    fn build(gate: Option<Semaphore>) -> (Arc<Self>, mpsc::UnboundedReceiver<FakeSocket>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let connector = Arc::new(Self {
            sockets: tx,
            opens: AtomicUsize::new(0),
            failing: AtomicBool::new(false),
            gate,
        });
        (connector, rx)
    }

    pub fn release(&self, opens: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(opens);
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SocketConnector for FakeConnector {
    async fn open(&self, _url: &str) -> Result<SocketChannels, ConnectionError> {
        if let Some(gate) = &self.gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }
        self.opens.fetch_add(1, Ordering::SeqCst);

        if self.failing.load(Ordering::SeqCst) {
            return Err(ConnectionError::ConnectFailed("connection refused".into()));
        }

        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (in_tx, in_rx) = mpsc::unbounded_channel();
        let _ = self.sockets.send(FakeSocket {
            sent: out_rx,
            events: in_tx,
        });
        Ok(SocketChannels {
            outbound: out_tx,
            inbound: in_rx,
        })
    }
}
