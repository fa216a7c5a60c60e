//! Socket transport using tokio-tungstenite

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};

use super::shared::CLOSE_NO_STATUS;
use crate::ports::outbound::{ConnectionError, SocketChannels, SocketConnector, SocketEvent};

/// Opens real WebSocket connections. Each open socket gets one pump task
/// that lives until either side closes.
#[derive(Debug, Clone, Copy, Default)]
pub struct TungsteniteConnector;

#[async_trait]
impl SocketConnector for TungsteniteConnector {
    async fn open(&self, url: &str) -> Result<SocketChannels, ConnectionError> {
        let (ws_stream, _) = connect_async(url)
            .await
            .map_err(|e| ConnectionError::ConnectFailed(e.to_string()))?;
        tracing::info!(url = %url, "Socket opened");

        let (mut write, mut read) = ws_stream.split();
        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<String>();
        let (in_tx, in_rx) = mpsc::unbounded_channel::<SocketEvent>();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    outgoing = out_rx.recv() => match outgoing {
                        Some(text) => {
                            if let Err(e) = write.send(Message::Text(text)).await {
                                tracing::warn!(error = %e, "Failed to write frame");
                                let _ = in_tx.send(SocketEvent::Error(e.to_string()));
                            }
                        }
                        None => {
                            // Owner dropped the sender: close from our side.
                            let _ = write.send(Message::Close(None)).await;
                            break;
                        }
                    },
                    incoming = read.next() => match incoming {
                        Some(Ok(Message::Text(text))) => {
                            if in_tx.send(SocketEvent::Frame(text)).is_err() {
                                break;
                            }
                        }
                        Some(Ok(Message::Close(frame))) => {
                            let (code, reason) = match frame {
                                Some(frame) => (u16::from(frame.code), frame.reason.into_owned()),
                                None => (CLOSE_NO_STATUS, String::new()),
                            };
                            let _ = in_tx.send(SocketEvent::Closed {
                                code: Some(code),
                                reason,
                            });
                            break;
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            let _ = in_tx.send(SocketEvent::Error(e.to_string()));
                            let _ = in_tx.send(SocketEvent::Closed {
                                code: None,
                                reason: e.to_string(),
                            });
                            break;
                        }
                        None => {
                            let _ = in_tx.send(SocketEvent::Closed {
                                code: None,
                                reason: String::new(),
                            });
                            break;
                        }
                    },
                }
            }
            tracing::debug!("Socket pump finished");
        });

        Ok(SocketChannels {
            outbound: out_tx,
            inbound: in_rx,
        })
    }
}
