//! WebSocket connection to the game server
//!
//! - `client`: `ConnectionManager` handle and its session task
//! - `backoff`: reconnection policy, free of any runtime
//! - `transport`: tokio-tungstenite socket pump
//! - `shared`: constants and frame helpers

mod client;
mod backoff;
mod shared;
mod transport;

pub use client::{ConnectionConfig, ConnectionManager, SessionEvent};
pub use backoff::{delay_for, BackoffState, ReconnectDecision};
pub use shared::{CLOSE_NO_STATUS, MAX_RETRY_ATTEMPTS};
pub use transport::TungsteniteConnector;
