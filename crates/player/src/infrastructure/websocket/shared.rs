//! Constants and frame helpers shared by the transport and the session task.

use dealer_shared::{AuthFrame, Envelope, ProtocolError};

use crate::ports::outbound::ConnectionError;

// Reconnection constants
pub const INITIAL_RETRY_DELAY_MS: u64 = 1_000;
pub const MAX_RETRY_DELAY_MS: u64 = 30_000;
pub const MAX_RETRY_ATTEMPTS: u32 = 5;
pub const BACKOFF_MULTIPLIER: u64 = 2;

/// Close code 1005: the close frame carried no status.
pub const CLOSE_NO_STATUS: u16 = 1005;

pub fn parse_envelope(text: &str) -> Result<Envelope, ProtocolError> {
    Envelope::decode(text)
}

/// The first frame written to every new socket.
pub fn auth_frame(token: &str) -> Result<String, ConnectionError> {
    serde_json::to_string(&AuthFrame {
        token: token.to_string(),
    })
    .map_err(|e| ConnectionError::Serialize(e.to_string()))
}
