//! Protocol decode errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The frame is not a JSON `{type, data}` envelope
    #[error("Malformed frame: {0}")]
    MalformedFrame(#[source] serde_json::Error),

    /// The envelope is fine but its payload does not match the message kind
    #[error("Malformed {kind} payload: {source}")]
    MalformedPayload {
        kind: String,
        source: serde_json::Error,
    },
}

impl ProtocolError {
    pub fn payload(kind: impl Into<String>, source: serde_json::Error) -> Self {
        Self::MalformedPayload {
            kind: kind.into(),
            source,
        }
    }
}
