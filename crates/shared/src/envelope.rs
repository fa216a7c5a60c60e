//! The `{type, data}` wrapper around every inbound socket frame.
//!
//! The connection layer only ever sees `Envelope`; it knows nothing about
//! what a given `type` means.

use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: String,
    /// Missing `data` decodes as `null`
    #[serde(default)]
    pub data: serde_json::Value,
}

impl Envelope {
    pub fn new(kind: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            kind: kind.into(),
            data,
        }
    }

    /// Parses one text frame.
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(text).map_err(ProtocolError::MalformedFrame)
    }

    /// Message kinds are matched case-insensitively.
    pub fn normalized_kind(&self) -> String {
        self.kind.trim().to_ascii_lowercase()
    }
}
