//! Client configuration loaded from environment

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::infrastructure::http_client::DEFAULT_API_BASE_URL;
use crate::infrastructure::websocket::{ConnectionConfig, MAX_RETRY_ATTEMPTS};

pub const DEFAULT_WS_URL: &str = "ws://localhost:8080/ws";
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// WebSocket endpoint
    pub ws_url: String,
    /// Base URL for the lobby/game HTTP endpoints
    pub api_url: String,
    /// Requested lobby name; the server picks one when unset
    pub player_name: Option<String>,
    pub max_reconnect_attempts: u32,
    pub http_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            ws_url: DEFAULT_WS_URL.to_string(),
            api_url: DEFAULT_API_BASE_URL.to_string(),
            player_name: None,
            max_reconnect_attempts: MAX_RETRY_ATTEMPTS,
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let text = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        Self {
            ws_url: text("DEALER_WS_URL").unwrap_or(defaults.ws_url),
            api_url: text("DEALER_API_URL").unwrap_or(defaults.api_url),
            player_name: text("DEALER_PLAYER_NAME"),
            max_reconnect_attempts: parse_or(
                "DEALER_MAX_RECONNECT_ATTEMPTS",
                text("DEALER_MAX_RECONNECT_ATTEMPTS"),
                defaults.max_reconnect_attempts,
            ),
            http_timeout: Duration::from_secs(parse_or(
                "DEALER_HTTP_TIMEOUT_SECS",
                text("DEALER_HTTP_TIMEOUT_SECS"),
                DEFAULT_HTTP_TIMEOUT_SECS,
            )),
        }
    }

    pub fn connection(&self) -> ConnectionConfig {
        ConnectionConfig {
            url: self.ws_url.clone(),
            max_reconnect_attempts: self.max_reconnect_attempts,
        }
    }
}

fn parse_or<T>(key: &str, raw: Option<String>, default: T) -> T
where
    T: FromStr + Copy + std::fmt::Display,
{
    let Some(raw) = raw else {
        return default;
    };
    raw.parse().unwrap_or_else(|_| {
        tracing::warn!(key, value = %raw, default = %default, "Unparseable setting, using default");
        default
    })
}

/// Loads `.env.local` then `.env` from the working directory. Values already
/// in the environment win.
pub fn load_dotenv() {
    for filename in [".env.local", ".env"] {
        let path = std::path::Path::new(filename);
        if path.exists() {
            let _ = dotenvy::from_path(path);
        }
    }
}
