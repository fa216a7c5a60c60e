//! Game API Port - the lobby/start/move HTTP surface
//!
//! The socket carries state; everything the player initiates outside of
//! bidding goes through these request/response calls.

use async_trait::async_trait;
use dealer_domain::Card;
use dealer_shared::JoinLobbyResponse;

#[derive(Debug, Clone, thiserror::Error)]
pub enum ApiError {
    #[error("Request failed: {0}")]
    RequestFailed(String),
    #[error("Server returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GameApiPort: Send + Sync {
    /// Registers with the lobby. The server picks a name when `username` is `None`.
    async fn join_lobby(&self, username: Option<String>) -> Result<JoinLobbyResponse, ApiError>;

    /// Asks the server to deal. Needs the token from `join_lobby`.
    async fn start_game(&self, player_id: &str, token: &str) -> Result<(), ApiError>;

    async fn submit_move(&self, game_id: &str, player_id: &str, card: Card)
        -> Result<(), ApiError>;
}
