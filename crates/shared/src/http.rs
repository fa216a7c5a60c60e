//! Request and response bodies for the lobby and game HTTP endpoints.

use dealer_domain::Card;
use serde::{Deserialize, Serialize};

/// Response of `POST /lobby/join`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinLobbyResponse {
    pub token: String,
    #[serde(rename = "playerName", alias = "player_name")]
    pub player_name: String,
}

/// Body of `POST /game/move`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveRequest {
    pub card: Card,
}
