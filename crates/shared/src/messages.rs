//! WebSocket message types for server-player communication
//!
//! Inbound frames arrive as an `Envelope` and are lifted into `ServerEvent`,
//! one variant per message kind the server emits. Kinds this client does not
//! know become `ServerEvent::Unknown` instead of failing, so a newer server
//! never breaks an older client.
//!
//! Outbound messages are flat objects tagged by `type`; the very first frame
//! on a socket is the untagged `AuthFrame`.

use std::collections::BTreeMap;

use dealer_domain::{Card, GameSnapshot, PlayerState, SeatKey, TrickWinner, TurnMarker};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::envelope::Envelope;
use crate::error::ProtocolError;

// =============================================================================
// Server Messages (Server → Player)
// =============================================================================

/// Every message kind the server can push.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    /// Full replacement of the game state
    GameState(Box<GameStatePayload>),
    HealthState(HealthStatePayload),
    CardPlayed(CardPlayedPayload),
    TrickWon(TrickWonPayload),
    /// The table was cleared without a winner
    ResetCardPlayed,
    BidUpdate(BidUpdatePayload),
    BiddingComplete,
    /// The server has no bid registered for this player
    UpdateBid(UpdateBidPayload),
    GameOver(GameOverPayload),
    /// `playerlist`, `playerjoined` and `playerleft` all carry the full roster
    LobbyRoster(Vec<String>),
    /// Free-text lobby notice
    LobbyMessage(String),
    /// Unknown message type for forward compatibility
    Unknown { kind: String },
}

impl ServerEvent {
    /// Lifts a decoded envelope into a typed event.
    ///
    /// Unknown kinds are not errors; a known kind with a payload that does not
    /// fit is.
    pub fn from_envelope(envelope: Envelope) -> Result<Self, ProtocolError> {
        let kind = envelope.normalized_kind();
        let data = envelope.data;

        let event = match kind.as_str() {
            "gamestate" => ServerEvent::GameState(Box::new(payload(&kind, data)?)),
            "healthstate" => ServerEvent::HealthState(payload(&kind, data)?),
            "cardplayed" => ServerEvent::CardPlayed(payload(&kind, data)?),
            "trickwon" => ServerEvent::TrickWon(payload(&kind, data)?),
            "resetcardplayed" => ServerEvent::ResetCardPlayed,
            "bidupdate" => ServerEvent::BidUpdate(payload(&kind, data)?),
            "biddingcomplete" => ServerEvent::BiddingComplete,
            "updatebid" => ServerEvent::UpdateBid(optional_payload(&kind, data)?),
            "gameover" => ServerEvent::GameOver(optional_payload(&kind, data)?),
            "playerlist" | "playerjoined" | "playerleft" => {
                let roster: RosterPayload = optional_payload(&kind, data)?;
                ServerEvent::LobbyRoster(roster.into_players())
            }
            "message" => ServerEvent::LobbyMessage(match data {
                serde_json::Value::String(text) => text,
                serde_json::Value::Null => String::new(),
                other => other.to_string(),
            }),
            _ => ServerEvent::Unknown {
                kind: envelope.kind,
            },
        };

        Ok(event)
    }

    /// Lower-case wire name, for logging.
    pub fn kind(&self) -> &str {
        match self {
            ServerEvent::GameState(_) => "gamestate",
            ServerEvent::HealthState(_) => "healthstate",
            ServerEvent::CardPlayed(_) => "cardplayed",
            ServerEvent::TrickWon(_) => "trickwon",
            ServerEvent::ResetCardPlayed => "resetcardplayed",
            ServerEvent::BidUpdate(_) => "bidupdate",
            ServerEvent::BiddingComplete => "biddingcomplete",
            ServerEvent::UpdateBid(_) => "updatebid",
            ServerEvent::GameOver(_) => "gameover",
            ServerEvent::LobbyRoster(_) => "playerlist",
            ServerEvent::LobbyMessage(_) => "message",
            ServerEvent::Unknown { kind } => kind,
        }
    }
}

fn payload<T: DeserializeOwned>(kind: &str, data: serde_json::Value) -> Result<T, ProtocolError> {
    serde_json::from_value(data).map_err(|e| ProtocolError::payload(kind, e))
}

fn optional_payload<T: DeserializeOwned + Default>(
    kind: &str,
    data: serde_json::Value,
) -> Result<T, ProtocolError> {
    if data.is_null() {
        return Ok(T::default());
    }
    payload(kind, data)
}

/// Full game state as the server serializes its game object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameStatePayload {
    #[serde(rename = "GameID", alias = "gameId", alias = "game_id")]
    pub game_id: String,
    #[serde(rename = "Players", alias = "players", default)]
    pub players: Vec<String>,
    #[serde(rename = "State", alias = "state")]
    pub state: TableStatePayload,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TableStatePayload {
    #[serde(default)]
    pub player1: Option<PlayerPayload>,
    #[serde(default)]
    pub player2: Option<PlayerPayload>,
    #[serde(default)]
    pub player3: Option<PlayerPayload>,
    #[serde(default)]
    pub player4: Option<PlayerPayload>,
    /// Opaque turn marker
    #[serde(default)]
    pub turn: serde_json::Value,
    #[serde(default)]
    pub trick_suit: Option<String>,
    #[serde(default)]
    pub scores: Option<BTreeMap<String, i32>>,
    #[serde(default)]
    pub bids: Option<BTreeMap<String, i32>>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PlayerPayload {
    pub id: String,
    /// The server sends `null` for an empty hand
    #[serde(default)]
    pub hand: Option<Vec<Card>>,
    #[serde(default)]
    pub health: i32,
    #[serde(default)]
    pub score: Option<i32>,
    #[serde(default)]
    pub bid: Option<i32>,
    #[serde(default)]
    pub played_card: Option<Card>,
}

impl PlayerPayload {
    fn into_player_state(self) -> PlayerState {
        PlayerState {
            id: self.id,
            hand: self.hand.unwrap_or_default(),
            health: self.health,
            score: self.score,
            bid: self.bid,
            played_card: self.played_card,
        }
    }
}

impl GameStatePayload {
    /// Converts into a domain snapshot. Seats without a player id are left
    /// empty; hands are sorted by `GameSnapshot::new`.
    pub fn into_snapshot(self) -> GameSnapshot {
        let TableStatePayload {
            player1,
            player2,
            player3,
            player4,
            turn,
            trick_suit,
            scores,
            bids,
        } = self.state;

        let seats = SeatKey::ALL
            .into_iter()
            .zip([player1, player2, player3, player4])
            .filter_map(|(key, player)| player.map(|p| (key, p)))
            .filter(|(_, p)| !p.id.is_empty())
            .map(|(key, p)| (key, p.into_player_state()));

        GameSnapshot::new(self.game_id, self.players, TurnMarker::new(turn), seats)
            .with_trick_suit(trick_suit.filter(|s| !s.is_empty()))
            .with_scores(scores.unwrap_or_default())
            .with_bids(bids.unwrap_or_default())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthStatePayload {
    #[serde(alias = "playerId")]
    pub player: String,
    pub health: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardPlayedPayload {
    #[serde(rename = "playerId", alias = "player_id", alias = "player")]
    pub player_id: String,
    pub card: Card,
}

/// The server names the trick winner either by id or by its whole player
/// object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PlayerRef {
    Id(String),
    Player {
        id: String,
        #[serde(default)]
        score: Option<i32>,
    },
}

impl PlayerRef {
    pub fn id(&self) -> &str {
        match self {
            PlayerRef::Id(id) => id,
            PlayerRef::Player { id, .. } => id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrickWonPayload {
    pub player: PlayerRef,
    #[serde(default)]
    pub score: Option<i32>,
}

impl TrickWonPayload {
    /// Top-level `score` wins over the one nested in the player object.
    pub fn winner(&self) -> TrickWinner {
        let nested = match &self.player {
            PlayerRef::Player { score, .. } => *score,
            PlayerRef::Id(_) => None,
        };
        TrickWinner {
            player_id: self.player.id().to_string(),
            score: self.score.or(nested),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BidUpdatePayload {
    #[serde(rename = "playerId", alias = "player_id", alias = "player")]
    pub player_id: String,
    pub bid: i32,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct UpdateBidPayload {
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GameOverPayload {
    #[serde(rename = "playerId", alias = "player_id", default)]
    pub player_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
enum RosterPayload {
    List(Vec<String>),
    Wrapped { players: Vec<String> },
}

impl Default for RosterPayload {
    fn default() -> Self {
        RosterPayload::List(Vec::new())
    }
}

impl RosterPayload {
    fn into_players(self) -> Vec<String> {
        match self {
            RosterPayload::List(players) | RosterPayload::Wrapped { players } => players,
        }
    }
}

// =============================================================================
// Client Messages (Player → Server)
// =============================================================================

/// Messages from the player to the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientMessage {
    /// Tells the server this client has applied a state broadcast
    Acknowledgment {
        #[serde(rename = "playerId")]
        player_id: String,
    },
    PlaceBid {
        #[serde(rename = "playerId")]
        player_id: String,
        bid: i32,
    },
}

impl ClientMessage {
    pub fn acknowledgment(player_id: impl Into<String>) -> Self {
        ClientMessage::Acknowledgment {
            player_id: player_id.into(),
        }
    }

    pub fn place_bid(player_id: impl Into<String>, bid: i32) -> Self {
        ClientMessage::PlaceBid {
            player_id: player_id.into(),
            bid,
        }
    }
}

/// First frame on every new socket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthFrame {
    pub token: String,
}
