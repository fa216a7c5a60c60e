//! Dealer Protocol - wire types between the game server and the player client
//!
//! - `envelope` - the `{type, data}` frame every server push arrives in
//! - `messages` - typed server events, client messages and the auth frame
//! - `http` - lobby and move request/response bodies
//!
//! Pure data and serialization. No I/O and no state.

pub mod envelope;
pub mod error;
pub mod http;
pub mod messages;

pub use envelope::Envelope;
pub use error::ProtocolError;
pub use http::{JoinLobbyResponse, MoveRequest};
pub use messages::{
    AuthFrame, BidUpdatePayload, CardPlayedPayload, ClientMessage, GameOverPayload,
    GameStatePayload, HealthStatePayload, PlayerPayload, PlayerRef, ServerEvent,
    TableStatePayload, TrickWonPayload, UpdateBidPayload,
};
