//! Dealer Domain
//!
//! Value objects and state for the four-seat trick-taking game the player
//! client mirrors. Pure data with invariants: no I/O, no logging, no rules.
//!
//! - `cards` - `Card`, `Rank`, `Suit` and the hand display order
//! - `snapshot` - `GameSnapshot`, `PlayerState`, `SeatKey` with copy-on-write seat updates
//! - `trick` - cards on the table and the last trick winner
//! - `lobby` - who is waiting in the lobby

pub mod cards;
pub mod error;
pub mod lobby;
pub mod snapshot;
pub mod trick;

pub use cards::{is_sorted_hand, sort_hand, Card, Rank, Suit};
pub use error::DomainError;
pub use lobby::LobbyRoster;
pub use snapshot::{GameSnapshot, PlayerState, SeatKey, SeatOverlay, TurnMarker};
pub use trick::{TrickState, TrickWinner};
