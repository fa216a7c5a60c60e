//! The canonical view of one game.
//!
//! A `GameSnapshot` is never mutated once published. Updates produce a new
//! snapshot that shares every untouched seat (`Arc<PlayerState>`) with its
//! predecessor and replaces only the seat that changed.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::Serialize;

use crate::cards::{sort_hand, Card};
use crate::error::DomainError;

/// Fixed seat labels. Distinct from the player identifier seated there.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SeatKey {
    Player1,
    Player2,
    Player3,
    Player4,
}

impl SeatKey {
    pub const ALL: [SeatKey; 4] = [
        SeatKey::Player1,
        SeatKey::Player2,
        SeatKey::Player3,
        SeatKey::Player4,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SeatKey::Player1 => "player1",
            SeatKey::Player2 => "player2",
            SeatKey::Player3 => "player3",
            SeatKey::Player4 => "player4",
        }
    }
}

impl fmt::Display for SeatKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SeatKey {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "player1" => Ok(SeatKey::Player1),
            "player2" => Ok(SeatKey::Player2),
            "player3" => Ok(SeatKey::Player3),
            "player4" => Ok(SeatKey::Player4),
            _ => Err(DomainError::UnknownSeat(s.to_string())),
        }
    }
}

/// One seated player's state.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct PlayerState {
    pub id: String,
    pub hand: Vec<Card>,
    pub health: i32,
    /// Absent until scoring begins
    pub score: Option<i32>,
    /// Absent until a bid is placed
    pub bid: Option<i32>,
    pub played_card: Option<Card>,
}

impl PlayerState {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }
}

/// Server-owned turn marker. Echoed verbatim, never computed locally.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(transparent)]
pub struct TurnMarker(serde_json::Value);

impl TurnMarker {
    pub fn new(raw: serde_json::Value) -> Self {
        Self(raw)
    }
}

impl fmt::Display for TurnMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            serde_json::Value::Null => f.write_str("-"),
            serde_json::Value::String(s) => f.write_str(s),
            other => write!(f, "{other}"),
        }
    }
}

/// Result of overlaying a change onto one seat.
#[derive(Debug, Clone, PartialEq)]
pub enum SeatOverlay {
    /// A new snapshot with exactly one seat replaced
    Applied { seat: SeatKey, snapshot: GameSnapshot },
    /// The seat already held the value; the caller keeps its snapshot
    Unchanged { seat: SeatKey },
    /// No seat is occupied by that player id
    Miss,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct GameSnapshot {
    pub game_id: String,
    /// Seating/turn order as the server sends it
    pub players: Vec<String>,
    pub turn: TurnMarker,
    pub trick_suit: Option<String>,
    /// Keyed by player id; `overlay_score` updates it with the seat
    pub scores: BTreeMap<String, i32>,
    /// Keyed by player id; `overlay_bid` updates it with the seat
    pub bids: BTreeMap<String, i32>,
    seats: BTreeMap<SeatKey, Arc<PlayerState>>,
}

impl GameSnapshot {
    /// Builds a snapshot from a full server state, restoring the sorted-hand
    /// invariant on every seat.
    pub fn new(
        game_id: impl Into<String>,
        players: Vec<String>,
        turn: TurnMarker,
        seats: impl IntoIterator<Item = (SeatKey, PlayerState)>,
    ) -> Self {
        let seats = seats
            .into_iter()
            .map(|(key, mut player)| {
                sort_hand(&mut player.hand);
                (key, Arc::new(player))
            })
            .collect();

        Self {
            game_id: game_id.into(),
            players,
            turn,
            trick_suit: None,
            scores: BTreeMap::new(),
            bids: BTreeMap::new(),
            seats,
        }
    }

    pub fn with_trick_suit(mut self, trick_suit: Option<String>) -> Self {
        self.trick_suit = trick_suit;
        self
    }

    pub fn with_scores(mut self, scores: BTreeMap<String, i32>) -> Self {
        self.scores = scores;
        self
    }

    pub fn with_bids(mut self, bids: BTreeMap<String, i32>) -> Self {
        self.bids = bids;
        self
    }

    pub fn seat(&self, key: SeatKey) -> Option<&Arc<PlayerState>> {
        self.seats.get(&key)
    }

    /// Occupied seats in seat order.
    pub fn seats(&self) -> impl Iterator<Item = (SeatKey, &Arc<PlayerState>)> {
        self.seats.iter().map(|(k, v)| (*k, v))
    }

    pub fn seat_of(&self, player_id: &str) -> Option<SeatKey> {
        self.seats
            .iter()
            .find(|(_, p)| p.id == player_id)
            .map(|(k, _)| *k)
    }

    pub fn player(&self, player_id: &str) -> Option<&PlayerState> {
        self.seats
            .values()
            .find(|p| p.id == player_id)
            .map(|p| p.as_ref())
    }

    /// Applies `change` to a copy of the seat held by `player_id`.
    ///
    /// Never touches `self`. When the change is a no-op the caller is told so
    /// and can keep publishing the existing snapshot.
    pub fn overlay_player(
        &self,
        player_id: &str,
        change: impl FnOnce(&mut PlayerState),
    ) -> SeatOverlay {
        let Some(seat) = self.seat_of(player_id) else {
            return SeatOverlay::Miss;
        };
        let Some(current) = self.seats.get(&seat) else {
            return SeatOverlay::Miss;
        };

        let mut updated = PlayerState::clone(current);
        change(&mut updated);
        if updated == **current {
            return SeatOverlay::Unchanged { seat };
        }

        let mut snapshot = self.clone();
        snapshot.seats.insert(seat, Arc::new(updated));
        SeatOverlay::Applied { seat, snapshot }
    }

    /// Overlays a bid on the seat and on `bids` together.
    pub fn overlay_bid(&self, player_id: &str, bid: i32) -> SeatOverlay {
        let overlay = self.overlay_player(player_id, |p| p.bid = Some(bid));
        self.keep_table_in_step(overlay, player_id, bid, |s| &mut s.bids)
    }

    /// Overlays a score on the seat and on `scores` together.
    pub fn overlay_score(&self, player_id: &str, score: i32) -> SeatOverlay {
        let overlay = self.overlay_player(player_id, |p| p.score = Some(score));
        self.keep_table_in_step(overlay, player_id, score, |s| &mut s.scores)
    }

    fn keep_table_in_step(
        &self,
        overlay: SeatOverlay,
        player_id: &str,
        value: i32,
        table: fn(&mut GameSnapshot) -> &mut BTreeMap<String, i32>,
    ) -> SeatOverlay {
        match overlay {
            SeatOverlay::Applied { seat, mut snapshot } => {
                table(&mut snapshot).insert(player_id.to_string(), value);
                SeatOverlay::Applied { seat, snapshot }
            }
            SeatOverlay::Unchanged { seat } => {
                let mut snapshot = self.clone();
                let entry = table(&mut snapshot).insert(player_id.to_string(), value);
                if entry == Some(value) {
                    SeatOverlay::Unchanged { seat }
                } else {
                    SeatOverlay::Applied { seat, snapshot }
                }
            }
            SeatOverlay::Miss => SeatOverlay::Miss,
        }
    }
}
