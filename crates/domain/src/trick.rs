//! The trick currently on the table.
//!
//! Kept apart from `GameSnapshot`: it changes on every card played and is
//! wiped whenever the server resolves or resets the trick.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::cards::Card;

/// Cards played in the active trick, keyed by player id.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct TrickState {
    plays: BTreeMap<String, Card>,
}

impl TrickState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Upserts a play. Returns false when the same card was already recorded.
    pub fn record(&mut self, player_id: impl Into<String>, card: Card) -> bool {
        self.plays.insert(player_id.into(), card) != Some(card)
    }

    /// Empties the trick. Returns false when there was nothing to clear.
    pub fn clear(&mut self) -> bool {
        if self.plays.is_empty() {
            return false;
        }
        self.plays.clear();
        true
    }

    pub fn card_of(&self, player_id: &str) -> Option<Card> {
        self.plays.get(player_id).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.plays.is_empty()
    }

    pub fn len(&self) -> usize {
        self.plays.len()
    }

    pub fn plays(&self) -> impl Iterator<Item = (&str, Card)> {
        self.plays.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

/// Winner of the most recently resolved trick, kept for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrickWinner {
    pub player_id: String,
    pub score: Option<i32>,
}
