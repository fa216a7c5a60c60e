//! Lobby roster shown before a game starts.

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct LobbyRoster {
    pub players: Vec<String>,
    /// Last free-text notice broadcast to the lobby
    pub notice: Option<String>,
}

impl LobbyRoster {
    /// Replaces the roster. Returns false if it was already identical.
    pub fn replace_players(&mut self, players: Vec<String>) -> bool {
        if self.players == players {
            return false;
        }
        self.players = players;
        true
    }

    pub fn set_notice(&mut self, notice: impl Into<String>) {
        self.notice = Some(notice.into());
    }

    /// A game starts once four players are present.
    pub fn is_full(&self) -> bool {
        self.players.len() >= 4
    }
}
