//! Game state reconciler
//!
//! Sole owner and writer of the local game state. Each `ServerEvent` goes
//! through one merge rule; every rule is a last-write-wins overlay keyed by
//! player id, so replaying an event is harmless.
//!
//! The snapshot is shared as `Arc<GameSnapshot>` and replaced, never
//! mutated. A merge that changes nothing keeps the existing `Arc`, which lets
//! readers detect change with `Arc::ptr_eq`.
//!
//! The reconciler does no I/O. Messages the server expects in response
//! (acknowledgments, bid resubmissions) come back as `Reaction`s for the
//! caller to send.

use std::sync::Arc;

use dealer_domain::{
    GameSnapshot, LobbyRoster, SeatOverlay, TrickState, TrickWinner,
};
use dealer_shared::{ClientMessage, ServerEvent};

/// The server declared the game over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameOver {
    /// Set when the server names a player
    pub player_id: Option<String>,
}

/// Something the caller must do after a merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reaction {
    Send(ClientMessage),
    GameEnded(GameOver),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Local state changed
    Changed,
    /// The event was valid but already reflected
    Unchanged,
    /// The event named a player who holds no seat
    Miss { player_id: String },
    /// Unknown message kind
    Ignored { kind: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciled {
    pub outcome: ReconcileOutcome,
    pub reactions: Vec<Reaction>,
}

impl Reconciled {
    fn new(outcome: ReconcileOutcome) -> Self {
        Self {
            outcome,
            reactions: Vec::new(),
        }
    }

    fn changed(changed: bool) -> Self {
        Self::new(if changed {
            ReconcileOutcome::Changed
        } else {
            ReconcileOutcome::Unchanged
        })
    }

    fn with_reaction(mut self, reaction: Option<Reaction>) -> Self {
        self.reactions.extend(reaction);
        self
    }

    pub fn is_changed(&self) -> bool {
        self.outcome == ReconcileOutcome::Changed
    }
}

#[derive(Debug, Default)]
pub struct GameStateReconciler {
    local_player: Option<String>,
    snapshot: Option<Arc<GameSnapshot>>,
    trick: TrickState,
    trick_winner: Option<TrickWinner>,
    bidding_complete: bool,
    game_over: Option<GameOver>,
    lobby: LobbyRoster,
    last_bid: Option<i32>,
}

impl GameStateReconciler {
    pub fn new(local_player: Option<String>) -> Self {
        Self {
            local_player,
            ..Self::default()
        }
    }

    pub fn set_local_player(&mut self, player_id: impl Into<String>) {
        self.local_player = Some(player_id.into());
    }

    /// Remembered so an `updatebid` can resubmit it.
    pub fn record_bid(&mut self, bid: i32) {
        self.last_bid = Some(bid);
    }

    pub fn apply(&mut self, event: ServerEvent) -> Reconciled {
        match event {
            ServerEvent::GameState(payload) => self.replace_snapshot(payload.into_snapshot()),
            ServerEvent::HealthState(payload) => {
                let health = payload.health;
                self.overlay(&payload.player, |snapshot, id| {
                    snapshot.overlay_player(id, |p| p.health = health)
                })
            }
            ServerEvent::CardPlayed(payload) => {
                Reconciled::changed(self.trick.record(payload.player_id, payload.card))
            }
            ServerEvent::TrickWon(payload) => self.resolve_trick(payload.winner()),
            ServerEvent::ResetCardPlayed => Reconciled::changed(self.trick.clear()),
            ServerEvent::BidUpdate(payload) => {
                let bid = payload.bid;
                self.overlay(&payload.player_id, |snapshot, id| snapshot.overlay_bid(id, bid))
                    .with_reaction(self.acknowledgment())
            }
            ServerEvent::BiddingComplete => {
                let changed = !self.bidding_complete;
                self.bidding_complete = true;
                Reconciled::changed(changed)
            }
            ServerEvent::UpdateBid(payload) => {
                if let Some(message) = payload.message.as_deref() {
                    tracing::info!(notice = %message, "Server asked for the bid again");
                }
                Reconciled::new(ReconcileOutcome::Unchanged).with_reaction(self.resubmission())
            }
            ServerEvent::GameOver(payload) => {
                let over = GameOver {
                    player_id: payload.player_id,
                };
                let changed = self.game_over.as_ref() != Some(&over);
                self.game_over = Some(over.clone());
                Reconciled::changed(changed).with_reaction(Some(Reaction::GameEnded(over)))
            }
            ServerEvent::LobbyRoster(players) => {
                Reconciled::changed(self.lobby.replace_players(players))
            }
            ServerEvent::LobbyMessage(text) => {
                let changed = self.lobby.notice.as_deref() != Some(text.as_str());
                self.lobby.set_notice(text);
                Reconciled::changed(changed)
            }
            ServerEvent::Unknown { kind } => {
                tracing::debug!(kind = %kind, "Ignoring unknown message type");
                Reconciled::new(ReconcileOutcome::Ignored { kind })
            }
        }
    }

    fn replace_snapshot(&mut self, snapshot: GameSnapshot) -> Reconciled {
        let new_game = self
            .snapshot
            .as_ref()
            .is_some_and(|current| current.game_id != snapshot.game_id);
        if new_game {
            tracing::info!(game_id = %snapshot.game_id, "New game started");
            self.bidding_complete = false;
            self.game_over = None;
            self.trick.clear();
            self.trick_winner = None;
        }

        let changed = self.snapshot.as_deref() != Some(&snapshot);
        if changed {
            self.snapshot = Some(Arc::new(snapshot));
        }

        Reconciled::changed(changed || new_game).with_reaction(self.acknowledgment())
    }

    fn overlay(
        &mut self,
        player_id: &str,
        change: impl FnOnce(&GameSnapshot, &str) -> SeatOverlay,
    ) -> Reconciled {
        let overlay = match self.snapshot.as_deref() {
            Some(snapshot) => change(snapshot, player_id),
            None => SeatOverlay::Miss,
        };

        match overlay {
            SeatOverlay::Applied { seat, snapshot } => {
                tracing::debug!(player_id, seat = %seat, "Seat updated");
                self.snapshot = Some(Arc::new(snapshot));
                Reconciled::changed(true)
            }
            SeatOverlay::Unchanged { .. } => Reconciled::changed(false),
            SeatOverlay::Miss => {
                tracing::warn!(player_id, "Update for a player without a seat");
                Reconciled::new(ReconcileOutcome::Miss {
                    player_id: player_id.to_string(),
                })
            }
        }
    }

    fn resolve_trick(&mut self, winner: TrickWinner) -> Reconciled {
        let mut changed = self.trick.clear();

        if let Some(score) = winner.score {
            // A winner who is not seated still gets recorded below.
            changed |= self
                .overlay(&winner.player_id, |snapshot, id| snapshot.overlay_score(id, score))
                .is_changed();
        }

        if self.trick_winner.as_ref() != Some(&winner) {
            self.trick_winner = Some(winner);
            changed = true;
        }

        Reconciled::changed(changed)
    }

    fn acknowledgment(&self) -> Option<Reaction> {
        match &self.local_player {
            Some(player_id) => Some(Reaction::Send(ClientMessage::acknowledgment(player_id))),
            None => {
                tracing::warn!("Cannot acknowledge: local player unknown");
                None
            }
        }
    }

    fn resubmission(&self) -> Option<Reaction> {
        match (&self.local_player, self.last_bid) {
            (Some(player_id), Some(bid)) => {
                Some(Reaction::Send(ClientMessage::place_bid(player_id, bid)))
            }
            _ => {
                tracing::warn!("Server asked for a bid, but none was placed yet");
                None
            }
        }
    }

    pub fn local_player(&self) -> Option<&str> {
        self.local_player.as_deref()
    }

    pub fn snapshot(&self) -> Option<&Arc<GameSnapshot>> {
        self.snapshot.as_ref()
    }

    pub fn trick(&self) -> &TrickState {
        &self.trick
    }

    pub fn trick_winner(&self) -> Option<&TrickWinner> {
        self.trick_winner.as_ref()
    }

    pub fn bidding_complete(&self) -> bool {
        self.bidding_complete
    }

    pub fn game_over(&self) -> Option<&GameOver> {
        self.game_over.as_ref()
    }

    pub fn lobby(&self) -> &LobbyRoster {
        &self.lobby
    }

    pub fn last_bid(&self) -> Option<i32> {
        self.last_bid
    }
}
