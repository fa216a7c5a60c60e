//! Game session service
//!
//! Drives the reconciler from the connection's event stream on a single
//! task, sends whatever the reconciler asks for, and publishes an immutable
//! `GameView` after every change. Readers hold `watch` receivers and never
//! touch the reconciler.

use std::sync::Arc;

use dealer_domain::{Card, GameSnapshot, LobbyRoster, TrickState, TrickWinner};
use dealer_shared::{ClientMessage, ServerEvent};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use super::reconciler::{GameOver, GameStateReconciler, Reaction, ReconcileOutcome};
use crate::infrastructure::messaging::ConnectionState;
use crate::infrastructure::websocket::SessionEvent;
use crate::ports::outbound::{ApiError, ConnectionError, GameApiPort, GameMessagePort};

/// Everything presentation needs, captured after a change.
#[derive(Debug, Clone, PartialEq)]
pub struct GameView {
    pub connection: ConnectionState,
    pub local_player: Option<String>,
    /// `None` until the first `gamestate`
    pub snapshot: Option<Arc<GameSnapshot>>,
    pub trick: TrickState,
    pub trick_winner: Option<TrickWinner>,
    pub bidding_complete: bool,
    pub game_over: Option<GameOver>,
    pub lobby: LobbyRoster,
    pub last_bid: Option<i32>,
}

impl GameView {
    fn capture(reconciler: &GameStateReconciler, connection: ConnectionState) -> Self {
        Self {
            connection,
            local_player: reconciler.local_player().map(str::to_string),
            snapshot: reconciler.snapshot().cloned(),
            trick: reconciler.trick().clone(),
            trick_winner: reconciler.trick_winner().cloned(),
            bidding_complete: reconciler.bidding_complete(),
            game_over: reconciler.game_over().cloned(),
            lobby: reconciler.lobby().clone(),
            last_bid: reconciler.last_bid(),
        }
    }
}

enum SessionCommand {
    SetLocalPlayer(String),
    SubmitBid {
        player_id: String,
        bid: i32,
        reply: oneshot::Sender<Result<(), ConnectionError>>,
    },
    Stop,
}

/// Handle to a running game session.
#[derive(Clone)]
pub struct GameSession {
    commands: mpsc::UnboundedSender<SessionCommand>,
    view: watch::Receiver<Arc<GameView>>,
    api: Arc<dyn GameApiPort>,
}

impl GameSession {
    pub fn start(
        messages: Arc<dyn GameMessagePort>,
        events: mpsc::UnboundedReceiver<SessionEvent>,
        api: Arc<dyn GameApiPort>,
        local_player: Option<String>,
    ) -> Self {
        let reconciler = GameStateReconciler::new(local_player);
        let connection = ConnectionState::Disconnected;
        let (view_tx, view_rx) = watch::channel(Arc::new(GameView::capture(&reconciler, connection)));
        let (command_tx, command_rx) = mpsc::unbounded_channel();

        let driver = SessionDriver {
            reconciler,
            connection,
            messages,
            view: view_tx,
        };
        tokio::spawn(driver.run(events, command_rx));

        Self {
            commands: command_tx,
            view: view_rx,
            api,
        }
    }

    /// The id acknowledgments and bid resubmissions are sent for.
    pub fn set_local_player(&self, player_id: impl Into<String>) -> Result<(), ConnectionError> {
        self.commands
            .send(SessionCommand::SetLocalPlayer(player_id.into()))
            .map_err(|_| ConnectionError::SessionClosed)
    }

    /// Sends `placebid` and remembers the bid for a later resubmission.
    pub async fn submit_bid(&self, player_id: &str, bid: i32) -> Result<(), ConnectionError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(SessionCommand::SubmitBid {
                player_id: player_id.to_string(),
                bid,
                reply,
            })
            .map_err(|_| ConnectionError::SessionClosed)?;
        rx.await.map_err(|_| ConnectionError::SessionClosed)?
    }

    /// Submits a move over HTTP without waiting for it.
    ///
    /// Failures are logged only. Nothing local changes either way; the card
    /// shows up once the server broadcasts `cardplayed`. Returns `None` when
    /// no game is in progress.
    pub fn play_card(&self, card: Card, player_id: &str) -> Option<JoinHandle<()>> {
        let game_id = self
            .view
            .borrow()
            .snapshot
            .as_ref()
            .map(|snapshot| snapshot.game_id.clone());
        let Some(game_id) = game_id else {
            tracing::warn!(card = %card, "Cannot play a card before the game state arrives");
            return None;
        };

        let api = Arc::clone(&self.api);
        let player_id = player_id.to_string();
        Some(tokio::spawn(async move {
            match api.submit_move(&game_id, &player_id, card).await {
                Ok(()) => tracing::debug!(card = %card, player_id = %player_id, "Move submitted"),
                Err(e) => tracing::warn!(
                    error = %e,
                    card = %card,
                    player_id = %player_id,
                    "Move submission failed"
                ),
            }
        }))
    }

    pub async fn start_game(&self, player_id: &str, token: &str) -> Result<(), ApiError> {
        self.api.start_game(player_id, token).await
    }

    pub fn view(&self) -> Arc<GameView> {
        Arc::clone(&self.view.borrow())
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<GameView>> {
        self.view.clone()
    }

    /// Stops the driver task. Pending events are dropped.
    pub fn stop(&self) {
        let _ = self.commands.send(SessionCommand::Stop);
    }
}

struct SessionDriver {
    reconciler: GameStateReconciler,
    connection: ConnectionState,
    messages: Arc<dyn GameMessagePort>,
    view: watch::Sender<Arc<GameView>>,
}

impl SessionDriver {
    async fn run(
        mut self,
        mut events: mpsc::UnboundedReceiver<SessionEvent>,
        mut commands: mpsc::UnboundedReceiver<SessionCommand>,
    ) {
        loop {
            tokio::select! {
                event = events.recv() => {
                    let Some(event) = event else {
                        tracing::debug!("Connection event stream ended");
                        break;
                    };
                    self.on_session_event(event).await;
                }
                command = commands.recv() => {
                    match command {
                        Some(SessionCommand::Stop) | None => break,
                        Some(command) => self.on_command(command).await,
                    }
                }
            }
        }
        tracing::debug!("Game session driver stopped");
    }

    async fn on_session_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::StateChanged(state) => {
                tracing::info!(state = %state, "Connection state changed");
                self.connection = state;
                self.publish();
            }
            SessionEvent::MessageReceived(envelope) => {
                let event = match ServerEvent::from_envelope(envelope) {
                    Ok(event) => event,
                    Err(e) => {
                        tracing::warn!(error = %e, "Dropping undecodable message");
                        return;
                    }
                };
                self.apply(event).await;
            }
        }
    }

    async fn apply(&mut self, event: ServerEvent) {
        let kind = event.kind().to_string();
        let reconciled = self.reconciler.apply(event);

        match &reconciled.outcome {
            ReconcileOutcome::Changed => tracing::debug!(kind = %kind, "State updated"),
            ReconcileOutcome::Unchanged => tracing::trace!(kind = %kind, "Already applied"),
            ReconcileOutcome::Miss { player_id } => {
                tracing::warn!(kind = %kind, player_id = %player_id, "Reconciliation miss")
            }
            ReconcileOutcome::Ignored { .. } => {}
        }

        if reconciled.is_changed() {
            self.publish();
        }

        for reaction in reconciled.reactions {
            match reaction {
                Reaction::Send(message) => self.send(message).await,
                Reaction::GameEnded(over) => {
                    tracing::info!(winner = ?over.player_id, "Game over");
                }
            }
        }
    }

    async fn on_command(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::SetLocalPlayer(player_id) => {
                self.reconciler.set_local_player(player_id);
                self.publish();
            }
            SessionCommand::SubmitBid {
                player_id,
                bid,
                reply,
            } => {
                self.reconciler.record_bid(bid);
                self.publish();
                let result = self
                    .messages
                    .send_message(ClientMessage::place_bid(player_id, bid))
                    .await;
                let _ = reply.send(result);
            }
            SessionCommand::Stop => {}
        }
    }

    async fn send(&self, message: ClientMessage) {
        if let Err(e) = self.messages.send_message(message).await {
            tracing::warn!(error = %e, "Failed to send reply to server");
        }
    }

    fn publish(&self) {
        self.view.send_replace(Arc::new(GameView::capture(
            &self.reconciler,
            self.connection,
        )));
    }
}

#[cfg(test)]
mod tests {
    use dealer_domain::{Rank, Suit};
    use dealer_shared::Envelope;
    use serde_json::json;

    use super::*;
    use crate::infrastructure::testing::{api_request_failed, gamestate_frame};
    use crate::ports::outbound::{MockGameApiPort, MockGameMessagePort};

    struct Harness {
        session: GameSession,
        events: mpsc::UnboundedSender<SessionEvent>,
        sent: mpsc::UnboundedReceiver<ClientMessage>,
    }

    fn recording_port() -> (MockGameMessagePort, mpsc::UnboundedReceiver<ClientMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut port = MockGameMessagePort::new();
        port.expect_send_message().returning(move |message| {
            let _ = tx.send(message);
            Ok(())
        });
        (port, rx)
    }

    fn harness(api: MockGameApiPort) -> Harness {
        let (port, sent) = recording_port();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let session = GameSession::start(
            Arc::new(port),
            events_rx,
            Arc::new(api),
            Some("alice".into()),
        );
        Harness {
            session,
            events: events_tx,
            sent,
        }
    }

    fn deliver(harness: &Harness, frame: serde_json::Value) {
        let envelope: Envelope = serde_json::from_value(frame).expect("envelope");
        harness
            .events
            .send(SessionEvent::MessageReceived(envelope))
            .expect("driver running");
    }

    async fn deal(harness: &mut Harness) -> Arc<GameView> {
        let mut views = harness.session.subscribe();
        deliver(harness, gamestate_frame("game-7", &[("alice", "AS 2C"), ("bob", "")]));
        views.changed().await.expect("view published");
        let ack = harness.sent.recv().await.expect("acknowledgment");
        assert_eq!(ack, ClientMessage::acknowledgment("alice"));
        let view = views.borrow().clone();
        view
    }

    #[tokio::test]
    async fn gamestate_is_published_and_acknowledged() {
        let mut harness = harness(MockGameApiPort::new());

        let view = deal(&mut harness).await;

        let snapshot = view.snapshot.as_ref().expect("snapshot");
        assert_eq!(snapshot.game_id, "game-7");
        assert_eq!(
            snapshot.player("alice").expect("alice").hand,
            vec![
                Card::new(Rank::Two, Suit::Clubs),
                Card::new(Rank::Ace, Suit::Spades)
            ]
        );
    }

    #[tokio::test]
    async fn connection_changes_reach_the_view() {
        let harness = harness(MockGameApiPort::new());
        let mut views = harness.session.subscribe();

        harness
            .events
            .send(SessionEvent::StateChanged(ConnectionState::Connected))
            .expect("driver running");
        views.changed().await.expect("view published");

        assert_eq!(harness.session.view().connection, ConnectionState::Connected);
    }

    #[tokio::test]
    async fn updatebid_resubmits_the_submitted_bid() {
        let mut harness = harness(MockGameApiPort::new());
        deal(&mut harness).await;

        harness.session.submit_bid("alice", 3).await.expect("bid sent");
        assert_eq!(
            harness.sent.recv().await,
            Some(ClientMessage::place_bid("alice", 3))
        );

        deliver(&harness, json!({"type": "updatebid", "data": {"message": "again"}}));
        assert_eq!(
            harness.sent.recv().await,
            Some(ClientMessage::place_bid("alice", 3))
        );
        assert_eq!(harness.session.view().last_bid, Some(3));
    }

    #[tokio::test]
    async fn malformed_payload_is_dropped_and_later_frames_still_apply() {
        let mut harness = harness(MockGameApiPort::new());
        deal(&mut harness).await;
        let mut views = harness.session.subscribe();
        views.borrow_and_update();

        deliver(&harness, json!({"type": "cardplayed", "data": {"playerId": "alice"}}));
        deliver(
            &harness,
            json!({"type": "healthstate", "data": {"player": "alice", "health": 7}}),
        );
        views.changed().await.expect("health published");

        let view = harness.session.view();
        let snapshot = view.snapshot.as_ref().expect("snapshot");
        assert_eq!(snapshot.player("alice").expect("alice").health, 7);
        assert!(view.trick.is_empty());
    }

    #[tokio::test]
    async fn local_player_can_be_set_after_start() {
        let (port, mut sent) = recording_port();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let session = GameSession::start(
            Arc::new(port),
            events_rx,
            Arc::new(MockGameApiPort::new()),
            None,
        );

        session.set_local_player("bob").expect("driver running");
        // Commands are handled in order, so the bid reply proves the id landed.
        session.submit_bid("bob", 1).await.expect("bid sent");
        assert_eq!(sent.recv().await, Some(ClientMessage::place_bid("bob", 1)));

        let frame: Envelope = serde_json::from_value(gamestate_frame("g", &[("bob", "KH")]))
            .expect("envelope");
        events_tx
            .send(SessionEvent::MessageReceived(frame))
            .expect("driver running");

        assert_eq!(sent.recv().await, Some(ClientMessage::acknowledgment("bob")));
        assert_eq!(session.view().local_player.as_deref(), Some("bob"));
    }

    #[tokio::test]
    async fn failed_move_is_logged_and_changes_nothing() {
        let mut api = MockGameApiPort::new();
        api.expect_submit_move()
            .withf(|game_id, player_id, card| {
                game_id == "game-7"
                    && player_id == "alice"
                    && *card == Card::new(Rank::Ace, Suit::Spades)
            })
            .times(1)
            .returning(|_, _, _| Err(api_request_failed("connection reset")));
        let mut harness = harness(api);
        let before = deal(&mut harness).await;

        let submission = harness
            .session
            .play_card(Card::new(Rank::Ace, Suit::Spades), "alice")
            .expect("game in progress");
        submission.await.expect("submission task does not panic");

        let after = harness.session.view();
        assert!(Arc::ptr_eq(&before, &after));
        assert!(after.trick.is_empty());
    }

    #[tokio::test]
    async fn play_card_before_any_game_is_refused() {
        let harness = harness(MockGameApiPort::new());
        assert!(harness
            .session
            .play_card(Card::new(Rank::Two, Suit::Clubs), "alice")
            .is_none());
    }

    #[tokio::test]
    async fn send_failures_do_not_stop_the_driver() {
        let mut port = MockGameMessagePort::new();
        port.expect_send_message()
            .returning(|_| Err(ConnectionError::NotConnected));
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let session = GameSession::start(
            Arc::new(port),
            events_rx,
            Arc::new(MockGameApiPort::new()),
            Some("alice".into()),
        );
        let mut views = session.subscribe();

        let frame: Envelope = serde_json::from_value(gamestate_frame("g", &[("alice", "KH")]))
            .expect("envelope");
        events_tx
            .send(SessionEvent::MessageReceived(frame))
            .expect("driver running");
        views.changed().await.expect("gamestate published");

        let health: Envelope = serde_json::from_value(
            json!({"type": "healthstate", "data": {"player": "alice", "health": 9}}),
        )
        .expect("envelope");
        events_tx
            .send(SessionEvent::MessageReceived(health))
            .expect("driver running");
        views.changed().await.expect("health published");

        let view = session.view();
        let snapshot = view.snapshot.as_ref().expect("snapshot");
        assert_eq!(snapshot.player("alice").expect("alice").health, 9);
        assert_eq!(
            session.submit_bid("alice", 1).await,
            Err(ConnectionError::NotConnected)
        );
    }

    #[tokio::test]
    async fn start_game_passes_token_through() {
        let mut api = MockGameApiPort::new();
        api.expect_start_game()
            .withf(|player_id, token| player_id == "alice" && token == "jwt")
            .times(1)
            .returning(|_, _| Ok(()));
        let harness = harness(api);

        harness
            .session
            .start_game("alice", "jwt")
            .await
            .expect("started");
    }
}
