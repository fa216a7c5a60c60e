//! Connection manager: one session task per logical connection
//!
//! `ConnectionManager` is a cheap, cloneable handle. Every lifecycle call is a
//! message to the session task, which alone owns the socket, the token and
//! the reconnect timer. That keeps `connect`, `disconnect` and a firing
//! reconnect timer from ever disagreeing about which socket is live.

use std::future::pending;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use dealer_shared::{ClientMessage, Envelope};
use serde::Serialize;
use tokio::sync::{mpsc, oneshot, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{sleep, Sleep};

use super::backoff::{BackoffState, ReconnectDecision};
use super::shared::{auth_frame, parse_envelope};
use crate::infrastructure::messaging::{
    ConnectionState, ConnectionStateObserver, SharedConnectionState,
};
use crate::ports::outbound::{
    ConnectionError, GameMessagePort, SocketChannels, SocketConnector, SocketEvent,
};

/// What the session task reports to its consumer.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    StateChanged(ConnectionState),
    MessageReceived(Envelope),
}

#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    pub url: String,
    pub max_reconnect_attempts: u32,
}

enum SessionCommand {
    Connect(String),
    Send {
        text: String,
        reply: oneshot::Sender<Result<(), ConnectionError>>,
    },
    Disconnect {
        done: oneshot::Sender<()>,
    },
    Shutdown {
        done: oneshot::Sender<()>,
    },
}

/// Handle to the session task.
#[derive(Clone)]
pub struct ConnectionManager {
    cmd_tx: mpsc::UnboundedSender<SessionCommand>,
    state: SharedConnectionState,
    last_message: Arc<RwLock<Option<Envelope>>>,
}

impl ConnectionManager {
    /// Starts the session task in the Disconnected state.
    ///
    /// The returned receiver yields every state change and every decoded
    /// envelope, in order.
    pub fn spawn(
        config: ConnectionConfig,
        connector: Arc<dyn SocketConnector>,
    ) -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let state = SharedConnectionState::default();
        let last_message = Arc::new(RwLock::new(None));

        let task = SessionTask {
            url: config.url,
            connector,
            backoff: BackoffState::new(config.max_reconnect_attempts),
            token: None,
            socket: None,
            connecting: None,
            reconnect_timer: None,
            state: state.clone(),
            events: event_tx,
            last_message: Arc::clone(&last_message),
        };
        tokio::spawn(task.run(cmd_rx));

        (
            Self {
                cmd_tx,
                state,
                last_message,
            },
            event_rx,
        )
    }

    /// Opens a socket and authenticates with `token`.
    ///
    /// No-op while an open is already in flight. Any existing socket is
    /// closed first.
    pub fn connect(&self, token: impl Into<String>) -> Result<(), ConnectionError> {
        self.command(SessionCommand::Connect(token.into()))
    }

    /// Serializes and writes one message. Fails with `NotConnected` unless
    /// the socket is open.
    pub async fn send<T: Serialize + ?Sized>(&self, message: &T) -> Result<(), ConnectionError> {
        let text =
            serde_json::to_string(message).map_err(|e| ConnectionError::Serialize(e.to_string()))?;
        let (reply, rx) = oneshot::channel();
        self.command(SessionCommand::Send { text, reply })?;
        rx.await.map_err(|_| ConnectionError::SessionClosed)?
    }

    /// Closes the socket, cancels any pending reconnect and forgets the
    /// token. Resolves once the session task has done so.
    pub async fn disconnect(&self) -> Result<(), ConnectionError> {
        let (done, rx) = oneshot::channel();
        self.command(SessionCommand::Disconnect { done })?;
        rx.await.map_err(|_| ConnectionError::SessionClosed)
    }

    /// Disconnects and stops the session task. Every handle is unusable
    /// afterwards.
    pub async fn shutdown(&self) -> Result<(), ConnectionError> {
        let (done, rx) = oneshot::channel();
        self.command(SessionCommand::Shutdown { done })?;
        rx.await.map_err(|_| ConnectionError::SessionClosed)
    }

    pub fn state(&self) -> ConnectionState {
        self.observer().state()
    }

    pub fn observer(&self) -> ConnectionStateObserver {
        self.state.observer()
    }

    /// The most recent envelope that decoded successfully.
    pub async fn last_message(&self) -> Option<Envelope> {
        self.last_message.read().await.clone()
    }

    fn command(&self, command: SessionCommand) -> Result<(), ConnectionError> {
        self.cmd_tx
            .send(command)
            .map_err(|_| ConnectionError::SessionClosed)
    }
}

#[async_trait]
impl GameMessagePort for ConnectionManager {
    async fn send_message(&self, message: ClientMessage) -> Result<(), ConnectionError> {
        self.send(&message).await
    }
}

struct SessionTask {
    url: String,
    connector: Arc<dyn SocketConnector>,
    backoff: BackoffState,
    /// `None` after `disconnect`; no reconnects happen without it.
    token: Option<String>,
    socket: Option<SocketChannels>,
    connecting: Option<JoinHandle<Result<SocketChannels, ConnectionError>>>,
    reconnect_timer: Option<Pin<Box<Sleep>>>,
    state: SharedConnectionState,
    events: mpsc::UnboundedSender<SessionEvent>,
    last_message: Arc<RwLock<Option<Envelope>>>,
}

impl SessionTask {
    async fn run(mut self, mut cmd_rx: mpsc::UnboundedReceiver<SessionCommand>) {
        loop {
            tokio::select! {
                command = cmd_rx.recv() => {
                    let Some(command) = command else {
                        tracing::debug!("All connection handles dropped");
                        self.teardown();
                        break;
                    };
                    if !self.handle_command(command) {
                        break;
                    }
                }
                opened = wait_for_open(&mut self.connecting) => {
                    self.connecting = None;
                    self.on_open(opened);
                }
                event = next_socket_event(&mut self.socket) => {
                    self.on_socket_event(event).await;
                }
                () = wait_for_timer(&mut self.reconnect_timer) => {
                    self.reconnect_timer = None;
                    tracing::info!(
                        attempt = self.backoff.attempts(),
                        max_attempts = self.backoff.max_attempts(),
                        "Reconnecting"
                    );
                    self.open_socket();
                }
            }
        }
        tracing::debug!("Connection session task stopped");
    }

    /// Returns false when the task should stop.
    fn handle_command(&mut self, command: SessionCommand) -> bool {
        match command {
            SessionCommand::Connect(token) => self.connect(token),
            SessionCommand::Send { text, reply } => {
                let _ = reply.send(self.send(text));
            }
            SessionCommand::Disconnect { done } => {
                tracing::info!("Disconnect requested");
                self.teardown();
                let _ = done.send(());
            }
            SessionCommand::Shutdown { done } => {
                self.teardown();
                let _ = done.send(());
                return false;
            }
        }
        true
    }

    fn connect(&mut self, token: String) {
        if self.connecting.is_some() {
            tracing::debug!("Connect ignored: an open is already in flight");
            return;
        }
        self.token = Some(token);
        self.backoff.reset();
        self.reconnect_timer = None;
        self.open_socket();
    }

    fn send(&self, text: String) -> Result<(), ConnectionError> {
        match &self.socket {
            Some(socket) if self.current_state() == ConnectionState::Connected => socket
                .outbound
                .send(text)
                .map_err(|_| ConnectionError::NotConnected),
            _ => Err(ConnectionError::NotConnected),
        }
    }

    fn open_socket(&mut self) {
        if self.socket.take().is_some() {
            tracing::debug!("Closing previous socket");
        }
        self.set_state(ConnectionState::Connecting);

        let connector = Arc::clone(&self.connector);
        let url = self.url.clone();
        self.connecting = Some(tokio::spawn(async move { connector.open(&url).await }));
    }

    fn on_open(&mut self, opened: Result<SocketChannels, ConnectionError>) {
        let channels = match opened {
            Ok(channels) => channels,
            Err(e) => {
                tracing::warn!(error = %e, url = %self.url, "Failed to open socket");
                self.on_closed(None);
                return;
            }
        };

        let Some(token) = self.token.as_deref() else {
            // Disconnected while opening; dropping the channels closes it.
            return;
        };

        let authenticated = auth_frame(token).and_then(|frame| {
            channels
                .outbound
                .send(frame)
                .map_err(|_| ConnectionError::NotConnected)
        });

        match authenticated {
            Ok(()) => {
                self.socket = Some(channels);
                self.backoff.reset();
                self.set_state(ConnectionState::Connected);
                tracing::info!(url = %self.url, "Connected and authenticated");
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to send auth frame");
                self.on_closed(None);
            }
        }
    }

    async fn on_socket_event(&mut self, event: Option<SocketEvent>) {
        match event {
            Some(SocketEvent::Frame(text)) => match parse_envelope(&text) {
                Ok(envelope) => {
                    *self.last_message.write().await = Some(envelope.clone());
                    let _ = self.events.send(SessionEvent::MessageReceived(envelope));
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Dropping malformed frame");
                }
            },
            Some(SocketEvent::Error(e)) => {
                tracing::warn!(error = %e, "Socket error");
            }
            Some(SocketEvent::Closed { code, reason }) => {
                tracing::info!(?code, reason = %reason, "Socket closed");
                self.on_closed(code);
            }
            None => {
                tracing::info!("Socket ended without a close frame");
                self.on_closed(None);
            }
        }
    }

    fn on_closed(&mut self, code: Option<u16>) {
        self.socket = None;
        self.set_state(ConnectionState::Disconnected);

        if self.token.is_none() {
            return;
        }

        match self.backoff.on_close(code) {
            ReconnectDecision::Immediate => {
                tracing::info!(
                    attempt = self.backoff.attempts(),
                    "Closed without status, reconnecting now"
                );
                self.open_socket();
            }
            ReconnectDecision::After(delay) => {
                tracing::info!(
                    attempt = self.backoff.attempts(),
                    delay_ms = delay.as_millis() as u64,
                    "Reconnect scheduled"
                );
                self.reconnect_timer = Some(Box::pin(sleep(delay)));
            }
            ReconnectDecision::GiveUp => {
                tracing::error!(
                    attempts = self.backoff.attempts(),
                    "Max reconnection attempts reached, giving up"
                );
            }
        }
    }

    fn teardown(&mut self) {
        self.token = None;
        self.reconnect_timer = None;
        if let Some(handle) = self.connecting.take() {
            handle.abort();
        }
        self.socket = None;
        self.set_state(ConnectionState::Disconnected);
    }

    fn current_state(&self) -> ConnectionState {
        self.state.get()
    }

    fn set_state(&self, new_state: ConnectionState) {
        let previous = self.state.replace(new_state);
        if previous != new_state {
            tracing::debug!(from = %previous, to = %new_state, "Connection state changed");
            let _ = self.events.send(SessionEvent::StateChanged(new_state));
        }
    }
}

async fn wait_for_open(
    slot: &mut Option<JoinHandle<Result<SocketChannels, ConnectionError>>>,
) -> Result<SocketChannels, ConnectionError> {
    match slot {
        Some(handle) => match handle.await {
            Ok(opened) => opened,
            Err(e) => Err(ConnectionError::ConnectFailed(e.to_string())),
        },
        None => pending().await,
    }
}

async fn next_socket_event(slot: &mut Option<SocketChannels>) -> Option<SocketEvent> {
    match slot {
        Some(socket) => socket.inbound.recv().await,
        None => pending().await,
    }
}

async fn wait_for_timer(slot: &mut Option<Pin<Box<Sleep>>>) {
    match slot {
        Some(timer) => timer.as_mut().await,
        None => pending().await,
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;
    use tokio::time::Instant;

    use super::*;
    use crate::infrastructure::testing::{FakeConnector, FakeSocket};

    fn config(max_reconnect_attempts: u32) -> ConnectionConfig {
        ConnectionConfig {
            url: "ws://test/ws".to_string(),
            max_reconnect_attempts,
        }
    }

    async fn expect_state(
        events: &mut mpsc::UnboundedReceiver<SessionEvent>,
        expected: ConnectionState,
    ) {
        loop {
            match events.recv().await {
                Some(SessionEvent::StateChanged(state)) if state == expected => return,
                Some(_) => continue,
                None => panic!("event stream ended before {expected}"),
            }
        }
    }

    async fn open_authenticated(
        sockets: &mut mpsc::UnboundedReceiver<FakeSocket>,
        token: &str,
    ) -> FakeSocket {
        let mut socket = sockets.recv().await.expect("socket opened");
        let auth = socket.sent.recv().await.expect("auth frame");
        assert_eq!(auth, json!({ "token": token }).to_string());
        socket
    }

    #[tokio::test(start_paused = true)]
    async fn connect_sends_token_first_then_reports_connected() {
        let (connector, mut sockets) = FakeConnector::new();
        let (manager, mut events) = ConnectionManager::spawn(config(5), connector);

        manager.connect("jwt-1").expect("connect");

        assert_eq!(
            events.recv().await,
            Some(SessionEvent::StateChanged(ConnectionState::Connecting))
        );
        let _socket = open_authenticated(&mut sockets, "jwt-1").await;
        assert_eq!(
            events.recv().await,
            Some(SessionEvent::StateChanged(ConnectionState::Connected))
        );
        assert!(manager.observer().is_connected());
    }

    #[tokio::test(start_paused = true)]
    async fn send_fails_until_connected() {
        let (connector, mut sockets) = FakeConnector::new();
        let (manager, mut events) = ConnectionManager::spawn(config(5), connector);

        assert_eq!(
            manager.send(&ClientMessage::place_bid("alice", 2)).await,
            Err(ConnectionError::NotConnected)
        );

        manager.connect("jwt").expect("connect");
        let mut socket = open_authenticated(&mut sockets, "jwt").await;
        expect_state(&mut events, ConnectionState::Connected).await;

        manager
            .send_message(ClientMessage::place_bid("alice", 2))
            .await
            .expect("send");
        assert_eq!(
            socket.sent.recv().await.expect("frame"),
            json!({"type": "placebid", "playerId": "alice", "bid": 2}).to_string()
        );
    }

    #[tokio::test(start_paused = true)]
    async fn malformed_frames_are_dropped_without_ending_the_session() {
        let (connector, mut sockets) = FakeConnector::new();
        let (manager, mut events) = ConnectionManager::spawn(config(5), connector);
        manager.connect("jwt").expect("connect");
        let socket = open_authenticated(&mut sockets, "jwt").await;
        expect_state(&mut events, ConnectionState::Connected).await;

        socket.push_frame("{not json");
        socket.push_frame(r#"{"type":"resetcardplayed"}"#);

        let expected = Envelope::new("resetcardplayed", serde_json::Value::Null);
        assert_eq!(
            events.recv().await,
            Some(SessionEvent::MessageReceived(expected.clone()))
        );
        assert_eq!(manager.last_message().await, Some(expected));
        assert_eq!(manager.state(), ConnectionState::Connected);
    }

    #[tokio::test(start_paused = true)]
    async fn abnormal_close_reconnects_after_backoff_and_reauthenticates() {
        let (connector, mut sockets) = FakeConnector::new();
        let (manager, mut events) = ConnectionManager::spawn(config(5), connector.clone());
        manager.connect("jwt").expect("connect");
        let socket = open_authenticated(&mut sockets, "jwt").await;
        expect_state(&mut events, ConnectionState::Connected).await;

        let closed_at = Instant::now();
        socket.close(Some(1006));

        let _second = open_authenticated(&mut sockets, "jwt").await;
        assert!(closed_at.elapsed() >= Duration::from_millis(2_000));
        assert_eq!(connector.open_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn close_without_status_reconnects_immediately() {
        let (connector, mut sockets) = FakeConnector::new();
        let (manager, mut events) = ConnectionManager::spawn(config(5), connector);
        manager.connect("jwt").expect("connect");
        let socket = open_authenticated(&mut sockets, "jwt").await;
        expect_state(&mut events, ConnectionState::Connected).await;

        let closed_at = Instant::now();
        socket.close(Some(1005));

        let _second = open_authenticated(&mut sockets, "jwt").await;
        assert!(closed_at.elapsed() < Duration::from_millis(1_000));
    }

    #[tokio::test(start_paused = true)]
    async fn disconnect_cancels_pending_reconnect() {
        let (connector, mut sockets) = FakeConnector::new();
        let (manager, mut events) = ConnectionManager::spawn(config(5), connector.clone());
        manager.connect("jwt").expect("connect");
        let socket = open_authenticated(&mut sockets, "jwt").await;
        expect_state(&mut events, ConnectionState::Connected).await;

        socket.close(Some(1006));
        expect_state(&mut events, ConnectionState::Disconnected).await;

        manager.disconnect().await.expect("disconnect");
        tokio::time::sleep(Duration::from_secs(120)).await;

        assert_eq!(connector.open_count(), 1);
        assert!(sockets.try_recv().is_err());
        assert_eq!(manager.state(), ConnectionState::Disconnected);
        assert_eq!(
            manager.send(&ClientMessage::acknowledgment("alice")).await,
            Err(ConnectionError::NotConnected)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn disconnect_closes_the_open_socket() {
        let (connector, mut sockets) = FakeConnector::new();
        let (manager, mut events) = ConnectionManager::spawn(config(5), connector);
        manager.connect("jwt").expect("connect");
        let mut socket = open_authenticated(&mut sockets, "jwt").await;
        expect_state(&mut events, ConnectionState::Connected).await;

        manager.disconnect().await.expect("disconnect");

        assert_eq!(socket.sent.recv().await, None);
        expect_state(&mut events, ConnectionState::Disconnected).await;
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_max_attempts_until_explicit_connect() {
        let (connector, mut sockets) = FakeConnector::new();
        connector.set_failing(true);
        let (manager, _events) = ConnectionManager::spawn(config(5), connector.clone());

        manager.connect("jwt").expect("connect");
        tokio::time::sleep(Duration::from_secs(600)).await;

        // The initial open plus four retries.
        assert_eq!(connector.open_count(), 5);
        assert_eq!(manager.state(), ConnectionState::Disconnected);

        connector.set_failing(false);
        manager.connect("jwt").expect("connect");
        let _socket = open_authenticated(&mut sockets, "jwt").await;
        assert_eq!(connector.open_count(), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn connect_while_opening_is_a_no_op() {
        let (connector, mut sockets) = FakeConnector::gated();
        let (manager, mut events) = ConnectionManager::spawn(config(5), connector.clone());

        manager.connect("first").expect("connect");
        expect_state(&mut events, ConnectionState::Connecting).await;
        manager.connect("second").expect("connect");
        tokio::time::sleep(Duration::from_millis(10)).await;

        connector.release(4);
        let _socket = open_authenticated(&mut sockets, "first").await;
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(connector.open_count(), 1);
        assert!(sockets.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn connect_while_connected_replaces_the_socket() {
        let (connector, mut sockets) = FakeConnector::new();
        let (manager, mut events) = ConnectionManager::spawn(config(5), connector.clone());
        manager.connect("a").expect("connect");
        let mut first = open_authenticated(&mut sockets, "a").await;
        expect_state(&mut events, ConnectionState::Connected).await;

        manager.connect("b").expect("connect");
        let _second = open_authenticated(&mut sockets, "b").await;
        expect_state(&mut events, ConnectionState::Connected).await;
        assert_eq!(first.sent.recv().await, None);

        // A close from the replaced socket must not schedule a reconnect.
        first.close(Some(1006));
        tokio::time::sleep(Duration::from_secs(60)).await;

        assert_eq!(connector.open_count(), 2);
        assert!(sockets.try_recv().is_err());
        assert_eq!(manager.state(), ConnectionState::Connected);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_stops_the_session_task() {
        let (connector, mut sockets) = FakeConnector::new();
        let (manager, _events) = ConnectionManager::spawn(config(5), connector);
        manager.connect("jwt").expect("connect");
        let _socket = open_authenticated(&mut sockets, "jwt").await;

        manager.shutdown().await.expect("shutdown");

        assert_eq!(manager.connect("jwt"), Err(ConnectionError::SessionClosed));
        assert_eq!(manager.state(), ConnectionState::Disconnected);
    }
}
