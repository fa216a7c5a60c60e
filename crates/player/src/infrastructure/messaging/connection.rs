//! Connection lifecycle state.
//!
//! The session task is the only writer. Anything else reads through a
//! `ConnectionStateObserver`, which never blocks and never owns the socket.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum ConnectionState {
    /// No socket, and none being opened
    #[default]
    Disconnected = 0,
    Connecting = 1,
    /// Socket open and the auth frame sent
    Connected = 2,
}

impl From<u8> for ConnectionState {
    fn from(raw: u8) -> Self {
        match raw {
            1 => Self::Connecting,
            2 => Self::Connected,
            _ => Self::Disconnected,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
        })
    }
}

/// Lock-free cell holding the session's current state.
#[derive(Debug, Clone, Default)]
pub struct SharedConnectionState(Arc<AtomicU8>);

impl SharedConnectionState {
    pub fn get(&self) -> ConnectionState {
        ConnectionState::from(self.0.load(Ordering::Acquire))
    }

    /// Stores `next` and returns what was there before.
    pub fn replace(&self, next: ConnectionState) -> ConnectionState {
        ConnectionState::from(self.0.swap(next as u8, Ordering::AcqRel))
    }

    pub fn observer(&self) -> ConnectionStateObserver {
        ConnectionStateObserver {
            state: self.clone(),
        }
    }
}

/// Read-only view of a session's state. Clones share the same cell.
#[derive(Debug, Clone)]
pub struct ConnectionStateObserver {
    state: SharedConnectionState,
}

impl ConnectionStateObserver {
    pub fn state(&self) -> ConnectionState {
        self.state.get()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_raw_values_read_as_disconnected() {
        assert_eq!(
            ConnectionState::from(ConnectionState::Connecting as u8),
            ConnectionState::Connecting
        );
        assert_eq!(ConnectionState::from(9), ConnectionState::Disconnected);
    }

    #[test]
    fn observer_sees_writes_through_the_shared_cell() {
        let state = SharedConnectionState::default();
        let observer = state.observer();
        assert!(!observer.is_connected());

        assert_eq!(
            state.replace(ConnectionState::Connected),
            ConnectionState::Disconnected
        );
        assert!(observer.is_connected());
        assert_eq!(state.replace(ConnectionState::Connected), ConnectionState::Connected);
    }
}
