//! Reconnection policy for the connection manager.
//!
//! Runtime-free: the session task asks `BackoffState` what to do after a
//! close and owns the actual timer.

use std::time::Duration;

use super::shared::{
    BACKOFF_MULTIPLIER, CLOSE_NO_STATUS, INITIAL_RETRY_DELAY_MS, MAX_RETRY_ATTEMPTS,
    MAX_RETRY_DELAY_MS,
};

/// What to do after the socket closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectDecision {
    /// Reopen right away
    Immediate,
    /// Reopen once the delay has elapsed
    After(Duration),
    /// Attempts exhausted; stay disconnected until an explicit connect
    GiveUp,
}

/// Exponential backoff state shared by reconnect logic.
#[derive(Debug, Clone, Copy)]
pub struct BackoffState {
    attempts: u32,
    max_attempts: u32,
}

impl Default for BackoffState {
    fn default() -> Self {
        Self::new(MAX_RETRY_ATTEMPTS)
    }
}

impl BackoffState {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            attempts: 0,
            max_attempts,
        }
    }

    /// Called on a successful open and on an explicit connect.
    pub fn reset(&mut self) {
        self.attempts = 0;
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn is_exhausted(&self) -> bool {
        self.attempts >= self.max_attempts
    }

    /// Counts the close, then decides. A close without status (1005) retries
    /// at once; anything else waits `delay_for(attempts)`.
    pub fn on_close(&mut self, code: Option<u16>) -> ReconnectDecision {
        self.attempts = self.attempts.saturating_add(1);

        if self.is_exhausted() {
            return ReconnectDecision::GiveUp;
        }

        if code == Some(CLOSE_NO_STATUS) {
            ReconnectDecision::Immediate
        } else {
            ReconnectDecision::After(delay_for(self.attempts))
        }
    }
}

/// `min(1000 * 2^attempt, 30000)` milliseconds.
pub fn delay_for(attempt: u32) -> Duration {
    let factor = BACKOFF_MULTIPLIER.saturating_pow(attempt);
    Duration::from_millis(
        INITIAL_RETRY_DELAY_MS
            .saturating_mul(factor)
            .min(MAX_RETRY_DELAY_MS),
    )
}
