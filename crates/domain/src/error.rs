//! Unified error types for the domain layer
//!
//! Domain errors are plain values; nothing in this crate logs or panics.

use thiserror::Error;

/// Unified error type for domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A card string or rank/suit token could not be parsed
    #[error("Invalid card: {0}")]
    ParseCard(String),

    /// A seat label outside `player1..player4`
    #[error("Unknown seat: {0}")]
    UnknownSeat(String),
}

impl DomainError {
    pub fn parse_card(input: impl Into<String>) -> Self {
        Self::ParseCard(input.into())
    }
}
