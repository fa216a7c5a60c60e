//! Playing cards.
//!
//! Wire form is `{"rank": "K", "suit": "H"}` with single-letter suits. The
//! total order on `Card` is the hand display order: suit first (C < D < H < S,
//! which is also the lexicographic order of the wire letters), then rank with
//! 2 < 3 < ... < 10 < J < Q < K < A.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub enum Suit {
    #[serde(rename = "C", alias = "Clubs", alias = "CLUBS")]
    Clubs,
    #[serde(rename = "D", alias = "Diamonds", alias = "DIAMONDS")]
    Diamonds,
    #[serde(rename = "H", alias = "Hearts", alias = "HEARTS")]
    Hearts,
    #[serde(rename = "S", alias = "Spades", alias = "SPADES")]
    Spades,
}

impl Suit {
    pub const ALL: [Suit; 4] = [Suit::Clubs, Suit::Diamonds, Suit::Hearts, Suit::Spades];

    pub fn letter(self) -> char {
        match self {
            Suit::Clubs => 'C',
            Suit::Diamonds => 'D',
            Suit::Hearts => 'H',
            Suit::Spades => 'S',
        }
    }

    pub fn symbol(self) -> char {
        match self {
            Suit::Clubs => '♣',
            Suit::Diamonds => '♦',
            Suit::Hearts => '♥',
            Suit::Spades => '♠',
        }
    }
}

impl FromStr for Suit {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "C" | "CLUBS" => Ok(Suit::Clubs),
            "D" | "DIAMONDS" => Ok(Suit::Diamonds),
            "H" | "HEARTS" => Ok(Suit::Hearts),
            "S" | "SPADES" => Ok(Suit::Spades),
            _ => Err(DomainError::parse_card(s)),
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub enum Rank {
    #[serde(rename = "2")]
    Two,
    #[serde(rename = "3")]
    Three,
    #[serde(rename = "4")]
    Four,
    #[serde(rename = "5")]
    Five,
    #[serde(rename = "6")]
    Six,
    #[serde(rename = "7")]
    Seven,
    #[serde(rename = "8")]
    Eight,
    #[serde(rename = "9")]
    Nine,
    #[serde(rename = "10", alias = "T")]
    Ten,
    #[serde(rename = "J")]
    Jack,
    #[serde(rename = "Q")]
    Queen,
    #[serde(rename = "K")]
    King,
    #[serde(rename = "A")]
    Ace,
}

impl Rank {
    pub const ALL: [Rank; 13] = [
        Rank::Two,
        Rank::Three,
        Rank::Four,
        Rank::Five,
        Rank::Six,
        Rank::Seven,
        Rank::Eight,
        Rank::Nine,
        Rank::Ten,
        Rank::Jack,
        Rank::Queen,
        Rank::King,
        Rank::Ace,
    ];

    /// Numeric strength, 2 through 14.
    pub fn value(self) -> u8 {
        match self {
            Rank::Two => 2,
            Rank::Three => 3,
            Rank::Four => 4,
            Rank::Five => 5,
            Rank::Six => 6,
            Rank::Seven => 7,
            Rank::Eight => 8,
            Rank::Nine => 9,
            Rank::Ten => 10,
            Rank::Jack => 11,
            Rank::Queen => 12,
            Rank::King => 13,
            Rank::Ace => 14,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Rank::Two => "2",
            Rank::Three => "3",
            Rank::Four => "4",
            Rank::Five => "5",
            Rank::Six => "6",
            Rank::Seven => "7",
            Rank::Eight => "8",
            Rank::Nine => "9",
            Rank::Ten => "10",
            Rank::Jack => "J",
            Rank::Queen => "Q",
            Rank::King => "K",
            Rank::Ace => "A",
        }
    }
}

impl FromStr for Rank {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "2" => Ok(Rank::Two),
            "3" => Ok(Rank::Three),
            "4" => Ok(Rank::Four),
            "5" => Ok(Rank::Five),
            "6" => Ok(Rank::Six),
            "7" => Ok(Rank::Seven),
            "8" => Ok(Rank::Eight),
            "9" => Ok(Rank::Nine),
            "10" | "T" => Ok(Rank::Ten),
            "J" => Ok(Rank::Jack),
            "Q" => Ok(Rank::Queen),
            "K" => Ok(Rank::King),
            "A" => Ok(Rank::Ace),
            _ => Err(DomainError::parse_card(s)),
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct Card {
    pub rank: Rank,
    pub suit: Suit,
}

impl Card {
    pub fn new(rank: Rank, suit: Suit) -> Self {
        Self { rank, suit }
    }

    /// Compact identifier as the server prints it, e.g. `10D` or `KH`.
    pub fn identifier(&self) -> String {
        format!("{}{}", self.rank.as_str(), self.suit.letter())
    }
}

// Ordering is for hand display only; trick resolution belongs to the server.
impl Ord for Card {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        match self.suit.cmp(&other.suit) {
            std::cmp::Ordering::Equal => self.rank.cmp(&other.rank),
            ord => ord,
        }
    }
}

impl PartialOrd for Card {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.rank.as_str(), self.suit.symbol())
    }
}

/// Parses the compact identifier form (`KH`, `10D`, `TD`).
impl FromStr for Card {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let Some(suit_ch) = trimmed.chars().last() else {
            return Err(DomainError::parse_card(s));
        };
        let rank_part = &trimmed[..trimmed.len() - suit_ch.len_utf8()];
        if rank_part.is_empty() {
            return Err(DomainError::parse_card(s));
        }
        let rank = rank_part
            .parse::<Rank>()
            .map_err(|_| DomainError::parse_card(s))?;
        let suit = suit_ch
            .to_string()
            .parse::<Suit>()
            .map_err(|_| DomainError::parse_card(s))?;
        Ok(Card::new(rank, suit))
    }
}

/// Sorts a hand into display order (suit, then rank).
pub fn sort_hand(hand: &mut [Card]) {
    hand.sort();
}

/// True when the hand is already in display order.
pub fn is_sorted_hand(hand: &[Card]) -> bool {
    hand.windows(2).all(|w| w[0] <= w[1])
}
