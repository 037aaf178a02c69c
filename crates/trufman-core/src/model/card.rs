use crate::model::rank::Rank;
use crate::model::suit::Suit;
use core::fmt;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Card {
    pub rank: Rank,
    pub suit: Suit,
}

impl Card {
    pub const fn new(rank: Rank, suit: Suit) -> Self {
        Self { rank, suit }
    }

    /// Dense index in `0..52`, suit-major.
    pub const fn to_id(self) -> u8 {
        (self.suit as u8) * 13 + (self.rank as u8 - 2)
    }

    pub const fn from_id(id: u8) -> Option<Self> {
        if id >= 52 {
            return None;
        }
        let suit = match Suit::from_index((id / 13) as usize) {
            Some(suit) => suit,
            None => return None,
        };
        match Rank::from_value(id % 13 + 2) {
            Some(rank) => Some(Card::new(rank, suit)),
            None => None,
        }
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.rank, self.suit)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardParseError(pub String);

impl fmt::Display for CardParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}' is not a card (expected e.g. AS, 10H, 7c)", self.0)
    }
}

impl std::error::Error for CardParseError {}

impl FromStr for Card {
    type Err = CardParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim();
        let mut chars = text.chars();
        let suit = chars
            .next_back()
            .and_then(Suit::from_symbol)
            .ok_or_else(|| CardParseError(s.to_string()))?;
        let rank = Rank::from_symbol(chars.as_str()).ok_or_else(|| CardParseError(s.to_string()))?;
        Ok(Card::new(rank, suit))
    }
}
