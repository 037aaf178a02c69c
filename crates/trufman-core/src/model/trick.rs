use crate::model::card::Card;
use crate::model::player::PlayerPosition;
use crate::model::rules;
use crate::model::suit::Suit;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trick {
    leader: PlayerPosition,
    plays: Vec<TrickPlay>,
}

/// One committed card. Trump plays stay concealed until the trick holds four cards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrickPlay {
    pub position: PlayerPosition,
    pub card: Card,
    pub concealed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrickError {
    TrickComplete,
    OutOfTurn {
        expected: PlayerPosition,
        actual: PlayerPosition,
    },
}

impl fmt::Display for TrickError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrickError::TrickComplete => write!(f, "trick already holds four plays"),
            TrickError::OutOfTurn { expected, actual } => {
                write!(f, "{actual} played out of turn, {expected} is next")
            }
        }
    }
}

impl std::error::Error for TrickError {}

impl Trick {
    pub fn new(leader: PlayerPosition) -> Self {
        Self {
            leader,
            plays: Vec::with_capacity(4),
        }
    }

    pub fn leader(&self) -> PlayerPosition {
        self.leader
    }

    pub fn plays(&self) -> &[TrickPlay] {
        &self.plays
    }

    pub fn is_empty(&self) -> bool {
        self.plays.is_empty()
    }

    pub fn is_complete(&self) -> bool {
        self.plays.len() == 4
    }

    pub fn lead_suit(&self) -> Option<Suit> {
        self.plays.first().map(|play| play.card.suit)
    }

    pub fn expected_position(&self) -> PlayerPosition {
        self.plays
            .last()
            .map(|play| play.position.next())
            .unwrap_or(self.leader)
    }

    pub fn play(&mut self, position: PlayerPosition, card: Card, trump: Suit) -> Result<(), TrickError> {
        if self.is_complete() {
            return Err(TrickError::TrickComplete);
        }

        let expected = self.expected_position();
        if expected != position {
            return Err(TrickError::OutOfTurn {
                expected,
                actual: position,
            });
        }

        self.plays.push(TrickPlay {
            position,
            card,
            concealed: card.suit == trump,
        });

        if self.is_complete() {
            for play in &mut self.plays {
                play.concealed = false;
            }
        }
        Ok(())
    }

    pub fn cards(&self) -> Vec<(PlayerPosition, Card)> {
        self.plays.iter().map(|play| (play.position, play.card)).collect()
    }

    pub fn winner(&self, trump: Suit) -> Option<PlayerPosition> {
        if !self.is_complete() {
            return None;
        }
        rules::evaluate_trick(&self.cards(), trump)
    }

    pub fn card_of(&self, position: PlayerPosition) -> Option<Card> {
        self.plays
            .iter()
            .find(|play| play.position == position)
            .map(|play| play.card)
    }
}

/// A resolved trick and the seat that took it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletedTrick {
    pub trick: Trick,
    pub winner: PlayerPosition,
}

#[cfg(test)]
mod tests {
    use super::{Trick, TrickError};
    use crate::model::card::Card;
    use crate::model::player::PlayerPosition;
    use crate::model::suit::Suit;

    fn card(text: &str) -> Card {
        text.parse().unwrap()
    }

    #[test]
    fn out_of_turn_play_is_refused() {
        let mut trick = Trick::new(PlayerPosition::North);
        assert!(trick.play(PlayerPosition::North, card("2C"), Suit::Spades).is_ok());
        assert!(matches!(
            trick.play(PlayerPosition::South, card("3C"), Suit::Spades),
            Err(TrickError::OutOfTurn { .. })
        ));
    }

    #[test]
    fn trump_plays_hidden_until_fourth_card() {
        let trump = Suit::Spades;
        let mut trick = Trick::new(PlayerPosition::East);
        trick.play(PlayerPosition::East, card("10H"), trump).unwrap();
        trick.play(PlayerPosition::South, card("2S"), trump).unwrap();
        assert!(trick.plays()[1].concealed);
        assert!(!trick.plays()[0].concealed);
        trick.play(PlayerPosition::West, card("KH"), trump).unwrap();
        assert_eq!(trick.winner(trump), None);
        trick.play(PlayerPosition::North, card("AC"), trump).unwrap();
        assert!(trick.plays().iter().all(|play| !play.concealed));
        assert_eq!(trick.winner(trump), Some(PlayerPosition::South));
        assert_eq!(
            trick.play(PlayerPosition::East, card("3H"), trump),
            Err(TrickError::TrickComplete)
        );
    }
}
