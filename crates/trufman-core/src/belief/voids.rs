use crate::model::player::PlayerPosition;
use crate::model::suit::Suit;
use serde::{Deserialize, Serialize};

/// Bit set of suits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct SuitMask(u8);

impl SuitMask {
    pub const EMPTY: Self = Self(0);
    pub const ALL: Self = Self(0b1111);

    pub const fn only(suit: Suit) -> Self {
        Self(1 << suit as u8)
    }

    pub fn contains(self, suit: Suit) -> bool {
        let bit = 1 << suit as u8;
        self.0 & bit != 0
    }

    pub fn with(mut self, suit: Suit) -> Self {
        let bit = 1 << suit as u8;
        self.0 |= bit;
        self
    }

    pub fn without(mut self, suit: Suit) -> Self {
        let bit = 1 << suit as u8;
        self.0 &= !bit;
        self
    }

    pub const fn complement(self) -> Self {
        Self(!self.0 & 0b1111)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn suits(self) -> impl Iterator<Item = Suit> {
        Suit::ALL.into_iter().filter(move |suit| self.contains(*suit))
    }
}

/// Suits each seat has shown it cannot follow. Grows monotonically within a round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VoidMap {
    masks: [SuitMask; 4],
}

impl VoidMap {
    pub const fn new() -> Self {
        Self {
            masks: [SuitMask::EMPTY; 4],
        }
    }

    pub fn mark(&mut self, seat: PlayerPosition, suit: Suit) {
        let index = seat.index();
        self.masks[index] = self.masks[index].with(suit);
    }

    /// Records a play against the active lead; a different suit proves a void.
    pub fn observe(&mut self, seat: PlayerPosition, lead: Option<Suit>, played: Suit) {
        if let Some(lead_suit) = lead {
            if lead_suit != played {
                self.mark(seat, lead_suit);
            }
        }
    }

    pub fn is_void(&self, seat: PlayerPosition, suit: Suit) -> bool {
        self.masks[seat.index()].contains(suit)
    }

    pub fn mask(&self, seat: PlayerPosition) -> SuitMask {
        self.masks[seat.index()]
    }
}
