use std::fmt;
use trufman_core::model::card::Card;
use trufman_core::model::rank::Rank;
use trufman_core::model::suit::Suit;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RankBucket {
    Ace,
    King,
    Queen,
    Jack,
    Ten,
    Low,
}

impl RankBucket {
    pub fn of(rank: Rank) -> Self {
        match rank {
            Rank::Ace => RankBucket::Ace,
            Rank::King => RankBucket::King,
            Rank::Queen => RankBucket::Queen,
            Rank::Jack => RankBucket::Jack,
            Rank::Ten => RankBucket::Ten,
            _ => RankBucket::Low,
        }
    }

    pub const fn symbol(self) -> char {
        match self {
            RankBucket::Ace => 'A',
            RankBucket::King => 'K',
            RankBucket::Queen => 'Q',
            RankBucket::Jack => 'J',
            RankBucket::Ten => 'T',
            RankBucket::Low => 'L',
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NeedSign {
    Positive,
    Zero,
    Negative,
}

impl NeedSign {
    pub fn of(need: i32) -> Self {
        match need.signum() {
            1 => NeedSign::Positive,
            0 => NeedSign::Zero,
            _ => NeedSign::Negative,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            NeedSign::Positive => "pos",
            NeedSign::Zero => "zero",
            NeedSign::Negative => "neg",
        }
    }
}

/// Coarse description of a play, used as the learned-weight lookup key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FeatureKey {
    pub trump: bool,
    pub bucket: RankBucket,
    pub position: u8,
    pub need: NeedSign,
    pub endgame: bool,
}

impl FeatureKey {
    pub fn for_play(card: Card, trump: Suit, position: usize, need: i32, endgame: bool) -> Self {
        Self {
            trump: card.suit == trump,
            bucket: RankBucket::of(card.rank),
            position: position.min(3) as u8,
            need: NeedSign::of(need),
            endgame,
        }
    }
}

impl fmt::Display for FeatureKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "v2|isT:{}|b:{}|pos:{}|need:{}|end:{}",
            u8::from(self.trump),
            self.bucket.symbol(),
            self.position,
            self.need.as_str(),
            u8::from(self.endgame)
        )
    }
}
