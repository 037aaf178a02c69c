//! Cross-round tendencies of each seat, used to bias world assignment.

use crate::model::bid::Bid;
use crate::model::card::Card;
use crate::model::player::PlayerPosition;
use crate::model::suit::Suit;
use crate::model::trick::Trick;
use serde::{Deserialize, Serialize};

const EMA_RATE: f32 = 0.2;
/// Even share of thirteen tricks across four seats.
const FAIR_SHARE: f32 = 13.0 / 4.0;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OpponentModel {
    pub bid_histogram: [u32; 4],
    pub aggression: f32,
    pub overtrump_frequency: f32,
    pub bids_seen: u32,
    pub discards_seen: u32,
}

impl OpponentModel {
    pub fn observe_bid(&mut self, suit: Suit, count: u8) {
        self.bid_histogram[suit.index()] += 1;
        self.aggression = blend(self.aggression, count as f32, self.bids_seen);
        self.bids_seen += 1;
    }

    /// A discard on a non-trump lead the seat could not follow.
    pub fn observe_void_discard(&mut self, trumped: bool) {
        let sample = if trumped { 1.0 } else { 0.0 };
        self.overtrump_frequency = blend(self.overtrump_frequency, sample, self.discards_seen);
        self.discards_seen += 1;
    }

    /// Bid size relative to an even share, in `[-1, 1]`.
    pub fn aggression_bias(&self) -> f32 {
        if self.bids_seen == 0 {
            return 0.0;
        }
        ((self.aggression - FAIR_SHARE) / FAIR_SHARE).clamp(-1.0, 1.0)
    }

    pub fn bid_share(&self, suit: Suit) -> f32 {
        let total: u32 = self.bid_histogram.iter().sum();
        if total == 0 {
            return 0.25;
        }
        self.bid_histogram[suit.index()] as f32 / total as f32
    }
}

fn blend(current: f32, sample: f32, seen: u32) -> f32 {
    if seen == 0 {
        sample
    } else {
        current + EMA_RATE * (sample - current)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct OpponentBook {
    seats: [OpponentModel; 4],
}

impl OpponentBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn model(&self, seat: PlayerPosition) -> &OpponentModel {
        &self.seats[seat.index()]
    }

    pub fn models(&self) -> &[OpponentModel; 4] {
        &self.seats
    }

    pub fn set_model(&mut self, seat: PlayerPosition, model: OpponentModel) {
        self.seats[seat.index()] = model;
    }

    pub fn observe_bid(&mut self, bid: &Bid) {
        self.seats[bid.seat.index()].observe_bid(bid.suit, bid.count());
    }

    pub fn observe_play(&mut self, seat: PlayerPosition, lead: Option<Suit>, card: Card, trump: Suit) {
        if let Some(lead_suit) = lead {
            if lead_suit != trump && card.suit != lead_suit {
                self.seats[seat.index()].observe_void_discard(card.suit == trump);
            }
        }
    }

    /// Replays a fully revealed trick.
    pub fn observe_trick(&mut self, trick: &Trick, trump: Suit) {
        let lead = trick.lead_suit();
        for play in trick.plays().iter().skip(1) {
            self.observe_play(play.position, lead, play.card, trump);
        }
    }

    /// Relative likelihood that `seat` holds a card of `suit`, around 1.0.
    pub fn suit_bias(&self, seat: PlayerPosition, suit: Suit, trump: Suit) -> f32 {
        let model = &self.seats[seat.index()];
        let mut weight = 1.0 + 0.6 * (model.bid_share(suit) - 0.25);
        if suit == trump {
            weight += 0.3 * model.overtrump_frequency + 0.1 * model.aggression_bias().max(0.0);
        }
        weight.clamp(0.5, 2.0)
    }
}

#[cfg(test)]
mod tests {
    use super::{OpponentBook, OpponentModel};
    use crate::model::bid::Bid;
    use crate::model::card::Card;
    use crate::model::player::PlayerPosition;
    use crate::model::rank::Rank;
    use crate::model::suit::Suit;
    use crate::model::trick::Trick;

    #[test]
    fn bids_build_histogram_and_aggression() {
        let mut model = OpponentModel::default();
        model.observe_bid(Suit::Hearts, 7);
        model.observe_bid(Suit::Hearts, 7);
        assert_eq!(model.bid_histogram, [0, 0, 2, 0]);
        assert!(model.aggression_bias() > 0.0);
        assert!((model.bid_share(Suit::Hearts) - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn unobserved_model_is_neutral() {
        let book = OpponentBook::new();
        for suit in Suit::ALL {
            let bias = book.suit_bias(PlayerPosition::East, suit, Suit::Spades);
            assert!((bias - 1.0).abs() < 1e-6, "{suit} bias {bias}");
        }
    }

    #[test]
    fn trumping_discards_raise_trump_bias() {
        let trump = Suit::Spades;
        let mut trick = Trick::new(PlayerPosition::North);
        trick.play(PlayerPosition::North, Card::new(Rank::Two, Suit::Hearts), trump).unwrap();
        trick.play(PlayerPosition::East, Card::new(Rank::Three, Suit::Spades), trump).unwrap();
        trick.play(PlayerPosition::South, Card::new(Rank::Four, Suit::Hearts), trump).unwrap();
        trick.play(PlayerPosition::West, Card::new(Rank::Five, Suit::Clubs), trump).unwrap();

        let mut book = OpponentBook::new();
        book.observe_trick(&trick, trump);
        assert!((book.model(PlayerPosition::East).overtrump_frequency - 1.0).abs() < 1e-6);
        assert_eq!(book.model(PlayerPosition::West).overtrump_frequency, 0.0);
        assert_eq!(book.model(PlayerPosition::West).discards_seen, 1);
        assert_eq!(book.model(PlayerPosition::South).discards_seen, 0);
        assert!(book.suit_bias(PlayerPosition::East, trump, trump) > 1.0);
    }

    #[test]
    fn bid_suit_is_favoured() {
        let mut book = OpponentBook::new();
        book.observe_bid(&Bid::new(PlayerPosition::West, Suit::Diamonds, Rank::Six));
        let favoured = book.suit_bias(PlayerPosition::West, Suit::Diamonds, Suit::Clubs);
        let other = book.suit_bias(PlayerPosition::West, Suit::Hearts, Suit::Clubs);
        assert!(favoured > other);
    }
}
