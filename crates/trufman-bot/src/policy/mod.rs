mod baseline;
mod learning;

pub use baseline::BaselinePolicy;
pub use learning::{LearningPolicy, PendingUpdate};

use crate::bot::CancelFlag;
use trufman_core::game::snapshot::RoundSnapshot;
use trufman_core::model::bid::Bid;
use trufman_core::model::card::Card;
use trufman_core::model::hand::Hand;
use trufman_core::model::player::PlayerPosition;
use trufman_core::model::rules;
use trufman_core::model::suit::Suit;
use trufman_core::model::trick::CompletedTrick;

/// Outcome of a card-play decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Play(Card),
    /// Evaluation failed; the card came from the deterministic fallback.
    Fallback(Card),
    Cancelled,
}

impl Decision {
    pub fn card(self) -> Option<Card> {
        match self {
            Decision::Play(card) | Decision::Fallback(card) => Some(card),
            Decision::Cancelled => None,
        }
    }
}

/// A seat's decision maker. Sees the table only through its own snapshot.
pub trait Policy: Send {
    fn seat(&self) -> PlayerPosition;

    fn name(&self) -> &'static str;

    /// `None` when the seat has no hand to bid from.
    fn choose_bid(&mut self, snapshot: &RoundSnapshot) -> Option<Bid>;

    /// `None` when it is not this seat's turn to play.
    fn choose_play(&mut self, snapshot: &RoundSnapshot, cancel: &CancelFlag) -> Option<Decision>;

    fn observe_bids(&mut self, _bids: &[Bid; 4]) {}

    fn observe_trick(&mut self, _trick: &CompletedTrick, _trump: Suit) {}

    fn observe_round_end(&mut self, _tricks_won: &[u8; 4], _deltas: &[i32; 4]) {}

    /// Soft resets forget the pending decision; hard resets also wipe anything learned.
    fn reset(&mut self, _hard: bool) {}
}

/// Legal cards for `seat` when it is that seat's turn in play.
pub(crate) fn legal_from_snapshot(snapshot: &RoundSnapshot, seat: PlayerPosition) -> Option<Vec<Card>> {
    if snapshot.to_act != Some(seat) {
        return None;
    }
    let trump = snapshot.contract?.trump;
    let hand = Hand::with_cards(snapshot.hand(seat)?.to_vec());
    let legal = rules::legal_cards(&hand, snapshot.lead_suit(), trump, snapshot.trump_broken);
    (!legal.is_empty()).then_some(legal)
}
