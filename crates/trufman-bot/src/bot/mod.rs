mod bid;
mod features;
mod params;
mod play;
mod rollout;

pub use bid::{BidPlanner, SuitAssessment};
pub use features::{FeatureKey, NeedSign, RankBucket};
pub use params::BotParams;
pub use play::{Candidate, PlayPlanner};
pub use rollout::{EstimateMethod, WinEstimate, WinEstimator};

use crate::error::AgentError;
use crate::memory::WeightTable;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use trufman_core::belief::OpponentBook;
use trufman_core::game::snapshot::RoundSnapshot;
use trufman_core::model::card::Card;
use trufman_core::model::hand::Hand;
use trufman_core::model::player::PlayerPosition;
use trufman_core::model::rank::Rank;
use trufman_core::model::rules;
use trufman_core::model::suit::Suit;

/// Shared stop signal for an in-flight evaluation.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Everything a planner may look at, built from one seat's snapshot.
#[derive(Debug, Clone, Copy)]
pub struct BotContext<'a> {
    pub seat: PlayerPosition,
    pub snapshot: &'a RoundSnapshot,
    pub params: &'a BotParams,
    pub opponents: &'a OpponentBook,
    pub weights: &'a WeightTable,
    hand: &'a [Card],
    trump: Suit,
}

impl<'a> BotContext<'a> {
    pub fn new(
        seat: PlayerPosition,
        snapshot: &'a RoundSnapshot,
        params: &'a BotParams,
        opponents: &'a OpponentBook,
        weights: &'a WeightTable,
    ) -> Result<Self, AgentError> {
        let hand = snapshot.hand(seat).ok_or(AgentError::HandHidden(seat))?;
        let trump = snapshot
            .contract
            .map(|contract| contract.trump)
            .ok_or(AgentError::NoContract)?;
        Ok(Self {
            seat,
            snapshot,
            params,
            opponents,
            weights,
            hand,
            trump,
        })
    }

    pub fn hand(&self) -> &'a [Card] {
        self.hand
    }

    pub fn trump(&self) -> Suit {
        self.trump
    }

    pub fn lead_suit(&self) -> Option<Suit> {
        self.snapshot.lead_suit()
    }

    pub fn need(&self) -> i32 {
        self.snapshot.need(self.seat).unwrap_or(0)
    }

    /// Cards already on the table before this seat plays.
    pub fn position_in_trick(&self) -> usize {
        self.snapshot.current_trick.len()
    }

    pub fn cards_left(&self) -> usize {
        self.hand.len()
    }

    pub fn is_endgame(&self) -> bool {
        self.cards_left() <= self.params.endgame_cards
    }

    pub fn legal_moves(&self) -> Vec<Card> {
        let hand = Hand::with_cards(self.hand.to_vec());
        rules::legal_cards(
            &hand,
            self.lead_suit(),
            self.trump,
            self.snapshot.trump_broken,
        )
    }

    /// Seats that still play to this trick after this one.
    pub fn seats_after(&self) -> Vec<PlayerPosition> {
        let order = self.snapshot.trick_leader.rotation();
        order
            .iter()
            .skip(self.position_in_trick() + 1)
            .copied()
            .collect()
    }

    /// Cards neither in this hand nor seen face up.
    pub fn unseen_cards(&self) -> Vec<Card> {
        let seen = self.snapshot.seen_cards();
        (0..52u8)
            .filter_map(Card::from_id)
            .filter(|card| !self.hand.contains(card) && !seen.contains(card))
            .collect()
    }

    /// The table as this seat sees it, with concealed trumps assumed as high as possible.
    pub fn table(&self) -> TableView {
        let assumed = self.highest_unseen_trump();
        let mut view = TableView {
            lead: self.lead_suit(),
            best: None,
            hidden: 0,
        };
        for play in &self.snapshot.current_trick {
            let card = match play.card {
                Some(card) => card,
                None => {
                    view.hidden += 1;
                    assumed
                }
            };
            view.consider(card, self.trump);
        }
        view
    }

    fn highest_unseen_trump(&self) -> Card {
        self.unseen_cards()
            .into_iter()
            .filter(|card| card.suit == self.trump)
            .max_by_key(|card| card.rank)
            .unwrap_or(Card::new(Rank::Two, self.trump))
    }
}

/// Best card currently on the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableView {
    pub lead: Option<Suit>,
    pub best: Option<Card>,
    pub hidden: usize,
}

impl TableView {
    fn consider(&mut self, card: Card, trump: Suit) {
        let lead = *self.lead.get_or_insert(card.suit);
        self.best = match self.best {
            Some(best) if !rules::card_beats(card, best, lead, trump) => Some(best),
            _ => Some(card),
        };
    }

    /// Whether `card` would take the lead over everything already played.
    pub fn beaten_by(&self, card: Card, trump: Suit) -> bool {
        match (self.best, self.lead) {
            (Some(best), Some(lead)) => rules::card_beats(card, best, lead, trump),
            _ => true,
        }
    }
}

/// Lowest rank first, suit order breaking ties.
pub(crate) fn low_card_key(card: Card) -> (u8, u8) {
    (card.rank.value(), card.suit as u8)
}

pub(crate) fn lowest(cards: impl IntoIterator<Item = Card>) -> Option<Card> {
    cards.into_iter().min_by_key(|card| low_card_key(*card))
}
