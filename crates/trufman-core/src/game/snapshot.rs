//! Read-only view of a round for one observer.

use crate::belief::voids::VoidMap;
use crate::model::bid::{Bid, Contract};
use crate::model::card::Card;
use crate::model::player::PlayerPosition;
use crate::model::round::{RoundPhase, RoundState};
use crate::model::score::ScoreBoard;
use crate::model::trick::CompletedTrick;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Viewer {
    Seat(PlayerPosition),
    Spectator,
}

impl Viewer {
    pub fn seat(self) -> Option<PlayerPosition> {
        match self {
            Viewer::Seat(seat) => Some(seat),
            Viewer::Spectator => None,
        }
    }

    fn sees_hand(self, seat: PlayerPosition) -> bool {
        match self {
            Viewer::Seat(own) => own == seat,
            Viewer::Spectator => true,
        }
    }
}

/// A card on the table. Concealed trumps show only that something was played.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicPlay {
    pub seat: PlayerPosition,
    pub card: Option<Card>,
    pub hidden: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BidView {
    pub submitted: bool,
    pub bid: Option<Bid>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundSnapshot {
    pub viewer: Viewer,
    pub round_number: u32,
    pub dealer: PlayerPosition,
    pub phase: RoundPhase,
    pub to_act: Option<PlayerPosition>,
    pub hands: [Option<Vec<Card>>; 4],
    pub hand_sizes: [usize; 4],
    pub bids: [BidView; 4],
    pub contract: Option<Contract>,
    pub trick_leader: PlayerPosition,
    pub current_trick: Vec<PublicPlay>,
    pub completed_tricks: Vec<CompletedTrick>,
    pub tricks_won: [u8; 4],
    pub trump_broken: bool,
    pub voids: VoidMap,
    pub resolving: bool,
    pub scores: [i32; 4],
}

impl RoundSnapshot {
    pub fn capture(
        round: &RoundState,
        scores: &ScoreBoard,
        round_number: u32,
        viewer: Viewer,
    ) -> Self {
        let bids_public = round.bids().is_complete();
        let bids = PlayerPosition::LOOP.map(|seat| {
            let bid = round.bids().get(seat).copied();
            let visible = bids_public || viewer.seat() == Some(seat);
            BidView {
                submitted: bid.is_some(),
                bid: bid.filter(|_| visible),
            }
        });

        let current_trick = round
            .current_trick()
            .plays()
            .iter()
            .map(|play| {
                let hidden = play.concealed && viewer.seat() != Some(play.position);
                PublicPlay {
                    seat: play.position,
                    card: (!hidden).then_some(play.card),
                    hidden,
                }
            })
            .collect();

        Self {
            viewer,
            round_number,
            dealer: round.dealer(),
            phase: round.phase(),
            to_act: round.to_act(),
            hands: PlayerPosition::LOOP.map(|seat| {
                viewer
                    .sees_hand(seat)
                    .then(|| round.hand(seat).cards().to_vec())
            }),
            hand_sizes: PlayerPosition::LOOP.map(|seat| round.hand(seat).len()),
            bids,
            contract: round.contract().copied(),
            trick_leader: round.current_trick().leader(),
            current_trick,
            completed_tricks: round.completed_tricks().to_vec(),
            tricks_won: round.tricks_won(),
            trump_broken: round.trump_broken(),
            voids: *round.voids(),
            resolving: round.is_resolving(),
            scores: *scores.standings(),
        }
    }

    pub fn hand(&self, seat: PlayerPosition) -> Option<&[Card]> {
        self.hands[seat.index()].as_deref()
    }

    pub fn bid(&self, seat: PlayerPosition) -> Option<&Bid> {
        self.bids[seat.index()].bid.as_ref()
    }

    pub fn lead_suit(&self) -> Option<crate::model::suit::Suit> {
        self.current_trick.first().and_then(|play| {
            play.card
                .map(|card| card.suit)
                .or_else(|| self.contract.map(|contract| contract.trump))
        })
    }

    pub fn need(&self, seat: PlayerPosition) -> Option<i32> {
        self.contract
            .map(|contract| contract.target(seat) as i32 - self.tricks_won[seat.index()] as i32)
    }

    /// Every card this viewer has seen leave a hand, including its own table cards.
    pub fn seen_cards(&self) -> Vec<Card> {
        let mut seen: Vec<Card> = self
            .completed_tricks
            .iter()
            .flat_map(|done| done.trick.plays().iter().map(|play| play.card))
            .collect();
        seen.extend(self.current_trick.iter().filter_map(|play| play.card));
        seen
    }
}
