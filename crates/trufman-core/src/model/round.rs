use crate::belief::voids::VoidMap;
use crate::model::bid::{Bid, BidBook, BidError, Contract};
use crate::model::card::Card;
use crate::model::deck::Deck;
use crate::model::hand::Hand;
use crate::model::player::PlayerPosition;
use crate::model::rank::Rank;
use crate::model::rules::{self, IllegalReason};
use crate::model::score::round_score;
use crate::model::suit::Suit;
use crate::model::trick::{CompletedTrick, Trick, TrickError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Authoritative state of one round, rebuilt at every deal.
#[derive(Debug, Clone)]
pub struct RoundState {
    dealer: PlayerPosition,
    hands: [Hand; 4],
    dealt: u64,
    bids: BidBook,
    contract: Option<Contract>,
    current_trick: Trick,
    history: Vec<CompletedTrick>,
    tricks_won: [u8; 4],
    trump_broken: bool,
    voids: VoidMap,
    phase: RoundPhase,
    resolving: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RoundPhase {
    Bidding,
    Play,
    Scoring,
}

/// Trick-level status derived from the round; never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrickState {
    AwaitingLead {
        leader: PlayerPosition,
    },
    AwaitingFollow {
        lead_suit: Suit,
        plays: usize,
        next: PlayerPosition,
    },
    TrickComplete,
    RoundComplete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayOutcome {
    Played { next: PlayerPosition },
    TrickFull,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrickResolution {
    pub winner: PlayerPosition,
    pub trick_number: usize,
    pub round_complete: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayError {
    NotInPlayPhase,
    CardNotInHand(Card),
    OutOfTurn {
        expected: PlayerPosition,
        actual: PlayerPosition,
    },
    IllegalPlay(IllegalReason),
    TrickFull,
    TrickIncomplete,
    ResolutionInProgress,
    NoResolutionInProgress,
    Trick(TrickError),
}

impl fmt::Display for PlayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlayError::NotInPlayPhase => write!(f, "cards can only be played during play"),
            PlayError::CardNotInHand(card) => write!(f, "{card} is not in hand"),
            PlayError::OutOfTurn { expected, actual } => {
                write!(f, "expected {expected} to act but got {actual}")
            }
            PlayError::IllegalPlay(reason) => write!(f, "illegal play: {reason}"),
            PlayError::TrickFull => write!(f, "trick already holds four plays"),
            PlayError::TrickIncomplete => write!(f, "trick is not complete"),
            PlayError::ResolutionInProgress => write!(f, "trick resolution already in progress"),
            PlayError::NoResolutionInProgress => write!(f, "no trick resolution in progress"),
            PlayError::Trick(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for PlayError {}

impl RoundState {
    pub fn deal(deck: &Deck, dealer: PlayerPosition) -> Self {
        Self::from_hands(deck.deal(), dealer)
    }

    /// Starts a round from explicit hands. The dealt set is whatever the hands hold.
    pub fn from_hands(hands: [Hand; 4], dealer: PlayerPosition) -> Self {
        let dealt = hands
            .iter()
            .flat_map(|hand| hand.iter())
            .fold(0u64, |mask, card| mask | (1u64 << card.to_id()));
        Self {
            dealer,
            hands,
            dealt,
            bids: BidBook::new(),
            contract: None,
            current_trick: Trick::new(dealer.next()),
            history: Vec::with_capacity(13),
            tricks_won: [0; 4],
            trump_broken: false,
            voids: VoidMap::new(),
            phase: RoundPhase::Bidding,
            resolving: false,
        }
    }

    pub fn dealer(&self) -> PlayerPosition {
        self.dealer
    }

    pub fn phase(&self) -> RoundPhase {
        self.phase
    }

    pub fn hand(&self, seat: PlayerPosition) -> &Hand {
        &self.hands[seat.index()]
    }

    pub fn bids(&self) -> &BidBook {
        &self.bids
    }

    pub fn contract(&self) -> Option<&Contract> {
        self.contract.as_ref()
    }

    pub fn trump(&self) -> Option<Suit> {
        self.contract.map(|contract| contract.trump)
    }

    pub fn current_trick(&self) -> &Trick {
        &self.current_trick
    }

    pub fn completed_tricks(&self) -> &[CompletedTrick] {
        &self.history
    }

    pub fn tricks_completed(&self) -> usize {
        self.history.len()
    }

    pub fn tricks_won(&self) -> [u8; 4] {
        self.tricks_won
    }

    pub fn trump_broken(&self) -> bool {
        self.trump_broken
    }

    pub fn voids(&self) -> &VoidMap {
        &self.voids
    }

    pub fn is_resolving(&self) -> bool {
        self.resolving
    }

    /// Target minus tricks won, once the contract exists.
    pub fn need(&self, seat: PlayerPosition) -> Option<i32> {
        self.contract
            .map(|contract| contract.target(seat) as i32 - self.tricks_won[seat.index()] as i32)
    }

    pub fn submit_bid(&mut self, seat: PlayerPosition, suit: Suit, rank: Rank) -> Result<(), BidError> {
        if self.phase != RoundPhase::Bidding {
            return Err(BidError::NotInBiddingPhase);
        }
        let bid = Bid::new(seat, suit, rank);
        self.bids.submit(bid, &self.hands[seat.index()])
    }

    /// Closes bidding, fixes the contract and hands the lead to the seat after the dealer.
    pub fn start_play(&mut self) -> Result<Contract, BidError> {
        if self.phase != RoundPhase::Bidding {
            return Err(BidError::NotInBiddingPhase);
        }
        let contract = self.bids.resolve()?;
        self.contract = Some(contract);
        self.current_trick = Trick::new(self.dealer.next());
        self.phase = RoundPhase::Play;
        Ok(contract)
    }

    pub fn trick_state(&self) -> TrickState {
        if self.phase == RoundPhase::Scoring {
            return TrickState::RoundComplete;
        }
        if self.current_trick.is_complete() {
            return TrickState::TrickComplete;
        }
        match self.current_trick.lead_suit() {
            None => TrickState::AwaitingLead {
                leader: self.current_trick.leader(),
            },
            Some(lead_suit) => TrickState::AwaitingFollow {
                lead_suit,
                plays: self.current_trick.plays().len(),
                next: self.current_trick.expected_position(),
            },
        }
    }

    /// Seat whose card is awaited, if any.
    pub fn to_act(&self) -> Option<PlayerPosition> {
        match self.trick_state() {
            TrickState::AwaitingLead { leader } => Some(leader),
            TrickState::AwaitingFollow { next, .. } => Some(next),
            TrickState::TrickComplete | TrickState::RoundComplete => None,
        }
    }

    pub fn can_play(&self, seat: PlayerPosition, card: Card) -> Result<(), PlayError> {
        let trump = self.active_trump()?;
        if self.current_trick.is_complete() {
            return Err(PlayError::TrickFull);
        }
        let expected = self.current_trick.expected_position();
        if expected != seat {
            return Err(PlayError::OutOfTurn {
                expected,
                actual: seat,
            });
        }
        let hand = &self.hands[seat.index()];
        if !hand.contains(card) {
            return Err(PlayError::CardNotInHand(card));
        }
        rules::check_play(
            hand,
            card,
            self.current_trick.lead_suit(),
            trump,
            self.trump_broken,
        )
        .map_err(PlayError::IllegalPlay)
    }

    /// Legal cards for `seat`; empty when it is not that seat's turn.
    pub fn legal_moves(&self, seat: PlayerPosition) -> Vec<Card> {
        let Some(trump) = self.trump() else {
            return Vec::new();
        };
        if self.phase != RoundPhase::Play || self.to_act() != Some(seat) {
            return Vec::new();
        }
        rules::legal_cards(
            &self.hands[seat.index()],
            self.current_trick.lead_suit(),
            trump,
            self.trump_broken,
        )
    }

    pub fn play_card(&mut self, seat: PlayerPosition, card: Card) -> Result<PlayOutcome, PlayError> {
        self.can_play(seat, card)?;
        let trump = self.active_trump()?;
        let lead = self.current_trick.lead_suit();

        self.current_trick
            .play(seat, card, trump)
            .map_err(PlayError::Trick)?;
        let removed = self.hands[seat.index()].remove(card);
        debug_assert!(removed, "{card} vanished from {seat} between check and commit");

        if rules::breaks_trump(card, lead, trump) {
            self.trump_broken = true;
        }
        self.voids.observe(seat, lead, card.suit);
        debug_assert!(self.partition_holds(), "card partition broken after {seat} played {card}");

        if self.current_trick.is_complete() {
            Ok(PlayOutcome::TrickFull)
        } else {
            Ok(PlayOutcome::Played {
                next: self.current_trick.expected_position(),
            })
        }
    }

    /// Marks the full trick as being resolved and reports its winner.
    pub fn begin_trick_resolution(&mut self) -> Result<PlayerPosition, PlayError> {
        let trump = self.active_trump()?;
        if self.resolving {
            return Err(PlayError::ResolutionInProgress);
        }
        let winner = self
            .current_trick
            .winner(trump)
            .ok_or(PlayError::TrickIncomplete)?;
        self.resolving = true;
        Ok(winner)
    }

    /// Records the winner, starts the next trick and clears the in-progress flag.
    pub fn complete_trick_resolution(&mut self) -> Result<TrickResolution, PlayError> {
        let trump = self.active_trump()?;
        if !self.resolving {
            return Err(PlayError::NoResolutionInProgress);
        }
        let winner = self
            .current_trick
            .winner(trump)
            .ok_or(PlayError::TrickIncomplete)?;

        let finished = std::mem::replace(&mut self.current_trick, Trick::new(winner));
        self.history.push(CompletedTrick {
            trick: finished,
            winner,
        });
        self.tricks_won[winner.index()] += 1;
        self.resolving = false;

        let round_complete = self.hands.iter().all(Hand::is_empty);
        if round_complete {
            self.phase = RoundPhase::Scoring;
        }
        debug_assert!(self.partition_holds(), "card partition broken after trick resolution");

        Ok(TrickResolution {
            winner,
            trick_number: self.history.len(),
            round_complete,
        })
    }

    /// Drops an in-flight resolution without side effects. Returns whether one was pending.
    pub fn abort_trick_resolution(&mut self) -> bool {
        std::mem::replace(&mut self.resolving, false)
    }

    pub fn resolve_trick(&mut self) -> Result<TrickResolution, PlayError> {
        self.begin_trick_resolution()?;
        self.complete_trick_resolution()
    }

    /// Per-seat deltas, available once every trick has been resolved.
    pub fn round_scores(&self) -> Option<[i32; 4]> {
        if self.phase != RoundPhase::Scoring {
            return None;
        }
        let contract = self.contract?;
        let mut deltas = [0; 4];
        for seat in PlayerPosition::LOOP {
            deltas[seat.index()] = round_score(
                contract.mode,
                contract.target(seat),
                self.tricks_won[seat.index()],
            );
        }
        Some(deltas)
    }

    /// Hands, the open trick and resolved tricks together hold each dealt card exactly once.
    pub fn partition_holds(&self) -> bool {
        let mut seen = 0u64;
        let mut count = 0u32;
        let hands = self.hands.iter().flat_map(|hand| hand.iter().copied());
        let open = self.current_trick.plays().iter().map(|play| play.card);
        let closed = self
            .history
            .iter()
            .flat_map(|done| done.trick.plays().iter().map(|play| play.card));
        for card in hands.chain(open).chain(closed) {
            let bit = 1u64 << card.to_id();
            if seen & bit != 0 {
                return false;
            }
            seen |= bit;
            count += 1;
        }
        seen == self.dealt && count == self.dealt.count_ones()
    }

    fn active_trump(&self) -> Result<Suit, PlayError> {
        match (self.phase, self.trump()) {
            (RoundPhase::Play, Some(trump)) => Ok(trump),
            _ => Err(PlayError::NotInPlayPhase),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::bid::Mode;

    fn card(text: &str) -> Card {
        text.parse().unwrap()
    }

    fn suit_hand(suit: Suit) -> Hand {
        Hand::with_cards(Rank::ORDERED.iter().map(|rank| Card::new(*rank, suit)).collect())
    }

    /// North holds all clubs, East diamonds, South hearts, West spades.
    fn suited_round() -> RoundState {
        RoundState::from_hands(
            [
                suit_hand(Suit::Clubs),
                suit_hand(Suit::Diamonds),
                suit_hand(Suit::Hearts),
                suit_hand(Suit::Spades),
            ],
            PlayerPosition::West,
        )
    }

    fn bid_all(round: &mut RoundState, bids: [&str; 4]) {
        for (seat, text) in PlayerPosition::LOOP.iter().zip(bids) {
            let card = card(text);
            round.submit_bid(*seat, card.suit, card.rank).unwrap();
        }
    }

    #[test]
    fn dealing_distributes_thirteen_cards_per_player() {
        let round = RoundState::deal(&Deck::shuffled_with_seed(5), PlayerPosition::South);
        for seat in PlayerPosition::LOOP {
            assert_eq!(round.hand(seat).len(), 13, "{seat} should have 13 cards");
        }
        assert_eq!(round.phase(), RoundPhase::Bidding);
        assert_eq!(round.current_trick().leader(), PlayerPosition::West);
        assert!(round.partition_holds());
    }

    #[test]
    fn bid_must_reference_held_card() {
        let mut round = suited_round();
        assert!(matches!(
            round.submit_bid(PlayerPosition::North, Suit::Hearts, Rank::Five),
            Err(BidError::InvalidBid { .. })
        ));
        assert_eq!(round.bids().submitted(), 0);
    }

    #[test]
    fn play_cannot_start_before_all_bids() {
        let mut round = suited_round();
        round
            .submit_bid(PlayerPosition::North, Suit::Clubs, Rank::Five)
            .unwrap();
        assert_eq!(
            round.start_play(),
            Err(BidError::IncompleteBidding { submitted: 1 })
        );
        assert_eq!(round.phase(), RoundPhase::Bidding);
        assert!(matches!(
            round.play_card(PlayerPosition::North, card("5C")),
            Err(PlayError::NotInPlayPhase)
        ));
    }

    #[test]
    fn start_play_fixes_contract_and_leader() {
        let mut round = suited_round();
        bid_all(&mut round, ["5C", "5D", "3H", "2S"]);
        let contract = round.start_play().unwrap();
        assert_eq!(contract.trump, Suit::Diamonds);
        assert_eq!(contract.mode, Mode::Atas);
        assert_eq!(round.to_act(), Some(PlayerPosition::North));
        assert_eq!(
            round.submit_bid(PlayerPosition::North, Suit::Clubs, Rank::Two),
            Err(BidError::NotInBiddingPhase)
        );
    }

    #[test]
    fn trump_only_hand_leads_trump_and_breaks_it() {
        let mut round = suited_round();
        bid_all(&mut round, ["7C", "2D", "3H", "2S"]);
        round.start_play().unwrap();
        assert_eq!(round.trump(), Some(Suit::Clubs));
        assert!(!round.trump_broken());
        round.play_card(PlayerPosition::North, card("2C")).unwrap();
        assert!(round.trump_broken());
        assert!(round.current_trick().plays()[0].concealed);
    }

    #[test]
    fn out_of_turn_and_unheld_cards_rejected_without_mutation() {
        let mut round = suited_round();
        bid_all(&mut round, ["7C", "2D", "3H", "2S"]);
        round.start_play().unwrap();
        let before = round.hand(PlayerPosition::East).clone();
        assert!(matches!(
            round.play_card(PlayerPosition::East, card("2D")),
            Err(PlayError::OutOfTurn { .. })
        ));
        assert!(matches!(
            round.play_card(PlayerPosition::North, card("2D")),
            Err(PlayError::CardNotInHand(_))
        ));
        assert_eq!(round.hand(PlayerPosition::East), &before);
        assert!(round.current_trick().is_empty());
    }

    #[test]
    fn full_trick_resolves_once() {
        let mut round = suited_round();
        bid_all(&mut round, ["7C", "2D", "3H", "2S"]);
        round.start_play().unwrap();
        for (seat, text) in [
            (PlayerPosition::North, "3C"),
            (PlayerPosition::East, "AD"),
            (PlayerPosition::South, "AH"),
        ] {
            assert!(matches!(
                round.play_card(seat, card(text)).unwrap(),
                PlayOutcome::Played { .. }
            ));
        }
        assert_eq!(
            round.play_card(PlayerPosition::West, card("AS")).unwrap(),
            PlayOutcome::TrickFull
        );
        assert_eq!(round.trick_state(), TrickState::TrickComplete);
        assert_eq!(round.to_act(), None);
        assert!(matches!(
            round.play_card(PlayerPosition::North, card("4C")),
            Err(PlayError::TrickFull)
        ));

        assert_eq!(round.begin_trick_resolution(), Ok(PlayerPosition::North));
        assert_eq!(
            round.begin_trick_resolution(),
            Err(PlayError::ResolutionInProgress)
        );
        let resolution = round.complete_trick_resolution().unwrap();
        assert_eq!(resolution.winner, PlayerPosition::North);
        assert_eq!(resolution.trick_number, 1);
        assert!(!resolution.round_complete);
        assert_eq!(
            round.complete_trick_resolution(),
            Err(PlayError::NoResolutionInProgress)
        );
        assert_eq!(round.tricks_won(), [1, 0, 0, 0]);
        assert_eq!(
            round.trick_state(),
            TrickState::AwaitingLead {
                leader: PlayerPosition::North
            }
        );
    }

    #[test]
    fn aborted_resolution_leaves_trick_in_place() {
        let mut round = suited_round();
        bid_all(&mut round, ["7C", "2D", "3H", "2S"]);
        round.start_play().unwrap();
        for (seat, text) in [
            (PlayerPosition::North, "3C"),
            (PlayerPosition::East, "AD"),
            (PlayerPosition::South, "AH"),
            (PlayerPosition::West, "AS"),
        ] {
            round.play_card(seat, card(text)).unwrap();
        }
        round.begin_trick_resolution().unwrap();
        assert!(round.abort_trick_resolution());
        assert_eq!(round.tricks_completed(), 0);
        assert_eq!(round.tricks_won(), [0; 4]);
        assert!(round.resolve_trick().is_ok());
    }

    #[test]
    fn void_plays_mark_void_map() {
        let mut round = suited_round();
        bid_all(&mut round, ["7C", "2D", "3H", "2S"]);
        round.start_play().unwrap();
        round.play_card(PlayerPosition::North, card("3C")).unwrap();
        round.play_card(PlayerPosition::East, card("4D")).unwrap();
        assert!(round.voids().is_void(PlayerPosition::East, Suit::Clubs));
        assert!(!round.voids().is_void(PlayerPosition::North, Suit::Clubs));
    }

    #[test]
    fn playing_out_the_round_reaches_scoring() {
        let mut round = suited_round();
        bid_all(&mut round, ["7C", "2D", "3H", "2S"]);
        round.start_play().unwrap();
        while round.phase() == RoundPhase::Play {
            let seat = round.to_act().expect("someone to act");
            let choice = round.legal_moves(seat)[0];
            if round.play_card(seat, choice).unwrap() == PlayOutcome::TrickFull {
                round.resolve_trick().unwrap();
            }
        }
        assert_eq!(round.trick_state(), TrickState::RoundComplete);
        assert_eq!(round.tricks_won().iter().map(|&t| t as u32).sum::<u32>(), 13);
        // North leads clubs (trump) every trick and wins all thirteen.
        assert_eq!(round.tricks_won(), [13, 0, 0, 0]);
        assert_eq!(round.round_scores(), Some([-5, -6, -8, -6]));
        assert!(round.partition_holds());
    }
}
