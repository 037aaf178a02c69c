//! Round orchestrator: one transition function per phase over a [`MatchState`].

use super::match_state::{MatchState, RoundSummary};
use super::snapshot::{RoundSnapshot, Viewer};
use crate::model::bid::{Bid, BidError, Contract};
use crate::model::card::Card;
use crate::model::player::PlayerPosition;
use crate::model::rank::Rank;
use crate::model::round::{PlayError, PlayOutcome, RoundPhase};
use crate::model::suit::Suit;
use crate::model::trick::TrickPlay;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableAction {
    Bid {
        seat: PlayerPosition,
        suit: Suit,
        rank: Rank,
    },
    StartPlay,
    Play {
        seat: PlayerPosition,
        card: Card,
    },
    BeginResolve,
    CompleteResolve,
    AbortResolve,
    FinishRound,
    ResetRound,
}

impl TableAction {
    pub const fn name(&self) -> &'static str {
        match self {
            TableAction::Bid { .. } => "bid",
            TableAction::StartPlay => "start_play",
            TableAction::Play { .. } => "play",
            TableAction::BeginResolve => "begin_resolve",
            TableAction::CompleteResolve => "complete_resolve",
            TableAction::AbortResolve => "abort_resolve",
            TableAction::FinishRound => "finish_round",
            TableAction::ResetRound => "reset_round",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TableEvent {
    BidAccepted {
        seat: PlayerPosition,
        replaced: bool,
    },
    BidsRevealed {
        bids: [Bid; 4],
    },
    ContractResolved {
        contract: Contract,
        leader: PlayerPosition,
    },
    CardPlayed {
        seat: PlayerPosition,
        card: Option<Card>,
        next: Option<PlayerPosition>,
    },
    TrickRevealed {
        plays: Vec<TrickPlay>,
    },
    ResolutionStarted {
        winner: PlayerPosition,
    },
    ResolutionAborted,
    TrickWon {
        winner: PlayerPosition,
        trick_number: usize,
        tricks_won: [u8; 4],
    },
    RoundComplete {
        deltas: [i32; 4],
    },
    RoundScored {
        summary: RoundSummary,
    },
    RoundStarted {
        round_number: u32,
        dealer: PlayerPosition,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableError {
    Bid(BidError),
    Play(PlayError),
    WrongPhase {
        action: &'static str,
        phase: RoundPhase,
    },
}

impl fmt::Display for TableError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableError::Bid(err) => write!(f, "bid rejected: {err}"),
            TableError::Play(err) => write!(f, "play rejected: {err}"),
            TableError::WrongPhase { action, phase } => {
                write!(f, "{action} is not allowed during {phase:?}")
            }
        }
    }
}

impl std::error::Error for TableError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TableError::Bid(err) => Some(err),
            TableError::Play(err) => Some(err),
            TableError::WrongPhase { .. } => None,
        }
    }
}

impl From<BidError> for TableError {
    fn from(err: BidError) -> Self {
        TableError::Bid(err)
    }
}

impl From<PlayError> for TableError {
    fn from(err: PlayError) -> Self {
        TableError::Play(err)
    }
}

/// Single writer over the match. Rejected actions leave the state untouched.
#[derive(Debug, Clone)]
pub struct Table {
    state: MatchState,
}

impl Table {
    pub fn new(state: MatchState) -> Self {
        Self { state }
    }

    pub fn with_seed(dealer: PlayerPosition, seed: u64) -> Self {
        Self::new(MatchState::with_seed(dealer, seed))
    }

    pub fn state(&self) -> &MatchState {
        &self.state
    }

    pub fn phase(&self) -> RoundPhase {
        self.state.round().phase()
    }

    pub fn snapshot(&self, viewer: Viewer) -> RoundSnapshot {
        RoundSnapshot::capture(
            self.state.round(),
            self.state.scores(),
            self.state.round_number(),
            viewer,
        )
    }

    pub fn propose_bid(
        &mut self,
        seat: PlayerPosition,
        suit: Suit,
        rank: Rank,
    ) -> Result<Vec<TableEvent>, TableError> {
        self.apply(TableAction::Bid { seat, suit, rank })
    }

    pub fn propose_play(
        &mut self,
        seat: PlayerPosition,
        card: Card,
    ) -> Result<Vec<TableEvent>, TableError> {
        self.apply(TableAction::Play { seat, card })
    }

    pub fn apply(&mut self, action: TableAction) -> Result<Vec<TableEvent>, TableError> {
        if action == TableAction::ResetRound {
            return Ok(self.reset_round());
        }
        match self.phase() {
            RoundPhase::Bidding => self.apply_bidding(action),
            RoundPhase::Play => self.apply_play(action),
            RoundPhase::Scoring => self.apply_scoring(action),
        }
    }

    fn apply_bidding(&mut self, action: TableAction) -> Result<Vec<TableEvent>, TableError> {
        let round = self.state.round_mut();
        match action {
            TableAction::Bid { seat, suit, rank } => {
                let replaced = round.bids().get(seat).is_some();
                round.submit_bid(seat, suit, rank)?;
                let mut events = vec![TableEvent::BidAccepted { seat, replaced }];
                if let Some(bids) = round.bids().bids() {
                    events.push(TableEvent::BidsRevealed { bids });
                }
                Ok(events)
            }
            TableAction::StartPlay => {
                let contract = round.start_play()?;
                Ok(vec![TableEvent::ContractResolved {
                    contract,
                    leader: round.current_trick().leader(),
                }])
            }
            other => Err(self.wrong_phase(other)),
        }
    }

    fn apply_play(&mut self, action: TableAction) -> Result<Vec<TableEvent>, TableError> {
        let round = self.state.round_mut();
        match action {
            TableAction::Play { seat, card } => {
                let outcome = round.play_card(seat, card)?;
                let mut events = Vec::with_capacity(2);
                match outcome {
                    PlayOutcome::Played { next } => {
                        let concealed = round
                            .current_trick()
                            .plays()
                            .last()
                            .is_some_and(|play| play.concealed);
                        events.push(TableEvent::CardPlayed {
                            seat,
                            card: (!concealed).then_some(card),
                            next: Some(next),
                        });
                    }
                    PlayOutcome::TrickFull => {
                        events.push(TableEvent::CardPlayed {
                            seat,
                            card: Some(card),
                            next: None,
                        });
                        events.push(TableEvent::TrickRevealed {
                            plays: round.current_trick().plays().to_vec(),
                        });
                    }
                }
                Ok(events)
            }
            TableAction::BeginResolve => {
                let winner = round.begin_trick_resolution()?;
                Ok(vec![TableEvent::ResolutionStarted { winner }])
            }
            TableAction::CompleteResolve => {
                let resolution = round.complete_trick_resolution()?;
                let mut events = vec![TableEvent::TrickWon {
                    winner: resolution.winner,
                    trick_number: resolution.trick_number,
                    tricks_won: round.tricks_won(),
                }];
                if let Some(deltas) = round.round_scores() {
                    events.push(TableEvent::RoundComplete { deltas });
                }
                Ok(events)
            }
            TableAction::AbortResolve => {
                if round.abort_trick_resolution() {
                    Ok(vec![TableEvent::ResolutionAborted])
                } else {
                    Err(PlayError::NoResolutionInProgress.into())
                }
            }
            other => Err(self.wrong_phase(other)),
        }
    }

    fn apply_scoring(&mut self, action: TableAction) -> Result<Vec<TableEvent>, TableError> {
        match action {
            TableAction::FinishRound => match self.state.finish_round_and_start_next() {
                Some(summary) => Ok(vec![
                    TableEvent::RoundScored { summary },
                    TableEvent::RoundStarted {
                        round_number: self.state.round_number(),
                        dealer: self.state.dealer(),
                    },
                ]),
                None => Err(self.wrong_phase(action)),
            },
            other => Err(self.wrong_phase(other)),
        }
    }

    fn reset_round(&mut self) -> Vec<TableEvent> {
        self.state.reset_round();
        vec![TableEvent::RoundStarted {
            round_number: self.state.round_number(),
            dealer: self.state.dealer(),
        }]
    }

    fn wrong_phase(&self, action: TableAction) -> TableError {
        TableError::WrongPhase {
            action: action.name(),
            phase: self.phase(),
        }
    }
}
