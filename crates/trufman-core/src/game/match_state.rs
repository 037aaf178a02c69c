use crate::model::bid::Contract;
use crate::model::deck::Deck;
use crate::model::player::PlayerPosition;
use crate::model::round::RoundState;
use crate::model::score::ScoreBoard;
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

/// Outcome of one finished round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundSummary {
    pub round_number: u32,
    pub dealer: PlayerPosition,
    pub contract: Contract,
    pub tricks_won: [u8; 4],
    pub deltas: [i32; 4],
    pub totals: [i32; 4],
}

#[derive(Debug, Clone)]
pub struct MatchState {
    scores: ScoreBoard,
    dealer: PlayerPosition,
    round_number: u32,
    current_round: RoundState,
    history: Vec<RoundSummary>,
    rng: StdRng,
    seed: u64,
}

impl MatchState {
    pub fn new(dealer: PlayerPosition) -> Self {
        let seed: u64 = rand::random();
        Self::with_seed(dealer, seed)
    }

    pub fn with_seed(dealer: PlayerPosition, seed: u64) -> Self {
        Self::with_seed_round(seed, 1, dealer)
    }

    /// Rebuilds the deal of `round_number` by replaying the shuffles before it.
    pub fn with_seed_round(seed: u64, round_number: u32, dealer: PlayerPosition) -> Self {
        let normalized_round = round_number.max(1);
        let mut rng = StdRng::seed_from_u64(seed);

        for _ in 1..normalized_round {
            let _ = Deck::shuffled(&mut rng);
        }

        let deck = Deck::shuffled(&mut rng);
        Self {
            scores: ScoreBoard::new(),
            dealer,
            round_number: normalized_round,
            current_round: RoundState::deal(&deck, dealer),
            history: Vec::new(),
            rng,
            seed,
        }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn scores(&self) -> &ScoreBoard {
        &self.scores
    }

    pub fn scores_mut(&mut self) -> &mut ScoreBoard {
        &mut self.scores
    }

    pub fn round(&self) -> &RoundState {
        &self.current_round
    }

    pub fn round_mut(&mut self) -> &mut RoundState {
        &mut self.current_round
    }

    pub fn round_number(&self) -> u32 {
        self.round_number
    }

    pub fn dealer(&self) -> PlayerPosition {
        self.dealer
    }

    pub fn history(&self) -> &[RoundSummary] {
        &self.history
    }

    /// Books the finished round and deals the next one with the dealer rotated.
    /// Returns `None` while the round still has tricks to play.
    pub fn finish_round_and_start_next(&mut self) -> Option<RoundSummary> {
        let deltas = self.current_round.round_scores()?;
        let contract = *self.current_round.contract()?;
        self.scores.apply_round(deltas);

        let summary = RoundSummary {
            round_number: self.round_number,
            dealer: self.dealer,
            contract,
            tricks_won: self.current_round.tricks_won(),
            deltas,
            totals: *self.scores.standings(),
        };
        self.history.push(summary.clone());

        self.round_number += 1;
        self.dealer = self.dealer.next();
        let deck = Deck::shuffled(&mut self.rng);
        self.current_round = RoundState::deal(&deck, self.dealer);
        Some(summary)
    }

    /// Throws the current round away and deals a fresh one to the same dealer.
    pub fn reset_round(&mut self) {
        let deck = Deck::shuffled(&mut self.rng);
        self.current_round = RoundState::deal(&deck, self.dealer);
    }
}
