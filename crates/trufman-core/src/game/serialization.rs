use super::match_state::MatchState;
use crate::model::player::PlayerPosition;
use serde::{Deserialize, Serialize};

/// Enough to rebuild a match at the start of its current round.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MatchSnapshot {
    pub seed: u64,
    pub round_number: u32,
    pub dealer: PlayerPosition,
    pub scores: [i32; 4],
}

impl MatchSnapshot {
    pub fn capture(state: &MatchState) -> Self {
        MatchSnapshot {
            seed: state.seed(),
            round_number: state.round_number(),
            dealer: state.dealer(),
            scores: *state.scores().standings(),
        }
    }

    pub fn restore(self) -> MatchState {
        let mut state = MatchState::with_seed_round(self.seed, self.round_number, self.dealer);
        state.scores_mut().set_totals(self.scores);
        state
    }

    pub fn to_json(state: &MatchState) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&Self::capture(state))
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}
