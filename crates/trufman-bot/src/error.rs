use thiserror::Error;
use trufman_core::belief::SamplingError;
use trufman_core::model::card::Card;
use trufman_core::model::player::PlayerPosition;

/// Failure while evaluating a decision. Callers recover with a deterministic fallback.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("hand of {0} is not visible to this agent")]
    HandHidden(PlayerPosition),
    #[error("no contract has been resolved")]
    NoContract,
    #[error("no legal card to evaluate")]
    NoLegalMoves,
    #[error("world assignment failed: {0}")]
    Sampling(#[from] SamplingError),
    #[error("score for {0} is not finite")]
    NonFiniteScore(Card),
    #[error("evaluation cancelled")]
    Cancelled,
}
