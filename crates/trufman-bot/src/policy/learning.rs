use super::{Decision, Policy, legal_from_snapshot};
use crate::bot::{BidPlanner, BotContext, BotParams, CancelFlag, FeatureKey, PlayPlanner};
use crate::error::AgentError;
use crate::memory::{BotMemory, MemoryHandle, WeightTable, seat_key};
use rand::SeedableRng;
use rand::rngs::SmallRng;
use trufman_core::belief::OpponentBook;
use trufman_core::game::snapshot::RoundSnapshot;
use trufman_core::model::bid::Bid;
use trufman_core::model::player::PlayerPosition;
use trufman_core::model::suit::Suit;
use trufman_core::model::trick::CompletedTrick;

/// The last play this seat made, waiting for its trick to resolve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PendingUpdate {
    pub key: FeatureKey,
    pub need: i32,
    pub endgame: bool,
}

/// Search-backed agent that keeps a learned weight table per seat.
///
/// The seat binding is fixed for the value's lifetime; [`LearningPolicy::rebind`]
/// saves this seat's record and returns a new agent loaded for another seat.
pub struct LearningPolicy {
    seat: PlayerPosition,
    namespace: String,
    params: BotParams,
    handle: MemoryHandle,
    memory: BotMemory,
    opponents: OpponentBook,
    seed: u64,
    rng: SmallRng,
    pending: Option<PendingUpdate>,
}

impl LearningPolicy {
    pub fn new(
        seat: PlayerPosition,
        namespace: impl Into<String>,
        handle: MemoryHandle,
        params: BotParams,
        seed: u64,
    ) -> Self {
        let namespace = namespace.into();
        let memory = handle.load(&seat_key(&namespace, seat));
        let opponents = memory.opponent_book();
        Self {
            seat,
            namespace,
            params,
            handle,
            memory,
            opponents,
            seed,
            rng: SmallRng::seed_from_u64(seat_seed(seed, seat)),
            pending: None,
        }
    }

    pub fn rebind(mut self, seat: PlayerPosition) -> Self {
        self.persist();
        Self::new(seat, self.namespace, self.handle, self.params, self.seed)
    }

    pub fn storage_key(&self) -> String {
        seat_key(&self.namespace, self.seat)
    }

    pub fn memory(&self) -> &BotMemory {
        &self.memory
    }

    pub fn weights(&self) -> &WeightTable {
        &self.memory.weights
    }

    pub fn opponents(&self) -> &OpponentBook {
        &self.opponents
    }

    pub fn pending(&self) -> Option<&PendingUpdate> {
        self.pending.as_ref()
    }

    pub fn params(&self) -> &BotParams {
        &self.params
    }

    fn persist(&mut self) -> bool {
        self.memory.record_opponents(&self.opponents);
        let key = self.storage_key();
        self.handle.save(&key, &self.memory)
    }
}

/// Reward for a resolved trick given the need recorded when the card was chosen.
pub(crate) fn trick_reward(need: i32, won: bool) -> f32 {
    match (need.signum(), won) {
        (1, true) => 0.15,
        (1, false) => -0.12,
        (-1, true) => -0.15,
        (-1, false) => 0.08,
        (_, true) => -0.05,
        (_, false) => 0.05,
    }
}

fn seat_seed(seed: u64, seat: PlayerPosition) -> u64 {
    seed ^ (seat.index() as u64 + 1).wrapping_mul(0x9E37_79B9_7F4A_7C15)
}

impl Policy for LearningPolicy {
    fn seat(&self) -> PlayerPosition {
        self.seat
    }

    fn name(&self) -> &'static str {
        "learning"
    }

    fn choose_bid(&mut self, snapshot: &RoundSnapshot) -> Option<Bid> {
        let hand = snapshot.hand(self.seat)?;
        BidPlanner::choose(self.seat, hand, &self.params)
    }

    fn choose_play(&mut self, snapshot: &RoundSnapshot, cancel: &CancelFlag) -> Option<Decision> {
        let legal = legal_from_snapshot(snapshot, self.seat)?;
        let ctx = BotContext::new(
            self.seat,
            snapshot,
            &self.params,
            &self.opponents,
            &self.memory.weights,
        )
        .ok()?;

        let (decision, key) = match PlayPlanner::choose(&legal, &ctx, &mut self.rng, cancel) {
            Ok(candidate) => (Decision::Play(candidate.card), candidate.key),
            Err(AgentError::Cancelled) => return Some(Decision::Cancelled),
            Err(err) => {
                let card = PlayPlanner::fallback(&legal, &ctx)?;
                tracing::warn!(
                    target: "trufman_bot::play",
                    seat = ?self.seat,
                    error = %err,
                    card = %card,
                    reason = "evaluation_failed",
                    message = "using deterministic fallback"
                );
                let key = FeatureKey::for_play(
                    card,
                    ctx.trump(),
                    ctx.position_in_trick(),
                    ctx.need(),
                    ctx.is_endgame(),
                );
                (Decision::Fallback(card), key)
            }
        };

        self.pending = Some(PendingUpdate {
            key,
            need: ctx.need(),
            endgame: ctx.is_endgame(),
        });
        Some(decision)
    }

    fn observe_bids(&mut self, bids: &[Bid; 4]) {
        for bid in bids.iter().filter(|bid| bid.seat != self.seat) {
            self.opponents.observe_bid(bid);
        }
    }

    fn observe_trick(&mut self, trick: &CompletedTrick, trump: Suit) {
        self.opponents.observe_trick(&trick.trick, trump);
        if trick.trick.card_of(self.seat).is_none() {
            return;
        }
        let Some(pending) = self.pending.take() else {
            return;
        };
        let scale = if pending.endgame {
            self.params.endgame_reward_scale
        } else {
            1.0
        };
        let reward = trick_reward(pending.need, trick.winner == self.seat) * scale;
        self.memory
            .weights
            .adjust(&pending.key.to_string(), reward, self.params.weight_limit);
        self.persist();
    }

    fn observe_round_end(&mut self, _tricks_won: &[u8; 4], _deltas: &[i32; 4]) {
        self.pending = None;
        self.memory.games += 1;
        self.persist();
    }

    fn reset(&mut self, hard: bool) {
        self.pending = None;
        if hard {
            self.memory = BotMemory::default();
            self.opponents = OpponentBook::new();
            self.persist();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::trick_reward;

    #[test]
    fn rewards_follow_need_and_outcome() {
        assert_eq!(trick_reward(2, true), 0.15);
        assert_eq!(trick_reward(2, false), -0.12);
        assert_eq!(trick_reward(-1, true), -0.15);
        assert_eq!(trick_reward(-1, false), 0.08);
        assert_eq!(trick_reward(0, true), -0.05);
        assert_eq!(trick_reward(0, false), 0.05);
    }
}
