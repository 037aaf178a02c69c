//! Trick-win probability for each candidate card.
//!
//! Unseen cards are dealt to the opponents' hands and to any concealed trump
//! on the table, the rest of the trick is played out with every opponent
//! playing its lowest legal card, and wins are averaged over the worlds.
//! Small positions are enumerated exactly; larger ones are sampled with
//! weights taken from the opponent model.

use super::{BotContext, CancelFlag, lowest};
use crate::error::AgentError;
use rand::Rng;
use trufman_core::belief::{Slot, WorldEnumerator, WorldSampler, WorldSpec};
use trufman_core::model::card::Card;
use trufman_core::model::player::PlayerPosition;
use trufman_core::model::rules;
use trufman_core::model::suit::Suit;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EstimateMethod {
    /// Nothing unknown can change the outcome.
    Settled,
    Exact { worlds: usize },
    Sampled { rollouts: usize },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WinEstimate {
    pub card: Card,
    pub probability: f32,
    pub method: EstimateMethod,
}

#[derive(Debug)]
pub struct WinEstimator<'a> {
    ctx: BotContext<'a>,
    spec: WorldSpec,
    hand_slots: [Option<usize>; 4],
    /// `(index in the current trick, slot)` for each face-down play.
    hidden_slots: Vec<(usize, usize)>,
    followers: Vec<PlayerPosition>,
}

impl<'a> WinEstimator<'a> {
    pub fn new(ctx: BotContext<'a>) -> Result<Self, AgentError> {
        let snapshot = ctx.snapshot;
        let trump = ctx.trump();
        let hidden_seats: Vec<PlayerPosition> = snapshot
            .current_trick
            .iter()
            .filter(|play| play.card.is_none())
            .map(|play| play.seat)
            .collect();

        let mut slots = Vec::new();
        let mut hand_slots = [None; 4];
        for seat in PlayerPosition::LOOP {
            let size = snapshot.hand_sizes[seat.index()];
            if seat == ctx.seat || size == 0 {
                continue;
            }
            let voids = snapshot.voids.mask(seat);
            let mut slot = Slot::hand(seat, size, voids);
            if let Some(bid) = snapshot.bid(seat) {
                if !voids.contains(bid.suit) && !hidden_seats.contains(&seat) {
                    slot = slot.with_pinned(bid.card());
                }
            }
            hand_slots[seat.index()] = Some(slots.len());
            slots.push(slot);
        }

        let mut hidden_slots = Vec::new();
        for (index, play) in snapshot.current_trick.iter().enumerate() {
            if play.card.is_none() {
                hidden_slots.push((index, slots.len()));
                slots.push(Slot::hidden_trump(play.seat, trump));
            }
        }

        let spec = WorldSpec::new(ctx.unseen_cards(), slots)?;
        Ok(Self {
            ctx,
            spec,
            hand_slots,
            hidden_slots,
            followers: ctx.seats_after(),
        })
    }

    pub fn method(&self) -> EstimateMethod {
        if self.followers.is_empty() && self.hidden_slots.is_empty() {
            EstimateMethod::Settled
        } else if self.spec.assignment_count() <= self.ctx.params.exact_limit {
            EstimateMethod::Exact { worlds: 0 }
        } else {
            EstimateMethod::Sampled {
                rollouts: rollout_budget(&self.ctx),
            }
        }
    }

    pub fn estimate_all<R: Rng + ?Sized>(
        &self,
        legal: &[Card],
        rng: &mut R,
        cancel: &CancelFlag,
    ) -> Result<Vec<WinEstimate>, AgentError> {
        if legal.is_empty() {
            return Err(AgentError::NoLegalMoves);
        }
        if cancel.is_cancelled() {
            return Err(AgentError::Cancelled);
        }

        let mut wins = vec![0u32; legal.len()];
        let (method, total) = match self.method() {
            EstimateMethod::Settled => {
                self.tally(legal, &[], &mut wins);
                (EstimateMethod::Settled, 1)
            }
            EstimateMethod::Exact { .. } => {
                let worlds = WorldEnumerator::new(&self.spec)
                    .for_each(|hands| self.tally(legal, hands, &mut wins));
                if cancel.is_cancelled() {
                    return Err(AgentError::Cancelled);
                }
                if worlds == 0 {
                    // Void marks admit no assignment; sampling relaxes them.
                    let rollouts = rollout_budget(&self.ctx);
                    self.sample(legal, rollouts, rng, cancel, &mut wins)?;
                    (EstimateMethod::Sampled { rollouts }, rollouts)
                } else {
                    (EstimateMethod::Exact { worlds }, worlds)
                }
            }
            EstimateMethod::Sampled { rollouts } => {
                self.sample(legal, rollouts, rng, cancel, &mut wins)?;
                (EstimateMethod::Sampled { rollouts }, rollouts)
            }
        };

        Ok(legal
            .iter()
            .zip(wins)
            .map(|(card, won)| WinEstimate {
                card: *card,
                probability: won as f32 / total.max(1) as f32,
                method,
            })
            .collect())
    }

    fn sample<R: Rng + ?Sized>(
        &self,
        legal: &[Card],
        rollouts: usize,
        rng: &mut R,
        cancel: &CancelFlag,
        wins: &mut [u32],
    ) -> Result<(), AgentError> {
        let trump = self.ctx.trump();
        let opponents = self.ctx.opponents;
        for _ in 0..rollouts {
            if cancel.is_cancelled() {
                return Err(AgentError::Cancelled);
            }
            let world = WorldSampler::sample(
                &self.spec,
                |seat, card| opponents.suit_bias(seat, card.suit, trump),
                rng,
            );
            self.tally(legal, world.hands(), wins);
        }
        Ok(())
    }

    fn tally(&self, legal: &[Card], hands: &[Vec<Card>], wins: &mut [u32]) {
        for (card, won) in legal.iter().zip(wins.iter_mut()) {
            if self.wins_trick(*card, hands) {
                *won += 1;
            }
        }
    }

    fn wins_trick(&self, candidate: Card, hands: &[Vec<Card>]) -> bool {
        let trump = self.ctx.trump();
        let mut plays: Vec<(PlayerPosition, Card)> = Vec::with_capacity(4);
        for (index, play) in self.ctx.snapshot.current_trick.iter().enumerate() {
            let card = play.card.or_else(|| self.hidden_card(index, hands));
            match card {
                Some(card) => plays.push((play.seat, card)),
                None => return false,
            }
        }
        plays.push((self.ctx.seat, candidate));
        let lead = plays[0].1.suit;
        for seat in &self.followers {
            let hand = self.hand_slots[seat.index()]
                .and_then(|slot| hands.get(slot))
                .map(Vec::as_slice)
                .unwrap_or(&[]);
            if let Some(card) = lowest_legal(hand, lead) {
                plays.push((*seat, card));
            }
        }
        rules::evaluate_trick(&plays, trump) == Some(self.ctx.seat)
    }

    fn hidden_card(&self, index: usize, hands: &[Vec<Card>]) -> Option<Card> {
        self.hidden_slots
            .iter()
            .find(|(at, _)| *at == index)
            .and_then(|(_, slot)| hands.get(*slot))
            .and_then(|hand| hand.first().copied())
    }
}

/// The fixed opponent reply: lowest card of the lead suit, else lowest card held.
fn lowest_legal(hand: &[Card], lead: Suit) -> Option<Card> {
    lowest(hand.iter().copied().filter(|card| card.suit == lead))
        .or_else(|| lowest(hand.iter().copied()))
}

/// More worlds when the trick matters, the hand is short, or the seat acts late.
pub(crate) fn rollout_budget(ctx: &BotContext<'_>) -> usize {
    let params = ctx.params;
    let mut budget = params.rollouts as f32;
    if ctx.need() > 0 {
        budget *= 1.5;
    }
    if ctx.cards_left() <= 4 {
        budget *= 1.5;
    }
    if ctx.position_in_trick() >= 2 {
        budget *= 1.25;
    }
    (budget.round() as usize).clamp(1, params.rollout_ceiling.max(1))
}
