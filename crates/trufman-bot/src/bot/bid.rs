use super::BotParams;
use std::cmp::Ordering;
use tracing::{Level, event};
use trufman_core::model::bid::{Bid, TRICKS_PER_ROUND};
use trufman_core::model::card::Card;
use trufman_core::model::player::PlayerPosition;
use trufman_core::model::rank::Rank;
use trufman_core::model::suit::Suit;

/// Bid counts a hand tends to settle around when nothing stands out.
const NEUTRAL_COUNT: f32 = TRICKS_PER_ROUND as f32 / 4.0;
const DEFAULT_CAP: u8 = 7;

/// How one suit of a hand would be bid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SuitAssessment {
    pub suit: Suit,
    pub length: usize,
    pub strength: f32,
    pub target: u8,
    pub rank: Rank,
}

impl SuitAssessment {
    pub fn count(&self) -> u8 {
        self.rank.bid_value()
    }

    fn closeness(&self) -> f32 {
        -((self.count() as f32) - (self.target as f32)).abs()
    }

    fn centrality(&self) -> f32 {
        -((self.count() as f32) - NEUTRAL_COUNT).abs()
    }

    fn compare(&self, other: &Self) -> Ordering {
        self.strength
            .total_cmp(&other.strength)
            .then_with(|| self.closeness().total_cmp(&other.closeness()))
            .then_with(|| self.length.cmp(&other.length))
            .then_with(|| self.centrality().total_cmp(&other.centrality()))
            .then_with(|| self.suit.cmp(&other.suit))
    }
}

pub struct BidPlanner;

impl BidPlanner {
    pub fn choose(seat: PlayerPosition, hand: &[Card], params: &BotParams) -> Option<Bid> {
        let best = Suit::ALL
            .iter()
            .filter_map(|&suit| Self::assess(hand, suit, params))
            .max_by(|a, b| a.compare(b))?;
        log_bid_decision(seat, &best);
        Some(Bid::new(seat, best.suit, best.rank))
    }

    /// `None` when the hand holds nothing of `suit`.
    pub fn assess(hand: &[Card], suit: Suit, params: &BotParams) -> Option<SuitAssessment> {
        let ranks: Vec<Rank> = hand
            .iter()
            .filter(|card| card.suit == suit)
            .map(|card| card.rank)
            .collect();
        if ranks.is_empty() {
            return None;
        }

        let strength = suit_strength(&ranks);
        let target = target_count(&ranks, strength + params.aggression);
        let rank = closest_bid_rank(&ranks, target, params.overbid_penalty)?;
        Some(SuitAssessment {
            suit,
            length: ranks.len(),
            strength,
            target,
            rank,
        })
    }
}

fn honour_bonus(rank: Rank) -> f32 {
    match rank {
        Rank::Ace => 0.9,
        Rank::King => 0.6,
        Rank::Queen => 0.35,
        Rank::Jack => 0.2,
        Rank::Ten => 0.12,
        _ => 0.0,
    }
}

fn holds_ace_or_king(ranks: &[Rank]) -> bool {
    ranks.iter().any(|rank| matches!(rank, Rank::Ace | Rank::King))
}

pub(crate) fn suit_strength(ranks: &[Rank]) -> f32 {
    let length = ranks.len();
    let honours: f32 = ranks.iter().map(|rank| honour_bonus(*rank)).sum();
    let length_bonus = match length {
        0..=3 => 0.0,
        4 => 0.2,
        _ => 0.4 + 0.1 * (length - 5) as f32,
    };
    let candidacy = if length > 3 {
        let top = if holds_ace_or_king(ranks) { 0.25 } else { 0.0 };
        0.15 * (length - 3) as f32 + top
    } else {
        0.0
    };
    honours + length_bonus + candidacy
}

/// Long suits topped by an ace or king and backed by a ten and another honour.
fn is_strong(ranks: &[Rank]) -> bool {
    let honours = ranks.iter().filter(|rank| **rank >= Rank::Jack).count();
    ranks.len() >= 6 && holds_ace_or_king(ranks) && ranks.contains(&Rank::Ten) && honours >= 2
}

fn target_count(ranks: &[Rank], estimate: f32) -> u8 {
    let cap = if is_strong(ranks) {
        8 + (ranks.len() - 6) as u8
    } else {
        DEFAULT_CAP
    };
    let upper = cap.min(ranks.len() as u8 + 2);
    let rounded = estimate.round();
    if !rounded.is_finite() || rounded <= 0.0 {
        return 0;
    }
    (rounded as u8).min(upper)
}

/// The held rank whose bid value lands nearest `target`, preferring to stay under it.
fn closest_bid_rank(ranks: &[Rank], target: u8, overbid_penalty: f32) -> Option<Rank> {
    let cost = |rank: &Rank| {
        let count = rank.bid_value();
        let over = if count > target { overbid_penalty } else { 0.0 };
        (count as f32 - target as f32).abs() + over
    };
    ranks.iter().copied().min_by(|a, b| {
        cost(a)
            .total_cmp(&cost(b))
            .then_with(|| a.bid_value().cmp(&b.bid_value()))
            // Among zero-count faces the king is shown first.
            .then_with(|| b.cmp(a))
    })
}

fn log_bid_decision(seat: PlayerPosition, chosen: &SuitAssessment) {
    if !tracing::enabled!(Level::INFO) {
        return;
    }

    event!(
        target: "trufman_bot::bid",
        Level::INFO,
        seat = ?seat,
        suit = %chosen.suit,
        rank = %chosen.rank,
        count = chosen.count(),
        target = chosen.target,
        strength = chosen.strength,
        length = chosen.length
    );
}
