use super::bid::suit_strength;
use super::rollout::EstimateMethod;
use super::{BotContext, CancelFlag, FeatureKey, TableView, WinEstimator, low_card_key, lowest};
use crate::error::AgentError;
use rand::Rng;
use tracing::{Level, event};
use trufman_core::model::card::Card;
use trufman_core::model::rank::Rank;
use trufman_core::model::suit::Suit;

/// A scored candidate card.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    pub card: Card,
    pub heuristic: f32,
    pub win_probability: f32,
    pub learned: f32,
    pub score: f32,
    pub key: FeatureKey,
}

pub struct PlayPlanner;

impl PlayPlanner {
    /// Scores every legal card and returns the best one.
    pub fn choose<R: Rng + ?Sized>(
        legal: &[Card],
        ctx: &BotContext<'_>,
        rng: &mut R,
        cancel: &CancelFlag,
    ) -> Result<Candidate, AgentError> {
        let (candidates, method) = Self::evaluate(legal, ctx, rng, cancel)?;
        let best = candidates
            .iter()
            .copied()
            .max_by(|a, b| {
                a.score
                    .total_cmp(&b.score)
                    .then_with(|| low_card_key(b.card).cmp(&low_card_key(a.card)))
            })
            .ok_or(AgentError::NoLegalMoves)?;
        log_play_decision(ctx, &best, legal.len(), method);
        Ok(best)
    }

    pub fn evaluate<R: Rng + ?Sized>(
        legal: &[Card],
        ctx: &BotContext<'_>,
        rng: &mut R,
        cancel: &CancelFlag,
    ) -> Result<(Vec<Candidate>, EstimateMethod), AgentError> {
        if legal.is_empty() {
            return Err(AgentError::NoLegalMoves);
        }
        let estimator = WinEstimator::new(*ctx)?;
        let estimates = estimator.estimate_all(legal, rng, cancel)?;
        let method = estimates
            .first()
            .map(|estimate| estimate.method)
            .unwrap_or(EstimateMethod::Settled);

        let table = ctx.table();
        let params = ctx.params;
        let need = ctx.need();
        let mut candidates = Vec::with_capacity(legal.len());
        for estimate in estimates {
            let card = estimate.card;
            let heuristic = Self::heuristic(card, ctx, &table);
            let key = FeatureKey::for_play(
                card,
                ctx.trump(),
                ctx.position_in_trick(),
                need,
                ctx.is_endgame(),
            );
            let learned = ctx.weights.get(&key.to_string());
            let score = heuristic
                + params.alpha * signed_win(estimate.probability, need, params.lose_discount)
                + params.beta * urgency_swing(estimate.probability, need, ctx.cards_left())
                + params.learned_scale * learned;
            if !score.is_finite() {
                return Err(AgentError::NonFiniteScore(card));
            }
            candidates.push(Candidate {
                card,
                heuristic,
                win_probability: estimate.probability,
                learned,
                score,
                key,
            });
        }
        Ok((candidates, method))
    }

    /// Rule-of-thumb value of `card`, before any simulation.
    pub fn heuristic(card: Card, ctx: &BotContext<'_>, table: &TableView) -> f32 {
        let trump = ctx.trump();
        let is_trump = card.suit == trump;
        let rank = card.rank.value() as f32;
        let need = ctx.need();

        let Some(lead) = table.lead else {
            return if need > 0 {
                let top = if Some(card) == best_suit_top(ctx) { 0.35 } else { 0.0 };
                (if is_trump { 0.2 } else { 0.5 }) + rank / 20.0 + top
            } else {
                let short = !is_trump && count_suit(ctx.hand(), card.suit) <= 2;
                (if is_trump { -1.2 } else { -0.2 }) - rank / 40.0 - if short { 0.15 } else { 0.0 }
            };
        };

        let takes_lead = table.beaten_by(card, trump);
        if need > 0 {
            return if takes_lead { 1.0 - rank / 60.0 } else { -0.8 };
        }
        if takes_lead {
            return -1.0;
        }
        let mut score = 0.3 - if is_trump { 0.2 } else { 0.0 };
        if card.suit == lead {
            score -= rank / 60.0;
        } else if !is_trump {
            score += rank / 60.0;
            if ctx.is_endgame() {
                score += 0.15;
            }
        }
        score
    }

    /// Deterministic choice that needs nothing beyond the legal set and the visible table.
    pub fn fallback(legal: &[Card], ctx: &BotContext<'_>) -> Option<Card> {
        if ctx.need() > 0 {
            let table = ctx.table();
            let trump = ctx.trump();
            let winning = legal
                .iter()
                .copied()
                .filter(|card| table.lead.is_some() && table.beaten_by(*card, trump));
            if let Some(card) = lowest_winner(winning, trump) {
                return Some(card);
            }
        }
        lowest(legal.iter().copied())
    }
}

/// Cheapest winner: an off-trump card before any trump, then by rank.
fn lowest_winner(cards: impl Iterator<Item = Card>, trump: Suit) -> Option<Card> {
    cards.min_by_key(|card| (card.suit == trump, low_card_key(*card)))
}

fn signed_win(probability: f32, need: i32, lose_discount: f32) -> f32 {
    if need > 0 {
        probability
    } else {
        -lose_discount * probability
    }
}

/// `(2p - 1)` pointed toward the wanted outcome, scaled by the share of the hand the gap needs.
fn urgency_swing(probability: f32, need: i32, cards_left: usize) -> f32 {
    if need == 0 || cards_left == 0 {
        return 0.0;
    }
    let urgency = (need.unsigned_abs() as f32 / cards_left as f32).min(1.0);
    let direction = if need > 0 { 1.0 } else { -1.0 };
    direction * urgency * (2.0 * probability - 1.0)
}

fn count_suit(hand: &[Card], suit: Suit) -> usize {
    hand.iter().filter(|card| card.suit == suit).count()
}

/// Top card of the strongest side suit, trump counted down.
fn best_suit_top(ctx: &BotContext<'_>) -> Option<Card> {
    let hand = ctx.hand();
    let trump = ctx.trump();
    Suit::ALL
        .iter()
        .filter_map(|&suit| {
            let ranks: Vec<Rank> = hand
                .iter()
                .filter(|card| card.suit == suit)
                .map(|card| card.rank)
                .collect();
            let top = ranks.iter().max().copied()?;
            let penalty = if suit == trump { 0.7 } else { 0.0 };
            Some((suit_strength(&ranks) - penalty, Card::new(top, suit)))
        })
        .max_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.suit.cmp(&b.1.suit)))
        .map(|(_, card)| card)
}

fn log_play_decision(
    ctx: &BotContext<'_>,
    chosen: &Candidate,
    legal_count: usize,
    method: EstimateMethod,
) {
    if !tracing::enabled!(Level::INFO) {
        return;
    }

    let choice = chosen.card.to_string();
    let key = chosen.key.to_string();
    event!(
        target: "trufman_bot::play",
        Level::INFO,
        seat = ?ctx.seat,
        need = ctx.need(),
        position = ctx.position_in_trick(),
        legal = legal_count,
        method = ?method,
        win_probability = chosen.win_probability,
        heuristic = chosen.heuristic,
        learned = chosen.learned,
        score = chosen.score,
        key = %key,
        chosen = %choice
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bot::BotParams;
    use crate::bot::rollout::tests::{play_lowest, suited_round};
    use crate::bot::test_support::{cards, round_in_play, seat_view};
    use crate::memory::WeightTable;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;
    use trufman_core::belief::OpponentBook;
    use trufman_core::model::player::PlayerPosition;

    struct Fixture {
        params: BotParams,
        opponents: OpponentBook,
        weights: WeightTable,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                params: BotParams::default(),
                opponents: OpponentBook::new(),
                weights: WeightTable::default(),
            }
        }
    }

    #[test]
    fn urgency_swing_points_at_the_wanted_outcome() {
        assert!(urgency_swing(1.0, 2, 4) > 0.0);
        assert!(urgency_swing(1.0, -1, 4) < 0.0);
        assert_eq!(urgency_swing(0.7, 0, 4), 0.0);
        assert!((urgency_swing(1.0, 9, 3) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn needing_tricks_prefers_the_cheapest_winner() {
        // Spades trump; West is last to act on North's club lead.
        let mut round = round_in_play(
            [
                "AC 2C 3C 4C 5C 6C 7C 8C 9C TC JC QC KC",
                "AD 2D 3D 4D 5D 6D 7D 8D 9D TD JD QD KD",
                "AH 2H 3H 4H 5H 6H 7H 8H 9H TH JH QH KH",
                "AS 2S 3S 4S 5S 6S 7S 8S 9S TS JS QS KS",
            ],
            ["4C", "3D", "2H", "7S"],
            PlayerPosition::West,
        );
        for _ in 0..3 {
            play_lowest(&mut round);
        }
        let view = seat_view(&round, PlayerPosition::West);
        let fixture = Fixture::new();
        let ctx = BotContext::new(
            PlayerPosition::West,
            &view,
            &fixture.params,
            &fixture.opponents,
            &fixture.weights,
        )
        .unwrap();
        let mut rng = SmallRng::seed_from_u64(3);
        let legal = ctx.legal_moves();
        let chosen = PlayPlanner::choose(&legal, &ctx, &mut rng, &CancelFlag::new()).unwrap();
        assert_eq!(chosen.card, "2S".parse().unwrap());
        assert_eq!(chosen.win_probability, 1.0);
        assert_eq!(PlayPlanner::fallback(&legal, &ctx), "2S".parse().ok());
    }

    #[test]
    fn avoiding_tricks_leads_low_side_cards() {
        // North bids zero with the king: target 0 under BAWAH, so every trick hurts.
        let round = round_in_play(
            [
                "KC 2D 3D 4D 5D 6H 7H 8H 9H 2S 3S 4S 5S",
                "AC QC JC TC 9C 8C 7C 6C 5C 4C 3C 2C AD",
                "KD QD JD TD 9D 8D 7D AH KH QH JH TH 2H",
                "3H 4H 5H AS KS QS JS TS 9S 8S 7S 6S 6D",
            ],
            ["KC", "4C", "2H", "3H"],
            PlayerPosition::West,
        );
        let view = seat_view(&round, PlayerPosition::North);
        assert_eq!(view.need(PlayerPosition::North), Some(0));
        let fixture = Fixture::new();
        let ctx = BotContext::new(
            PlayerPosition::North,
            &view,
            &fixture.params,
            &fixture.opponents,
            &fixture.weights,
        )
        .unwrap();
        let mut rng = SmallRng::seed_from_u64(9);
        let chosen =
            PlayPlanner::choose(&ctx.legal_moves(), &ctx, &mut rng, &CancelFlag::new()).unwrap();
        assert_ne!(chosen.card.suit, Suit::Clubs);
        assert!(chosen.card.rank <= Rank::Five);
    }

    #[test]
    fn learned_weight_shifts_the_score() {
        let round = suited_round([Rank::Seven, Rank::Five, Rank::Four, Rank::Three]);
        let view = seat_view(&round, PlayerPosition::North);
        let mut fixture = Fixture::new();
        let ctx = BotContext::new(
            PlayerPosition::North,
            &view,
            &fixture.params,
            &fixture.opponents,
            &fixture.weights,
        )
        .unwrap();
        let legal = cards("2C");
        let mut rng = SmallRng::seed_from_u64(5);
        let (plain, _) = PlayPlanner::evaluate(&legal, &ctx, &mut rng, &CancelFlag::new()).unwrap();
        let key = plain[0].key.to_string();

        fixture.weights.adjust(&key, 1.0, 4.0);
        let ctx = BotContext::new(
            PlayerPosition::North,
            &view,
            &fixture.params,
            &fixture.opponents,
            &fixture.weights,
        )
        .unwrap();
        let (tuned, _) = PlayPlanner::evaluate(&legal, &ctx, &mut rng, &CancelFlag::new()).unwrap();
        assert!((tuned[0].score - plain[0].score - 0.5).abs() < 1e-5);
    }

    #[test]
    fn non_finite_params_are_reported() {
        let round = suited_round([Rank::Seven, Rank::Five, Rank::Four, Rank::Three]);
        let view = seat_view(&round, PlayerPosition::North);
        let mut fixture = Fixture::new();
        fixture.params.alpha = f32::NAN;
        let ctx = BotContext::new(
            PlayerPosition::North,
            &view,
            &fixture.params,
            &fixture.opponents,
            &fixture.weights,
        )
        .unwrap();
        let mut rng = SmallRng::seed_from_u64(5);
        let result = PlayPlanner::choose(&ctx.legal_moves(), &ctx, &mut rng, &CancelFlag::new());
        assert!(matches!(result, Err(AgentError::NonFiniteScore(_))));
        assert_eq!(PlayPlanner::fallback(&ctx.legal_moves(), &ctx), "2C".parse().ok());
    }
}
