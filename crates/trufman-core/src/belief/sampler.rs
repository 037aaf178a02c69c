//! Assignment of unseen cards to hidden slots.
//!
//! A slot is either an opponent's remaining hand or a concealed play still on
//! the table. Sampling is constructive: cards are placed one at a time into a
//! slot chosen by weight among those that keep the rest of the assignment
//! feasible, so every call terminates after a single pass. Exact enumeration
//! visits every consistent assignment and is meant for small positions only.

use super::voids::SuitMask;
use crate::model::card::Card;
use crate::model::player::PlayerPosition;
use crate::model::suit::Suit;
use rand::Rng;
use rand::seq::SliceRandom;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slot {
    pub seat: PlayerPosition,
    pub capacity: usize,
    pub allowed: SuitMask,
    pub pinned: Vec<Card>,
}

impl Slot {
    /// An opponent hand of `capacity` cards that holds nothing of the `voids` suits.
    pub fn hand(seat: PlayerPosition, capacity: usize, voids: SuitMask) -> Self {
        Self {
            seat,
            capacity,
            allowed: voids.complement(),
            pinned: Vec::new(),
        }
    }

    /// A single face-down trump already committed to the trick.
    pub fn hidden_trump(seat: PlayerPosition, trump: Suit) -> Self {
        Self {
            seat,
            capacity: 1,
            allowed: SuitMask::only(trump),
            pinned: Vec::new(),
        }
    }

    pub fn with_pinned(mut self, card: Card) -> Self {
        self.pinned.push(card);
        self
    }
}

#[derive(Debug, Clone)]
pub struct WorldSpec {
    unseen: Vec<Card>,
    slots: Vec<Slot>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SamplingError {
    CapacityMismatch { cards: usize, capacity: usize },
}

impl fmt::Display for SamplingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SamplingError::CapacityMismatch { cards, capacity } => {
                write!(f, "{cards} unseen cards cannot fill {capacity} hidden places")
            }
        }
    }
}

impl std::error::Error for SamplingError {}

impl WorldSpec {
    /// Pins that are not unseen, duplicated, or beyond a slot's capacity are dropped.
    pub fn new(unseen: Vec<Card>, mut slots: Vec<Slot>) -> Result<Self, SamplingError> {
        let capacity: usize = slots.iter().map(|slot| slot.capacity).sum();
        if capacity != unseen.len() {
            return Err(SamplingError::CapacityMismatch {
                cards: unseen.len(),
                capacity,
            });
        }
        let mut claimed = Vec::new();
        for slot in &mut slots {
            let mut kept = Vec::new();
            for card in slot.pinned.drain(..) {
                if kept.len() < slot.capacity && unseen.contains(&card) && !claimed.contains(&card) {
                    claimed.push(card);
                    kept.push(card);
                }
            }
            slot.pinned = kept;
        }
        Ok(Self { unseen, slots })
    }

    pub fn unseen(&self) -> &[Card] {
        &self.unseen
    }

    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    /// Upper bound on the number of assignments: the multinomial over free capacities.
    pub fn assignment_count(&self) -> u128 {
        let mut remaining = self.free_cards().len() as u128;
        let mut total: u128 = 1;
        for free in self.free_capacities() {
            let Some(ways) = binomial(remaining, free as u128) else {
                return u128::MAX;
            };
            total = match total.checked_mul(ways) {
                Some(value) => value,
                None => return u128::MAX,
            };
            remaining -= free as u128;
        }
        total
    }

    fn free_cards(&self) -> Vec<Card> {
        self.unseen
            .iter()
            .copied()
            .filter(|card| !self.slots.iter().any(|slot| slot.pinned.contains(card)))
            .collect()
    }

    fn free_capacities(&self) -> Vec<usize> {
        self.slots
            .iter()
            .map(|slot| slot.capacity - slot.pinned.len())
            .collect()
    }

    fn masks(&self) -> Vec<SuitMask> {
        self.slots.iter().map(|slot| slot.allowed).collect()
    }

    fn seeded_hands(&self) -> Vec<Vec<Card>> {
        self.slots.iter().map(|slot| slot.pinned.clone()).collect()
    }
}

fn binomial(n: u128, k: u128) -> Option<u128> {
    if k > n {
        return Some(0);
    }
    let k = k.min(n - k);
    let mut result: u128 = 1;
    for i in 0..k {
        result = result.checked_mul(n - i)? / (i + 1);
    }
    Some(result)
}

fn suit_supply(cards: &[Card]) -> [usize; 4] {
    let mut supply = [0usize; 4];
    for card in cards {
        supply[card.suit.index()] += 1;
    }
    supply
}

/// Every subset of suits fits into the slots that accept at least one of them.
fn feasible(supply: &[usize; 4], remaining: &[usize], masks: &[SuitMask]) -> bool {
    for subset in 1u8..16 {
        let demand: usize = Suit::ALL
            .iter()
            .filter(|suit| subset & (1 << **suit as u8) != 0)
            .map(|suit| supply[suit.index()])
            .sum();
        if demand == 0 {
            continue;
        }
        let room: usize = remaining
            .iter()
            .zip(masks)
            .filter(|(_, mask)| mask.bits() & subset != 0)
            .map(|(free, _)| *free)
            .sum();
        if demand > room {
            return false;
        }
    }
    true
}

/// One complete assignment, aligned with `WorldSpec::slots`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct World {
    hands: Vec<Vec<Card>>,
    relaxed: bool,
}

impl World {
    pub fn hand(&self, slot: usize) -> &[Card] {
        &self.hands[slot]
    }

    pub fn hands(&self) -> &[Vec<Card>] {
        &self.hands
    }

    /// True when suit restrictions had to be ignored to fill every slot.
    pub fn relaxed(&self) -> bool {
        self.relaxed
    }
}

#[derive(Debug, Default)]
pub struct WorldSampler;

impl WorldSampler {
    /// Draws one assignment. `weight(seat, card)` scales the odds of a slot receiving a card.
    pub fn sample<R, W>(spec: &WorldSpec, weight: W, rng: &mut R) -> World
    where
        R: Rng + ?Sized,
        W: Fn(PlayerPosition, Card) -> f32,
    {
        let mut pool = spec.free_cards();
        let mut remaining = spec.free_capacities();
        let mut supply = suit_supply(&pool);
        let mut hands = spec.seeded_hands();

        let mut masks = spec.masks();
        let mut relaxed = false;
        if !feasible(&supply, &remaining, &masks) {
            masks = vec![SuitMask::ALL; masks.len()];
            relaxed = true;
        }

        pool.shuffle(rng);
        let mut candidates: Vec<(usize, f32)> = Vec::with_capacity(spec.slots.len());
        for card in pool {
            supply[card.suit.index()] -= 1;
            candidates.clear();
            for (index, slot) in spec.slots.iter().enumerate() {
                if remaining[index] == 0 || !masks[index].contains(card.suit) {
                    continue;
                }
                remaining[index] -= 1;
                let ok = feasible(&supply, &remaining, &masks);
                remaining[index] += 1;
                if ok {
                    candidates.push((index, weight(slot.seat, card).max(0.0)));
                }
            }
            if candidates.is_empty() {
                relaxed = true;
                candidates.extend(
                    remaining
                        .iter()
                        .enumerate()
                        .filter(|(_, free)| **free > 0)
                        .map(|(index, _)| (index, 1.0)),
                );
            }
            let Some(choice) = pick_weighted(&candidates, rng) else {
                break;
            };
            remaining[choice] -= 1;
            hands[choice].push(card);
        }

        World { hands, relaxed }
    }
}

fn pick_weighted<R: Rng + ?Sized>(candidates: &[(usize, f32)], rng: &mut R) -> Option<usize> {
    let total: f32 = candidates.iter().map(|(_, weight)| *weight).sum();
    if candidates.is_empty() {
        return None;
    }
    if total <= 0.0 {
        return candidates.choose(rng).map(|(index, _)| *index);
    }
    let mut choice = rng.gen_range(0.0..total);
    for (index, weight) in candidates {
        if choice < *weight {
            return Some(*index);
        }
        choice -= weight;
    }
    candidates.last().map(|(index, _)| *index)
}

/// Visits every assignment that respects capacities and suit restrictions.
#[derive(Debug)]
pub struct WorldEnumerator<'a> {
    spec: &'a WorldSpec,
}

impl<'a> WorldEnumerator<'a> {
    pub fn new(spec: &'a WorldSpec) -> Self {
        Self { spec }
    }

    /// Calls `visit` once per assignment and returns how many were visited.
    pub fn for_each<F: FnMut(&[Vec<Card>])>(&self, mut visit: F) -> usize {
        let mut pool = self.spec.free_cards();
        pool.sort_by_key(|card| card.to_id());
        let mut remaining = self.spec.free_capacities();
        let mut supply = suit_supply(&pool);
        let masks = self.spec.masks();
        let mut hands = self.spec.seeded_hands();
        if !feasible(&supply, &remaining, &masks) {
            return 0;
        }
        let mut visited = 0;
        descend(
            &pool,
            0,
            &mut supply,
            &mut remaining,
            &masks,
            &mut hands,
            &mut visit,
            &mut visited,
        );
        visited
    }
}

#[allow(clippy::too_many_arguments)]
fn descend<F: FnMut(&[Vec<Card>])>(
    pool: &[Card],
    depth: usize,
    supply: &mut [usize; 4],
    remaining: &mut [usize],
    masks: &[SuitMask],
    hands: &mut [Vec<Card>],
    visit: &mut F,
    visited: &mut usize,
) {
    let Some(card) = pool.get(depth).copied() else {
        visit(hands);
        *visited += 1;
        return;
    };
    supply[card.suit.index()] -= 1;
    for index in 0..hands.len() {
        if remaining[index] == 0 || !masks[index].contains(card.suit) {
            continue;
        }
        remaining[index] -= 1;
        if feasible(supply, remaining, masks) {
            hands[index].push(card);
            descend(pool, depth + 1, supply, remaining, masks, hands, visit, visited);
            hands[index].pop();
        }
        remaining[index] += 1;
    }
    supply[card.suit.index()] += 1;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::rank::Rank;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    fn card(text: &str) -> Card {
        text.parse().unwrap()
    }

    fn cards(texts: &[&str]) -> Vec<Card> {
        texts.iter().map(|text| card(text)).collect()
    }

    #[test]
    fn capacity_must_match_unseen_cards() {
        let result = WorldSpec::new(
            cards(&["2H", "3H"]),
            vec![Slot::hand(PlayerPosition::East, 3, SuitMask::EMPTY)],
        );
        assert_eq!(
            result.unwrap_err(),
            SamplingError::CapacityMismatch {
                cards: 2,
                capacity: 3
            }
        );
    }

    #[test]
    fn sampled_world_respects_voids_and_sizes() {
        let unseen = cards(&["2H", "3H", "4H", "5C", "6C", "7S"]);
        let spec = WorldSpec::new(
            unseen,
            vec![
                Slot::hand(PlayerPosition::East, 3, SuitMask::only(Suit::Hearts)),
                Slot::hand(PlayerPosition::South, 3, SuitMask::EMPTY),
            ],
        )
        .unwrap();
        let mut rng = SmallRng::seed_from_u64(9);
        for _ in 0..50 {
            let world = WorldSampler::sample(&spec, |_, _| 1.0, &mut rng);
            assert!(!world.relaxed());
            assert_eq!(world.hand(0).len(), 3);
            assert!(world.hand(0).iter().all(|c| c.suit != Suit::Hearts));
            assert_eq!(world.hand(1).len(), 3);
        }
    }

    #[test]
    fn hidden_trump_slot_gets_a_trump() {
        let unseen = cards(&["2S", "9H", "3D"]);
        let spec = WorldSpec::new(
            unseen,
            vec![
                Slot::hidden_trump(PlayerPosition::West, Suit::Spades),
                Slot::hand(PlayerPosition::West, 2, SuitMask::EMPTY),
            ],
        )
        .unwrap();
        let mut rng = SmallRng::seed_from_u64(1);
        let world = WorldSampler::sample(&spec, |_, _| 1.0, &mut rng);
        assert_eq!(world.hand(0), &[card("2S")]);
    }

    #[test]
    fn pinned_cards_stay_with_their_slot() {
        let unseen = cards(&["AS", "2H", "3H", "4H"]);
        let spec = WorldSpec::new(
            unseen,
            vec![
                Slot::hand(PlayerPosition::North, 2, SuitMask::EMPTY).with_pinned(card("AS")),
                Slot::hand(PlayerPosition::East, 2, SuitMask::EMPTY),
            ],
        )
        .unwrap();
        let mut rng = SmallRng::seed_from_u64(4);
        for _ in 0..20 {
            let world = WorldSampler::sample(&spec, |_, _| 1.0, &mut rng);
            assert!(world.hand(0).contains(&card("AS")));
        }
        assert_eq!(spec.assignment_count(), 3);
        assert_eq!(WorldEnumerator::new(&spec).for_each(|_| {}), 3);
    }

    #[test]
    fn contradictory_voids_fall_back_to_relaxed_split() {
        let unseen = cards(&["2H", "3H"]);
        let spec = WorldSpec::new(
            unseen,
            vec![
                Slot::hand(PlayerPosition::East, 1, SuitMask::only(Suit::Hearts)),
                Slot::hand(PlayerPosition::South, 1, SuitMask::only(Suit::Hearts)),
            ],
        )
        .unwrap();
        let mut rng = SmallRng::seed_from_u64(2);
        let world = WorldSampler::sample(&spec, |_, _| 1.0, &mut rng);
        assert!(world.relaxed());
        assert_eq!(world.hand(0).len() + world.hand(1).len(), 2);
        assert_eq!(WorldEnumerator::new(&spec).for_each(|_| {}), 0);
    }

    #[test]
    fn enumeration_counts_constrained_assignments() {
        let unseen = cards(&["2H", "3H", "4C", "5C"]);
        let spec = WorldSpec::new(
            unseen,
            vec![
                Slot::hand(PlayerPosition::East, 2, SuitMask::only(Suit::Clubs)),
                Slot::hand(PlayerPosition::West, 2, SuitMask::EMPTY),
            ],
        )
        .unwrap();
        assert_eq!(spec.assignment_count(), 6);
        let mut seen = Vec::new();
        let count = WorldEnumerator::new(&spec).for_each(|hands| seen.push(hands.to_vec()));
        assert_eq!(count, 1);
        assert_eq!(seen[0][0], cards(&["2H", "3H"]));
    }

    #[test]
    fn weights_steer_assignment() {
        let unseen: Vec<Card> = Rank::ORDERED.iter().map(|r| Card::new(*r, Suit::Diamonds)).collect();
        let spec = WorldSpec::new(
            unseen,
            vec![
                Slot::hand(PlayerPosition::East, 6, SuitMask::EMPTY),
                Slot::hand(PlayerPosition::West, 7, SuitMask::EMPTY),
            ],
        )
        .unwrap();
        let mut rng = SmallRng::seed_from_u64(77);
        let mut ace_east = 0;
        for _ in 0..200 {
            let world = WorldSampler::sample(
                &spec,
                |seat, card| {
                    if seat == PlayerPosition::East && card.rank == Rank::Ace {
                        20.0
                    } else {
                        1.0
                    }
                },
                &mut rng,
            );
            if world.hand(0).contains(&Card::new(Rank::Ace, Suit::Diamonds)) {
                ace_east += 1;
            }
        }
        assert!(ace_east > 130, "ace went east {ace_east} times");
    }

    #[test]
    fn binomial_values() {
        assert_eq!(binomial(52, 13), Some(635_013_559_600));
        assert_eq!(binomial(3, 5), Some(0));
    }
}
