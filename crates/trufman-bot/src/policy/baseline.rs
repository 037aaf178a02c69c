use super::{Decision, Policy, legal_from_snapshot};
use crate::bot::{CancelFlag, lowest};
use trufman_core::game::snapshot::RoundSnapshot;
use trufman_core::model::bid::Bid;
use trufman_core::model::player::PlayerPosition;
use trufman_core::model::suit::Suit;

/// The plain strategy: bid the longest suit, always play low.
#[derive(Debug, Clone)]
pub struct BaselinePolicy {
    seat: PlayerPosition,
}

impl BaselinePolicy {
    pub fn new(seat: PlayerPosition) -> Self {
        Self { seat }
    }
}

impl Policy for BaselinePolicy {
    fn seat(&self) -> PlayerPosition {
        self.seat
    }

    fn name(&self) -> &'static str {
        "baseline"
    }

    fn choose_bid(&mut self, snapshot: &RoundSnapshot) -> Option<Bid> {
        let hand = snapshot.hand(self.seat)?;
        let suit = Suit::ALL
            .iter()
            .copied()
            .filter(|suit| hand.iter().any(|card| card.suit == *suit))
            .max_by_key(|suit| (hand.iter().filter(|card| card.suit == *suit).count(), *suit))?;
        let rank = hand
            .iter()
            .filter(|card| card.suit == suit)
            .map(|card| card.rank)
            .max_by_key(|rank| (rank.bid_value(), *rank))?;
        Some(Bid::new(self.seat, suit, rank))
    }

    fn choose_play(&mut self, snapshot: &RoundSnapshot, _cancel: &CancelFlag) -> Option<Decision> {
        let legal = legal_from_snapshot(snapshot, self.seat)?;
        let trump = snapshot.contract?.trump;
        let pick = |suit: Suit| lowest(legal.iter().copied().filter(|card| card.suit == suit));
        let card = match snapshot.lead_suit() {
            None => lowest(legal.iter().copied().filter(|card| card.suit != trump)),
            Some(lead) => pick(lead).or_else(|| pick(trump)),
        }
        .or_else(|| lowest(legal.iter().copied()))?;
        Some(Decision::Play(card))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bot::test_support::{round_in_play, seat_view};
    use trufman_core::game::snapshot::Viewer;
    use trufman_core::model::card::Card;
    use trufman_core::model::round::RoundState;
    use trufman_core::model::score::ScoreBoard;

    fn card(text: &str) -> Card {
        text.parse().unwrap()
    }

    fn round() -> RoundState {
        round_in_play(
            [
                "KC 2D 3D 4D 5D 6H 7H 8H 9H 2S 3S 4S 5S",
                "AC QC JC TC 9C 8C 7C 6C 5C 4C 3C 2C AD",
                "KD QD JD TD 9D 8D 7D AH KH QH JH TH 2H",
                "3H 4H 5H AS KS QS JS TS 9S 8S 7S 6S 6D",
            ],
            ["KC", "4C", "2H", "3H"],
            PlayerPosition::West,
        )
    }

    #[test]
    fn bids_the_longest_suit_with_its_highest_count() {
        let round = round();
        let view = RoundSnapshot::capture(&round, &ScoreBoard::new(), 1, Viewer::Seat(PlayerPosition::East));
        let mut policy = BaselinePolicy::new(PlayerPosition::East);
        let bid = policy.choose_bid(&view).unwrap();
        assert_eq!(bid.suit, Suit::Clubs);
        assert_eq!(bid.card(), card("TC"));

        let view = RoundSnapshot::capture(&round, &ScoreBoard::new(), 1, Viewer::Seat(PlayerPosition::South));
        let bid = BaselinePolicy::new(PlayerPosition::South).choose_bid(&view).unwrap();
        // Seven diamonds against six hearts.
        assert_eq!(bid.card(), card("TD"));
    }

    #[test]
    fn plays_low_and_trumps_only_when_void() {
        let mut round = round();
        let cancel = CancelFlag::new();
        let mut north = BaselinePolicy::new(PlayerPosition::North);
        let decision = north.choose_play(&seat_view(&round, PlayerPosition::North), &cancel);
        assert_eq!(decision, Some(Decision::Play(card("2D"))));
        round.play_card(PlayerPosition::North, card("2D")).unwrap();

        // East holds one diamond and must follow with it.
        let mut east = BaselinePolicy::new(PlayerPosition::East);
        let decision = east.choose_play(&seat_view(&round, PlayerPosition::East), &cancel);
        assert_eq!(decision, Some(Decision::Play(card("AD"))));
        round.play_card(PlayerPosition::East, card("AD")).unwrap();

        let mut south = BaselinePolicy::new(PlayerPosition::South);
        let decision = south.choose_play(&seat_view(&round, PlayerPosition::South), &cancel);
        assert_eq!(decision, Some(Decision::Play(card("7D"))));
        assert!(north.choose_play(&seat_view(&round, PlayerPosition::North), &cancel).is_none());
    }
}
