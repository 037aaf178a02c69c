//! Stateless legality and trick-evaluation rules.

use crate::model::card::Card;
use crate::model::hand::Hand;
use crate::model::player::PlayerPosition;
use crate::model::suit::Suit;
use std::fmt;

/// Why a held card may not be played right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IllegalReason {
    MustFollowSuit(Suit),
    TrumpNotBroken(Suit),
}

impl fmt::Display for IllegalReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IllegalReason::MustFollowSuit(suit) => write!(f, "must follow {suit}"),
            IllegalReason::TrumpNotBroken(trump) => {
                write!(f, "cannot lead trump {trump} before it is broken")
            }
        }
    }
}

/// Checks follow-suit and trump-lead rules for a card already known to be in `hand`.
pub fn check_play(
    hand: &Hand,
    card: Card,
    lead: Option<Suit>,
    trump: Suit,
    trump_broken: bool,
) -> Result<(), IllegalReason> {
    match lead {
        Some(lead_suit) => {
            if card.suit != lead_suit && hand.has_suit(lead_suit) {
                return Err(IllegalReason::MustFollowSuit(lead_suit));
            }
        }
        None => {
            if card.suit == trump && !trump_broken && !hand.only_suit(trump) {
                return Err(IllegalReason::TrumpNotBroken(trump));
            }
        }
    }
    Ok(())
}

/// Every card in `hand` that may be played. Never empty for a non-empty hand.
pub fn legal_cards(hand: &Hand, lead: Option<Suit>, trump: Suit, trump_broken: bool) -> Vec<Card> {
    hand.iter()
        .copied()
        .filter(|&card| check_play(hand, card, lead, trump, trump_broken).is_ok())
        .collect()
}

/// Whether playing `card` sets the trump-broken flag.
pub fn breaks_trump(card: Card, lead: Option<Suit>, trump: Suit) -> bool {
    card.suit == trump && lead != Some(trump)
}

/// Whether `challenger` beats the current best `incumbent` in a trick led with `lead`.
pub fn card_beats(challenger: Card, incumbent: Card, lead: Suit, trump: Suit) -> bool {
    match (challenger.suit == trump, incumbent.suit == trump) {
        (true, false) => true,
        (false, true) => false,
        (true, true) => challenger.rank > incumbent.rank,
        (false, false) => {
            if challenger.suit != lead {
                false
            } else if incumbent.suit != lead {
                true
            } else {
                challenger.rank > incumbent.rank
            }
        }
    }
}

/// Index of the winning card among `cards`, the first being the lead.
pub fn winning_index(cards: &[Card], trump: Suit) -> Option<usize> {
    let lead = cards.first()?.suit;
    let mut best = 0;
    for (index, card) in cards.iter().enumerate().skip(1) {
        if card_beats(*card, cards[best], lead, trump) {
            best = index;
        }
    }
    Some(best)
}

/// Winner among `(seat, card)` plays in play order.
pub fn evaluate_trick(plays: &[(PlayerPosition, Card)], trump: Suit) -> Option<PlayerPosition> {
    let cards: Vec<Card> = plays.iter().map(|(_, card)| *card).collect();
    winning_index(&cards, trump).map(|index| plays[index].0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::rank::Rank;

    fn card(text: &str) -> Card {
        text.parse().unwrap()
    }

    #[test]
    fn any_trump_beats_higher_lead_cards() {
        let plays = [
            (PlayerPosition::North, card("10H")),
            (PlayerPosition::East, card("2S")),
            (PlayerPosition::South, card("KH")),
            (PlayerPosition::West, card("AC")),
        ];
        assert_eq!(evaluate_trick(&plays, Suit::Spades), Some(PlayerPosition::East));
    }

    #[test]
    fn off_suit_never_wins() {
        let plays = [
            (PlayerPosition::North, card("3D")),
            (PlayerPosition::East, card("AC")),
            (PlayerPosition::South, card("AH")),
            (PlayerPosition::West, card("4D")),
        ];
        assert_eq!(evaluate_trick(&plays, Suit::Spades), Some(PlayerPosition::West));
    }

    #[test]
    fn higher_trump_overtrumps() {
        let plays = [
            (PlayerPosition::North, card("3D")),
            (PlayerPosition::East, card("4S")),
            (PlayerPosition::South, card("JS")),
            (PlayerPosition::West, card("AD")),
        ];
        assert_eq!(evaluate_trick(&plays, Suit::Spades), Some(PlayerPosition::South));
    }

    #[test]
    fn trump_only_hand_may_lead_trump() {
        let hand = Hand::with_cards(vec![card("2S"), card("9S")]);
        assert!(check_play(&hand, card("2S"), None, Suit::Spades, false).is_ok());
    }

    #[test]
    fn mixed_hand_cannot_lead_trump_before_break() {
        let hand = Hand::with_cards(vec![card("2S"), card("9H")]);
        assert_eq!(
            check_play(&hand, card("2S"), None, Suit::Spades, false),
            Err(IllegalReason::TrumpNotBroken(Suit::Spades))
        );
        assert!(check_play(&hand, card("2S"), None, Suit::Spades, true).is_ok());
        assert_eq!(legal_cards(&hand, None, Suit::Spades, false), vec![card("9H")]);
    }

    #[test]
    fn following_is_forced_when_able() {
        let hand = Hand::with_cards(vec![card("2S"), card("9H"), card("QH")]);
        assert_eq!(
            legal_cards(&hand, Some(Suit::Hearts), Suit::Spades, false),
            vec![card("QH"), card("9H")]
        );
        let void = Hand::with_cards(vec![card("2S"), card("4C")]);
        assert_eq!(legal_cards(&void, Some(Suit::Hearts), Suit::Spades, false).len(), 2);
    }

    #[test]
    fn trump_break_detection() {
        let trump = Suit::Spades;
        assert!(breaks_trump(Card::new(Rank::Two, trump), Some(Suit::Hearts), trump));
        assert!(breaks_trump(Card::new(Rank::Two, trump), None, trump));
        assert!(!breaks_trump(Card::new(Rank::Two, trump), Some(trump), trump));
        assert!(!breaks_trump(card("2H"), Some(Suit::Hearts), trump));
    }
}
