use crate::model::card::Card;
use crate::model::hand::Hand;
use crate::model::player::PlayerPosition;
use crate::model::rank::Rank;
use crate::model::suit::Suit;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of tricks in a round; also the ATAS threshold for the bid total.
pub const TRICKS_PER_ROUND: u8 = 13;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Bid {
    pub seat: PlayerPosition,
    pub suit: Suit,
    pub rank: Rank,
}

impl Bid {
    pub const fn new(seat: PlayerPosition, suit: Suit, rank: Rank) -> Self {
        Self { seat, suit, rank }
    }

    pub const fn count(&self) -> u8 {
        self.rank.bid_value()
    }

    pub const fn card(&self) -> Card {
        Card::new(self.rank, self.suit)
    }
}

impl fmt::Display for Bid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} bids {} ({})", self.seat, self.card(), self.count())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mode {
    Bawah,
    Atas,
}

impl Mode {
    pub const fn from_total(total: u32) -> Self {
        if total < TRICKS_PER_ROUND as u32 {
            Mode::Bawah
        } else {
            Mode::Atas
        }
    }

    pub const fn target_for(self, count: u8) -> u8 {
        match self {
            Mode::Bawah => count.saturating_sub(1),
            Mode::Atas => count + 1,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Mode::Bawah => "BAWAH",
            Mode::Atas => "ATAS",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Trump, mode and per-seat targets derived from the four bids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contract {
    pub trump: Suit,
    pub mode: Mode,
    pub counts: [u8; 4],
    pub targets: [u8; 4],
}

impl Contract {
    pub fn target(&self, seat: PlayerPosition) -> u8 {
        self.targets[seat.index()]
    }

    pub fn total(&self) -> u32 {
        self.counts.iter().map(|&c| c as u32).sum()
    }
}

/// Pure resolution of four bids, indexed by seat.
pub fn resolve_contract(bids: &[Bid; 4]) -> Contract {
    let mut best = bids[0];
    for bid in &bids[1..] {
        if (bid.count(), bid.suit) > (best.count(), best.suit) {
            best = *bid;
        }
    }
    let counts = bids.map(|bid| bid.count());
    let mode = Mode::from_total(counts.iter().map(|&c| c as u32).sum());
    Contract {
        trump: best.suit,
        mode,
        counts,
        targets: counts.map(|count| mode.target_for(count)),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BidError {
    InvalidBid { seat: PlayerPosition, card: Card },
    IncompleteBidding { submitted: usize },
    NotInBiddingPhase,
    BidsRevealed { seat: PlayerPosition },
}

impl fmt::Display for BidError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BidError::InvalidBid { seat, card } => {
                write!(f, "{seat} cannot bid {card}: card not in hand")
            }
            BidError::IncompleteBidding { submitted } => {
                write!(f, "only {submitted} of 4 bids submitted")
            }
            BidError::NotInBiddingPhase => write!(f, "bids are only accepted during bidding"),
            BidError::BidsRevealed { seat } => {
                write!(f, "{seat} cannot change a bid once all four are revealed")
            }
        }
    }
}

impl std::error::Error for BidError {}

/// Sealed bids for one round. A seat may replace its bid until the fourth bid
/// reveals them all; after that the book is closed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BidBook {
    submissions: [Option<Bid>; 4],
}

impl BidBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn submit(&mut self, bid: Bid, hand: &Hand) -> Result<(), BidError> {
        if self.is_complete() {
            return Err(BidError::BidsRevealed { seat: bid.seat });
        }
        if !hand.holds(bid.suit, bid.rank) {
            return Err(BidError::InvalidBid {
                seat: bid.seat,
                card: bid.card(),
            });
        }
        self.submissions[bid.seat.index()] = Some(bid);
        Ok(())
    }

    pub fn get(&self, seat: PlayerPosition) -> Option<&Bid> {
        self.submissions[seat.index()].as_ref()
    }

    pub fn submitted(&self) -> usize {
        self.submissions.iter().filter(|s| s.is_some()).count()
    }

    pub fn is_complete(&self) -> bool {
        self.submitted() == 4
    }

    pub fn bids(&self) -> Option<[Bid; 4]> {
        match self.submissions {
            [Some(a), Some(b), Some(c), Some(d)] => Some([a, b, c, d]),
            _ => None,
        }
    }

    pub fn resolve(&self) -> Result<Contract, BidError> {
        self.bids()
            .map(|bids| resolve_contract(&bids))
            .ok_or(BidError::IncompleteBidding {
                submitted: self.submitted(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::{Bid, BidBook, BidError, Mode, resolve_contract};
    use crate::model::card::Card;
    use crate::model::hand::Hand;
    use crate::model::player::PlayerPosition;
    use crate::model::rank::Rank;
    use crate::model::suit::Suit;

    fn bids(entries: [(Rank, Suit); 4]) -> [Bid; 4] {
        let mut out = [Bid::new(PlayerPosition::North, Suit::Clubs, Rank::Two); 4];
        for (seat, (rank, suit)) in PlayerPosition::LOOP.iter().zip(entries) {
            out[seat.index()] = Bid::new(*seat, suit, rank);
        }
        out
    }

    #[test]
    fn trump_tie_goes_to_higher_suit() {
        let contract = resolve_contract(&bids([
            (Rank::Five, Suit::Clubs),
            (Rank::Five, Suit::Spades),
            (Rank::Three, Suit::Diamonds),
            (Rank::Two, Suit::Hearts),
        ]));
        assert_eq!(contract.trump, Suit::Spades);
        assert_eq!(contract.mode, Mode::Atas);
    }

    #[test]
    fn total_fourteen_is_atas() {
        let contract = resolve_contract(&bids([
            (Rank::Five, Suit::Clubs),
            (Rank::Four, Suit::Spades),
            (Rank::Three, Suit::Diamonds),
            (Rank::Two, Suit::Hearts),
        ]));
        assert_eq!(contract.total(), 14);
        assert_eq!(contract.mode, Mode::Atas);
        assert_eq!(contract.targets, [6, 5, 4, 3]);
    }

    #[test]
    fn total_ten_is_bawah() {
        let contract = resolve_contract(&bids([
            (Rank::Four, Suit::Clubs),
            (Rank::Ace, Suit::Spades),
            (Rank::Three, Suit::Diamonds),
            (Rank::Two, Suit::Hearts),
        ]));
        assert_eq!(contract.total(), 10);
        assert_eq!(contract.mode, Mode::Bawah);
        assert_eq!(contract.targets, [3, 0, 2, 1]);
    }

    #[test]
    fn total_thirteen_is_atas() {
        let contract = resolve_contract(&bids([
            (Rank::Five, Suit::Clubs),
            (Rank::Four, Suit::Spades),
            (Rank::Two, Suit::Diamonds),
            (Rank::Two, Suit::Hearts),
        ]));
        assert_eq!(contract.total(), 13);
        assert_eq!(contract.mode, Mode::Atas);
        assert_eq!(contract.targets, [6, 5, 3, 3]);
    }

    #[test]
    fn face_card_bid_targets_zero_under_bawah() {
        let contract = resolve_contract(&bids([
            (Rank::King, Suit::Clubs),
            (Rank::Queen, Suit::Spades),
            (Rank::Jack, Suit::Diamonds),
            (Rank::Two, Suit::Hearts),
        ]));
        assert_eq!(contract.trump, Suit::Hearts);
        assert_eq!(contract.targets, [0, 0, 0, 1]);
    }

    #[test]
    fn book_rejects_unheld_card_and_allows_replacement() {
        let hand = Hand::with_cards(vec![
            Card::new(Rank::Seven, Suit::Hearts),
            Card::new(Rank::Ace, Suit::Clubs),
        ]);
        let mut book = BidBook::new();
        let missing = Bid::new(PlayerPosition::East, Suit::Spades, Rank::Seven);
        assert!(matches!(
            book.submit(missing, &hand),
            Err(BidError::InvalidBid { .. })
        ));
        assert_eq!(book.submitted(), 0);

        book.submit(Bid::new(PlayerPosition::East, Suit::Hearts, Rank::Seven), &hand)
            .unwrap();
        book.submit(Bid::new(PlayerPosition::East, Suit::Clubs, Rank::Ace), &hand)
            .unwrap();
        assert_eq!(book.submitted(), 1);
        assert_eq!(book.get(PlayerPosition::East).map(Bid::count), Some(1));
    }

    #[test]
    fn complete_book_is_closed() {
        let mut book = BidBook::new();
        for seat in PlayerPosition::LOOP {
            let hand = Hand::with_cards(vec![
                Card::new(Rank::Two, Suit::Spades),
                Card::new(Rank::King, Suit::Hearts),
            ]);
            book.submit(Bid::new(seat, Suit::Spades, Rank::Two), &hand).unwrap();
        }
        let before = book.clone();
        let hand = Hand::with_cards(vec![Card::new(Rank::King, Suit::Hearts)]);
        assert_eq!(
            book.submit(Bid::new(PlayerPosition::East, Suit::Hearts, Rank::King), &hand),
            Err(BidError::BidsRevealed { seat: PlayerPosition::East })
        );
        assert_eq!(book, before);
    }

    #[test]
    fn resolve_requires_all_four() {
        let book = BidBook::new();
        assert_eq!(
            book.resolve(),
            Err(BidError::IncompleteBidding { submitted: 0 })
        );
    }
}
