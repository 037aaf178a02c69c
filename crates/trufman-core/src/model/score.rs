use crate::model::bid::Mode;
use crate::model::player::PlayerPosition;
use serde::{Deserialize, Serialize};

/// Round delta for one seat. Misses in the "wrong" direction for the mode cost double.
pub fn round_score(mode: Mode, target: u8, got: u8) -> i32 {
    let target = target as i32;
    let got = got as i32;
    match got.cmp(&target) {
        std::cmp::Ordering::Equal => target,
        std::cmp::Ordering::Less => match mode {
            Mode::Bawah => -(target - got),
            Mode::Atas => -2 * (target - got),
        },
        std::cmp::Ordering::Greater => match mode {
            Mode::Atas => -(got - target),
            Mode::Bawah => -2 * (got - target),
        },
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ScoreBoard {
    totals: [i32; 4],
}

impl ScoreBoard {
    pub const fn new() -> Self {
        Self { totals: [0; 4] }
    }

    pub fn set_totals(&mut self, totals: [i32; 4]) {
        self.totals = totals;
    }

    pub fn score(&self, seat: PlayerPosition) -> i32 {
        self.totals[seat.index()]
    }

    pub fn standings(&self) -> &[i32; 4] {
        &self.totals
    }

    pub fn apply_round(&mut self, deltas: [i32; 4]) {
        for (total, delta) in self.totals.iter_mut().zip(deltas) {
            *total += delta;
        }
    }

    /// Seats by total descending; equal totals keep seat order.
    pub fn leaderboard(&self) -> Vec<(PlayerPosition, i32)> {
        let mut rows: Vec<_> = PlayerPosition::LOOP
            .iter()
            .map(|seat| (*seat, self.score(*seat)))
            .collect();
        rows.sort_by(|a, b| b.1.cmp(&a.1));
        rows
    }
}
