#![allow(dead_code)]

use trufman_bot::{CancelFlag, Decision, Policy};
use trufman_core::game::snapshot::Viewer;
use trufman_core::game::table::{Table, TableAction, TableEvent};
use trufman_core::model::player::PlayerPosition;
use trufman_core::model::round::RoundPhase;

/// Drives one round of `table` with one policy per seat, indexed by seat.
/// Returns every play decision in table order.
pub fn play_round(table: &mut Table, agents: &mut [Box<dyn Policy>]) -> Vec<(PlayerPosition, Decision)> {
    let mut seats: Vec<&mut dyn Policy> = agents.iter_mut().map(|agent| agent.as_mut() as &mut dyn Policy).collect();
    play_round_with(table, &mut seats)
}

/// Same as [`play_round`] for callers that keep ownership of their policies.
pub fn play_round_with(table: &mut Table, agents: &mut [&mut dyn Policy]) -> Vec<(PlayerPosition, Decision)> {
    assert_eq!(table.phase(), RoundPhase::Bidding);
    for seat in PlayerPosition::LOOP {
        let snapshot = table.snapshot(Viewer::Seat(seat));
        let bid = agents[seat.index()].choose_bid(&snapshot).expect("bid");
        table.propose_bid(seat, bid.suit, bid.rank).expect("bid accepted");
    }
    table.apply(TableAction::StartPlay).expect("contract");
    let bids = table.state().round().bids().bids().expect("four bids");
    let trump = table.state().round().trump().expect("trump");
    for agent in agents.iter_mut() {
        agent.observe_bids(&bids);
    }

    let cancel = CancelFlag::new();
    let mut decisions = Vec::new();
    while table.phase() == RoundPhase::Play {
        let seat = table.state().round().to_act().expect("turn holder");
        let snapshot = table.snapshot(Viewer::Seat(seat));
        let decision = agents[seat.index()]
            .choose_play(&snapshot, &cancel)
            .expect("decision");
        let card = decision.card().expect("card");
        assert!(
            table.state().round().legal_moves(seat).contains(&card),
            "{seat:?} chose illegal {card}"
        );
        decisions.push((seat, decision));

        let events = table.propose_play(seat, card).expect("play accepted");
        if !events.iter().any(|event| matches!(event, TableEvent::TrickRevealed { .. })) {
            continue;
        }
        table.apply(TableAction::BeginResolve).expect("resolve");
        let events = table.apply(TableAction::CompleteResolve).expect("resolved");
        let trick = table
            .state()
            .round()
            .completed_tricks()
            .last()
            .cloned()
            .expect("completed trick");
        for agent in agents.iter_mut() {
            agent.observe_trick(&trick, trump);
        }
        for event in events {
            if let TableEvent::RoundComplete { deltas } = event {
                let tricks_won = table.state().round().tricks_won();
                for agent in agents.iter_mut() {
                    agent.observe_round_end(&tricks_won, &deltas);
                }
            }
        }
    }
    decisions
}
