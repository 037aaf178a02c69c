pub mod pacing;
pub mod worker;

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::{RngCore, SeedableRng, rngs::StdRng};
use serde::Serialize;
use thiserror::Error;
use tracing::{Level, event};
use trufman_bot::memory::{JsonDirStore, PersistQueue, QueueStats};
use trufman_bot::{BaselinePolicy, BotParams, CancelFlag, Decision, LearningPolicy, MemoryHandle, Policy};
use trufman_core::game::match_state::RoundSummary;
use trufman_core::game::serialization::MatchSnapshot;
use trufman_core::game::snapshot::Viewer;
use trufman_core::game::table::{Table, TableAction, TableError, TableEvent};
use trufman_core::model::bid::Bid;
use trufman_core::model::player::PlayerPosition;
use trufman_core::model::round::RoundPhase;

use crate::analytics::{AnalyticsCollector, AnalyticsError, AnalyticsSummary};
use crate::config::{AgentKind, MatchConfig, ResolvedOutputs, SeatConfig};
use crate::logging::telemetry_path;
use pacing::Pacer;
use worker::{AgentWorker, WorkerError};

/// Plays a configured match headlessly, one worker thread per seat.
pub struct MatchRunner {
    config: MatchConfig,
    outputs: ResolvedOutputs,
    stop: CancelFlag,
    persistence: Option<Arc<PersistQueue>>,
}

/// Details returned after a run.
#[derive(Debug)]
pub struct RunSummary {
    pub rounds_played: usize,
    pub rows_written: usize,
    /// Set when the stop flag ended the run early; the unfinished round was discarded.
    pub interrupted: bool,
    pub jsonl_path: PathBuf,
    pub summary_path: PathBuf,
    pub snapshot_path: Option<PathBuf>,
    pub telemetry_path: Option<PathBuf>,
    pub persistence: Option<QueueStats>,
    pub analytics: AnalyticsSummary,
}

/// One finished round as seen by the runner.
#[derive(Debug, Clone)]
pub struct RoundOutcome {
    pub summary: RoundSummary,
    pub seats: Vec<SeatOutcome>,
}

#[derive(Debug, Clone)]
pub struct SeatOutcome {
    pub seat: PlayerPosition,
    pub name: String,
    pub kind: AgentKind,
    pub bid: Bid,
    pub target: u8,
    pub tricks: u8,
    pub delta: i32,
    pub total: i32,
    pub metrics: DecisionSummary,
}

impl MatchRunner {
    /// Expects `config` to have passed `MatchConfig::validate`.
    pub fn new(config: MatchConfig, outputs: ResolvedOutputs) -> Result<Self, RunnerError> {
        if config.seats.len() != 4 {
            return Err(RunnerError::SeatCount {
                found: config.seats.len(),
            });
        }

        let persistence = match outputs.memory_dir.as_ref() {
            Some(dir) => {
                let store = JsonDirStore::new(dir);
                Some(Arc::new(PersistQueue::new(Arc::new(store))?))
            }
            None => None,
        };

        Ok(Self {
            config,
            outputs,
            stop: CancelFlag::new(),
            persistence,
        })
    }

    /// Raising this flag cancels in-flight evaluations and pacing waits, then ends the run.
    pub fn stop_handle(&self) -> CancelFlag {
        self.stop.clone()
    }

    /// Play every configured round, streaming JSONL rows to disk.
    pub fn run(&self) -> Result<RunSummary, RunnerError> {
        ensure_parent(self.outputs.jsonl.parent())?;
        ensure_parent(self.outputs.summary_md.parent())?;

        let mut writer = BufWriter::new(File::create(&self.outputs.jsonl)?);
        let workers = self.spawn_workers()?;
        let pacer = Pacer::new(&self.config.pacing, self.stop.clone());
        let mut table = Table::with_seed(self.config.schedule.dealer, self.config.schedule.seed);
        let mut analytics = AnalyticsCollector::new(&self.config);
        let mut rows_written = 0usize;
        let mut rounds_played = 0usize;
        let mut interrupted = false;

        for _ in 0..self.config.schedule.rounds {
            let outcome = if self.stop.is_cancelled() {
                None
            } else {
                self.play_round(&mut table, &workers, &pacer)?
            };
            let Some(outcome) = outcome else {
                interrupted = true;
                table.apply(TableAction::ResetRound)?;
                for worker in &workers {
                    worker.reset(false)?;
                }
                break;
            };
            analytics.record_round(&outcome)?;
            rows_written += write_round_rows(&mut writer, &self.config.run_id, &outcome)?;
            rounds_played += 1;
        }
        writer.flush()?;

        for worker in workers {
            worker.shutdown()?;
        }
        let persistence = self.persistence.as_ref().map(|queue| {
            queue.flush();
            queue.stats()
        });

        let analytics = analytics.finalize();
        analytics.write_markdown(&self.outputs.summary_md)?;

        let snapshot_path = match self.outputs.snapshot_json.as_ref() {
            Some(path) => {
                ensure_parent(path.parent())?;
                fs::write(path, MatchSnapshot::to_json(table.state())?)?;
                Some(path.clone())
            }
            None => None,
        };

        event!(
            target: "trufman_bench::runner",
            Level::INFO,
            run_id = %self.config.run_id,
            rounds_played,
            interrupted,
            "match finished"
        );

        Ok(RunSummary {
            rounds_played,
            rows_written,
            interrupted,
            jsonl_path: self.outputs.jsonl.clone(),
            summary_path: self.outputs.summary_md.clone(),
            snapshot_path,
            telemetry_path: self
                .config
                .logging
                .enable_structured
                .then(|| telemetry_path(&self.outputs)),
            persistence,
            analytics,
        })
    }

    fn spawn_workers(&self) -> Result<Vec<AgentWorker>, RunnerError> {
        let handle = self
            .persistence
            .as_ref()
            .map(|queue| MemoryHandle::queued(Arc::clone(queue)))
            .unwrap_or_else(MemoryHandle::disabled);
        let env_params = BotParams::from_env();
        let mut seeds = StdRng::seed_from_u64(self.config.schedule.seed);

        let mut workers = Vec::with_capacity(4);
        for (seat, seat_config) in PlayerPosition::LOOP.iter().zip(&self.config.seats) {
            let seed = seeds.next_u64();
            let policy = self.build_policy(*seat, seat_config, &handle, env_params, seed);
            workers.push(AgentWorker::spawn(policy, self.stop.clone())?);
        }
        Ok(workers)
    }

    fn build_policy(
        &self,
        seat: PlayerPosition,
        seat_config: &SeatConfig,
        handle: &MemoryHandle,
        env_params: BotParams,
        seed: u64,
    ) -> Box<dyn Policy> {
        match seat_config.kind {
            AgentKind::Learning => Box::new(LearningPolicy::new(
                seat,
                self.config.memory.namespace.clone(),
                handle.clone(),
                seat_config.params.apply(env_params),
                seed,
            )),
            AgentKind::Baseline => Box::new(BaselinePolicy::new(seat)),
        }
    }

    /// `Ok(None)` when the stop flag interrupted the round.
    fn play_round(
        &self,
        table: &mut Table,
        workers: &[AgentWorker],
        pacer: &Pacer,
    ) -> Result<Option<RoundOutcome>, RunnerError> {
        let round_number = table.state().round_number();
        let mut metrics: [DecisionMetrics; 4] = Default::default();

        for worker in workers {
            let seat = worker.seat();
            let bid = worker
                .bid(&table.snapshot(Viewer::Seat(seat)))?
                .ok_or_else(|| RunnerError::game(format!("{seat} produced no bid")))?;
            table.propose_bid(seat, bid.suit, bid.rank)?;
        }
        table.apply(TableAction::StartPlay)?;
        let round = table.state().round();
        let bids = round
            .bids()
            .bids()
            .ok_or_else(|| RunnerError::game("bids missing after start of play"))?;
        let contract = *round
            .contract()
            .ok_or_else(|| RunnerError::game("contract missing after start of play"))?;
        for worker in workers {
            worker.observe_bids(bids)?;
        }
        if tracing::enabled!(Level::INFO) {
            event!(
                target: "trufman_bench::runner",
                Level::INFO,
                run_id = %self.config.run_id,
                round = round_number,
                trump = %contract.trump,
                mode = contract.mode.as_str(),
                targets = ?contract.targets,
                "contract resolved"
            );
        }

        while table.phase() == RoundPhase::Play {
            let seat = table
                .state()
                .round()
                .to_act()
                .ok_or_else(|| RunnerError::game("no seat to act during play"))?;
            let worker = &workers[seat.index()];
            let started = Instant::now();
            let decision = worker
                .play(&table.snapshot(Viewer::Seat(seat)))?
                .ok_or_else(|| RunnerError::game(format!("{seat} produced no play")))?;
            let elapsed_ms = metrics[seat.index()].record(started.elapsed(), decision);
            let Some(card) = decision.card() else {
                return Ok(None);
            };
            if !pacer.think() {
                return Ok(None);
            }

            let events = table.propose_play(seat, card)?;
            if tracing::enabled!(Level::INFO) {
                event!(
                    target: "trufman_bench::runner",
                    Level::INFO,
                    run_id = %self.config.run_id,
                    round = round_number,
                    seat = seat_label(seat),
                    agent = worker.agent(),
                    card = %card,
                    fallback = matches!(decision, Decision::Fallback(_)),
                    elapsed_ms
                );
            }
            if !events.iter().any(|event| matches!(event, TableEvent::TrickRevealed { .. })) {
                continue;
            }

            table.apply(TableAction::BeginResolve)?;
            if !pacer.reveal() {
                table.apply(TableAction::AbortResolve)?;
                return Ok(None);
            }
            let events = table.apply(TableAction::CompleteResolve)?;
            let trick = table
                .state()
                .round()
                .completed_tricks()
                .last()
                .cloned()
                .ok_or_else(|| RunnerError::game("resolved trick missing"))?;
            for worker in workers {
                worker.observe_trick(&trick, contract.trump)?;
            }
            for event in events {
                if let TableEvent::RoundComplete { deltas } = event {
                    let tricks_won = table.state().round().tricks_won();
                    for worker in workers {
                        worker.round_end(tricks_won, deltas)?;
                    }
                }
            }
        }

        let summary = table
            .apply(TableAction::FinishRound)?
            .into_iter()
            .find_map(|event| match event {
                TableEvent::RoundScored { summary } => Some(summary),
                _ => None,
            })
            .ok_or_else(|| RunnerError::game("round finished without a score"))?;

        let seats = workers
            .iter()
            .zip(&self.config.seats)
            .zip(metrics)
            .map(|((worker, seat_config), metrics)| {
                let index = worker.seat().index();
                SeatOutcome {
                    seat: worker.seat(),
                    name: seat_config.name.clone(),
                    kind: seat_config.kind,
                    bid: bids[index],
                    target: summary.contract.targets[index],
                    tricks: summary.tricks_won[index],
                    delta: summary.deltas[index],
                    total: summary.totals[index],
                    metrics: metrics.finalize(),
                }
            })
            .collect();
        Ok(Some(RoundOutcome { summary, seats }))
    }
}

fn ensure_parent(path: Option<&Path>) -> Result<(), RunnerError> {
    if let Some(dir) = path.filter(|dir| !dir.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    Ok(())
}

fn write_round_rows(
    writer: &mut BufWriter<File>,
    run_id: &str,
    outcome: &RoundOutcome,
) -> Result<usize, RunnerError> {
    let summary = &outcome.summary;
    let round_id = format!("R{:05}", summary.round_number);
    let mut rows_written = 0usize;
    for seat in &outcome.seats {
        let row = RoundLogRow {
            run_id,
            round_id: &round_id,
            round_number: summary.round_number,
            dealer: seat_label(summary.dealer),
            seat: seat_label(seat.seat),
            agent: &seat.name,
            kind: seat.kind.as_str(),
            trump: summary.contract.trump.to_string(),
            mode: summary.contract.mode.as_str(),
            bid: seat.bid.card().to_string(),
            bid_count: seat.bid.count(),
            target: seat.target,
            tricks: seat.tricks,
            delta: seat.delta,
            total: seat.total,
            decisions: seat.metrics.decisions,
            fallbacks: seat.metrics.fallbacks,
            speed_ms_turn: seat.metrics.avg_ms_per_decision,
        };
        serde_json::to_writer(&mut *writer, &row)?;
        writer.write_all(b"\n")?;
        rows_written += 1;
    }
    Ok(rows_written)
}

pub(crate) fn seat_label(position: PlayerPosition) -> &'static str {
    match position {
        PlayerPosition::North => "north",
        PlayerPosition::East => "east",
        PlayerPosition::South => "south",
        PlayerPosition::West => "west",
    }
}

#[derive(Default)]
struct DecisionMetrics {
    total: Duration,
    decisions: u32,
    fallbacks: u32,
}

impl DecisionMetrics {
    fn record(&mut self, duration: Duration, decision: Decision) -> f64 {
        self.total += duration;
        self.decisions += 1;
        if matches!(decision, Decision::Fallback(_)) {
            self.fallbacks += 1;
        }
        duration.as_secs_f64() * 1000.0
    }

    fn finalize(self) -> DecisionSummary {
        let total_ms = self.total.as_secs_f64() * 1000.0;
        DecisionSummary {
            decisions: self.decisions,
            fallbacks: self.fallbacks,
            avg_ms_per_decision: if self.decisions == 0 {
                0.0
            } else {
                total_ms / f64::from(self.decisions)
            },
            total_ms,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DecisionSummary {
    pub decisions: u32,
    pub fallbacks: u32,
    pub avg_ms_per_decision: f64,
    pub total_ms: f64,
}

#[derive(Serialize)]
struct RoundLogRow<'a> {
    run_id: &'a str,
    round_id: &'a str,
    round_number: u32,
    dealer: &'static str,
    seat: &'static str,
    agent: &'a str,
    kind: &'static str,
    trump: String,
    mode: &'static str,
    bid: String,
    bid_count: u8,
    target: u8,
    tricks: u8,
    delta: i32,
    total: i32,
    decisions: u32,
    fallbacks: u32,
    speed_ms_turn: f64,
}

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
    #[error("failed to serialize output: {source}")]
    Serialize {
        #[from]
        source: serde_json::Error,
    },
    #[error("table rejected an action: {0}")]
    Table(#[from] TableError),
    #[error(transparent)]
    Worker(#[from] WorkerError),
    #[error("analytics error: {0}")]
    Analytics(#[from] AnalyticsError),
    #[error("match execution failed: {message}")]
    Game { message: String },
    #[error("configuration requires exactly 4 seats but found {found}")]
    SeatCount { found: usize },
}

impl RunnerError {
    fn game(message: impl Into<String>) -> Self {
        RunnerError::Game {
            message: message.into(),
        }
    }
}
