use std::path::PathBuf;

use clap::Parser;

use trufman_bench::config::{MatchConfig, PacingConfig};
use trufman_bench::logging::init_logging;
use trufman_bench::runner::MatchRunner;

/// Headless Trufman match runner.
#[derive(Debug, Parser)]
#[command(
    name = "trufman-bench",
    author,
    version,
    about = "Deterministic Trufman match runner"
)]
struct Cli {
    /// Path to the YAML configuration file.
    #[arg(short, long, value_name = "FILE", default_value = "bench/trufman.yaml")]
    config: PathBuf,

    /// Override the run identifier (substitutes {run_id} templates).
    #[arg(long, value_name = "RUN_ID")]
    run_id: Option<String>,

    /// Override the number of rounds to play.
    #[arg(long, value_name = "ROUNDS")]
    rounds: Option<usize>,

    /// Override the deal seed.
    #[arg(long, value_name = "SEED")]
    seed: Option<u64>,

    /// Exit after validating the configuration (no match is played).
    #[arg(long)]
    validate_only: bool,

    /// Skip reveal and think delays regardless of config.
    #[arg(long)]
    no_delay: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut config = MatchConfig::from_path(&cli.config)?;

    if let Some(run_id) = cli.run_id {
        config.run_id = run_id;
    }

    if let Some(rounds) = cli.rounds {
        config.schedule.rounds = rounds;
    }

    if let Some(seed) = cli.seed {
        config.schedule.seed = seed;
    }

    if cli.no_delay {
        config.pacing = PacingConfig::disabled();
    }

    config.validate()?;

    let outputs = config.resolved_outputs();
    let run_id = config.run_id.clone();
    let rounds = config.schedule.rounds;
    let seats = config
        .seats
        .iter()
        .map(|seat| format!("{} ({})", seat.name, seat.kind.as_str()))
        .collect::<Vec<_>>()
        .join(", ");

    println!("Loaded configuration '{run_id}': {rounds} rounds, seats {seats}");

    if cli.validate_only {
        println!("Validation-only mode: match execution skipped.");
        return Ok(());
    }

    let _logging_guard = init_logging(&config.logging, &outputs)?;
    let runner = MatchRunner::new(config, outputs)?;
    let summary = runner.run()?;

    println!(
        "Match complete for '{run_id}': {} rounds → {} rows at {}",
        summary.rounds_played,
        summary.rows_written,
        summary.jsonl_path.display()
    );
    if summary.interrupted {
        println!("Run was interrupted; the unfinished round was discarded.");
    }
    println!("Summary table: {}", summary.summary_path.display());
    for (place, seat) in summary.analytics.leaderboard().iter().enumerate() {
        println!("  {}. {} {:+}", place + 1, seat.name, seat.total);
    }
    if let Some(path) = summary.snapshot_path.as_ref() {
        println!("Match snapshot: {}", path.display());
    }
    if let Some(path) = summary.telemetry_path.as_ref() {
        println!("Telemetry log: {}", path.display());
    }
    if let Some(stats) = summary.persistence {
        println!(
            "Memory: {} written, {} coalesced, {} failed",
            stats.written, stats.coalesced, stats.failed
        );
    }

    Ok(())
}
