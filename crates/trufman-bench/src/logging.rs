use std::fs::{self, File};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::Level;
use tracing_appender::non_blocking::{self, WorkerGuard};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::{LoggingConfig, ResolvedOutputs};

/// Keeps the background log writer alive; dropping it flushes the file.
pub struct LoggingGuard {
    _guard: WorkerGuard,
    pub telemetry_path: PathBuf,
}

/// Where `telemetry.jsonl` is written: next to the summary.
pub fn telemetry_path(outputs: &ResolvedOutputs) -> PathBuf {
    outputs
        .summary_md
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
        .join("telemetry.jsonl")
}

pub fn init_logging(logging: &LoggingConfig, outputs: &ResolvedOutputs) -> Result<Option<LoggingGuard>> {
    if !logging.enable_structured {
        return Ok(None);
    }

    let path = telemetry_path(outputs);
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).with_context(|| format!("mkdir {}", dir.display()))?;
    }
    let file = File::create(&path).with_context(|| format!("open {} for telemetry", path.display()))?;
    let (writer, guard) = non_blocking::NonBlockingBuilder::default().lossy(false).finish(file);

    // RUST_LOG wins; otherwise only the trufman crates at the configured level.
    let level = logging.level().unwrap_or(Level::INFO);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("trufman_core={level},trufman_bot={level},trufman_bench={level}"))
    });

    let subscriber = fmt::Subscriber::builder()
        .json()
        .with_env_filter(filter)
        .with_span_events(FmtSpan::NONE)
        .with_current_span(false)
        .with_writer(writer)
        .finish();

    // Already set when several runs share a test process.
    let _ = tracing::subscriber::set_global_default(subscriber);

    Ok(Some(LoggingGuard {
        _guard: guard,
        telemetry_path: path,
    }))
}
