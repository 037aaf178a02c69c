use std::fs;
use std::path::Path;

use serde::Serialize;
use statrs::distribution::{ContinuousCDF, Normal};
use thiserror::Error;

use crate::config::{AgentKind, MatchConfig};
use crate::runner::RoundOutcome;

/// Two-sided 95% normal quantile.
const Z_95: f64 = 1.96;

#[derive(Debug, Error)]
pub enum AnalyticsError {
    #[error("seat '{0}' reported in results but missing from configuration")]
    UnknownSeat(String),
    #[error("{context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
}

/// Folds round outcomes into per-seat statistics.
pub struct AnalyticsCollector {
    baseline: Option<String>,
    seats: Vec<SeatAccumulator>,
}

impl AnalyticsCollector {
    pub fn new(config: &MatchConfig) -> Self {
        Self {
            baseline: config.metrics.baseline.clone(),
            seats: config
                .seats
                .iter()
                .map(|seat| SeatAccumulator::new(seat.name.clone(), seat.kind))
                .collect(),
        }
    }

    pub fn record_round(&mut self, outcome: &RoundOutcome) -> Result<(), AnalyticsError> {
        let baseline_delta = self.baseline.as_ref().and_then(|name| {
            outcome
                .seats
                .iter()
                .find(|seat| &seat.name == name)
                .map(|seat| f64::from(seat.delta))
        });
        let best = outcome.seats.iter().map(|seat| seat.delta).max().unwrap_or(0);

        for seat in &outcome.seats {
            let acc = self
                .seats
                .iter_mut()
                .find(|acc| acc.name == seat.name)
                .ok_or_else(|| AnalyticsError::UnknownSeat(seat.name.clone()))?;
            acc.deltas.push(f64::from(seat.delta));
            acc.total = seat.total;
            if seat.tricks == seat.target {
                acc.exact += 1;
            }
            if seat.delta == best {
                acc.round_wins += 1;
            }
            acc.decisions += u64::from(seat.metrics.decisions);
            acc.fallbacks += u64::from(seat.metrics.fallbacks);
            acc.total_ms += seat.metrics.total_ms;
            if let Some(baseline) = baseline_delta {
                acc.diffs.push(f64::from(seat.delta) - baseline);
            }
        }
        Ok(())
    }

    pub fn finalize(self) -> AnalyticsSummary {
        let baseline = self.baseline;
        let seats = self
            .seats
            .into_iter()
            .map(|acc| {
                let is_baseline = baseline.as_deref() == Some(acc.name.as_str());
                acc.into_report(is_baseline)
            })
            .collect();
        AnalyticsSummary { baseline, seats }
    }
}

struct SeatAccumulator {
    name: String,
    kind: AgentKind,
    deltas: Vec<f64>,
    diffs: Vec<f64>,
    total: i32,
    exact: usize,
    round_wins: usize,
    decisions: u64,
    fallbacks: u64,
    total_ms: f64,
}

impl SeatAccumulator {
    fn new(name: String, kind: AgentKind) -> Self {
        Self {
            name,
            kind,
            deltas: Vec::new(),
            diffs: Vec::new(),
            total: 0,
            exact: 0,
            round_wins: 0,
            decisions: 0,
            fallbacks: 0,
            total_ms: 0.0,
        }
    }

    fn into_report(self, is_baseline: bool) -> SeatReport {
        let rounds = self.deltas.len();
        let avg_delta = if rounds == 0 {
            0.0
        } else {
            self.deltas.iter().sum::<f64>() / rounds as f64
        };
        let (p_value, compared) = if is_baseline || self.diffs.is_empty() {
            (1.0, 0)
        } else {
            wilcoxon_signed_rank(&self.diffs)
        };
        SeatReport {
            ci95: confidence_interval(&self.deltas),
            name: self.name,
            kind: self.kind,
            rounds,
            total: self.total,
            avg_delta,
            exact_rate: ratio(self.exact as f64, rounds as f64),
            round_wins: self.round_wins,
            fallbacks: self.fallbacks,
            average_ms_per_decision: ratio(self.total_ms, self.decisions as f64),
            p_value,
            compared,
        }
    }
}

fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        0.0
    } else {
        numerator / denominator
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SeatReport {
    pub name: String,
    pub kind: AgentKind,
    pub rounds: usize,
    pub total: i32,
    pub avg_delta: f64,
    pub ci95: (f64, f64),
    pub exact_rate: f64,
    pub round_wins: usize,
    pub fallbacks: u64,
    pub average_ms_per_decision: f64,
    /// Against the baseline seat; 1.0 when there is nothing to compare.
    pub p_value: f64,
    pub compared: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalyticsSummary {
    pub baseline: Option<String>,
    pub seats: Vec<SeatReport>,
}

impl AnalyticsSummary {
    /// Seats by total score descending.
    pub fn leaderboard(&self) -> Vec<&SeatReport> {
        let mut rows: Vec<&SeatReport> = self.seats.iter().collect();
        rows.sort_by(|a, b| b.total.cmp(&a.total));
        rows
    }

    pub fn to_markdown(&self) -> String {
        let mut rows = String::new();
        rows.push_str("# Match Summary\n\n");
        if let Some(baseline) = &self.baseline {
            rows.push_str(&format!("Baseline seat: {baseline}\n\n"));
        }
        rows.push_str("| Seat | Kind | Rounds | Total | Avg Δ | 95% CI | Exact % | Round wins | Fallbacks | Avg ms/decision | p-value |\n");
        rows.push_str("|------|------|--------|-------|-------|--------|---------|------------|-----------|-----------------|---------|\n");
        for seat in self.leaderboard() {
            rows.push_str(&format!(
                "| {name} | {kind} | {rounds} | {total} | {avg:+.3} | [{low:.3}, {high:.3}] | {exact:.1}% | {wins} | {fallbacks} | {latency:.2} | {pval:.3} |\n",
                name = seat.name,
                kind = seat.kind.as_str(),
                rounds = seat.rounds,
                total = seat.total,
                avg = seat.avg_delta,
                low = seat.ci95.0,
                high = seat.ci95.1,
                exact = seat.exact_rate * 100.0,
                wins = seat.round_wins,
                fallbacks = seat.fallbacks,
                latency = seat.average_ms_per_decision,
                pval = seat.p_value,
            ));
        }
        rows
    }

    pub fn write_markdown(&self, path: impl AsRef<Path>) -> Result<(), AnalyticsError> {
        fs::write(path.as_ref(), self.to_markdown()).map_err(|source| AnalyticsError::Io {
            context: "summary table",
            source,
        })
    }
}

/// Two-sided p-value of the paired differences, normal approximation with tie correction.
fn wilcoxon_signed_rank(diffs: &[f64]) -> (f64, usize) {
    let mut paired: Vec<(f64, f64)> = diffs
        .iter()
        .filter(|diff| diff.abs() > f64::EPSILON)
        .map(|diff| (diff.abs(), diff.signum()))
        .collect();
    let n = paired.len();
    if n == 0 {
        return (1.0, 0);
    }
    paired.sort_by(|a, b| a.0.total_cmp(&b.0));

    let mut w_plus = 0.0;
    let mut tie_adjustment = 0.0;
    let mut start = 0;
    while start < n {
        let mut end = start;
        while end + 1 < n && (paired[end + 1].0 - paired[start].0).abs() < 1e-12 {
            end += 1;
        }
        let rank = (start + end + 2) as f64 / 2.0;
        w_plus += paired[start..=end]
            .iter()
            .filter(|(_, sign)| *sign > 0.0)
            .count() as f64
            * rank;
        let ties = (end - start + 1) as f64;
        if ties > 1.0 {
            tie_adjustment += (ties.powi(3) - ties) / 48.0;
        }
        start = end + 1;
    }

    let n_f = n as f64;
    let w_minus = n_f * (n_f + 1.0) / 2.0 - w_plus;
    let w = f64::min(w_plus, w_minus);
    let mean = n_f * (n_f + 1.0) / 4.0;
    let variance = n_f * (n_f + 1.0) * (2.0 * n_f + 1.0) / 24.0 - tie_adjustment;
    if variance <= 0.0 {
        return (1.0, n);
    }

    let z = ((w - mean).abs() - 0.5).max(0.0) / variance.sqrt();
    let Ok(normal) = Normal::new(0.0, 1.0) else {
        return (1.0, n);
    };
    let p = 2.0 * (1.0 - normal.cdf(z));
    (p.clamp(0.0, 1.0), n)
}

fn confidence_interval(points: &[f64]) -> (f64, f64) {
    if points.is_empty() {
        return (0.0, 0.0);
    }
    let mean = points.iter().sum::<f64>() / points.len() as f64;
    if points.len() == 1 {
        return (mean, mean);
    }
    let variance = points
        .iter()
        .map(|value| (value - mean).powi(2))
        .sum::<f64>()
        / (points.len() as f64 - 1.0);
    let margin = Z_95 * (variance / points.len() as f64).sqrt();
    (mean - margin, mean + margin)
}
