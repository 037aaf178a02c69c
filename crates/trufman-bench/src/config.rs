use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::Level;
use trufman_bot::BotParams;
use trufman_bot::memory::DEFAULT_NAMESPACE;
use trufman_core::model::player::PlayerPosition;

const MAX_ROUNDS: usize = 10_000;
const REVEAL_DELAY_RANGE_MS: (u64, u64) = (400, 2_000);
const THINK_DELAY_RANGE_MS: (u64, u64) = (200, 1_200);

/// Root match configuration loaded from YAML.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct MatchConfig {
    pub run_id: String,
    #[serde(rename = "match")]
    pub schedule: ScheduleConfig,
    pub seats: Vec<SeatConfig>,
    #[serde(default)]
    pub pacing: PacingConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
    pub outputs: OutputsConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl MatchConfig {
    /// Reads, parses and validates `path`.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let location = path.as_ref().to_path_buf();
        let file = match File::open(&location) {
            Ok(file) => file,
            Err(source) => return Err(ConfigError::Read { path: location, source }),
        };
        let mut config: MatchConfig = match serde_yaml::from_reader(BufReader::new(file)) {
            Ok(config) => config,
            Err(source) => return Err(ConfigError::Parse { path: location, source }),
        };
        if let Err(source) = config.validate() {
            return Err(ConfigError::Invalid { path: location, source });
        }
        Ok(config)
    }

    /// Checks every section; fills in a blank tracing level.
    pub fn validate(&mut self) -> Result<(), ValidationError> {
        check_identifier("run_id", &self.run_id)?;
        self.schedule.validate()?;
        validate_seats(&self.seats)?;
        self.pacing.validate()?;
        self.memory.validate()?;
        self.outputs.validate()?;
        self.metrics.validate(&self.seats)?;
        self.logging.normalize();
        Ok(())
    }

    /// Output and memory paths with `{run_id}` substituted.
    pub fn resolved_outputs(&self) -> ResolvedOutputs {
        ResolvedOutputs {
            jsonl: self.expand(&self.outputs.jsonl),
            summary_md: self.expand(&self.outputs.summary_md),
            snapshot_json: self.outputs.snapshot_json.as_deref().map(|path| self.expand(path)),
            memory_dir: self.memory.enabled.then(|| self.expand(&self.memory.dir)),
        }
    }

    fn expand(&self, template: &str) -> PathBuf {
        PathBuf::from(template.replace("{run_id}", &self.run_id))
    }
}

/// How many rounds to play and from which deal.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ScheduleConfig {
    #[serde(default)]
    pub seed: u64,
    pub rounds: usize,
    #[serde(default = "default_dealer")]
    pub dealer: PlayerPosition,
}

impl ScheduleConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.rounds == 0 {
            return Err(ValidationError::InvalidField {
                field: "match.rounds".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.rounds > MAX_ROUNDS {
            return Err(ValidationError::InvalidField {
                field: "match.rounds".to_string(),
                message: format!("must not exceed {MAX_ROUNDS}"),
            });
        }
        Ok(())
    }
}

fn default_dealer() -> PlayerPosition {
    PlayerPosition::West
}

/// One seat at the table, listed in seat order starting with North.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct SeatConfig {
    pub name: String,
    pub kind: AgentKind,
    #[serde(default)]
    pub params: SeatParams,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    Learning,
    Baseline,
}

impl AgentKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            AgentKind::Learning => "learning",
            AgentKind::Baseline => "baseline",
        }
    }
}

/// Overrides applied on top of [`BotParams::from_env`] for a learning seat.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct SeatParams {
    pub rollouts: Option<usize>,
    pub rollout_ceiling: Option<usize>,
    pub exact_limit: Option<u64>,
    pub aggression: Option<f32>,
    pub alpha: Option<f32>,
    pub beta: Option<f32>,
}

impl SeatParams {
    pub fn apply(&self, mut params: BotParams) -> BotParams {
        if let Some(rollouts) = self.rollouts {
            params.rollouts = rollouts;
            params.rollout_ceiling = params.rollout_ceiling.max(rollouts);
        }
        if let Some(ceiling) = self.rollout_ceiling {
            params.rollout_ceiling = ceiling.max(params.rollouts);
        }
        if let Some(limit) = self.exact_limit {
            params.exact_limit = u128::from(limit);
        }
        if let Some(aggression) = self.aggression {
            params.aggression = aggression;
        }
        if let Some(alpha) = self.alpha {
            params.alpha = alpha;
        }
        if let Some(beta) = self.beta {
            params.beta = beta;
        }
        params
    }

    fn validate(&self, seat: &str) -> Result<(), ValidationError> {
        let field = |name: &str| format!("seats[{seat}].params.{name}");
        if self.rollouts == Some(0) {
            return Err(ValidationError::InvalidField {
                field: field("rollouts"),
                message: "must be at least 1".to_string(),
            });
        }
        for (name, value) in [
            ("aggression", self.aggression),
            ("alpha", self.alpha),
            ("beta", self.beta),
        ] {
            if value.is_some_and(|value| !value.is_finite()) {
                return Err(ValidationError::InvalidField {
                    field: field(name),
                    message: "is not a finite number".to_string(),
                });
            }
        }
        Ok(())
    }
}

/// Delays that make a headless match watchable; zero disables each.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
pub struct PacingConfig {
    #[serde(default)]
    pub reveal_delay_ms: u64,
    #[serde(default)]
    pub think_delay_ms: u64,
}

impl PacingConfig {
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn reveal_delay(&self) -> Duration {
        Duration::from_millis(self.reveal_delay_ms)
    }

    pub fn think_delay(&self) -> Duration {
        Duration::from_millis(self.think_delay_ms)
    }

    fn validate(&self) -> Result<(), ValidationError> {
        for (field, value, (low, high)) in [
            ("pacing.reveal_delay_ms", self.reveal_delay_ms, REVEAL_DELAY_RANGE_MS),
            ("pacing.think_delay_ms", self.think_delay_ms, THINK_DELAY_RANGE_MS),
        ] {
            if value != 0 && !(low..=high).contains(&value) {
                return Err(ValidationError::InvalidField {
                    field: field.to_string(),
                    message: format!("must be 0 or between {low} and {high} ms"),
                });
            }
        }
        Ok(())
    }
}

/// Where learning seats keep their records between runs.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct MemoryConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_memory_dir")]
    pub dir: String,
    #[serde(default = "default_namespace")]
    pub namespace: String,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            dir: default_memory_dir(),
            namespace: default_namespace(),
        }
    }
}

impl MemoryConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.namespace.trim().is_empty() {
            return Err(ValidationError::InvalidField {
                field: "memory.namespace".to_string(),
                message: "is blank".to_string(),
            });
        }
        if self.enabled && self.dir.trim().is_empty() {
            return Err(ValidationError::InvalidField {
                field: "memory.dir".to_string(),
                message: "is blank while memory is enabled".to_string(),
            });
        }
        Ok(())
    }
}

fn default_memory_dir() -> String {
    "bench/memory".to_string()
}

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_string()
}

/// Path templates; `{run_id}` is substituted at run time.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct OutputsConfig {
    pub jsonl: String,
    pub summary_md: String,
    #[serde(default)]
    pub snapshot_json: Option<String>,
}

impl OutputsConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        let snapshot = self.snapshot_json.as_deref().map(|path| ("outputs.snapshot_json", path));
        [("outputs.jsonl", self.jsonl.as_str()), ("outputs.summary_md", self.summary_md.as_str())]
            .into_iter()
            .chain(snapshot)
            .find(|(_, path)| path.trim().is_empty())
            .map_or(Ok(()), |(field, _)| {
                Err(ValidationError::InvalidField {
                    field: field.to_string(),
                    message: "is blank".to_string(),
                })
            })
    }
}

/// Which seat the others are compared against in the summary.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct MetricsConfig {
    #[serde(default)]
    pub baseline: Option<String>,
}

impl MetricsConfig {
    fn validate(&self, seats: &[SeatConfig]) -> Result<(), ValidationError> {
        match &self.baseline {
            Some(name) if !seats.iter().any(|seat| &seat.name == name) => {
                Err(ValidationError::InvalidField {
                    field: "metrics.baseline".to_string(),
                    message: format!("names '{name}', which is not a seat"),
                })
            }
            _ => Ok(()),
        }
    }
}

/// Structured telemetry is off unless enabled.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct LoggingConfig {
    #[serde(default)]
    pub enable_structured: bool,
    #[serde(default)]
    pub tracing_level: String,
}

impl LoggingConfig {
    fn normalize(&mut self) {
        if self.tracing_level.trim().is_empty() {
            self.tracing_level = "info".to_string();
        }
    }

    /// `None` for an unrecognised name; callers fall back to INFO.
    pub fn level(&self) -> Option<Level> {
        self.tracing_level.trim().parse().ok()
    }
}

/// Names double as file names and JSONL values, so keep them to `[A-Za-z0-9._-]`.
fn check_identifier(field: &str, value: &str) -> Result<(), ValidationError> {
    let message = if value.trim().is_empty() {
        "is blank"
    } else if !value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
    {
        "allows only letters, digits, '.', '_' and '-'"
    } else {
        return Ok(());
    };
    Err(ValidationError::InvalidField {
        field: field.to_string(),
        message: message.to_string(),
    })
}

fn validate_seats(seats: &[SeatConfig]) -> Result<(), ValidationError> {
    if seats.len() != 4 {
        return Err(ValidationError::InvalidField {
            field: "seats".to_string(),
            message: format!("lists {} seats instead of 4", seats.len()),
        });
    }

    let mut names = HashSet::new();
    for (index, seat) in seats.iter().enumerate() {
        check_identifier(&format!("seats[{index}].name"), &seat.name)?;
        if !names.insert(seat.name.as_str()) {
            return Err(ValidationError::InvalidField {
                field: "seats".to_string(),
                message: format!("name '{}' is used twice", seat.name),
            });
        }

        seat.params.validate(&seat.name)?;
    }

    Ok(())
}

/// Concrete paths for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedOutputs {
    pub jsonl: PathBuf,
    pub summary_md: PathBuf,
    pub snapshot_json: Option<PathBuf>,
    /// `None` when persistence is disabled.
    pub memory_dir: Option<PathBuf>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot open {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{} is not a valid match file: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("{}: {source}", path.display())]
    Invalid {
        path: PathBuf,
        #[source]
        source: ValidationError,
    },
}

/// A rejected field, named by its YAML path (`match.rounds`, `seats[2].name`).
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("{field} {message}")]
    InvalidField { field: String, message: String },
}
