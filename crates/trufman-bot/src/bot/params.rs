/// Tunable weights for bidding and card play.
///
/// Defaults are the values the agent ships with; `from_env` lets a run
/// override the search budget and the blend weights without a rebuild.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BotParams {
    // === Bidding ===
    /// Added to each suit's trick estimate before rounding (default: 0.0)
    pub aggression: f32,

    /// Cost of bidding above the estimate, per bid (default: 0.75)
    pub overbid_penalty: f32,

    // === Card play ===
    /// Weight of the signed win probability (default: 1.2)
    pub alpha: f32,

    /// Weight of the urgency-scaled expected swing (default: 0.8)
    pub beta: f32,

    /// Scale applied to the learned feature weight (default: 0.5)
    pub learned_scale: f32,

    /// Discount on the win probability when the trick is unwanted (default: 0.6)
    pub lose_discount: f32,

    /// Sampled worlds per decision before scaling (default: 48)
    pub rollouts: usize,

    /// Upper bound on sampled worlds per decision (default: 192)
    pub rollout_ceiling: usize,

    /// Largest assignment count that is enumerated exactly (default: 4096)
    pub exact_limit: u128,

    /// Cards left in hand at or below which the end-game rules apply (default: 3)
    pub endgame_cards: usize,

    // === Learning ===
    /// Reward multiplier for tricks played in the end-game (default: 1.5)
    pub endgame_reward_scale: f32,

    /// Learned weights are clamped to `[-weight_limit, weight_limit]` (default: 4.0)
    pub weight_limit: f32,
}

impl Default for BotParams {
    fn default() -> Self {
        Self {
            aggression: 0.0,
            overbid_penalty: 0.75,
            alpha: 1.2,
            beta: 0.8,
            learned_scale: 0.5,
            lose_discount: 0.6,
            rollouts: 48,
            rollout_ceiling: 192,
            exact_limit: 4096,
            endgame_cards: 3,
            endgame_reward_scale: 1.5,
            weight_limit: 4.0,
        }
    }
}

impl BotParams {
    pub fn from_env() -> Self {
        Self::from_reader(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_reader<F>(mut read: F) -> Self
    where
        F: FnMut(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let rollouts = read("TRF_BOT_ROLLOUTS")
            .and_then(|raw| raw.trim().parse::<usize>().ok())
            .filter(|value| (1..=4096).contains(value))
            .unwrap_or(defaults.rollouts);

        let rollout_ceiling = read("TRF_BOT_ROLLOUT_CEILING")
            .and_then(|raw| raw.trim().parse::<usize>().ok())
            .filter(|value| (1..=16384).contains(value))
            .unwrap_or(defaults.rollout_ceiling)
            .max(rollouts);

        let exact_limit = read("TRF_BOT_EXACT_LIMIT")
            .and_then(|raw| raw.trim().parse::<u128>().ok())
            .filter(|value| *value <= 1_000_000)
            .unwrap_or(defaults.exact_limit);

        let aggression = read("TRF_BOT_AGGRESSION")
            .and_then(|raw| raw.trim().parse::<f32>().ok())
            .filter(|value| value.is_finite() && (-2.0..=2.0).contains(value))
            .unwrap_or(defaults.aggression);

        let alpha = read("TRF_BOT_ALPHA")
            .and_then(|raw| raw.trim().parse::<f32>().ok())
            .filter(|value| value.is_finite() && *value >= 0.0)
            .unwrap_or(defaults.alpha);

        let beta = read("TRF_BOT_BETA")
            .and_then(|raw| raw.trim().parse::<f32>().ok())
            .filter(|value| value.is_finite() && *value >= 0.0)
            .unwrap_or(defaults.beta);

        Self {
            aggression,
            rollouts,
            rollout_ceiling,
            exact_limit,
            alpha,
            beta,
            ..defaults
        }
    }
}
