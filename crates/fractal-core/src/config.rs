//! Swarm configuration.

use rand::{SeedableRng, rngs::SmallRng};
use serde::{Deserialize, Serialize};

use crate::error::{FractalError, Result};

/// What companion selection does when every walker is terminal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoSurvivorsPolicy {
    /// Draw companions from the whole population; every walker then clones.
    #[default]
    FallbackToAll,
    /// Abort the generation with [`FractalError::NoSurvivors`].
    Fail,
}

/// Static configuration for a swarm run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SwarmConfig {
    /// Number of walkers in the population.
    pub n_walkers: usize,
    /// Exponent applied to the normalised reward (exploitation).
    pub reward_scale: f64,
    /// Exponent applied to the normalised distance (exploration).
    pub dist_scale: f64,
    /// Add each step's reward to the running total instead of replacing it.
    pub accumulate_rewards: bool,
    /// Favour lower cumulative rewards.
    pub minimize: bool,
    /// Lower bound on the denominator of the clone probability.
    pub clone_eps: f64,
    /// Stop after this many generations.
    pub max_iters: Option<u64>,
    /// Stop when the best reward has not improved for this many generations.
    pub patience: Option<u64>,
    /// Stop when every pair of observations lies within this distance of each other.
    pub convergence_tol: Option<f64>,
    /// Stop once the best reward reaches this value.
    pub reward_limit: Option<f64>,
    /// Behaviour when no alive walker is left.
    pub no_survivors: NoSurvivorsPolicy,
    /// Hard ceiling on driver epochs.
    pub max_epochs: u64,
    /// Optional RNG seed for reproducible runs.
    pub rng_seed: Option<u64>,
    /// Maximum number of recent epoch summaries retained in-memory.
    pub history_capacity: usize,
    /// Free-form settings forwarded to environment and model factories.
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Default for SwarmConfig {
    fn default() -> Self {
        Self {
            n_walkers: 100,
            reward_scale: 1.0,
            dist_scale: 1.0,
            accumulate_rewards: true,
            minimize: false,
            clone_eps: 1e-8,
            max_iters: None,
            patience: None,
            convergence_tol: None,
            reward_limit: None,
            no_survivors: NoSurvivorsPolicy::default(),
            max_epochs: 1_000,
            rng_seed: None,
            history_capacity: 256,
            extra: serde_json::Map::new(),
        }
    }
}

impl SwarmConfig {
    /// Config with `n_walkers` walkers and defaults elsewhere.
    #[must_use]
    pub fn with_walkers(n_walkers: usize) -> Self {
        Self {
            n_walkers,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.n_walkers == 0 {
            return Err(FractalError::InvalidConfig(
                "n_walkers must be at least 1",
            ));
        }
        if !self.reward_scale.is_finite()
            || !self.dist_scale.is_finite()
            || self.reward_scale < 0.0
            || self.dist_scale < 0.0
        {
            return Err(FractalError::InvalidConfig(
                "reward_scale and dist_scale must be finite and non-negative",
            ));
        }
        if !(self.clone_eps > 0.0 && self.clone_eps.is_finite()) {
            return Err(FractalError::InvalidConfig("clone_eps must be positive"));
        }
        if self.max_epochs == 0 {
            return Err(FractalError::InvalidConfig("max_epochs must be positive"));
        }
        if self.convergence_tol.is_some_and(|tol| !(tol >= 0.0)) {
            return Err(FractalError::InvalidConfig(
                "convergence_tol must be non-negative",
            ));
        }
        if self.reward_limit.is_some_and(f64::is_nan) {
            return Err(FractalError::InvalidConfig("reward_limit must not be NaN"));
        }
        if self.history_capacity == 0 {
            return Err(FractalError::InvalidConfig(
                "history_capacity must be positive",
            ));
        }
        Ok(())
    }

    /// Read a typed value from [`SwarmConfig::extra`].
    pub fn extra_value<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.extra
            .get(key)
            .and_then(|value| serde_json::from_value(value.clone()).ok())
    }

    pub(crate) fn seeded_rng(&self) -> SmallRng {
        match self.rng_seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => {
                let seed: u64 = rand::random();
                SmallRng::seed_from_u64(seed)
            }
        }
    }
}
