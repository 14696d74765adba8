//! Reference policies for the Fractal Monte Carlo swarm.

use fractal_core::{FractalError, Result};
use rand::{SeedableRng, rngs::SmallRng};
use serde::{Deserialize, Serialize};
use std::fmt;

pub mod constant;
pub mod random;

pub use constant::ConstantModel;
pub use random::{
    ContinuousConfig, DiscreteConfig, DiscreteUniformModel, RandomContinuousModel,
};

/// Model-state attribute holding the last sampled actions.
pub const ACTIONS: &str = "actions";
/// Model-state attribute holding the last sampled step counts.
pub const DT: &str = "dt";

/// Stable identifier for a model family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModelKind(&'static str);

impl ModelKind {
    #[must_use]
    pub const fn new(name: &'static str) -> Self {
        Self(name)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        self.0
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// Inclusive range of environment applications per action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DtRange {
    pub min_dt: usize,
    pub max_dt: usize,
}

impl Default for DtRange {
    fn default() -> Self {
        Self {
            min_dt: 1,
            max_dt: 1,
        }
    }
}

impl DtRange {
    pub fn validate(&self) -> Result<()> {
        if self.min_dt > self.max_dt {
            return Err(FractalError::InvalidConfig("min_dt must not exceed max_dt"));
        }
        Ok(())
    }
}

fn seeded_rng(seed: Option<u64>) -> SmallRng {
    match seed {
        Some(seed) => SmallRng::seed_from_u64(seed),
        None => {
            let seed: u64 = rand::random();
            SmallRng::seed_from_u64(seed)
        }
    }
}
