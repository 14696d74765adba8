//! Reference environments for the Fractal Monte Carlo swarm.
//!
//! [`FunctionEnv`] turns a scalar objective over a box in `R^d` into an
//! [`Environment`]: each action is a displacement, the reward is the objective
//! at the new point, and leaving the box is terminal.

use std::f64::consts::TAU;
use std::fmt;
use std::sync::Arc;

use fractal_core::{
    Column, DType, ENDS, Environment, FractalError, OBSERVS, REWARDS, Result, Schema, States,
    env_schema, validate_env_states,
};
use rand::{Rng, SeedableRng, rngs::SmallRng};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors emitted by the reference environments.
#[derive(Debug, Error)]
pub enum EnvError {
    /// Indicates configuration values that cannot be used (e.g., an empty box).
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
    /// A point or action whose length disagrees with the environment dimension.
    #[error("expected {expected} components per walker, found {found}")]
    DimensionMismatch { expected: usize, found: usize },
    /// Actions must be continuous displacements.
    #[error("unsupported action dtype {0:?}")]
    UnsupportedActions(DType),
}

impl From<EnvError> for FractalError {
    fn from(err: EnvError) -> Self {
        FractalError::collaborator("environment", err)
    }
}

/// Axis-aligned box `[low, high]` in `R^d`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    low: Vec<f64>,
    high: Vec<f64>,
}

impl Bounds {
    pub fn new(low: Vec<f64>, high: Vec<f64>) -> std::result::Result<Self, EnvError> {
        if low.is_empty() {
            return Err(EnvError::InvalidConfig("bounds need at least one dimension"));
        }
        if low.len() != high.len() {
            return Err(EnvError::DimensionMismatch {
                expected: low.len(),
                found: high.len(),
            });
        }
        if low
            .iter()
            .zip(&high)
            .any(|(lo, hi)| !(lo.is_finite() && hi.is_finite() && lo < hi))
        {
            return Err(EnvError::InvalidConfig(
                "every bound must be finite with low < high",
            ));
        }
        Ok(Self { low, high })
    }

    /// The cube `[low, high]^dim`.
    pub fn cube(dim: usize, low: f64, high: f64) -> std::result::Result<Self, EnvError> {
        Self::new(vec![low; dim], vec![high; dim])
    }

    #[must_use]
    pub fn dim(&self) -> usize {
        self.low.len()
    }

    #[must_use]
    pub fn low(&self) -> &[f64] {
        &self.low
    }

    #[must_use]
    pub fn high(&self) -> &[f64] {
        &self.high
    }

    #[must_use]
    pub fn contains(&self, point: &[f64]) -> bool {
        point.len() == self.dim()
            && point
                .iter()
                .zip(self.low.iter().zip(&self.high))
                .all(|(x, (lo, hi))| (lo..=hi).contains(&x))
    }

    /// Uniform point inside the box.
    pub fn sample(&self, rng: &mut impl Rng) -> Vec<f64> {
        self.low
            .iter()
            .zip(&self.high)
            .map(|(&lo, &hi)| rng.random_range(lo..hi))
            .collect()
    }
}

/// Objective evaluated at each walker's position.
pub type Objective = Arc<dyn Fn(&[f64]) -> f64 + Send + Sync>;

/// Sum of squares; minimum 0 at the origin.
#[must_use]
pub fn sphere(point: &[f64]) -> f64 {
    point.iter().map(|x| x * x).sum()
}

/// Rastrigin function; minimum 0 at the origin, many local minima.
#[must_use]
pub fn rastrigin(point: &[f64]) -> f64 {
    10.0 * point.len() as f64
        + point
            .iter()
            .map(|x| x * x - 10.0 * (TAU * x).cos())
            .sum::<f64>()
}

/// Continuous optimisation over a box.
#[derive(Clone)]
pub struct FunctionEnv {
    name: &'static str,
    bounds: Bounds,
    objective: Objective,
    start: Option<Vec<f64>>,
    rng: SmallRng,
}

impl fmt::Debug for FunctionEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionEnv")
            .field("name", &self.name)
            .field("bounds", &self.bounds)
            .field("start", &self.start)
            .finish_non_exhaustive()
    }
}

impl FunctionEnv {
    /// Wrap an arbitrary objective.
    pub fn new(
        name: &'static str,
        bounds: Bounds,
        objective: impl Fn(&[f64]) -> f64 + Send + Sync + 'static,
    ) -> Self {
        let seed: u64 = rand::random();
        Self {
            name,
            bounds,
            objective: Arc::new(objective),
            start: None,
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    /// Sum-of-squares objective. Pair with minimisation.
    pub fn sphere(bounds: Bounds) -> Self {
        Self::new("sphere", bounds, sphere)
    }

    /// Rastrigin objective. Pair with minimisation.
    pub fn rastrigin(bounds: Bounds) -> Self {
        Self::new("rastrigin", bounds, rastrigin)
    }

    /// `-|x - target|^2`, maximised at `target`.
    pub fn negative_squared_distance(
        bounds: Bounds,
        target: Vec<f64>,
    ) -> std::result::Result<Self, EnvError> {
        if target.len() != bounds.dim() {
            return Err(EnvError::DimensionMismatch {
                expected: bounds.dim(),
                found: target.len(),
            });
        }
        Ok(Self::new("negative_squared_distance", bounds, move |point| {
            -point
                .iter()
                .zip(&target)
                .map(|(x, t)| (x - t).powi(2))
                .sum::<f64>()
        }))
    }

    /// Start every walker at `point` instead of a random point in the box.
    pub fn with_start(mut self, point: Vec<f64>) -> std::result::Result<Self, EnvError> {
        if point.len() != self.bounds.dim() {
            return Err(EnvError::DimensionMismatch {
                expected: self.bounds.dim(),
                found: point.len(),
            });
        }
        self.start = Some(point);
        Ok(self)
    }

    /// Reseed the start-point sampler.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = SmallRng::seed_from_u64(seed);
        self
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    #[must_use]
    pub fn bounds(&self) -> &Bounds {
        &self.bounds
    }

    #[must_use]
    pub fn dim(&self) -> usize {
        self.bounds.dim()
    }

    /// Objective value at `point`.
    #[must_use]
    pub fn evaluate(&self, point: &[f64]) -> f64 {
        (self.objective)(point)
    }

    /// Recompute rewards and terminal flags from the observations.
    fn score(&self, observs: Vec<f64>, batch_size: usize) -> Result<States> {
        let dim = self.dim();
        let (rewards, ends): (Vec<f64>, Vec<bool>) = observs
            .chunks_exact(dim)
            .map(|point| (self.evaluate(point), !self.bounds.contains(point)))
            .unzip();
        States::from_columns(
            batch_size,
            [
                (OBSERVS, Column::from_f64(vec![dim], observs)?),
                (REWARDS, Column::scalar_f64(rewards)),
                (ENDS, Column::scalar_bool(ends)),
            ],
        )
    }

    fn check_rows(&self, found: usize) -> Result<()> {
        if found != self.dim() {
            return Err(EnvError::DimensionMismatch {
                expected: self.dim(),
                found,
            }
            .into());
        }
        Ok(())
    }
}

impl Environment for FunctionEnv {
    fn reset(&mut self, batch_size: usize) -> Result<States> {
        let start = match &self.start {
            Some(point) => point.clone(),
            None => self.bounds.sample(&mut self.rng),
        };
        self.score(start.repeat(batch_size), batch_size)
    }

    fn step(&self, actions: &Column, states: &States) -> Result<States> {
        let batch_size = states.batch_size();
        if actions.dtype() != DType::F64 {
            return Err(EnvError::UnsupportedActions(actions.dtype()).into());
        }
        self.check_rows(actions.row_len())?;
        if actions.batch_size() != batch_size {
            return Err(FractalError::ShapeMismatch(format!(
                "{} actions for {batch_size} walkers",
                actions.batch_size()
            )));
        }
        let observs = states.get(OBSERVS)?;
        self.check_rows(observs.row_len())?;
        let moved: Vec<f64> = observs
            .as_f64()?
            .iter()
            .zip(actions.as_f64()?)
            .map(|(x, dx)| x + dx)
            .collect();
        self.score(moved, batch_size)
    }

    fn reset_from(&mut self, states: &States) -> Result<States> {
        validate_env_states(states, states.batch_size())?;
        let observs = states.get(OBSERVS)?;
        self.check_rows(observs.row_len())?;
        self.score(observs.as_f64()?.to_vec(), states.batch_size())
    }
}

/// Observation schema produced by a [`FunctionEnv`] of dimension `dim`.
#[must_use]
pub fn function_env_schema(dim: usize) -> Schema {
    env_schema(&[dim])
}
