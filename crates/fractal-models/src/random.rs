//! Uniformly random policies.

use fractal_core::{
    Column, DType, FieldSpec, FractalError, Model, Result, Schema, States, WalkersStates,
};
use rand::{Rng, rngs::SmallRng};
use serde::{Deserialize, Serialize};

use crate::{ACTIONS, DT, DtRange, ModelKind, seeded_rng};

fn sample_dt(rng: &mut SmallRng, range: DtRange, batch_size: usize) -> Vec<usize> {
    (0..batch_size)
        .map(|_| rng.random_range(range.min_dt..=range.max_dt))
        .collect()
}

fn with_dt(model_states: &States, dt: &[usize]) -> Result<States> {
    let mut next = model_states.clone();
    let values = dt.iter().map(|&steps| steps as u64).collect();
    next.set(DT, Column::from_u64(Vec::new(), values)?)?;
    Ok(next)
}

/// Settings for [`RandomContinuousModel`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContinuousConfig {
    /// Length of each action vector.
    pub dim: usize,
    pub low: f64,
    pub high: f64,
    pub dt: DtRange,
    pub rng_seed: Option<u64>,
}

impl Default for ContinuousConfig {
    fn default() -> Self {
        Self {
            dim: 2,
            low: -1.0,
            high: 1.0,
            dt: DtRange::default(),
            rng_seed: None,
        }
    }
}

impl ContinuousConfig {
    pub fn validate(&self) -> Result<()> {
        if self.dim == 0 {
            return Err(FractalError::InvalidConfig("action dim must be at least 1"));
        }
        if !(self.low.is_finite() && self.high.is_finite() && self.low <= self.high) {
            return Err(FractalError::InvalidConfig(
                "action bounds must be finite with low <= high",
            ));
        }
        self.dt.validate()
    }
}

/// Samples each action component uniformly from `[low, high]`.
#[derive(Debug, Clone)]
pub struct RandomContinuousModel {
    config: ContinuousConfig,
    rng: SmallRng,
}

impl RandomContinuousModel {
    pub const KIND: ModelKind = ModelKind::new("random.continuous");

    pub fn new(config: ContinuousConfig) -> Result<Self> {
        config.validate()?;
        let rng = seeded_rng(config.rng_seed);
        Ok(Self { config, rng })
    }

    #[must_use]
    pub fn config(&self) -> &ContinuousConfig {
        &self.config
    }

    fn schema(&self) -> Schema {
        Schema::new()
            .with(ACTIONS, FieldSpec::vector(self.config.dim, DType::F64))
            .with(DT, FieldSpec::scalar(DType::U64))
    }
}

impl Model for RandomContinuousModel {
    fn reset(&mut self, batch_size: usize) -> Result<States> {
        Ok(States::from_schema(batch_size, &self.schema()))
    }

    fn predict(
        &mut self,
        model_states: &States,
        _env_states: &States,
        _walkers_states: &WalkersStates,
    ) -> Result<(Column, States)> {
        let (low, high) = (self.config.low, self.config.high);
        let values = (0..model_states.batch_size() * self.config.dim)
            .map(|_| {
                if low == high {
                    low
                } else {
                    self.rng.random_range(low..=high)
                }
            })
            .collect();
        let actions = Column::from_f64(vec![self.config.dim], values)?;
        let mut next = model_states.clone();
        next.set(ACTIONS, actions.clone())?;
        Ok((actions, next))
    }

    fn calculate_dt(
        &mut self,
        model_states: &States,
        _env_states: &States,
        _walkers_states: &WalkersStates,
    ) -> Result<(Vec<usize>, States)> {
        let dt = sample_dt(&mut self.rng, self.config.dt, model_states.batch_size());
        let next = with_dt(model_states, &dt)?;
        Ok((dt, next))
    }
}

/// Settings for [`DiscreteUniformModel`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscreteConfig {
    /// Actions are drawn from `0..n_actions`.
    pub n_actions: i64,
    pub dt: DtRange,
    pub rng_seed: Option<u64>,
}

impl Default for DiscreteConfig {
    fn default() -> Self {
        Self {
            n_actions: 2,
            dt: DtRange::default(),
            rng_seed: None,
        }
    }
}

impl DiscreteConfig {
    pub fn validate(&self) -> Result<()> {
        if self.n_actions <= 0 {
            return Err(FractalError::InvalidConfig("n_actions must be positive"));
        }
        self.dt.validate()
    }
}

/// Picks one of `n_actions` integer actions uniformly per walker.
#[derive(Debug, Clone)]
pub struct DiscreteUniformModel {
    config: DiscreteConfig,
    rng: SmallRng,
}

impl DiscreteUniformModel {
    pub const KIND: ModelKind = ModelKind::new("random.discrete");

    pub fn new(config: DiscreteConfig) -> Result<Self> {
        config.validate()?;
        let rng = seeded_rng(config.rng_seed);
        Ok(Self { config, rng })
    }

    #[must_use]
    pub fn n_actions(&self) -> i64 {
        self.config.n_actions
    }
}

impl Model for DiscreteUniformModel {
    fn reset(&mut self, batch_size: usize) -> Result<States> {
        let schema = Schema::new()
            .with(ACTIONS, FieldSpec::scalar(DType::I64))
            .with(DT, FieldSpec::scalar(DType::U64));
        Ok(States::from_schema(batch_size, &schema))
    }

    fn predict(
        &mut self,
        model_states: &States,
        _env_states: &States,
        _walkers_states: &WalkersStates,
    ) -> Result<(Column, States)> {
        let values = (0..model_states.batch_size())
            .map(|_| self.rng.random_range(0..self.config.n_actions))
            .collect();
        let actions = Column::from_i64(Vec::new(), values)?;
        let mut next = model_states.clone();
        next.set(ACTIONS, actions.clone())?;
        Ok((actions, next))
    }

    fn calculate_dt(
        &mut self,
        model_states: &States,
        _env_states: &States,
        _walkers_states: &WalkersStates,
    ) -> Result<(Vec<usize>, States)> {
        let dt = sample_dt(&mut self.rng, self.config.dt, model_states.batch_size());
        let next = with_dt(model_states, &dt)?;
        Ok((dt, next))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn walkers(n: usize) -> WalkersStates {
        WalkersStates::fresh(0, &vec![0.0; n], &vec![false; n]).expect("walkers")
    }

    #[test]
    fn continuous_actions_respect_bounds_and_shape() {
        let mut model = RandomContinuousModel::new(ContinuousConfig {
            dim: 3,
            low: -0.5,
            high: 2.0,
            dt: DtRange {
                min_dt: 1,
                max_dt: 4,
            },
            rng_seed: Some(1),
        })
        .expect("model");
        let states = model.reset(5).expect("reset");
        let env = States::empty(5);
        let (actions, next) = model.predict(&states, &env, &walkers(5)).expect("predict");
        assert_eq!(actions.batch_size(), 5);
        assert_eq!(actions.shape(), &[3]);
        assert!(
            actions
                .as_f64()
                .expect("f64")
                .iter()
                .all(|a| (-0.5..=2.0).contains(a))
        );
        assert_eq!(next.get(ACTIONS).expect("actions"), &actions);
        assert_eq!(states.f64s(ACTIONS).expect("untouched"), &[0.0; 15]);

        let (dt, next) = model
            .calculate_dt(&next, &env, &walkers(5))
            .expect("dt");
        assert!(dt.iter().all(|steps| (1..=4).contains(steps)));
        let stored: Vec<usize> = next
            .get(DT)
            .and_then(Column::as_u64)
            .expect("dt column")
            .iter()
            .map(|&steps| steps as usize)
            .collect();
        assert_eq!(stored, dt);
    }

    #[test]
    fn continuous_config_is_validated() {
        for config in [
            ContinuousConfig {
                dim: 0,
                ..ContinuousConfig::default()
            },
            ContinuousConfig {
                low: 1.0,
                high: -1.0,
                ..ContinuousConfig::default()
            },
            ContinuousConfig {
                dt: DtRange {
                    min_dt: 3,
                    max_dt: 2,
                },
                ..ContinuousConfig::default()
            },
        ] {
            assert!(matches!(
                RandomContinuousModel::new(config),
                Err(FractalError::InvalidConfig(_))
            ));
        }
    }

    #[test]
    fn seeded_models_repeat_their_samples() {
        let config = ContinuousConfig {
            rng_seed: Some(99),
            ..ContinuousConfig::default()
        };
        let mut a = RandomContinuousModel::new(config.clone()).expect("a");
        let mut b = RandomContinuousModel::new(config).expect("b");
        let states = a.reset(4).expect("reset");
        let env = States::empty(4);
        let (left, _) = a.predict(&states, &env, &walkers(4)).expect("a");
        let (right, _) = b.predict(&states, &env, &walkers(4)).expect("b");
        assert_eq!(left, right);
    }

    #[test]
    fn discrete_actions_stay_in_range() {
        let mut model = DiscreteUniformModel::new(DiscreteConfig {
            n_actions: 3,
            rng_seed: Some(5),
            ..DiscreteConfig::default()
        })
        .expect("model");
        let states = model.reset(64).expect("reset");
        let env = States::empty(64);
        let (actions, _) = model
            .predict(&states, &env, &walkers(64))
            .expect("predict");
        let values = actions.as_i64().expect("i64");
        assert_eq!(values.len(), 64);
        assert!(values.iter().all(|a| (0..3).contains(a)));
        assert!(DiscreteUniformModel::new(DiscreteConfig {
            n_actions: 0,
            ..DiscreteConfig::default()
        })
        .is_err());
    }
}
