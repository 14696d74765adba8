//! Environment contract consumed by the swarm.

use crate::error::{FractalError, Result};
use crate::states::{Column, DType, FieldSpec, Schema, States};

/// Observation attribute of an environment state batch.
pub const OBSERVS: &str = "observs";
/// Per-walker reward produced by the last transition.
pub const REWARDS: &str = "rewards";
/// Per-walker terminal flag.
pub const ENDS: &str = "ends";

/// Minimal schema every environment state batch carries.
#[must_use]
pub fn env_schema(observation_shape: &[usize]) -> Schema {
    Schema::new()
        .with(
            OBSERVS,
            FieldSpec {
                shape: observation_shape.to_vec(),
                dtype: DType::F64,
            },
        )
        .with(REWARDS, FieldSpec::scalar(DType::F64))
        .with(ENDS, FieldSpec::scalar(DType::Bool))
}

/// Check that `states` exposes observations, rewards and terminal flags for `batch_size` walkers.
pub fn validate_env_states(states: &States, batch_size: usize) -> Result<()> {
    if states.batch_size() != batch_size {
        return Err(FractalError::ShapeMismatch(format!(
            "environment returned {} walkers, expected {batch_size}",
            states.batch_size()
        )));
    }
    let observs = states.get(OBSERVS)?;
    if observs.dtype() != DType::F64 {
        return Err(FractalError::ShapeMismatch(format!(
            "`{OBSERVS}` must hold f64 values, found {:?}",
            observs.dtype()
        )));
    }
    let rewards = states.get(REWARDS)?;
    if rewards.dtype() != DType::F64 || rewards.row_len() != 1 {
        return Err(FractalError::ShapeMismatch(format!(
            "`{REWARDS}` must be one f64 per walker"
        )));
    }
    let ends = states.get(ENDS)?;
    if ends.dtype() != DType::Bool || ends.row_len() != 1 {
        return Err(FractalError::ShapeMismatch(format!(
            "`{ENDS}` must be one flag per walker"
        )));
    }
    Ok(())
}

/// Transition function explored by the walkers.
///
/// `step` must not mutate the states it receives: it returns a new batch with
/// the same number of walkers in the same order.
pub trait Environment {
    /// Produce `batch_size` copies of the initial state.
    fn reset(&mut self, batch_size: usize) -> Result<States>;

    /// Apply one action per walker.
    fn step(&self, actions: &Column, states: &States) -> Result<States>;

    /// Apply `step` repeatedly so that walker `i` advances exactly `dt[i]` times.
    fn step_repeated(&self, actions: &Column, states: &States, dt: &[usize]) -> Result<States> {
        let batch_size = states.batch_size();
        if dt.len() != batch_size || actions.batch_size() != batch_size {
            return Err(FractalError::ShapeMismatch(format!(
                "{} actions and {} step counts cannot drive {batch_size} walkers",
                actions.batch_size(),
                dt.len()
            )));
        }
        let mut current = states.clone();
        let rounds = dt.iter().copied().max().unwrap_or(0);
        for round in 0..rounds {
            let stepped = self.step(actions, &current)?;
            validate_env_states(&stepped, batch_size)?;
            let active: Vec<bool> = dt.iter().map(|&steps| steps > round).collect();
            if active.iter().all(|&flag| flag) {
                current = stepped;
            } else {
                current.merge_rows(&active, &stepped)?;
            }
        }
        Ok(current)
    }

    /// Rebuild internal state so that subsequent steps continue from `states`.
    fn reset_from(&mut self, states: &States) -> Result<States> {
        let _ = states;
        Err(FractalError::NotImplemented {
            component: "environment",
            operation: "reset_from",
        })
    }
}
