//! Deterministic policy repeating one action.

use fractal_core::{Column, ColumnData, FractalError, Model, Result, States, WalkersStates};

use crate::ModelKind;

/// Every walker receives the same `f64` action, held for a single step.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstantModel {
    action: Vec<f64>,
}

impl ConstantModel {
    pub const KIND: ModelKind = ModelKind::new("constant");

    pub fn new(action: Vec<f64>) -> Result<Self> {
        if action.is_empty() {
            return Err(FractalError::InvalidConfig(
                "constant action must have at least one component",
            ));
        }
        Ok(Self { action })
    }

    /// All-zero action of length `dim`.
    pub fn zeros(dim: usize) -> Result<Self> {
        Self::new(vec![0.0; dim])
    }

    #[must_use]
    pub fn action(&self) -> &[f64] {
        &self.action
    }
}

impl Model for ConstantModel {
    fn reset(&mut self, batch_size: usize) -> Result<States> {
        Ok(States::empty(batch_size))
    }

    fn predict(
        &mut self,
        model_states: &States,
        _env_states: &States,
        _walkers_states: &WalkersStates,
    ) -> Result<(Column, States)> {
        let n = model_states.batch_size();
        let values = self.action.repeat(n);
        let actions = Column::new(n, vec![self.action.len()], ColumnData::F64(values))?;
        Ok((actions, model_states.clone()))
    }

    fn calculate_dt(
        &mut self,
        model_states: &States,
        _env_states: &States,
        _walkers_states: &WalkersStates,
    ) -> Result<(Vec<usize>, States)> {
        Ok((vec![1; model_states.batch_size()], model_states.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeats_action_for_every_walker() {
        let mut model = ConstantModel::new(vec![0.25, -1.0]).expect("model");
        let states = model.reset(3).expect("reset");
        let walkers = WalkersStates::fresh(0, &[0.0; 3], &[false; 3]).expect("walkers");
        let env = States::empty(3);
        let (actions, next) = model.predict(&states, &env, &walkers).expect("predict");
        assert_eq!(actions.batch_size(), 3);
        assert_eq!(
            actions.as_f64().expect("f64"),
            &[0.25, -1.0, 0.25, -1.0, 0.25, -1.0]
        );
        assert_eq!(next, states);
        let (dt, _) = model.calculate_dt(&states, &env, &walkers).expect("dt");
        assert_eq!(dt, vec![1, 1, 1]);
    }

    #[test]
    fn empty_action_is_rejected() {
        assert!(ConstantModel::new(Vec::new()).is_err());
    }
}
