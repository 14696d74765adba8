//! Policy contract: chooses actions and how long to hold them.

use crate::error::Result;
use crate::states::{Column, States};
use crate::walkers::WalkersStates;

/// Action-sampling policy driving the walkers.
///
/// Implementations may keep their own randomness, hence `&mut self`; they must
/// still leave the states they receive untouched and return new containers.
pub trait Model {
    /// Produce initial model states for `batch_size` walkers.
    fn reset(&mut self, batch_size: usize) -> Result<States>;

    /// Sample one action per walker.
    fn predict(
        &mut self,
        model_states: &States,
        env_states: &States,
        walkers_states: &WalkersStates,
    ) -> Result<(Column, States)>;

    /// Number of environment applications each action is held for.
    fn calculate_dt(
        &mut self,
        model_states: &States,
        env_states: &States,
        walkers_states: &WalkersStates,
    ) -> Result<(Vec<usize>, States)>;
}
