//! Driver loop alternating environment steps with walker balancing.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::SwarmConfig;
use crate::env::Environment;
use crate::error::{FractalError, Result};
use crate::model::Model;
use crate::states::{BatchState, States};
use crate::walkers::{BestWalker, StopReason, Walkers, WalkersStates};

/// Lifecycle of a [`Swarm`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SwarmStatus {
    #[default]
    Uninitialized,
    Reset,
    Running,
    Stopped,
}

/// Summary emitted to observers after each epoch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochSummary {
    pub epoch: u64,
    pub best_reward: Option<f64>,
    pub mean_reward: f64,
    pub alive: usize,
    pub cloned: usize,
}

/// Outcome of [`Swarm::run_swarm`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub epochs: u64,
    pub stop_reason: StopReason,
    pub best_reward: Option<f64>,
}

/// Hook invoked after every epoch.
pub trait SwarmObserver: Send {
    fn on_epoch(&mut self, summary: &EpochSummary);
}

/// No-op observer.
#[derive(Debug, Default)]
pub struct NullObserver;

impl SwarmObserver for NullObserver {
    fn on_epoch(&mut self, _summary: &EpochSummary) {}
}

/// A population of walkers bound to one environment and one model.
pub struct Swarm<E, M> {
    config: SwarmConfig,
    env: E,
    model: M,
    walkers: Walkers,
    status: SwarmStatus,
    epoch: u64,
    stop_reason: Option<StopReason>,
    history: VecDeque<EpochSummary>,
    observer: Box<dyn SwarmObserver>,
}

impl<E: Environment, M: Model> Swarm<E, M> {
    /// Build the environment, model and walkers engine from `config`.
    pub fn new(
        env_factory: impl FnOnce(&SwarmConfig) -> Result<E>,
        model_factory: impl FnOnce(&SwarmConfig) -> Result<M>,
        config: SwarmConfig,
    ) -> Result<Self> {
        Self::with_walkers(env_factory, model_factory, Walkers::new, config)
    }

    /// Like [`Swarm::new`] with a caller-supplied walkers engine.
    pub fn with_walkers(
        env_factory: impl FnOnce(&SwarmConfig) -> Result<E>,
        model_factory: impl FnOnce(&SwarmConfig) -> Result<M>,
        walkers_factory: impl FnOnce(&SwarmConfig) -> Result<Walkers>,
        config: SwarmConfig,
    ) -> Result<Self> {
        config.validate()?;
        let env = env_factory(&config)?;
        let model = model_factory(&config)?;
        let walkers = walkers_factory(&config)?;
        if walkers.n_walkers() != config.n_walkers {
            return Err(FractalError::InvalidConfig(
                "walkers engine must be sized for n_walkers",
            ));
        }
        let history_capacity = config.history_capacity;
        Ok(Self {
            config,
            env,
            model,
            walkers,
            status: SwarmStatus::Uninitialized,
            epoch: 0,
            stop_reason: None,
            history: VecDeque::with_capacity(history_capacity),
            observer: Box::new(NullObserver),
        })
    }

    /// Replace the epoch observer.
    #[must_use]
    pub fn with_observer(mut self, observer: Box<dyn SwarmObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn set_observer(&mut self, observer: Box<dyn SwarmObserver>) {
        self.observer = observer;
    }

    #[must_use]
    pub fn config(&self) -> &SwarmConfig {
        &self.config
    }

    #[must_use]
    pub fn env(&self) -> &E {
        &self.env
    }

    #[must_use]
    pub fn model(&self) -> &M {
        &self.model
    }

    #[must_use]
    pub fn walkers(&self) -> &Walkers {
        &self.walkers
    }

    #[must_use]
    pub fn status(&self) -> SwarmStatus {
        self.status
    }

    #[must_use]
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    #[must_use]
    pub fn stop_reason(&self) -> Option<StopReason> {
        self.stop_reason
    }

    /// Recent epoch summaries, oldest first.
    pub fn history(&self) -> impl Iterator<Item = &EpochSummary> {
        self.history.iter()
    }

    /// Rebuild all three containers, optionally from caller-provided states.
    pub fn reset(
        &mut self,
        model_states: Option<States>,
        env_states: Option<States>,
        walkers_states: Option<WalkersStates>,
    ) -> Result<()> {
        let n = self.config.n_walkers;
        let env_states = match env_states {
            Some(states) => self.env.reset_from(&states)?,
            None => self.env.reset(n)?,
        };
        let model_states = match model_states {
            Some(states) => states,
            None => self.model.reset(n)?,
        };
        self.walkers.reset(env_states, model_states, walkers_states)?;
        self.epoch = 0;
        self.stop_reason = None;
        self.history.clear();
        self.status = SwarmStatus::Reset;
        debug!(n_walkers = n, "swarm reset");
        Ok(())
    }

    /// One model query plus environment transition, folded into the walkers.
    pub fn step_walkers(&mut self) -> Result<()> {
        if self.status == SwarmStatus::Uninitialized {
            return Err(FractalError::Uninitialized);
        }
        let (dt, model_states) = self.model.calculate_dt(
            self.walkers.model_states(),
            self.walkers.env_states(),
            self.walkers.states(),
        )?;
        let (actions, model_states) = self.model.predict(
            &model_states,
            self.walkers.env_states(),
            self.walkers.states(),
        )?;
        let env_states = self
            .env
            .step_repeated(&actions, self.walkers.env_states(), &dt)?;
        self.walkers.update_states(env_states, model_states)
    }

    /// One selection generation over the current population.
    pub fn balance(&mut self) -> Result<usize> {
        if self.status == SwarmStatus::Uninitialized {
            return Err(FractalError::Uninitialized);
        }
        self.walkers.balance()
    }

    /// Reset, then alternate steps and balancing until a stopping rule fires.
    pub fn run_swarm(
        &mut self,
        model_states: Option<States>,
        env_states: Option<States>,
        walkers_states: Option<WalkersStates>,
    ) -> Result<RunSummary> {
        self.reset(model_states, env_states, walkers_states)?;
        self.status = SwarmStatus::Running;
        info!(
            n_walkers = self.config.n_walkers,
            max_epochs = self.config.max_epochs,
            "swarm run started"
        );
        let outcome = self.run_epochs();
        self.status = SwarmStatus::Stopped;
        let stop_reason = outcome?;
        self.stop_reason = Some(stop_reason);
        let summary = RunSummary {
            epochs: self.epoch,
            stop_reason,
            best_reward: self.walkers.best().map(|best| best.reward),
        };
        info!(
            epochs = summary.epochs,
            reason = %stop_reason,
            best_reward = ?summary.best_reward,
            "swarm run finished"
        );
        Ok(summary)
    }

    /// [`Swarm::run_swarm`] from a fresh reset.
    pub fn run(&mut self) -> Result<RunSummary> {
        self.run_swarm(None, None, None)
    }

    /// Best walker observed since the last reset.
    #[must_use]
    pub fn best_walker(&self) -> Option<&BestWalker> {
        self.walkers.best()
    }

    /// Best walker of the current population, sliced out of each container.
    pub fn current_best(&self) -> Result<Option<BestWalker>> {
        let Some(index) = self.walkers.best_index() else {
            return Ok(None);
        };
        Ok(Some(BestWalker {
            env: self.walkers.env_states().walker(index)?,
            model: self.walkers.model_states().walker(index)?,
            walker: self.walkers.states().walker(index)?,
            reward: self.walkers.states().cum_rewards()[index],
            found_at: self.walkers.n_iters(),
        }))
    }

    fn run_epochs(&mut self) -> Result<StopReason> {
        loop {
            self.step_walkers()?;
            let cloned = self.balance()?;
            self.epoch += 1;
            self.record_epoch(cloned);
            if let Some(reason) = self.walkers.end_reason() {
                return Ok(reason);
            }
            if self.epoch >= self.config.max_epochs {
                return Ok(StopReason::EpochCeiling);
            }
        }
    }

    fn record_epoch(&mut self, cloned: usize) {
        let summary = EpochSummary {
            epoch: self.epoch,
            best_reward: self.walkers.best().map(|best| best.reward),
            mean_reward: self.walkers.mean_reward(),
            alive: self.walkers.alive_count(),
            cloned,
        };
        debug!(
            epoch = summary.epoch,
            best_reward = ?summary.best_reward,
            mean_reward = summary.mean_reward,
            alive = summary.alive,
            cloned = summary.cloned,
            "epoch complete"
        );
        self.observer.on_epoch(&summary);
        if self.history.len() >= self.config.history_capacity {
            self.history.pop_front();
        }
        self.history.push_back(summary);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::env::{ENDS, OBSERVS, REWARDS, env_schema};
    use crate::states::Column;

    /// 1-D track: `x += action`, reward is the new position, terminal past `limit`.
    struct Track {
        limit: f64,
        fail_steps: bool,
    }

    impl Environment for Track {
        fn reset(&mut self, batch_size: usize) -> Result<States> {
            Ok(States::from_schema(batch_size, &env_schema(&[1])))
        }

        fn step(&self, actions: &Column, states: &States) -> Result<States> {
            if self.fail_steps {
                return Err(FractalError::collaborator("environment", "track is closed"));
            }
            let mut next = states.clone();
            let actions = actions.as_f64()?;
            let positions: Vec<f64> = next
                .f64s(OBSERVS)?
                .iter()
                .zip(actions)
                .map(|(x, a)| x + a)
                .collect();
            let ends: Vec<bool> = positions.iter().map(|x| x.abs() > self.limit).collect();
            next.f64s_mut(OBSERVS)?.copy_from_slice(&positions);
            next.f64s_mut(REWARDS)?.copy_from_slice(&positions);
            next.bools_mut(ENDS)?.copy_from_slice(&ends);
            Ok(next)
        }

        fn reset_from(&mut self, states: &States) -> Result<States> {
            Ok(states.clone())
        }
    }

    /// Walker `i` always moves by `(i + 1) * 0.1`.
    struct Stride;

    impl Model for Stride {
        fn reset(&mut self, batch_size: usize) -> Result<States> {
            Ok(States::empty(batch_size))
        }

        fn predict(
            &mut self,
            model_states: &States,
            env_states: &States,
            _walkers_states: &WalkersStates,
        ) -> Result<(Column, States)> {
            let actions = (0..env_states.batch_size())
                .map(|index| (index + 1) as f64 * 0.1)
                .collect();
            Ok((Column::scalar_f64(actions), model_states.clone()))
        }

        fn calculate_dt(
            &mut self,
            model_states: &States,
            env_states: &States,
            _walkers_states: &WalkersStates,
        ) -> Result<(Vec<usize>, States)> {
            Ok((vec![1; env_states.batch_size()], model_states.clone()))
        }
    }

    fn swarm(config: SwarmConfig) -> Swarm<Track, Stride> {
        Swarm::new(
            |_| {
                Ok(Track {
                    limit: 1_000.0,
                    fail_steps: false,
                })
            },
            |_| Ok(Stride),
            config,
        )
        .expect("swarm")
    }

    fn config(n_walkers: usize) -> SwarmConfig {
        SwarmConfig {
            n_walkers,
            rng_seed: Some(3),
            ..SwarmConfig::default()
        }
    }

    #[derive(Clone, Default)]
    struct Recorder(Arc<Mutex<Vec<u64>>>);

    impl SwarmObserver for Recorder {
        fn on_epoch(&mut self, summary: &EpochSummary) {
            if let Ok(mut epochs) = self.0.lock() {
                epochs.push(summary.epoch);
            }
        }
    }

    #[test]
    fn stepping_requires_reset() {
        let mut swarm = swarm(config(4));
        assert_eq!(swarm.status(), SwarmStatus::Uninitialized);
        assert!(matches!(swarm.step_walkers(), Err(FractalError::Uninitialized)));
        swarm.reset(None, None, None).expect("reset");
        assert_eq!(swarm.status(), SwarmStatus::Reset);
        swarm.step_walkers().expect("step");
    }

    #[test]
    fn run_stops_at_epoch_ceiling() {
        let mut swarm = swarm(SwarmConfig {
            max_epochs: 5,
            history_capacity: 3,
            ..config(6)
        });
        let recorder = Recorder::default();
        swarm.set_observer(Box::new(recorder.clone()));
        let summary = swarm.run().expect("run");
        assert_eq!(summary.stop_reason, StopReason::EpochCeiling);
        assert_eq!(summary.epochs, 5);
        assert_eq!(swarm.status(), SwarmStatus::Stopped);
        assert_eq!(swarm.stop_reason(), Some(StopReason::EpochCeiling));
        let epochs: Vec<u64> = swarm.history().map(|entry| entry.epoch).collect();
        assert_eq!(epochs, vec![3, 4, 5]);
        assert_eq!(*recorder.0.lock().expect("lock"), vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn iteration_budget_ends_run_before_ceiling() {
        let mut swarm = swarm(SwarmConfig {
            max_iters: Some(3),
            max_epochs: 50,
            ..config(4)
        });
        let summary = swarm.run().expect("run");
        assert_eq!(summary.stop_reason, StopReason::IterationBudget);
        assert_eq!(summary.epochs, 3);
        assert_eq!(swarm.walkers().n_iters(), 3);
    }

    #[test]
    fn best_reward_never_decreases_on_a_monotone_track() {
        let mut swarm = swarm(SwarmConfig {
            max_epochs: 20,
            ..config(8)
        });
        swarm.run().expect("run");
        let bests: Vec<f64> = swarm.history().filter_map(|entry| entry.best_reward).collect();
        assert_eq!(bests.len(), 20);
        assert!(bests.windows(2).all(|pair| pair[1] >= pair[0]));
        let best = swarm.best_walker().expect("best");
        assert_eq!(best.env.batch_size(), 1);
        assert_eq!(best.walker.cum_rewards()[0], best.reward);
        let current = swarm.current_best().expect("slice").expect("walker");
        assert!(current.reward <= best.reward);
    }

    #[test]
    fn collaborator_errors_stop_the_swarm() {
        let mut swarm: Swarm<Track, Stride> = Swarm::new(
            |_| {
                Ok(Track {
                    limit: 1.0,
                    fail_steps: true,
                })
            },
            |_| Ok(Stride),
            config(3),
        )
        .expect("swarm");
        let err = swarm.run().expect_err("step fails");
        assert!(matches!(
            err,
            FractalError::Collaborator {
                component: "environment",
                ..
            }
        ));
        assert_eq!(swarm.status(), SwarmStatus::Stopped);
        assert_eq!(swarm.stop_reason(), None);
    }

    #[test]
    fn warm_start_reuses_caller_states() {
        let mut swarm = swarm(config(3));
        let env_states = States::from_columns(
            3,
            [
                (OBSERVS, Column::from_f64(vec![1], vec![5.0, 6.0, 7.0]).expect("observs")),
                (REWARDS, Column::scalar_f64(vec![5.0, 6.0, 7.0])),
                (ENDS, Column::scalar_bool(vec![false; 3])),
            ],
        )
        .expect("env states");
        swarm.reset(None, Some(env_states), None).expect("warm start");
        assert_eq!(swarm.walkers().states().cum_rewards(), &[5.0, 6.0, 7.0]);
        assert_eq!(swarm.best_walker().expect("best").reward, 7.0);
        assert_eq!(swarm.epoch(), 0);

        let wrong = States::empty(2);
        assert!(swarm.reset(Some(wrong), None, None).is_err());
    }

    #[test]
    fn walkers_factory_must_match_population() {
        let result: Result<Swarm<Track, Stride>> = Swarm::with_walkers(
            |_| {
                Ok(Track {
                    limit: 1.0,
                    fail_steps: false,
                })
            },
            |_| Ok(Stride),
            |_| Walkers::new(&config(2)),
            config(3),
        );
        assert!(matches!(result, Err(FractalError::InvalidConfig(_))));
    }
}
