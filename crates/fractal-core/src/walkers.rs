//! Walker bookkeeping and the distance → virtual reward → clone generation step.

use std::fmt;

use ordered_float::OrderedFloat;
use rand::{Rng, rngs::SmallRng};
use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

use crate::config::{NoSurvivorsPolicy, SwarmConfig};
use crate::env::{ENDS, OBSERVS, REWARDS, validate_env_states};
use crate::error::{FractalError, Result};
use crate::states::{BatchState, States, validate_clone_args};

/// Scalar fields of one walker, used for construction and snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WalkerData {
    pub id: u64,
    pub cum_reward: f64,
    pub processed_reward: f64,
    pub distance: f64,
    pub virtual_reward: f64,
    pub compas_dist: usize,
    pub compas_clone: usize,
    pub clone_prob: f64,
    pub will_clone: bool,
    pub end_condition: bool,
}

impl WalkerData {
    /// A freshly reset walker with the given id, reward and terminal flag.
    #[must_use]
    pub fn fresh(id: u64, cum_reward: f64, end_condition: bool) -> Self {
        Self {
            id,
            cum_reward,
            processed_reward: 1.0,
            distance: 1.0,
            virtual_reward: 1.0,
            compas_dist: 0,
            compas_clone: 0,
            clone_prob: 0.0,
            will_clone: false,
            end_condition,
        }
    }
}

/// Struct-of-arrays storage for walker bookkeeping.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WalkersStates {
    ids: Vec<u64>,
    cum_rewards: Vec<f64>,
    processed_rewards: Vec<f64>,
    distances: Vec<f64>,
    virtual_rewards: Vec<f64>,
    compas_dist: Vec<usize>,
    compas_clone: Vec<usize>,
    clone_probs: Vec<f64>,
    will_clone: Vec<bool>,
    end_condition: Vec<bool>,
}

macro_rules! for_each_column {
    ($states:expr, $column:ident => $body:expr) => {{
        {
            let $column = &mut $states.ids;
            $body;
        }
        {
            let $column = &mut $states.cum_rewards;
            $body;
        }
        {
            let $column = &mut $states.processed_rewards;
            $body;
        }
        {
            let $column = &mut $states.distances;
            $body;
        }
        {
            let $column = &mut $states.virtual_rewards;
            $body;
        }
        {
            let $column = &mut $states.compas_dist;
            $body;
        }
        {
            let $column = &mut $states.compas_clone;
            $body;
        }
        {
            let $column = &mut $states.clone_probs;
            $body;
        }
        {
            let $column = &mut $states.will_clone;
            $body;
        }
        {
            let $column = &mut $states.end_condition;
            $body;
        }
    }};
}

fn clone_from_snapshot<T: Copy>(values: &mut [T], will_clone: &[bool], compas: &[usize]) {
    let snapshot = values.to_vec();
    for ((value, &clone), &companion) in values.iter_mut().zip(will_clone).zip(compas) {
        if clone {
            *value = snapshot[companion];
        }
    }
}

impl WalkersStates {
    /// Create an empty collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a collection with reserved capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let mut states = Self::default();
        for_each_column!(states, column => column.reserve(capacity));
        states
    }

    /// Fresh bookkeeping for a population whose ids start at `first_id`.
    pub fn fresh(first_id: u64, cum_rewards: &[f64], ends: &[bool]) -> Result<Self> {
        if cum_rewards.len() != ends.len() {
            return Err(FractalError::ShapeMismatch(format!(
                "{} rewards and {} terminal flags cannot describe one population",
                cum_rewards.len(),
                ends.len()
            )));
        }
        let mut states = Self::with_capacity(ends.len());
        for (offset, (&reward, &end)) in cum_rewards.iter().zip(ends).enumerate() {
            states.push(WalkerData::fresh(first_id + offset as u64, reward, end));
        }
        Ok(states)
    }

    /// Number of walkers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append a new walker row.
    pub fn push(&mut self, walker: WalkerData) {
        self.ids.push(walker.id);
        self.cum_rewards.push(walker.cum_reward);
        self.processed_rewards.push(walker.processed_reward);
        self.distances.push(walker.distance);
        self.virtual_rewards.push(walker.virtual_reward);
        self.compas_dist.push(walker.compas_dist);
        self.compas_clone.push(walker.compas_clone);
        self.clone_probs.push(walker.clone_prob);
        self.will_clone.push(walker.will_clone);
        self.end_condition.push(walker.end_condition);
        self.debug_assert_coherent();
    }

    /// Copy out the scalar fields of walker `index`.
    #[must_use]
    pub fn snapshot(&self, index: usize) -> WalkerData {
        WalkerData {
            id: self.ids[index],
            cum_reward: self.cum_rewards[index],
            processed_reward: self.processed_rewards[index],
            distance: self.distances[index],
            virtual_reward: self.virtual_rewards[index],
            compas_dist: self.compas_dist[index],
            compas_clone: self.compas_clone[index],
            clone_prob: self.clone_probs[index],
            will_clone: self.will_clone[index],
            end_condition: self.end_condition[index],
        }
    }

    /// Iterate over every walker's scalar fields.
    pub fn iter(&self) -> impl Iterator<Item = WalkerData> + '_ {
        (0..self.len()).map(|index| self.snapshot(index))
    }

    #[must_use]
    pub fn ids(&self) -> &[u64] {
        &self.ids
    }

    #[must_use]
    pub fn cum_rewards(&self) -> &[f64] {
        &self.cum_rewards
    }

    #[must_use]
    pub fn cum_rewards_mut(&mut self) -> &mut [f64] {
        &mut self.cum_rewards
    }

    /// Rewards after normalisation, as used by the virtual reward.
    #[must_use]
    pub fn processed_rewards(&self) -> &[f64] {
        &self.processed_rewards
    }

    /// Normalised distances to each walker's distance companion.
    #[must_use]
    pub fn distances(&self) -> &[f64] {
        &self.distances
    }

    #[must_use]
    pub fn virtual_rewards(&self) -> &[f64] {
        &self.virtual_rewards
    }

    #[must_use]
    pub fn compas_dist(&self) -> &[usize] {
        &self.compas_dist
    }

    #[must_use]
    pub fn compas_clone(&self) -> &[usize] {
        &self.compas_clone
    }

    #[must_use]
    pub fn clone_probs(&self) -> &[f64] {
        &self.clone_probs
    }

    /// Outcome of the last Bernoulli draw.
    #[must_use]
    pub fn will_clone(&self) -> &[bool] {
        &self.will_clone
    }

    #[must_use]
    pub fn end_condition(&self) -> &[bool] {
        &self.end_condition
    }

    #[must_use]
    pub fn end_condition_mut(&mut self) -> &mut [bool] {
        &mut self.end_condition
    }

    fn debug_assert_coherent(&self) {
        let len = self.ids.len();
        debug_assert_eq!(len, self.cum_rewards.len());
        debug_assert_eq!(len, self.processed_rewards.len());
        debug_assert_eq!(len, self.distances.len());
        debug_assert_eq!(len, self.virtual_rewards.len());
        debug_assert_eq!(len, self.compas_dist.len());
        debug_assert_eq!(len, self.compas_clone.len());
        debug_assert_eq!(len, self.clone_probs.len());
        debug_assert_eq!(len, self.will_clone.len());
        debug_assert_eq!(len, self.end_condition.len());
    }
}

impl BatchState for WalkersStates {
    fn batch_size(&self) -> usize {
        self.len()
    }

    fn walker(&self, index: usize) -> Result<Self> {
        if index >= self.len() {
            return Err(FractalError::ShapeMismatch(format!(
                "walker index {index} is out of range for a batch of {}",
                self.len()
            )));
        }
        let mut single = Self::with_capacity(1);
        single.push(self.snapshot(index));
        Ok(single)
    }

    fn concat(parts: &[Self]) -> Result<Self> {
        if parts.is_empty() {
            return Err(FractalError::InvalidConfig(
                "cannot concatenate an empty sequence of walker states",
            ));
        }
        let mut joined = Self::with_capacity(parts.iter().map(Self::len).sum());
        for part in parts {
            for walker in part.iter() {
                joined.push(walker);
            }
        }
        Ok(joined)
    }

    fn clone_walkers(&mut self, will_clone: &[bool], compas: &[usize]) -> Result<()> {
        validate_clone_args(self.len(), will_clone, compas)?;
        for_each_column!(self, column => clone_from_snapshot(column, will_clone, compas));
        self.debug_assert_coherent();
        Ok(())
    }
}

/// Map raw scores onto a strictly positive scale.
///
/// Values are standardised; positive z-scores become `1 + ln(1 + z)` and the
/// rest `exp(z)`. A population with no spread maps to all ones.
#[must_use]
pub fn relativize(values: &[f64]) -> Vec<f64> {
    let n = values.len();
    if n == 0 {
        return Vec::new();
    }
    let mean = values.iter().sum::<f64>() / n as f64;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n as f64;
    let std = variance.sqrt();
    let max_abs = values.iter().fold(0.0_f64, |acc, v| acc.max(v.abs()));
    let flat = values.iter().all(|&v| v == values[0]);
    if flat || !std.is_finite() || std <= max_abs * 1e-12 {
        return vec![1.0; n];
    }
    values
        .iter()
        .map(|&v| {
            let z = (v - mean) / std;
            if z > 0.0 { 1.0 + z.ln_1p() } else { z.exp() }
        })
        .collect()
}

/// Position inside one `balance` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum GenerationPhase {
    #[default]
    Idle,
    DistancesComputed,
    VirtualRewardComputed,
    CompanionsAssigned,
    CloneProbabilitiesComputed,
    Cloned,
}

/// Stopping rule that ended a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    IterationBudget,
    Stagnation,
    Converged,
    Extinct,
    RewardLimit,
    EpochCeiling,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::IterationBudget => "iteration budget exhausted",
            Self::Stagnation => "best reward stagnated",
            Self::Converged => "population converged",
            Self::Extinct => "every walker is terminal",
            Self::RewardLimit => "reward limit reached",
            Self::EpochCeiling => "epoch ceiling reached",
        };
        f.write_str(label)
    }
}

/// Best walker observed so far, materialised as batch-size-1 containers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BestWalker {
    pub env: States,
    pub model: States,
    pub walker: WalkersStates,
    /// Cumulative reward of the walker when it was recorded.
    pub reward: f64,
    /// Generation at which it was recorded.
    pub found_at: u64,
}

/// Population engine owning the aligned env, model and walker states.
#[derive(Debug)]
pub struct Walkers {
    config: SwarmConfig,
    env_states: States,
    model_states: States,
    states: WalkersStates,
    phase: GenerationPhase,
    n_iters: u64,
    next_id: u64,
    best: Option<BestWalker>,
    best_improved_at: u64,
    last_clones: usize,
    rng: SmallRng,
}

impl Walkers {
    /// Build an engine for `config.n_walkers` walkers. Call [`Walkers::reset`] before balancing.
    pub fn new(config: &SwarmConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config: config.clone(),
            env_states: States::empty(0),
            model_states: States::empty(0),
            states: WalkersStates::new(),
            phase: GenerationPhase::Idle,
            n_iters: 0,
            next_id: 0,
            best: None,
            best_improved_at: 0,
            last_clones: 0,
            rng: config.seeded_rng(),
        })
    }

    #[must_use]
    pub fn config(&self) -> &SwarmConfig {
        &self.config
    }

    #[must_use]
    pub fn n_walkers(&self) -> usize {
        self.config.n_walkers
    }

    #[must_use]
    pub fn env_states(&self) -> &States {
        &self.env_states
    }

    #[must_use]
    pub fn model_states(&self) -> &States {
        &self.model_states
    }

    #[must_use]
    pub fn states(&self) -> &WalkersStates {
        &self.states
    }

    #[must_use]
    pub fn phase(&self) -> GenerationPhase {
        self.phase
    }

    /// Completed generations since the last reset.
    #[must_use]
    pub fn n_iters(&self) -> u64 {
        self.n_iters
    }

    /// Walkers cloned by the most recent generation.
    #[must_use]
    pub fn last_clones(&self) -> usize {
        self.last_clones
    }

    #[must_use]
    pub fn best(&self) -> Option<&BestWalker> {
        self.best.as_ref()
    }

    /// Number of walkers whose terminal flag is unset.
    #[must_use]
    pub fn alive_count(&self) -> usize {
        self.states.end_condition.iter().filter(|&&end| !end).count()
    }

    #[must_use]
    pub fn mean_reward(&self) -> f64 {
        let n = self.states.len();
        if n == 0 {
            return 0.0;
        }
        self.states.cum_rewards.iter().sum::<f64>() / n as f64
    }

    /// Install new aligned states and restart the generation counter.
    ///
    /// Without `walkers_states`, bookkeeping starts from the environment's
    /// rewards and terminal flags.
    pub fn reset(
        &mut self,
        env_states: States,
        model_states: States,
        walkers_states: Option<WalkersStates>,
    ) -> Result<()> {
        let n = self.config.n_walkers;
        validate_env_states(&env_states, n)?;
        self.check_batch("model", model_states.batch_size())?;
        let states = match walkers_states {
            Some(states) => {
                self.check_batch("walkers", states.len())?;
                states
            }
            None => WalkersStates::fresh(
                self.next_id,
                env_states.f64s(REWARDS)?,
                env_states.bools(ENDS)?,
            )?,
        };
        self.next_id = self
            .next_id
            .max(states.ids.iter().copied().max().map_or(0, |id| id + 1));
        self.env_states = env_states;
        self.model_states = model_states;
        self.states = states;
        self.phase = GenerationPhase::Idle;
        self.n_iters = 0;
        self.last_clones = 0;
        self.best = None;
        self.best_improved_at = 0;
        self.update_best()?;
        Ok(())
    }

    /// Fold the result of an environment step into the engine.
    pub fn update_states(&mut self, env_states: States, model_states: States) -> Result<()> {
        let n = self.config.n_walkers;
        if self.states.len() != n {
            return Err(FractalError::Uninitialized);
        }
        validate_env_states(&env_states, n)?;
        self.check_batch("model", model_states.batch_size())?;
        let rewards = env_states.f64s(REWARDS)?;
        if self.config.accumulate_rewards {
            for (total, reward) in self.states.cum_rewards.iter_mut().zip(rewards) {
                *total += reward;
            }
        } else {
            self.states.cum_rewards.copy_from_slice(rewards);
        }
        self.states
            .end_condition
            .copy_from_slice(env_states.bools(ENDS)?);
        self.env_states = env_states;
        self.model_states = model_states;
        self.update_best()
    }

    /// Draw alive companions and store the normalised distance to each.
    pub fn calculate_distances(&mut self) -> Result<()> {
        let compas = self.get_alive_compas()?;
        let observs = self.env_states.get(OBSERVS)?;
        let raw = (0..self.states.len())
            .map(|index| {
                let own = observs.row_f64(index)?;
                let other = observs.row_f64(compas[index])?;
                Ok(euclidean(own, other))
            })
            .collect::<Result<Vec<f64>>>()?;
        self.states.distances = relativize(&raw);
        self.states.compas_dist = compas;
        self.phase = GenerationPhase::DistancesComputed;
        trace!(iteration = self.n_iters, "distances computed");
        Ok(())
    }

    /// Combine normalised reward and distance into the virtual reward.
    pub fn calculate_virtual_reward(&mut self) {
        let signed: Vec<f64> = if self.config.minimize {
            self.states.cum_rewards.iter().map(|reward| -reward).collect()
        } else {
            self.states.cum_rewards.clone()
        };
        let processed = relativize(&signed);
        let reward_scale = self.config.reward_scale;
        let dist_scale = self.config.dist_scale;
        self.states.virtual_rewards = processed
            .iter()
            .zip(&self.states.distances)
            .map(|(reward, distance)| reward.powf(reward_scale) * distance.powf(dist_scale))
            .collect();
        self.states.processed_rewards = processed;
        self.phase = GenerationPhase::VirtualRewardComputed;
        trace!(iteration = self.n_iters, "virtual reward computed");
    }

    /// One uniformly drawn companion per walker, taken from the alive walkers.
    pub fn get_alive_compas(&mut self) -> Result<Vec<usize>> {
        let n = self.states.len();
        let mut candidates: Vec<usize> = (0..n)
            .filter(|&index| !self.states.end_condition[index])
            .collect();
        if candidates.is_empty() {
            match self.config.no_survivors {
                NoSurvivorsPolicy::Fail => return Err(FractalError::NoSurvivors),
                NoSurvivorsPolicy::FallbackToAll => {
                    warn!(
                        iteration = self.n_iters,
                        walkers = n,
                        "no alive walkers; drawing companions from the whole population"
                    );
                    candidates = (0..n).collect();
                }
            }
        }
        if candidates.is_empty() {
            return Ok(Vec::new());
        }
        Ok((0..n)
            .map(|_| candidates[self.rng.random_range(0..candidates.len())])
            .collect())
    }

    /// Compute the probability that each walker clones onto its companion.
    ///
    /// Terminal walkers, and walkers flagged in `will_clone_prior`, always clone.
    /// Otherwise the best alive walker never clones, so a generation cannot lose the
    /// population's best score.
    pub fn update_clone_probs(
        &mut self,
        compas: &[usize],
        will_clone_prior: Option<&[bool]>,
    ) -> Result<()> {
        let n = self.states.len();
        validate_clone_args(n, &vec![false; n], compas)?;
        if let Some(prior) = will_clone_prior
            && prior.len() != n
        {
            return Err(FractalError::ShapeMismatch(format!(
                "clone prior of length {} does not match a batch of {n}",
                prior.len()
            )));
        }
        let vr = &self.states.virtual_rewards;
        let equilibrium = vr.iter().all(|&value| value == vr[0]);
        let eps = self.config.clone_eps;
        let keeper = self.ranked_index(true);
        let probs: Vec<f64> = (0..n)
            .map(|index| {
                let forced = self.states.end_condition[index]
                    || will_clone_prior.is_some_and(|prior| prior[index]);
                if forced {
                    1.0
                } else if equilibrium || keeper == Some(index) {
                    0.0
                } else {
                    let own = vr[index];
                    let ratio = (vr[compas[index]] - own) / own.max(eps);
                    if ratio.is_nan() { 0.0 } else { ratio.clamp(0.0, 1.0) }
                }
            })
            .collect();
        self.states.clone_probs = probs;
        self.states.compas_clone = compas.to_vec();
        self.phase = GenerationPhase::CloneProbabilitiesComputed;
        trace!(iteration = self.n_iters, "clone probabilities computed");
        Ok(())
    }

    /// Draw the clone mask and apply it to all three containers. Returns the clone count.
    pub fn clone_walkers(&mut self) -> Result<usize> {
        let n = self.states.len();
        let compas = self.states.compas_clone.clone();
        let will_clone: Vec<bool> = self
            .states
            .clone_probs
            .iter()
            .map(|&prob| self.rng.random::<f64>() < prob)
            .collect();
        validate_clone_args(self.env_states.batch_size(), &will_clone, &compas)?;
        validate_clone_args(self.model_states.batch_size(), &will_clone, &compas)?;
        validate_clone_args(n, &will_clone, &compas)?;

        self.env_states.clone_walkers(&will_clone, &compas)?;
        self.model_states.clone_walkers(&will_clone, &compas)?;
        self.states.clone_walkers(&will_clone, &compas)?;

        let mut cloned = 0;
        for (index, &clone) in will_clone.iter().enumerate() {
            if clone {
                self.states.ids[index] = self.next_id;
                self.next_id += 1;
                cloned += 1;
            }
        }
        self.states.will_clone = will_clone;
        self.states.compas_clone = compas;
        self.last_clones = cloned;
        self.phase = GenerationPhase::Cloned;
        trace!(iteration = self.n_iters, cloned, "walkers cloned");
        Ok(cloned)
    }

    /// Run one full generation. The phase returns to `Idle` whether or not it succeeds.
    pub fn balance(&mut self) -> Result<usize> {
        let result = self.run_generation();
        self.phase = GenerationPhase::Idle;
        result
    }

    fn run_generation(&mut self) -> Result<usize> {
        if self.states.is_empty() {
            return Err(FractalError::Uninitialized);
        }
        self.calculate_distances()?;
        self.calculate_virtual_reward();
        let compas = self.get_alive_compas()?;
        self.phase = GenerationPhase::CompanionsAssigned;
        self.update_clone_probs(&compas, None)?;
        let cloned = self.clone_walkers()?;
        self.n_iters += 1;
        self.update_best()?;
        Ok(cloned)
    }

    /// Whether any stopping rule fires. Performs no mutation.
    #[must_use]
    pub fn calculate_end_condition(&self) -> bool {
        self.end_reason().is_some()
    }

    /// The first stopping rule that currently fires, if any.
    #[must_use]
    pub fn end_reason(&self) -> Option<StopReason> {
        if !self.states.is_empty() && self.states.end_condition.iter().all(|&end| end) {
            return Some(StopReason::Extinct);
        }
        if self.config.max_iters.is_some_and(|max| self.n_iters >= max) {
            return Some(StopReason::IterationBudget);
        }
        if let (Some(limit), Some(best)) = (self.config.reward_limit, &self.best) {
            let reached = if self.config.minimize {
                best.reward <= limit
            } else {
                best.reward >= limit
            };
            if reached {
                return Some(StopReason::RewardLimit);
            }
        }
        if let Some(patience) = self.config.patience
            && self.n_iters > 0
            && self.n_iters - self.best_improved_at >= patience
        {
            return Some(StopReason::Stagnation);
        }
        if let Some(tol) = self.config.convergence_tol
            && self.is_converged(tol)
        {
            return Some(StopReason::Converged);
        }
        None
    }

    /// Index of the best walker in the current population.
    ///
    /// Alive walkers are preferred; ties go to the lowest index.
    #[must_use]
    pub fn best_index(&self) -> Option<usize> {
        let alive = self.ranked_index(true);
        alive.or_else(|| self.ranked_index(false))
    }

    fn ranked_index(&self, alive_only: bool) -> Option<usize> {
        (0..self.states.len())
            .filter(|&index| !alive_only || !self.states.end_condition[index])
            .max_by_key(|&index| {
                (
                    OrderedFloat(self.score(self.states.cum_rewards[index])),
                    std::cmp::Reverse(index),
                )
            })
    }

    fn score(&self, reward: f64) -> f64 {
        if self.config.minimize { -reward } else { reward }
    }

    fn update_best(&mut self) -> Result<()> {
        let Some(index) = self.ranked_index(true) else {
            return Ok(());
        };
        let reward = self.states.cum_rewards[index];
        let improved = match &self.best {
            Some(best) => OrderedFloat(self.score(reward)) > OrderedFloat(self.score(best.reward)),
            None => true,
        };
        if !improved {
            return Ok(());
        }
        self.best = Some(BestWalker {
            env: self.env_states.walker(index)?,
            model: self.model_states.walker(index)?,
            walker: self.states.walker(index)?,
            reward,
            found_at: self.n_iters,
        });
        self.best_improved_at = self.n_iters;
        Ok(())
    }

    /// Every pair of observations lies within `tol` of each other.
    fn is_converged(&self, tol: f64) -> bool {
        let Ok(observs) = self.env_states.get(OBSERVS) else {
            return false;
        };
        let Ok(rows) = (0..observs.batch_size())
            .map(|index| observs.row_f64(index))
            .collect::<Result<Vec<&[f64]>>>()
        else {
            return false;
        };
        rows.iter().enumerate().all(|(index, own)| {
            rows[index + 1..]
                .iter()
                .all(|other| euclidean(own, other) <= tol)
        })
    }

    fn check_batch(&self, component: &str, batch_size: usize) -> Result<()> {
        if batch_size != self.config.n_walkers {
            return Err(FractalError::ShapeMismatch(format!(
                "{component} states hold {batch_size} walkers, expected {}",
                self.config.n_walkers
            )));
        }
        Ok(())
    }
}

fn euclidean(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f64>()
        .sqrt()
}
