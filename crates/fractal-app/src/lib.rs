//! Shared plumbing for the `fractal` command-line shell.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use clap::ValueEnum;
use fractal_core::{EpochSummary, OBSERVS, RunSummary, Swarm, SwarmConfig, SwarmObserver};
use fractal_envs::{Bounds, FunctionEnv};
use fractal_models::{ContinuousConfig, DtRange, RandomContinuousModel};
use serde::{Deserialize, Serialize};
use tracing::info;

pub type FunctionSwarm = Swarm<FunctionEnv, RandomContinuousModel>;

/// Objective explored by the demo swarm.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ObjectiveKind {
    #[default]
    Sphere,
    Rastrigin,
    /// Maximise `-|x - target|^2`; the target is read from `swarm.extra.target`.
    Target,
}

impl ObjectiveKind {
    /// Whether lower objective values are better.
    #[must_use]
    pub fn minimize(self) -> bool {
        matches!(self, Self::Sphere | Self::Rastrigin)
    }
}

/// Everything needed to build and run one demo swarm.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunSettings {
    pub objective: ObjectiveKind,
    /// Dimension of the search box.
    pub dim: usize,
    /// The box is `[-half_width, half_width]^dim`.
    pub half_width: f64,
    /// Actions are drawn from `[-step, step]` per component.
    pub step: f64,
    pub dt: DtRange,
    /// Fixed start point; a random point in the box when absent.
    pub start: Option<Vec<f64>>,
    /// Log an epoch summary every this many epochs; 0 disables.
    pub log_every: u64,
    pub swarm: SwarmConfig,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            objective: ObjectiveKind::default(),
            dim: 2,
            half_width: 5.12,
            step: 0.25,
            dt: DtRange::default(),
            start: None,
            log_every: 10,
            swarm: SwarmConfig {
                max_epochs: 200,
                ..SwarmConfig::default()
            },
        }
    }
}

impl RunSettings {
    /// Read settings from a JSON file; missing fields keep their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read settings from {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse settings in {}", path.display()))
    }
}

/// Emits a tracing event every `every` epochs.
#[derive(Debug, Clone)]
pub struct LoggingObserver {
    every: u64,
}

impl LoggingObserver {
    #[must_use]
    pub fn new(every: u64) -> Self {
        Self { every }
    }
}

impl SwarmObserver for LoggingObserver {
    fn on_epoch(&mut self, summary: &EpochSummary) {
        if self.every == 0 || summary.epoch % self.every != 0 {
            return;
        }
        info!(
            epoch = summary.epoch,
            best_reward = ?summary.best_reward,
            mean_reward = summary.mean_reward,
            alive = summary.alive,
            cloned = summary.cloned,
            "epoch summary"
        );
    }
}

/// Build the environment and model described by `settings`.
pub fn build_swarm(settings: &RunSettings) -> fractal_core::Result<FunctionSwarm> {
    let mut config = settings.swarm.clone();
    config.minimize = settings.objective.minimize();
    let env_seed = config.rng_seed.map(|seed| seed.wrapping_add(1));
    let model_seed = config.rng_seed.map(|seed| seed.wrapping_add(2));
    let swarm = Swarm::new(
        |config: &SwarmConfig| {
            let bounds = Bounds::cube(settings.dim, -settings.half_width, settings.half_width)?;
            let mut env = match settings.objective {
                ObjectiveKind::Sphere => FunctionEnv::sphere(bounds),
                ObjectiveKind::Rastrigin => FunctionEnv::rastrigin(bounds),
                ObjectiveKind::Target => {
                    let target = config
                        .extra_value::<Vec<f64>>("target")
                        .unwrap_or_else(|| vec![1.0; settings.dim]);
                    FunctionEnv::negative_squared_distance(bounds, target)?
                }
            };
            if let Some(start) = &settings.start {
                env = env.with_start(start.clone())?;
            }
            if let Some(seed) = env_seed {
                env = env.with_seed(seed);
            }
            Ok(env)
        },
        |_| {
            RandomContinuousModel::new(ContinuousConfig {
                dim: settings.dim,
                low: -settings.step,
                high: settings.step,
                dt: settings.dt,
                rng_seed: model_seed,
            })
        },
        config,
    )?;
    Ok(swarm.with_observer(Box::new(LoggingObserver::new(settings.log_every))))
}

/// Outcome of a demo run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub objective: ObjectiveKind,
    pub summary: RunSummary,
    /// Position of the best walker, if any walker stayed alive.
    pub best_point: Option<Vec<f64>>,
}

/// Build, run and summarise a swarm.
pub fn run(settings: &RunSettings) -> Result<RunReport> {
    let mut swarm = build_swarm(settings).context("failed to build swarm")?;
    info!(
        objective = ?settings.objective,
        dim = settings.dim,
        n_walkers = settings.swarm.n_walkers,
        "starting swarm"
    );
    let summary = swarm.run().context("swarm run failed")?;
    let best_point = swarm
        .best_walker()
        .map(|best| best.env.f64s(OBSERVS).map(<[f64]>::to_vec))
        .transpose()
        .context("best walker is missing observations")?;
    Ok(RunReport {
        objective: settings.objective,
        summary,
        best_point,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn objectives_choose_direction() {
        assert!(ObjectiveKind::Sphere.minimize());
        assert!(ObjectiveKind::Rastrigin.minimize());
        assert!(!ObjectiveKind::Target.minimize());
    }

    #[test]
    fn partial_settings_keep_defaults() {
        let settings: RunSettings = serde_json::from_str(
            r#"{"objective": "rastrigin", "dim": 4, "swarm": {"n_walkers": 12}}"#,
        )
        .expect("settings");
        assert_eq!(settings.objective, ObjectiveKind::Rastrigin);
        assert_eq!(settings.dim, 4);
        assert_eq!(settings.swarm.n_walkers, 12);
        assert_eq!(settings.swarm.max_epochs, SwarmConfig::default().max_epochs);
        assert_eq!(settings.log_every, 10);
    }

    #[test]
    fn build_rejects_mismatched_start() {
        let settings = RunSettings {
            start: Some(vec![0.0; 3]),
            ..RunSettings::default()
        };
        assert!(build_swarm(&settings).is_err());
    }
}
