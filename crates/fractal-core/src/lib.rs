//! Core types for Fractal Monte Carlo search.
//!
//! A [`Swarm`] drives a population of walkers through an [`Environment`]
//! using actions sampled by a [`Model`]. After every step the [`Walkers`]
//! engine balances the population: walkers with a low virtual reward clone
//! onto better companions, keeping env, model and walker states aligned.

pub mod config;
pub mod env;
pub mod error;
pub mod model;
pub mod states;
pub mod swarm;
pub mod walkers;

pub use config::{NoSurvivorsPolicy, SwarmConfig};
pub use env::{ENDS, Environment, OBSERVS, REWARDS, env_schema, validate_env_states};
pub use error::{BoxedSource, FractalError, Result};
pub use model::Model;
pub use states::{
    BatchState, Column, ColumnData, DType, FieldSpec, Schema, States, validate_clone_args,
};
pub use swarm::{EpochSummary, NullObserver, RunSummary, Swarm, SwarmObserver, SwarmStatus};
pub use walkers::{
    BestWalker, GenerationPhase, StopReason, WalkerData, Walkers, WalkersStates, relativize,
};
