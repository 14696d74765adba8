use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use fractal_app::{ObjectiveKind, RunSettings, run};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "fractal",
    version,
    about = "Run a Fractal Monte Carlo swarm on a reference objective"
)]
struct Cli {
    /// JSON settings file; command-line flags override its values.
    #[arg(short, long)]
    config: Option<PathBuf>,
    #[arg(long, value_enum)]
    objective: Option<ObjectiveKind>,
    /// Dimension of the search box.
    #[arg(long)]
    dim: Option<usize>,
    /// Number of walkers.
    #[arg(short = 'n', long)]
    walkers: Option<usize>,
    /// Epoch ceiling.
    #[arg(long)]
    epochs: Option<u64>,
    /// RNG seed for reproducible runs.
    #[arg(long, env = "FRACTAL_SEED")]
    seed: Option<u64>,
    /// Print the final report as JSON on stdout.
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let settings = settings_from(&cli)?;
    let report = run(&settings)?;

    match &report.best_point {
        Some(point) => info!(
            epochs = report.summary.epochs,
            reason = %report.summary.stop_reason,
            best_reward = ?report.summary.best_reward,
            best_point = ?point,
            "search finished"
        ),
        None => warn!(
            epochs = report.summary.epochs,
            reason = %report.summary.stop_reason,
            "search finished without a surviving walker"
        ),
    }
    if cli.json {
        let rendered =
            serde_json::to_string_pretty(&report).context("failed to serialise run report")?;
        println!("{rendered}");
    }
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

fn settings_from(cli: &Cli) -> Result<RunSettings> {
    let mut settings = match &cli.config {
        Some(path) => RunSettings::load(path)?,
        None => RunSettings::default(),
    };
    if let Some(objective) = cli.objective {
        settings.objective = objective;
    }
    if let Some(dim) = cli.dim {
        settings.dim = dim;
    }
    if let Some(walkers) = cli.walkers {
        settings.swarm.n_walkers = walkers;
    }
    if let Some(epochs) = cli.epochs {
        settings.swarm.max_epochs = epochs;
    }
    if cli.seed.is_some() {
        settings.swarm.rng_seed = cli.seed;
    }
    Ok(settings)
}
