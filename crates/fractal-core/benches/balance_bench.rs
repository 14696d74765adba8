use criterion::{BatchSize, Criterion, criterion_group, criterion_main};
use fractal_core::{Column, ENDS, OBSERVS, REWARDS, States, SwarmConfig, Walkers};
use rand::{Rng, SeedableRng, rngs::SmallRng};
use std::time::Duration;

fn env_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|s| s.parse::<T>().ok())
}

fn population(walkers: usize, dim: usize, seed: u64) -> (States, States) {
    let mut rng = SmallRng::seed_from_u64(seed);
    let observs: Vec<f64> = (0..walkers * dim)
        .map(|_| rng.random_range(-10.0..10.0))
        .collect();
    let rewards: Vec<f64> = (0..walkers).map(|_| rng.random::<f64>()).collect();
    // Roughly one walker in ten starts terminal.
    let ends: Vec<bool> = (0..walkers).map(|_| rng.random_bool(0.1)).collect();
    let env = States::from_columns(
        walkers,
        [
            (OBSERVS, Column::from_f64(vec![dim], observs).expect("observs")),
            (REWARDS, Column::scalar_f64(rewards)),
            (ENDS, Column::scalar_bool(ends)),
        ],
    )
    .expect("env states");
    let model = States::from_columns(
        walkers,
        [("actions", Column::from_f64(vec![dim], vec![0.0; walkers * dim]).expect("actions"))],
    )
    .expect("model states");
    (env, model)
}

fn bench_balance(c: &mut Criterion) {
    let mut group = c.benchmark_group("walkers_balance");
    // Allow env overrides for CI boxes with less headroom
    let samples: usize = env_var("FMC_BENCH_SAMPLES")
        .filter(|v| *v > 0)
        .unwrap_or(30);
    let warm: u64 = env_var("FMC_BENCH_WARMUP_SECS").unwrap_or(2);
    let measure: u64 = env_var("FMC_BENCH_MEASURE_SECS").unwrap_or(10);
    group.sample_size(samples);
    group.warm_up_time(Duration::from_secs(warm));
    group.measurement_time(Duration::from_secs(measure));
    let dim: usize = env_var("FMC_BENCH_DIM").filter(|v| *v > 0).unwrap_or(8);
    let walkers_list: Vec<usize> = std::env::var("FMC_BENCH_WALKERS")
        .ok()
        .map(|s| {
            s.split(',')
                .filter_map(|t| t.trim().parse::<usize>().ok())
                .collect::<Vec<_>>()
        })
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| vec![100_usize, 1_000, 10_000]);
    for &walkers in &walkers_list {
        group.bench_function(format!("dim{dim}_walkers{walkers}"), |b| {
            b.iter_batched(
                || {
                    let config = SwarmConfig {
                        n_walkers: walkers,
                        rng_seed: Some(0xBEEF),
                        ..SwarmConfig::default()
                    };
                    let (env, model) = population(walkers, dim, 0xBEEF);
                    let mut engine = Walkers::new(&config).expect("walkers");
                    engine.reset(env, model, None).expect("reset");
                    engine
                },
                |mut engine| {
                    engine.balance().expect("balance");
                },
                BatchSize::LargeInput,
            );
        });
    }
    group.finish();
}

criterion_group!(benches, bench_balance);
criterion_main!(benches);
