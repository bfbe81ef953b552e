use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::Serialize;
use tracing::info;

use crate::sim::cancel::CancelToken;
use crate::sim::listener::ListenerChain;
use crate::sim::options::SimulationConditions;
use crate::sim::runner::{simulate_with, SimulationResult};

// ---------------------------------------------------------------------------
// Monte-Carlo batches
// ---------------------------------------------------------------------------

/// Run `runs` independent flights in parallel. Each run gets its own seed,
/// drawn from `seed`, so the whole batch is reproducible.
pub fn run_batch(conditions: &Arc<SimulationConditions>, runs: usize, seed: u64) -> Vec<SimulationResult> {
    run_batch_with(conditions, runs, seed, ListenerChain::new, &CancelToken::new())
}

/// Like [`run_batch`], with a fresh listener chain per run and a shared
/// cancellation token.
pub fn run_batch_with<F>(
    conditions: &Arc<SimulationConditions>,
    runs: usize,
    seed: u64,
    listeners: F,
    cancel: &CancelToken,
) -> Vec<SimulationResult>
where
    F: Fn() -> ListenerChain + Sync,
{
    let seeds = run_seeds(seed, runs);
    info!(runs, seed, "batch started");
    let results: Vec<SimulationResult> = seeds
        .par_iter()
        .map(|&s| {
            let mut chain = listeners();
            simulate_with(Arc::new(conditions.with_seed(s)), &mut chain, cancel)
        })
        .collect();
    info!(
        runs,
        failed = results.iter().filter(|r| r.outcome.error().is_some()).count(),
        "batch finished"
    );
    results
}

fn run_seeds(seed: u64, runs: usize) -> Vec<u64> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..runs).map(|_| rng.gen()).collect()
}

/// Spread of the main-branch apogee over successful runs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchStatistics {
    pub runs: usize,
    pub succeeded: usize,
    pub mean_altitude: f64,    // m
    pub std_dev_altitude: f64, // m
    pub min_altitude: f64,
    pub max_altitude: f64,
}

impl BatchStatistics {
    pub fn from_results(results: &[SimulationResult]) -> Self {
        let apogees: Vec<f64> = results
            .iter()
            .filter(|r| r.outcome.is_success())
            .filter_map(|r| r.main_branch())
            .map(|b| b.max_altitude())
            .filter(|a| a.is_finite())
            .collect();

        let n = apogees.len() as f64;
        let mean = apogees.iter().sum::<f64>() / n;
        let variance = apogees.iter().map(|a| (a - mean).powi(2)).sum::<f64>() / n;
        Self {
            runs: results.len(),
            succeeded: apogees.len(),
            mean_altitude: mean,
            std_dev_altitude: variance.sqrt(),
            min_altitude: apogees.iter().copied().fold(f64::NAN, f64::min),
            max_altitude: apogees.iter().copied().fold(f64::NAN, f64::max),
        }
    }
}
