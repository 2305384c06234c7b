use rand::distributions::Distribution;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use statrs::distribution::Normal;

use analysis_core::math::median;
use analysis_core::{FundamentalsSnapshot, Metric, MonteCarloResult};

use crate::dcf;

const WACC_STD_DEV: f64 = 0.01;
const GROWTH_STD_DEV: f64 = 0.02;
const WACC_FLOOR: f64 = 0.02;

/// Randomized DCF sensitivity sweep.
///
/// Each trial samples WACC ~ N(base_wacc, 0.01) floored at 0.02 and growth
/// ~ N(base_growth, 0.02) floored at 0, with terminal growth at half the
/// sampled growth. Only non-zero intrinsic values are kept.
///
/// The injected `rng` only draws one seed per trial; trials then run in
/// parallel on their own seeded generators, so a seeded `rng` gives a
/// reproducible result regardless of thread scheduling.
///
/// Returns zero iterations when FCF or shares are missing. Otherwise
/// `iterations` is the requested trial count, even if no trial was kept.
pub fn run_monte_carlo<R: Rng>(
    snapshot: &FundamentalsSnapshot,
    base_wacc: f64,
    base_growth: f64,
    iterations: u32,
    rng: &mut R,
) -> MonteCarloResult {
    if snapshot.free_cash_flow.is_indeterminate() || snapshot.shares_outstanding.is_indeterminate() {
        return MonteCarloResult::empty(0);
    }

    let (wacc_dist, growth_dist) = match (
        Normal::new(base_wacc, WACC_STD_DEV),
        Normal::new(base_growth, GROWTH_STD_DEV),
    ) {
        (Ok(w), Ok(g)) => (w, g),
        _ => {
            tracing::warn!("Monte Carlo skipped: invalid base wacc {} or growth {}", base_wacc, base_growth);
            return MonteCarloResult::empty(iterations);
        }
    };

    let seeds: Vec<u64> = (0..iterations).map(|_| rng.gen()).collect();

    let values: Vec<f64> = seeds
        .into_par_iter()
        .filter_map(|seed| {
            let mut trial_rng = StdRng::seed_from_u64(seed);
            let wacc = wacc_dist.sample(&mut trial_rng).max(WACC_FLOOR);
            let growth = growth_dist.sample(&mut trial_rng).max(0.0);
            let terminal = (growth / 2.0).max(0.0);
            dcf::evaluate(snapshot, wacc, terminal, Some(growth), growth)
                .intrinsic_value
                .non_zero()
        })
        .collect();

    if values.is_empty() {
        return MonteCarloResult::empty(iterations);
    }

    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    tracing::debug!(
        "Monte Carlo kept {}/{} trials for {}",
        values.len(),
        iterations,
        snapshot.ticker
    );

    MonteCarloResult {
        iterations,
        median: median(&values),
        min: Metric::new(min),
        max: Metric::new(max),
    }
}
