//! Discounted cash flow valuation: a single deterministic evaluation, a
//! weighted set of macro scenarios and a randomized sensitivity sweep.

pub mod dcf;
pub mod monte_carlo;
pub mod scenarios;

use analysis_core::{DcfResult, EngineConfig, FundamentalsSnapshot, MonteCarloResult, ScenarioBundle};
use rand::Rng;
use serde::{Deserialize, Serialize};

pub use dcf::{effective_terminal_growth, evaluate};
pub use monte_carlo::run_monte_carlo;
pub use scenarios::run_scenarios;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Valuation {
    pub dcf: DcfResult,
    pub scenarios: ScenarioBundle,
    pub monte_carlo: MonteCarloResult,
}

pub struct ValuationModel {
    config: EngineConfig,
}

impl ValuationModel {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    /// Base DCF, scenarios and Monte Carlo over one snapshot.
    ///
    /// The sweep is centered on the snapshot growth, or the configured
    /// default growth when it is missing.
    pub fn value<R: Rng>(
        &self,
        snapshot: &FundamentalsSnapshot,
        wacc: f64,
        terminal_growth: f64,
        rng: &mut R,
    ) -> Valuation {
        let default_growth = self.config.default_growth;
        let dcf = evaluate(snapshot, wacc, terminal_growth, None, default_growth);
        let scenarios = run_scenarios(snapshot, wacc, terminal_growth, &self.config.scenarios, default_growth);
        let monte_carlo = run_monte_carlo(
            snapshot,
            wacc,
            snapshot.growth_rate.unwrap_or(default_growth),
            self.config.monte_carlo_iterations,
            rng,
        );

        tracing::info!(
            "Valued {}: intrinsic {} (weighted {}, MC median {})",
            snapshot.ticker,
            dcf.intrinsic_value,
            scenarios.weighted_intrinsic_value,
            monte_carlo.median
        );

        Valuation {
            dcf,
            scenarios,
            monte_carlo,
        }
    }
}

impl Default for ValuationModel {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use analysis_core::{GrowthSource, Metric};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_value_uses_configured_iterations() {
        let model = ValuationModel::new(EngineConfig::default().with_monte_carlo_iterations(25));
        let snapshot = FundamentalsSnapshot {
            free_cash_flow: Metric::Value(500.0),
            shares_outstanding: Metric::Value(50.0),
            ..Default::default()
        };
        let valuation = model.value(&snapshot, 0.08, 0.025, &mut StdRng::seed_from_u64(1));
        assert_eq!(valuation.dcf.growth_source, GrowthSource::AssumedDefault);
        assert_eq!(valuation.monte_carlo.iterations, 25);
        assert!(valuation.scenarios.weighted_intrinsic_value.is_present());
    }
}
