use analysis_core::{FundamentalsSnapshot, Metric, ScenarioBundle, ScenarioResult, ScenarioSpec};

use crate::dcf;

const WACC_FLOOR: f64 = 0.02;

/// Run every scenario through the DCF independently.
///
/// The weighted value sums `intrinsic × weight` over scenarios with a usable
/// non-zero intrinsic value; failed scenarios drop out without renormalizing.
pub fn run_scenarios(
    snapshot: &FundamentalsSnapshot,
    wacc: f64,
    terminal_growth: f64,
    specs: &[ScenarioSpec],
    default_growth: f64,
) -> ScenarioBundle {
    let base_growth = snapshot.growth_rate.unwrap_or(default_growth);

    let scenarios: Vec<ScenarioResult> = specs
        .iter()
        .map(|spec| {
            let growth_rate = base_growth * spec.growth_multiplier;
            let scenario_wacc = (wacc + spec.wacc_delta).max(WACC_FLOOR);
            let scenario_terminal = (terminal_growth + spec.terminal_delta).max(0.0);
            let result = dcf::evaluate(snapshot, scenario_wacc, scenario_terminal, Some(growth_rate), default_growth);
            ScenarioResult {
                name: spec.name.clone(),
                wacc: scenario_wacc,
                growth_rate,
                terminal_growth: scenario_terminal,
                intrinsic_value: result.intrinsic_value,
                weight: spec.weight,
            }
        })
        .collect();

    let weighted: Vec<f64> = scenarios
        .iter()
        .filter_map(|s| s.intrinsic_value.non_zero().map(|v| v * s.weight))
        .collect();
    let weighted_intrinsic_value = if weighted.is_empty() {
        Metric::Indeterminate
    } else {
        Metric::new(weighted.iter().sum())
    };

    ScenarioBundle {
        scenarios,
        weighted_intrinsic_value,
    }
}
