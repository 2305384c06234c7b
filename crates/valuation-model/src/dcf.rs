use analysis_core::math::safe_divide;
use analysis_core::{CashFlowYear, DcfResult, FundamentalsSnapshot, GrowthSource, Metric};

pub const FORECAST_YEARS: u32 = 5;
/// Minimum spread kept between WACC and terminal growth.
pub const TERMINAL_SPREAD: f64 = 0.005;

/// Terminal growth clamped into `[0, wacc - 0.005]`.
pub fn effective_terminal_growth(wacc: f64, terminal_growth: f64) -> f64 {
    terminal_growth.max(0.0).min(wacc - TERMINAL_SPREAD)
}

/// One five-year discounted cash flow evaluation.
///
/// Needs a non-zero free cash flow and a non-zero share count; otherwise the
/// insufficient-data shape is returned. `growth_override` takes precedence
/// over the snapshot growth, which takes precedence over `default_growth`.
pub fn evaluate(
    snapshot: &FundamentalsSnapshot,
    wacc: f64,
    terminal_growth: f64,
    growth_override: Option<f64>,
    default_growth: f64,
) -> DcfResult {
    let (Some(base_fcf), Some(_)) = (snapshot.free_cash_flow.non_zero(), snapshot.shares_outstanding.non_zero()) else {
        return DcfResult::insufficient();
    };

    let (growth, growth_source) = match (growth_override, snapshot.growth_rate.value()) {
        (Some(g), _) => (g, GrowthSource::ScenarioOverride),
        (None, Some(g)) => (g, GrowthSource::Reported),
        (None, None) => (default_growth, GrowthSource::AssumedDefault),
    };

    let mut projections = Vec::with_capacity(FORECAST_YEARS as usize);
    let mut cash_flow = base_fcf;
    for year in 1..=FORECAST_YEARS {
        cash_flow *= 1.0 + growth;
        let present_value = cash_flow / (1.0 + wacc).powi(year as i32);
        projections.push(CashFlowYear {
            year,
            cash_flow,
            present_value,
        });
    }

    let terminal = effective_terminal_growth(wacc, terminal_growth);
    let terminal_value = Metric::new(cash_flow * (1.0 + terminal) / (wacc - terminal));
    let pv_terminal = terminal_value.map(|tv| tv / (1.0 + wacc).powi(FORECAST_YEARS as i32));
    let pv_sum: f64 = projections.iter().map(|p| p.present_value).sum();
    let enterprise_value = pv_terminal.map(|pv| pv + pv_sum);
    let equity_value = enterprise_value.map(|ev| ev - snapshot.net_debt.unwrap_or(0.0));
    let intrinsic_value = safe_divide(equity_value, snapshot.shares_outstanding);

    DcfResult {
        projections,
        growth_rate: Metric::new(growth),
        terminal_growth: Metric::new(terminal),
        terminal_value,
        pv_terminal,
        enterprise_value,
        equity_value,
        intrinsic_value,
        growth_source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use analysis_core::DEFAULT_GROWTH;

    fn snapshot() -> FundamentalsSnapshot {
        FundamentalsSnapshot {
            free_cash_flow: Metric::Value(1_000.0),
            shares_outstanding: Metric::Value(100.0),
            growth_rate: Metric::Value(0.05),
            net_debt: Metric::Value(0.0),
            ..Default::default()
        }
    }

    fn within(actual: Metric, expected: f64, tolerance: f64) -> bool {
        actual.value().is_some_and(|v| ((v - expected) / expected).abs() <= tolerance)
    }

    #[test]
    fn test_reference_valuation() {
        let dcf = evaluate(&snapshot(), 0.08, 0.025, None, DEFAULT_GROWTH);
        assert_eq!(dcf.growth_source, GrowthSource::Reported);
        assert_eq!(dcf.projections.len(), 5);

        let expected_pv = [972.2, 945.1, 918.9, 893.1, 868.7];
        for (row, expected) in dcf.projections.iter().zip(expected_pv) {
            assert!(within(Metric::Value(row.present_value), expected, 0.01), "{:?}", row);
        }
        assert!(within(dcf.terminal_value, 23_785.0, 0.01));
        assert!(within(dcf.enterprise_value, 20_786.0, 0.01));
        assert!(within(dcf.intrinsic_value, 207.9, 0.01));
    }

    #[test]
    fn test_terminal_growth_clamped() {
        let dcf = evaluate(&snapshot(), 0.08, 0.20, None, DEFAULT_GROWTH);
        assert!((dcf.terminal_growth.value().unwrap() - 0.075).abs() < 1e-12);

        let dcf = evaluate(&snapshot(), 0.08, -0.03, None, DEFAULT_GROWTH);
        assert_eq!(dcf.terminal_growth, Metric::Value(0.0));
    }

    #[test]
    fn test_growth_source_selection() {
        let mut s = snapshot();
        assert_eq!(
            evaluate(&s, 0.08, 0.025, Some(0.01), DEFAULT_GROWTH).growth_source,
            GrowthSource::ScenarioOverride
        );
        s.growth_rate = Metric::Indeterminate;
        let dcf = evaluate(&s, 0.08, 0.025, None, DEFAULT_GROWTH);
        assert_eq!(dcf.growth_source, GrowthSource::AssumedDefault);
        assert_eq!(dcf.growth_rate, Metric::Value(DEFAULT_GROWTH));
    }

    #[test]
    fn test_missing_inputs_are_insufficient() {
        let mut s = snapshot();
        s.free_cash_flow = Metric::Value(0.0);
        assert_eq!(evaluate(&s, 0.08, 0.025, None, DEFAULT_GROWTH), DcfResult::insufficient());

        let mut s = snapshot();
        s.shares_outstanding = Metric::Indeterminate;
        let dcf = evaluate(&s, 0.08, 0.025, None, DEFAULT_GROWTH);
        assert!(!dcf.is_usable());
        assert!(dcf.intrinsic_value.is_indeterminate());
    }

    #[test]
    fn test_net_debt_reduces_equity() {
        let mut s = snapshot();
        s.net_debt = Metric::Value(2_000.0);
        let base = evaluate(&snapshot(), 0.08, 0.025, None, DEFAULT_GROWTH);
        let levered = evaluate(&s, 0.08, 0.025, None, DEFAULT_GROWTH);
        let diff = base.intrinsic_value.value().unwrap() - levered.intrinsic_value.value().unwrap();
        assert!((diff - 20.0).abs() < 1e-9);
    }
}
