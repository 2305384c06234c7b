use analysis_core::math::safe_divide;
use analysis_core::{AdvancedMetrics, FundamentalsSnapshot, Metric};

/// Net income over equity + debt - cash. Needs both equity and debt.
pub fn roic(snapshot: &FundamentalsSnapshot) -> Metric {
    let invested = snapshot
        .equity
        .zip_with(snapshot.total_debt, |e, d| e + d - snapshot.total_cash.unwrap_or(0.0));
    safe_divide(snapshot.net_income, invested)
}

pub fn fcf_yield(snapshot: &FundamentalsSnapshot) -> Metric {
    safe_divide(snapshot.free_cash_flow, snapshot.market_cap)
}

/// Net margin used as an operating-margin proxy.
pub fn operating_margin(snapshot: &FundamentalsSnapshot) -> Metric {
    safe_divide(snapshot.net_income, snapshot.revenue)
}

/// Simplified nine-signal Piotroski-style score.
///
/// Returns `None` when none of the base signals (net income, FCF, growth,
/// net debt, payout, strong ROE) could be evaluated.
pub fn piotroski_score(snapshot: &FundamentalsSnapshot, roic: Metric, fcf_yield: Metric) -> Option<u8> {
    let mut score = 0u8;
    let mut available = false;

    let base_signals: [(Metric, fn(f64) -> bool); 5] = [
        (snapshot.net_income, |v| v > 0.0),
        (snapshot.free_cash_flow, |v| v > 0.0),
        (snapshot.growth_rate, |v| v > 0.0),
        (snapshot.net_debt, |v| v <= 0.0),
        (snapshot.payout_ratio, |v| v > 0.0 && v < 0.7),
    ];
    for (metric, passes) in base_signals {
        if let Some(v) = metric.value() {
            available = true;
            if passes(v) {
                score += 1;
            }
        }
    }

    // Weak ROE does not count as an available signal.
    if snapshot.roe.value().is_some_and(|v| v > 0.15) {
        available = true;
        score += 1;
    }

    let bonus = [
        roic.value().is_some_and(|v| v > 0.1),
        fcf_yield.value().is_some_and(|v| v > 0.05),
        operating_margin(snapshot).value().is_some_and(|v| v > 0.1),
    ];
    score += bonus.iter().filter(|hit| **hit).count() as u8;

    available.then_some(score)
}

/// Altman-style Z-score approximated from the snapshot. Assets are proxied
/// by equity + debt; indeterminate when that is not positive.
pub fn z_score(snapshot: &FundamentalsSnapshot) -> Metric {
    let equity = snapshot.equity.unwrap_or(0.0);
    let total_debt = snapshot.total_debt.unwrap_or(0.0);
    let assets = equity + total_debt;
    if assets <= 0.0 {
        return Metric::Indeterminate;
    }

    let working_capital = snapshot.total_cash.unwrap_or(0.0) - snapshot.net_debt.unwrap_or(0.0).max(0.0);
    let retained_earnings = snapshot.net_income.unwrap_or(0.0);
    let ebit = snapshot
        .ebitda
        .non_zero()
        .or(snapshot.net_income.non_zero())
        .unwrap_or(0.0)
        * 0.8;
    let market_value_equity = snapshot.market_cap.unwrap_or(0.0);
    let revenue = snapshot.revenue.unwrap_or(0.0);
    let liabilities = if total_debt > 0.0 { total_debt } else { 1.0 };

    Metric::new(
        1.2 * (working_capital / assets)
            + 1.4 * (retained_earnings / assets)
            + 3.3 * (ebit / assets)
            + 0.6 * (market_value_equity / liabilities)
            + 1.0 * (revenue / assets),
    )
}

pub fn compute_advanced_metrics(snapshot: &FundamentalsSnapshot) -> AdvancedMetrics {
    let roic = roic(snapshot);
    let fcf_yield = fcf_yield(snapshot);
    AdvancedMetrics {
        roic,
        fcf_yield,
        operating_margin: operating_margin(snapshot),
        piotroski_score: piotroski_score(snapshot, roic, fcf_yield),
        z_score: z_score(snapshot),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn healthy() -> FundamentalsSnapshot {
        FundamentalsSnapshot {
            net_income: Metric::Value(200.0),
            revenue: Metric::Value(1_000.0),
            equity: Metric::Value(800.0),
            total_debt: Metric::Value(400.0),
            total_cash: Metric::Value(200.0),
            net_debt: Metric::Value(200.0),
            free_cash_flow: Metric::Value(150.0),
            market_cap: Metric::Value(2_000.0),
            growth_rate: Metric::Value(0.08),
            payout_ratio: Metric::Value(0.3),
            roe: Metric::Value(0.25),
            ebitda: Metric::Value(300.0),
            ..Default::default()
        }
    }

    #[test]
    fn test_ratios() {
        let s = healthy();
        assert!((roic(&s).value().unwrap() - 0.2).abs() < 1e-12);
        assert!((fcf_yield(&s).value().unwrap() - 0.075).abs() < 1e-12);
        assert!((operating_margin(&s).value().unwrap() - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_roic_needs_equity_and_debt() {
        let mut s = healthy();
        s.total_debt = Metric::Indeterminate;
        assert!(roic(&s).is_indeterminate());
    }

    #[test]
    fn test_piotroski() {
        let m = compute_advanced_metrics(&healthy());
        // Every signal except non-positive net debt.
        assert_eq!(m.piotroski_score, Some(8));
        assert_eq!(compute_advanced_metrics(&FundamentalsSnapshot::default()).piotroski_score, None);

        let weak_roe = FundamentalsSnapshot {
            roe: Metric::Value(0.05),
            ..Default::default()
        };
        assert_eq!(piotroski_score(&weak_roe, Metric::Indeterminate, Metric::Indeterminate), None);
    }

    #[test]
    fn test_z_score() {
        let s = healthy();
        // assets 1200, wc 0, re 200, ebit 240, mve/liab 5, rev 1000
        let expected = 1.4 * (200.0 / 1200.0) + 3.3 * (240.0 / 1200.0) + 0.6 * 5.0 + 1_000.0 / 1200.0;
        assert!((z_score(&s).value().unwrap() - expected).abs() < 1e-9);
        assert!(z_score(&FundamentalsSnapshot::default()).is_indeterminate());
    }
}
