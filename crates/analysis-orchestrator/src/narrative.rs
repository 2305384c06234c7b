use analysis_core::math::{format_number, format_percent, safe_divide};
use analysis_core::{DcfResult, FundamentalsSnapshot, RatioKind, RatioResult, ScoreSet};
use fundamental_analysis::find_ratio;

pub const MAX_SUMMARY_LINES: usize = 10;
pub const MAX_POINTS: usize = 4;

pub const GENERIC_RISK: &str = "Sensitivity to macroeconomic cycles and sector regulation";
pub const GENERIC_CATALYST: &str = "Strategic initiatives: product innovation, geographic expansion or margin gains";

fn or_na(value: Option<&str>) -> &str {
    value.unwrap_or("N/A")
}

/// Plain-language investor summary, one sentence per line.
pub fn investor_summary(snapshot: &FundamentalsSnapshot, ratios: &[RatioResult], dcf: &DcfResult) -> Vec<String> {
    let currency = snapshot.currency_label();
    let mut lines = vec![
        format!(
            "{} ({}) - sector {} / industry {}.",
            snapshot.name,
            snapshot.ticker,
            or_na(snapshot.sector.as_deref()),
            or_na(snapshot.industry.as_deref())
        ),
        format!("Current price: {}.", format_number(snapshot.price, 2, currency)),
        format!(
            "Expected growth: {}; return on equity: {}.",
            format_percent(snapshot.growth_rate, 1),
            format_percent(snapshot.roe, 1)
        ),
    ];

    if let Some(pe) = find_ratio(ratios, RatioKind::PriceEarnings) {
        lines.push(format!(
            "Price to Earnings {} vs sector {}: {}.",
            format_number(pe.value, 2, ""),
            format_number(pe.sector, 2, ""),
            pe.verdict.label()
        ));
    }
    if let Some(ps) = find_ratio(ratios, RatioKind::PriceSales) {
        lines.push(format!(
            "Price to Sales {} (sector {}): {}.",
            format_number(ps.value, 2, ""),
            format_number(ps.sector, 2, ""),
            ps.verdict.label()
        ));
    }
    lines.push(format!(
        "Free cash flow used for the DCF: {}.",
        format_number(snapshot.free_cash_flow, 0, currency)
    ));
    if dcf.intrinsic_value.non_zero().is_some() {
        lines.push(format!(
            "Estimated intrinsic value: {}.",
            format_number(dcf.intrinsic_value, 2, currency)
        ));
    }
    lines.push(format!("Net debt: {}.", format_number(snapshot.net_debt, 0, currency)));
    lines.push(format!(
        "Dividend per share: {}.",
        format_number(snapshot.dividend_per_share, 2, currency)
    ));
    lines.push("See the scores for the health / growth / valuation / risk synthesis.".to_string());

    lines.truncate(MAX_SUMMARY_LINES);
    lines
}

pub fn risk_points(snapshot: &FundamentalsSnapshot, scores: &ScoreSet) -> Vec<String> {
    let mut risks = Vec::new();

    if snapshot.growth_rate.value().map_or(true, |g| g < 0.03) {
        risks.push("Limited visibility on revenue growth (<3 % or unknown)".to_string());
    }
    let positive_ebitda = snapshot.ebitda.value().filter(|e| *e > 0.0);
    let leverage = safe_divide(snapshot.net_debt.non_zero().into(), positive_ebitda.into());
    if leverage.value().is_some_and(|l| l > 3.0) {
        risks.push("High financial leverage (net debt / EBITDA > 3x)".to_string());
    }
    if snapshot.free_cash_flow.value().map_or(true, |f| f < 0.0) {
        risks.push("Fragile or negative free cash flow".to_string());
    }
    if scores.risk < 50.0 {
        risks.push("Beta and volatility above peers (high risk profile)".to_string());
    }
    risks.push(GENERIC_RISK.to_string());

    risks.truncate(MAX_POINTS);
    risks
}

pub fn catalysts(snapshot: &FundamentalsSnapshot, scores: &ScoreSet) -> Vec<String> {
    let mut catalysts = Vec::new();

    if snapshot.growth_rate.value().is_some_and(|g| g > 0.1) {
        catalysts.push("Strong organic growth potential (>10 % a year)".to_string());
    }
    if snapshot.free_cash_flow.value().is_some_and(|f| f > 0.0)
        && snapshot.dividend_per_share.unwrap_or(0.0) > 0.0
    {
        catalysts.push("Attractive cash distribution (dividends or buybacks)".to_string());
    }
    if scores.valuation >= 70.0 {
        catalysts.push("Attractive multiples vs. sector (valuation below average)".to_string());
    }
    if snapshot.net_debt.value().is_some_and(|d| d < 0.0) {
        catalysts.push("Net cash balance sheet enabling opportunistic acquisitions".to_string());
    }
    catalysts.push(GENERIC_CATALYST.to_string());

    catalysts.truncate(MAX_POINTS);
    catalysts
}
