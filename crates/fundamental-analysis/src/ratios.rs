use analysis_core::math::{format_number, safe_divide};
use analysis_core::{FundamentalsSnapshot, Metric, RatioKind, RatioResult, RatioVerdict};

/// Below `low × benchmark` is cheap, above `high × benchmark` is expensive.
/// The upper bound is inclusive.
fn band_against_benchmark(value: Metric, benchmark: Metric, low: f64, high: f64) -> RatioVerdict {
    let (Some(v), Some(b)) = (value.value(), benchmark.value()) else {
        return RatioVerdict::InsufficientData;
    };
    if v < low * b {
        RatioVerdict::Undervalued
    } else if v <= high * b {
        RatioVerdict::Neutral
    } else {
        RatioVerdict::Overvalued
    }
}

pub fn verdict_pe(value: Metric, sector: Metric) -> RatioVerdict {
    band_against_benchmark(value, sector, 0.80, 1.20)
}

pub fn verdict_ps(value: Metric, sector: Metric) -> RatioVerdict {
    band_against_benchmark(value, sector, 0.85, 1.15)
}

pub fn verdict_ev_ebitda(value: Metric, sector: Metric) -> RatioVerdict {
    band_against_benchmark(value, sector, 0.85, 1.15)
}

/// Absolute bands: under 1 is cheap, 1–3 inclusive is fair.
pub fn verdict_pb(value: Metric) -> RatioVerdict {
    match value.value() {
        None => RatioVerdict::InsufficientData,
        Some(v) if v < 1.0 => RatioVerdict::Undervalued,
        Some(v) if v <= 3.0 => RatioVerdict::Neutral,
        Some(_) => RatioVerdict::Overvalued,
    }
}

pub fn verdict_peg(value: Metric) -> RatioVerdict {
    match value.value() {
        None => RatioVerdict::InsufficientData,
        Some(v) if v < 1.0 => RatioVerdict::Undervalued,
        Some(v) if (v - 1.0).abs() <= 0.05 => RatioVerdict::Neutral,
        Some(_) => RatioVerdict::Overvalued,
    }
}

/// Market cap plus net debt; missing net debt counts as zero here only.
pub fn enterprise_value(snapshot: &FundamentalsSnapshot) -> Metric {
    snapshot.market_cap.map(|cap| cap + snapshot.net_debt.unwrap_or(0.0))
}

/// Compute the five valuation multiples and their verdicts.
pub fn compute_ratios(snapshot: &FundamentalsSnapshot) -> Vec<RatioResult> {
    let sector = &snapshot.sector_multiples;
    let history = &snapshot.historical_multiples;

    let pe = safe_divide(snapshot.price, snapshot.eps);

    let growth_percent = snapshot.growth_rate.map(|g| g * 100.0);
    let peg = match growth_percent.value() {
        Some(g) if g > 0.0 => safe_divide(pe, growth_percent),
        _ => Metric::Indeterminate,
    };

    let pb = safe_divide(snapshot.price, snapshot.book_value_per_share);
    let ps = safe_divide(snapshot.market_cap.non_zero().into(), snapshot.revenue);

    let ev = enterprise_value(snapshot);
    let ev_ebitda = safe_divide(ev, snapshot.ebitda);

    vec![
        RatioResult {
            kind: RatioKind::PriceEarnings,
            name: "Price to Earnings".to_string(),
            formula: "P/E = Price / EPS".to_string(),
            calculation: format!("{} / {}", format_number(snapshot.price, 2, ""), format_number(snapshot.eps, 2, "")),
            value: pe,
            sector: sector.pe,
            history: history.pe,
            verdict: verdict_pe(pe, sector.pe),
        },
        RatioResult {
            kind: RatioKind::PriceEarningsGrowth,
            name: "Price to Earnings Growth".to_string(),
            formula: "PEG = P/E / Growth (%)".to_string(),
            calculation: format!("{} / {}", format_number(pe, 2, ""), format_number(growth_percent, 2, "")),
            value: peg,
            sector: Metric::Indeterminate,
            history: Metric::Indeterminate,
            verdict: verdict_peg(peg),
        },
        RatioResult {
            kind: RatioKind::PriceBook,
            name: "Price to Book".to_string(),
            formula: "P/B = Price / Book value per share".to_string(),
            calculation: format!(
                "{} / {}",
                format_number(snapshot.price, 2, ""),
                format_number(snapshot.book_value_per_share, 2, "")
            ),
            value: pb,
            sector: sector.pb,
            history: history.pb,
            verdict: verdict_pb(pb),
        },
        RatioResult {
            kind: RatioKind::PriceSales,
            name: "Price to Sales".to_string(),
            formula: "P/S = Market cap / Revenue".to_string(),
            calculation: format!(
                "{} / {}",
                format_number(snapshot.market_cap, 2, ""),
                format_number(snapshot.revenue, 2, "")
            ),
            value: ps,
            sector: sector.ps,
            history: history.ps,
            verdict: verdict_ps(ps, sector.ps),
        },
        RatioResult {
            kind: RatioKind::EvEbitda,
            name: "Enterprise Value / EBITDA".to_string(),
            formula: "EV/EBITDA = Enterprise value / EBITDA".to_string(),
            calculation: format!("{} / {}", format_number(ev, 2, ""), format_number(snapshot.ebitda, 2, "")),
            value: ev_ebitda,
            sector: sector.ev_ebitda,
            history: history.ev_ebitda,
            verdict: verdict_ev_ebitda(ev_ebitda, sector.ev_ebitda),
        },
    ]
}

pub fn find_ratio(ratios: &[RatioResult], kind: RatioKind) -> Option<&RatioResult> {
    ratios.iter().find(|r| r.kind == kind)
}
