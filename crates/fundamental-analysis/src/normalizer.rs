use std::collections::BTreeMap;

use analysis_core::math::net_debt;
use analysis_core::{
    BenchmarkTable, FundamentalsSnapshot, GapFiller, Metric, Multiples, OverridableField, RawBundle,
    DEFAULT_SECTOR_PROFILE,
};

const FREE_CASH_FLOW_ROWS: [&str; 2] = ["FreeCashFlow", "Free Cash Flow"];
const OPERATING_CASH_FLOW_ROWS: [&str; 3] = [
    "Total Cash From Operating Activities",
    "Operating Cash Flow",
    "Cash Flow From Continuing Operating Activities",
];
const CAPEX_ROWS: [&str; 2] = ["Capital Expenditures", "Capital Expenditure"];

/// A snapshot plus the ordered human-readable notes describing every
/// heuristic substitution applied while building it.
#[derive(Debug, Clone)]
pub struct NormalizedSnapshot {
    pub snapshot: FundamentalsSnapshot,
    pub assumptions: Vec<String>,
}

/// Growth figures above 5 are read as percentages, anything else as a fraction.
///
/// A true fractional rate of 6.0 (600 %) is indistinguishable from "6 %" and is
/// read as 0.06.
pub fn normalize_growth(raw: Metric) -> Metric {
    raw.map(|g| if g > 5.0 { g / 100.0 } else { g })
}

/// Build a snapshot from a raw provider bundle.
pub fn normalize(raw: &RawBundle, sector_override: Option<&str>, benchmarks: &BenchmarkTable) -> NormalizedSnapshot {
    let mut assumptions = Vec::new();

    let price = Metric::first_valid([
        raw.quote_number("lastPrice"),
        raw.quote_number("regularMarketPrice"),
        raw.summary_number("regularMarketPrice"),
        raw.summary_number("currentPrice"),
        raw.summary_number("previousClose"),
    ]);
    let currency = raw.quote_text("currency").or_else(|| raw.summary_text("currency"));
    let eps = Metric::first_valid([
        raw.summary_number("trailingEps"),
        raw.summary_number("epsTrailingTwelveMonths"),
    ]);

    let mut growth_rate = normalize_growth(Metric::first_valid([
        raw.summary_number("earningsGrowth"),
        raw.summary_number("earningsQuarterlyGrowth"),
        raw.summary_number("revenueQuarterlyGrowth"),
    ]));
    if growth_rate.is_indeterminate() {
        growth_rate = normalize_growth(Metric::from(raw.earnings_trend_growth));
    }

    let book_value_per_share = Metric::first_valid([
        raw.summary_number("bookValue"),
        raw.summary_number("bookValuePerShare"),
    ]);
    let shares_outstanding = Metric::first_valid([
        raw.summary_number("sharesOutstanding"),
        raw.summary_number("floatShares"),
    ]);
    let equity = raw
        .summary_number("totalStockholderEquity")
        .or(book_value_per_share.zip_with(shares_outstanding, |bvps, shares| bvps * shares));

    let total_debt = raw.summary_number("totalDebt");
    let total_cash = raw.summary_number("totalCash");
    let net_debt = net_debt(raw.summary_number("netDebt"), total_debt, total_cash);

    let market_cap = raw.summary_number("marketCap").or(
        price
            .zip_with(shares_outstanding, |p, s| p * s)
            .non_zero()
            .into(),
    );

    let free_cash_flow = derive_free_cash_flow(raw);

    let sector = sector_override
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .or_else(|| raw.summary_text("sector"));
    match sector.as_deref() {
        None => assumptions.push(format!(
            "Sector not provided by the data source; using the '{}' benchmark profile.",
            DEFAULT_SECTOR_PROFILE
        )),
        Some(s) if !benchmarks.contains(s) => assumptions.push(format!(
            "No benchmark profile for sector '{}'; using the '{}' profile.",
            s, DEFAULT_SECTOR_PROFILE
        )),
        Some(_) => {}
    }
    let sector_multiples = Multiples::from(benchmarks.lookup(sector.as_deref()));

    let ticker = raw.symbol.trim().to_uppercase();
    let name = raw
        .summary_text("longName")
        .or_else(|| raw.summary_text("shortName"))
        .unwrap_or_else(|| ticker.clone());

    let snapshot = FundamentalsSnapshot {
        name,
        sector,
        industry: raw.summary_text("industry"),
        currency,
        price,
        shares_outstanding,
        market_cap,
        beta: raw.summary_number("beta"),
        dividend_per_share: raw.summary_number("dividendRate"),
        eps,
        revenue: raw.summary_number("totalRevenue"),
        net_income: Metric::first_valid([
            raw.summary_number("netIncomeToCommon"),
            raw.summary_number("netIncome"),
        ]),
        ebitda: raw.summary_number("ebitda"),
        growth_rate,
        roe: raw.summary_number("returnOnEquity"),
        roa: raw.summary_number("returnOnAssets"),
        payout_ratio: raw.summary_number("payoutRatio"),
        book_value_per_share,
        equity,
        total_debt,
        total_cash,
        net_debt,
        free_cash_flow,
        sector_multiples,
        historical_multiples: raw.historical_multiples,
        ticker,
    };

    tracing::debug!(
        "Normalized {}: price={} eps={} growth={} fcf={} shares={}",
        snapshot.ticker,
        snapshot.price,
        snapshot.eps,
        snapshot.growth_rate,
        snapshot.free_cash_flow,
        snapshot.shares_outstanding
    );

    NormalizedSnapshot { snapshot, assumptions }
}

/// Reported FCF first, otherwise operating cash flow less capital expenditure.
fn derive_free_cash_flow(raw: &RawBundle) -> Metric {
    let direct = raw.cash_flow_row(&FREE_CASH_FLOW_ROWS).or(raw.summary_number("freeCashflow"));
    if direct.is_present() {
        return direct;
    }
    let operating = raw
        .cash_flow_row(&OPERATING_CASH_FLOW_ROWS)
        .or(raw.summary_number("operatingCashflow"));
    // Statements report capex as an outflow (negative); accept either sign.
    let capex = raw.cash_flow_row(&CAPEX_ROWS);
    operating.zip_with(capex, |ocf, capex| ocf - capex.abs())
}

/// Force caller-supplied values onto the snapshot, recording one note per field.
pub fn apply_overrides(
    snapshot: &mut FundamentalsSnapshot,
    overrides: &BTreeMap<OverridableField, f64>,
    assumptions: &mut Vec<String>,
) {
    for (&field, &value) in overrides {
        let metric = Metric::new(value);
        let Some(v) = metric.value() else {
            continue;
        };
        field.set(snapshot, metric);
        let note = match field {
            OverridableField::GrowthRate => format!("{} forced to {:.2} %.", field.label(), v * 100.0),
            _ => format!("{} forced to {}.", field.label(), v),
        };
        assumptions.push(note);
    }
}

/// Offer every still-missing gap-fillable field to `filler`. With no filler
/// (the service path) the snapshot is left untouched.
pub fn fill_gaps(snapshot: &mut FundamentalsSnapshot, filler: Option<&dyn GapFiller>, assumptions: &mut Vec<String>) {
    let Some(filler) = filler else {
        return;
    };

    for field in OverridableField::GAP_FILLABLE {
        if field.get(snapshot).is_present() {
            continue;
        }
        let Some(value) = filler.supply(field, snapshot).map(Metric::new).and_then(Metric::value) else {
            continue;
        };
        if value < 0.0 && !field.allows_negative() {
            assumptions.push(format!("{} supplied manually was negative and ignored ({}).", field.label(), value));
            continue;
        }

        if field == OverridableField::GrowthRate {
            // Entries above 1 are taken as percentages.
            let (fraction, shown) = if value > 1.0 { (value / 100.0, value) } else { (value, value * 100.0) };
            field.set(snapshot, Metric::new(fraction));
            assumptions.push(format!("{} supplied manually ({:.2} %).", field.label(), shown));
        } else {
            field.set(snapshot, Metric::new(value));
            assumptions.push(format!("{} supplied manually ({}).", field.label(), value));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw_bundle() -> RawBundle {
        let mut raw = RawBundle::new("acme");
        raw.summary.insert("longName".into(), json!("Acme Corp"));
        raw.summary.insert("sector".into(), json!("Technology"));
        raw.summary.insert("currentPrice".into(), json!(50.0));
        raw.summary.insert("trailingEps".into(), json!(2.5));
        raw.summary.insert("earningsGrowth".into(), json!(12.0));
        raw.summary.insert("bookValue".into(), json!(10.0));
        raw.summary.insert("sharesOutstanding".into(), json!(1000.0));
        raw.summary.insert("totalDebt".into(), json!(3000.0));
        raw.summary.insert("totalCash".into(), json!(1000.0));
        raw
    }

    struct FixedFiller(f64);

    impl GapFiller for FixedFiller {
        fn supply(&self, _field: OverridableField, _snapshot: &FundamentalsSnapshot) -> Option<f64> {
            Some(self.0)
        }
    }

    #[test]
    fn test_normalize_growth_threshold() {
        assert_eq!(normalize_growth(Metric::Value(6.0)), Metric::Value(0.06));
        assert_eq!(normalize_growth(Metric::Value(4.0)), Metric::Value(4.0));
        assert_eq!(normalize_growth(Metric::Value(5.0)), Metric::Value(5.0));
        assert!(normalize_growth(Metric::Indeterminate).is_indeterminate());
    }

    #[test]
    fn test_price_priority_skips_invalid_sources() {
        let mut raw = raw_bundle();
        raw.quote.insert("lastPrice".into(), json!("NaN"));
        raw.quote.insert("regularMarketPrice".into(), json!(48.0));
        let n = normalize(&raw, None, &BenchmarkTable::default());
        assert_eq!(n.snapshot.price, Metric::Value(48.0));
    }

    #[test]
    fn test_derived_fields() {
        let n = normalize(&raw_bundle(), None, &BenchmarkTable::default());
        let s = &n.snapshot;
        assert_eq!(s.ticker, "ACME");
        assert_eq!(s.name, "Acme Corp");
        assert_eq!(s.growth_rate, Metric::Value(0.12));
        assert_eq!(s.equity, Metric::Value(10_000.0));
        assert_eq!(s.net_debt, Metric::Value(2000.0));
        assert_eq!(s.market_cap, Metric::Value(50_000.0));
        assert_eq!(s.sector_multiples.pe, Metric::Value(27.0));
        assert!(n.assumptions.is_empty());
    }

    #[test]
    fn test_reported_equity_wins() {
        let mut raw = raw_bundle();
        raw.summary.insert("totalStockholderEquity".into(), json!(12_345.0));
        let n = normalize(&raw, None, &BenchmarkTable::default());
        assert_eq!(n.snapshot.equity, Metric::Value(12_345.0));
    }

    #[test]
    fn test_free_cash_flow_fallback() {
        let mut raw = raw_bundle();
        raw.cash_flow.insert("Operating Cash Flow".into(), vec![Some(900.0)]);
        raw.cash_flow.insert("Capital Expenditure".into(), vec![Some(-300.0)]);
        let n = normalize(&raw, None, &BenchmarkTable::default());
        assert_eq!(n.snapshot.free_cash_flow, Metric::Value(600.0));

        raw.cash_flow.insert("Free Cash Flow".into(), vec![Some(750.0)]);
        let n = normalize(&raw, None, &BenchmarkTable::default());
        assert_eq!(n.snapshot.free_cash_flow, Metric::Value(750.0));

        let mut no_capex = raw_bundle();
        no_capex.cash_flow.insert("Operating Cash Flow".into(), vec![Some(900.0)]);
        let n = normalize(&no_capex, None, &BenchmarkTable::default());
        assert!(n.snapshot.free_cash_flow.is_indeterminate());
    }

    #[test]
    fn test_sector_resolution() {
        let mut raw = raw_bundle();
        let n = normalize(&raw, Some("Energy"), &BenchmarkTable::default());
        assert_eq!(n.snapshot.sector.as_deref(), Some("Energy"));
        assert_eq!(n.snapshot.sector_multiples.pe, Metric::Value(9.0));

        raw.summary.remove("sector");
        let n = normalize(&raw, None, &BenchmarkTable::default());
        assert!(n.snapshot.sector.is_none());
        assert_eq!(n.snapshot.sector_multiples.pe, Metric::Value(18.0));
        assert_eq!(n.assumptions.len(), 1);
    }

    #[test]
    fn test_net_debt_absent_when_unreported() {
        let mut raw = raw_bundle();
        raw.summary.remove("totalDebt");
        raw.summary.remove("totalCash");
        let n = normalize(&raw, None, &BenchmarkTable::default());
        assert!(n.snapshot.net_debt.is_indeterminate());

        raw.summary.insert("netDebt".into(), json!(750.0));
        let n = normalize(&raw, None, &BenchmarkTable::default());
        assert_eq!(n.snapshot.net_debt, Metric::Value(750.0));
    }

    #[test]
    fn test_overrides_replace_and_note() {
        let n = normalize(&raw_bundle(), None, &BenchmarkTable::default());
        let mut snapshot = n.snapshot;
        let mut notes = Vec::new();
        let overrides = BTreeMap::from([(OverridableField::Price, 60.0), (OverridableField::GrowthRate, 0.12)]);
        apply_overrides(&mut snapshot, &overrides, &mut notes);
        assert_eq!(snapshot.price, Metric::Value(60.0));
        assert_eq!(notes, vec!["Current price forced to 60.".to_string(), "Expected growth forced to 12.00 %.".to_string()]);
    }

    #[test]
    fn test_fill_gaps_disabled_leaves_absent() {
        let mut snapshot = FundamentalsSnapshot::default();
        let mut notes = Vec::new();
        fill_gaps(&mut snapshot, None, &mut notes);
        assert!(snapshot.price.is_indeterminate());
        assert!(notes.is_empty());
    }

    #[test]
    fn test_fill_gaps_supplies_missing_fields_only() {
        let mut snapshot = FundamentalsSnapshot::default();
        snapshot.eps = Metric::Value(1.0);
        let mut notes = Vec::new();
        fill_gaps(&mut snapshot, Some(&FixedFiller(8.0)), &mut notes);
        assert_eq!(snapshot.price, Metric::Value(8.0));
        assert_eq!(snapshot.eps, Metric::Value(1.0));
        assert_eq!(snapshot.growth_rate, Metric::Value(0.08));
        assert!(snapshot.shares_outstanding.is_indeterminate());
        assert_eq!(notes.len(), 4);
    }
}
