use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

use crate::{Metric, SectorBenchmarks};

/// Raw fundamentals exactly as returned by the market-data provider.
///
/// Field values may be missing, zero, non-numeric or non-finite; the
/// normalizer is responsible for turning this into a [`FundamentalsSnapshot`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawBundle {
    pub symbol: String,
    /// Lightweight real-time quote fields (`lastPrice`, `regularMarketPrice`, `currency`).
    #[serde(default)]
    pub quote: Map<String, Value>,
    /// Flattened company profile / key statistics (`trailingEps`, `bookValue`, `sector`, ...).
    #[serde(default)]
    pub summary: Map<String, Value>,
    /// Cash-flow statement rows, each ordered most recent period first.
    #[serde(default)]
    pub cash_flow: BTreeMap<String, Vec<Option<f64>>>,
    /// Current-year growth from the analyst earnings trend, as reported.
    #[serde(default)]
    pub earnings_trend_growth: Option<f64>,
    #[serde(default)]
    pub historical_multiples: Multiples,
}

impl RawBundle {
    pub fn new(symbol: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            ..Default::default()
        }
    }

    pub fn quote_number(&self, key: &str) -> Metric {
        self.quote.get(key).map(json_number).unwrap_or_default()
    }

    pub fn summary_number(&self, key: &str) -> Metric {
        self.summary.get(key).map(json_number).unwrap_or_default()
    }

    pub fn quote_text(&self, key: &str) -> Option<String> {
        self.quote.get(key).and_then(json_text)
    }

    pub fn summary_text(&self, key: &str) -> Option<String> {
        self.summary.get(key).and_then(json_text)
    }

    /// First present value in the first listed row that exists and holds one.
    pub fn cash_flow_row(&self, names: &[&str]) -> Metric {
        names
            .iter()
            .filter_map(|name| self.cash_flow.get(*name))
            .flat_map(|row| row.iter())
            .map(|v| Metric::from(*v))
            .find(|m| m.is_present())
            .unwrap_or_default()
    }

    /// True when no field at all was returned.
    pub fn is_empty(&self) -> bool {
        self.quote.is_empty() && self.summary.is_empty() && self.cash_flow.is_empty()
    }
}

/// Accepts plain numbers, numeric strings and Yahoo-style `{"raw": n, "fmt": ".."}` objects.
fn json_number(value: &Value) -> Metric {
    match value {
        Value::Number(n) => Metric::from(n.as_f64()),
        Value::String(s) => s.trim().parse::<f64>().map(Metric::new).unwrap_or_default(),
        Value::Object(obj) => obj.get("raw").map(json_number).unwrap_or_default(),
        _ => Metric::Indeterminate,
    }
}

fn json_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    }
}

/// P/E, P/B, P/S and EV/EBITDA, each possibly indeterminate.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Multiples {
    pub pe: Metric,
    pub pb: Metric,
    pub ps: Metric,
    pub ev_ebitda: Metric,
}

impl From<SectorBenchmarks> for Multiples {
    fn from(b: SectorBenchmarks) -> Self {
        Self {
            pe: Metric::new(b.pe),
            pb: Metric::new(b.pb),
            ps: Metric::new(b.ps),
            ev_ebitda: Metric::new(b.ev_ebitda),
        }
    }
}

/// Clean, gap-aware company fundamentals for one analysis run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FundamentalsSnapshot {
    pub ticker: String,
    pub name: String,
    pub sector: Option<String>,
    pub industry: Option<String>,
    pub currency: Option<String>,

    pub price: Metric,
    pub shares_outstanding: Metric,
    pub market_cap: Metric,
    pub beta: Metric,
    pub dividend_per_share: Metric,

    pub eps: Metric,
    pub revenue: Metric,
    pub net_income: Metric,
    pub ebitda: Metric,
    /// Decimal fraction: 0.10 = 10 %.
    pub growth_rate: Metric,
    pub roe: Metric,
    pub roa: Metric,
    pub payout_ratio: Metric,

    pub book_value_per_share: Metric,
    pub equity: Metric,
    pub total_debt: Metric,
    pub total_cash: Metric,
    pub net_debt: Metric,

    pub free_cash_flow: Metric,

    pub sector_multiples: Multiples,
    pub historical_multiples: Multiples,
}

impl FundamentalsSnapshot {
    /// At least one of price, market cap, revenue, EPS or FCF is present and non-zero.
    pub fn has_core_data(&self) -> bool {
        [self.price, self.market_cap, self.revenue, self.eps, self.free_cash_flow]
            .iter()
            .any(|m| m.non_zero().is_some())
    }

    pub fn currency_label(&self) -> &str {
        self.currency.as_deref().unwrap_or("")
    }
}

/// The closed set of snapshot fields a caller may force or gap-fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverridableField {
    Price,
    Eps,
    GrowthRate,
    BookValuePerShare,
    SharesOutstanding,
    FreeCashFlow,
}

impl OverridableField {
    pub const ALL: [OverridableField; 6] = [
        OverridableField::Price,
        OverridableField::Eps,
        OverridableField::GrowthRate,
        OverridableField::BookValuePerShare,
        OverridableField::SharesOutstanding,
        OverridableField::FreeCashFlow,
    ];

    /// Fields the gap-filling hook is offered, in prompt order.
    pub const GAP_FILLABLE: [OverridableField; 5] = [
        OverridableField::Price,
        OverridableField::Eps,
        OverridableField::GrowthRate,
        OverridableField::BookValuePerShare,
        OverridableField::FreeCashFlow,
    ];

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.key() == key)
    }

    pub fn key(self) -> &'static str {
        match self {
            OverridableField::Price => "price",
            OverridableField::Eps => "eps",
            OverridableField::GrowthRate => "growth_rate",
            OverridableField::BookValuePerShare => "book_value_per_share",
            OverridableField::SharesOutstanding => "shares_outstanding",
            OverridableField::FreeCashFlow => "free_cash_flow",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            OverridableField::Price => "Current price",
            OverridableField::Eps => "Earnings per share",
            OverridableField::GrowthRate => "Expected growth",
            OverridableField::BookValuePerShare => "Book value per share",
            OverridableField::SharesOutstanding => "Shares outstanding",
            OverridableField::FreeCashFlow => "Free cash flow",
        }
    }

    /// Whether a negative value is meaningful for this field.
    pub fn allows_negative(self) -> bool {
        matches!(self, OverridableField::GrowthRate | OverridableField::FreeCashFlow)
    }

    pub fn get(self, snapshot: &FundamentalsSnapshot) -> Metric {
        match self {
            OverridableField::Price => snapshot.price,
            OverridableField::Eps => snapshot.eps,
            OverridableField::GrowthRate => snapshot.growth_rate,
            OverridableField::BookValuePerShare => snapshot.book_value_per_share,
            OverridableField::SharesOutstanding => snapshot.shares_outstanding,
            OverridableField::FreeCashFlow => snapshot.free_cash_flow,
        }
    }

    pub fn set(self, snapshot: &mut FundamentalsSnapshot, value: Metric) {
        let slot = match self {
            OverridableField::Price => &mut snapshot.price,
            OverridableField::Eps => &mut snapshot.eps,
            OverridableField::GrowthRate => &mut snapshot.growth_rate,
            OverridableField::BookValuePerShare => &mut snapshot.book_value_per_share,
            OverridableField::SharesOutstanding => &mut snapshot.shares_outstanding,
            OverridableField::FreeCashFlow => &mut snapshot.free_cash_flow,
        };
        *slot = value;
    }
}

impl fmt::Display for OverridableField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RatioKind {
    PriceEarnings,
    PriceEarningsGrowth,
    PriceBook,
    PriceSales,
    EvEbitda,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RatioVerdict {
    Undervalued,
    Neutral,
    Overvalued,
    InsufficientData,
}

impl RatioVerdict {
    pub fn is_definite(self) -> bool {
        !matches!(self, RatioVerdict::InsufficientData)
    }

    pub fn label(self) -> &'static str {
        match self {
            RatioVerdict::Undervalued => "UNDERVALUED",
            RatioVerdict::Neutral => "NEUTRAL",
            RatioVerdict::Overvalued => "OVERVALUED",
            RatioVerdict::InsufficientData => "Insufficient data",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatioResult {
    pub kind: RatioKind,
    pub name: String,
    pub formula: String,
    pub calculation: String,
    pub value: Metric,
    pub sector: Metric,
    pub history: Metric,
    pub verdict: RatioVerdict,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrowthSource {
    Reported,
    AssumedDefault,
    ScenarioOverride,
    InsufficientData,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CashFlowYear {
    pub year: u32,
    pub cash_flow: f64,
    pub present_value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DcfResult {
    /// Empty when the DCF could not run.
    pub projections: Vec<CashFlowYear>,
    pub growth_rate: Metric,
    /// Terminal growth after clamping to [0, WACC - 0.005].
    pub terminal_growth: Metric,
    pub terminal_value: Metric,
    pub pv_terminal: Metric,
    pub enterprise_value: Metric,
    pub equity_value: Metric,
    pub intrinsic_value: Metric,
    pub growth_source: GrowthSource,
}

impl DcfResult {
    pub fn insufficient() -> Self {
        Self {
            projections: Vec::new(),
            growth_rate: Metric::Indeterminate,
            terminal_growth: Metric::Indeterminate,
            terminal_value: Metric::Indeterminate,
            pv_terminal: Metric::Indeterminate,
            enterprise_value: Metric::Indeterminate,
            equity_value: Metric::Indeterminate,
            intrinsic_value: Metric::Indeterminate,
            growth_source: GrowthSource::InsufficientData,
        }
    }

    pub fn is_usable(&self) -> bool {
        !self.projections.is_empty()
    }

    pub fn pv_sum(&self) -> Metric {
        if self.projections.is_empty() {
            return Metric::Indeterminate;
        }
        Metric::new(self.projections.iter().map(|p| p.present_value).sum())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub name: String,
    pub wacc: f64,
    pub growth_rate: f64,
    pub terminal_growth: f64,
    pub intrinsic_value: Metric,
    pub weight: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioBundle {
    pub scenarios: Vec<ScenarioResult>,
    pub weighted_intrinsic_value: Metric,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MonteCarloResult {
    /// Requested trial count, or 0 when the sweep could not run at all.
    pub iterations: u32,
    pub median: Metric,
    pub min: Metric,
    pub max: Metric,
}

impl MonteCarloResult {
    pub fn empty(iterations: u32) -> Self {
        Self {
            iterations,
            median: Metric::Indeterminate,
            min: Metric::Indeterminate,
            max: Metric::Indeterminate,
        }
    }
}

/// Four 0–100 sub-scores and their average.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreSet {
    pub health: f64,
    pub growth: f64,
    pub valuation: f64,
    pub risk: f64,
    pub composite: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConsistencyIssue {
    MarketCapMismatch { implied: f64, reported: f64 },
    EpsMismatch { derived: f64, reported: f64 },
    EquityMismatch { implied: f64, reported: f64 },
}

impl fmt::Display for ConsistencyIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConsistencyIssue::MarketCapMismatch { implied, reported } => write!(
                f,
                "Implied market cap ({}) far from reported market cap ({}).",
                crate::math::format_number(Metric::new(*implied), 0, ""),
                crate::math::format_number(Metric::new(*reported), 0, ""),
            ),
            ConsistencyIssue::EpsMismatch { .. } => {
                f.write_str("Earnings per share inconsistent with reported net income (>20 % gap).")
            }
            ConsistencyIssue::EquityMismatch { .. } => {
                f.write_str("Computed and reported shareholder equity differ by more than 25 %.")
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AdvancedMetrics {
    pub roic: Metric,
    pub fcf_yield: Metric,
    pub operating_margin: Metric,
    /// 0–9 fundamentals score; `None` when no input was available.
    pub piotroski_score: Option<u8>,
    pub z_score: Metric,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerdictLabel {
    Undervalued,
    Neutral,
    Overvalued,
}

impl VerdictLabel {
    pub fn to_label(self) -> &'static str {
        match self {
            VerdictLabel::Undervalued => "Undervalued",
            VerdictLabel::Neutral => "Neutral",
            VerdictLabel::Overvalued => "Overvalued",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Buy,
    Sell,
    Hold,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Horizon {
    Long,
    ShortToMedium,
    Medium,
}

impl Horizon {
    pub fn to_label(self) -> &'static str {
        match self {
            Horizon::Long => "Long term (3+ years)",
            Horizon::ShortToMedium => "Short to medium term (up to 1 year)",
            Horizon::Medium => "Medium term (12-24 months)",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub label: VerdictLabel,
    pub rationale: String,
    pub action: Action,
    pub horizon: Horizon,
}

/// One closing price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: String,
    pub close: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsItem {
    pub title: String,
    pub link: String,
    pub publisher: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
}

/// Result of a free-text symbol search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolMatch {
    pub symbol: String,
    pub name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_raw_number_shapes() {
        let mut raw = RawBundle::new("ACME");
        raw.summary.insert("a".into(), json!(12.5));
        raw.summary.insert("b".into(), json!({"raw": 3.0, "fmt": "3.00"}));
        raw.summary.insert("c".into(), json!("NaN"));
        raw.summary.insert("d".into(), json!("Infinity"));
        raw.summary.insert("e".into(), json!(null));
        raw.summary.insert("f".into(), json!("42"));

        assert_eq!(raw.summary_number("a"), Metric::Value(12.5));
        assert_eq!(raw.summary_number("b"), Metric::Value(3.0));
        assert!(raw.summary_number("c").is_indeterminate());
        assert!(raw.summary_number("d").is_indeterminate());
        assert!(raw.summary_number("e").is_indeterminate());
        assert_eq!(raw.summary_number("f"), Metric::Value(42.0));
        assert!(raw.summary_number("missing").is_indeterminate());
    }

    #[test]
    fn test_cash_flow_row_priority() {
        let mut raw = RawBundle::new("ACME");
        raw.cash_flow.insert("Free Cash Flow".into(), vec![None, Some(500.0)]);
        raw.cash_flow.insert("FreeCashFlow".into(), vec![None, None]);
        assert_eq!(raw.cash_flow_row(&["FreeCashFlow", "Free Cash Flow"]), Metric::Value(500.0));
        assert!(raw.cash_flow_row(&["Capital Expenditure"]).is_indeterminate());
    }

    #[test]
    fn test_overridable_field_round_trip() {
        let mut snapshot = FundamentalsSnapshot::default();
        for field in OverridableField::ALL {
            assert_eq!(OverridableField::from_key(field.key()), Some(field));
            field.set(&mut snapshot, Metric::Value(7.0));
            assert_eq!(field.get(&snapshot), Metric::Value(7.0));
        }
        assert_eq!(OverridableField::from_key("beta"), None);
    }

    #[test]
    fn test_has_core_data_ignores_zero() {
        let mut snapshot = FundamentalsSnapshot::default();
        snapshot.price = Metric::Value(0.0);
        assert!(!snapshot.has_core_data());
        snapshot.revenue = Metric::Value(1.0);
        assert!(snapshot.has_core_data());
    }
}
