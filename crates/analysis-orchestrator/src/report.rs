use analysis_core::math::{format_percent, safe_divide};
use analysis_core::{
    AdvancedMetrics, CashFlowYear, ConsistencyIssue, FundamentalsSnapshot, GrowthSource, Horizon, Metric,
    MonteCarloResult, Multiples, NewsItem, PricePoint, RatioResult, ScenarioBundle, ScoreSet, Verdict, Action,
};
use chrono::{DateTime, Utc};
use fundamental_analysis::FundamentalAnalysis;
use serde::{Deserialize, Serialize};
use valuation_model::Valuation;

use crate::narrative::{catalysts, investor_summary, risk_points};
use crate::verdict::{assemble_verdict, describe_price_gap};

const VIX_ELEVATED: f64 = 20.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyData {
    pub price: Metric,
    pub eps: Metric,
    pub revenue: Metric,
    pub net_income: Metric,
    pub free_cash_flow: Metric,
    /// Net debt, or total debt when net debt is unknown.
    pub debt: Metric,
    pub growth_rate: Metric,
    pub net_margin: Metric,
    pub roe: Metric,
    pub roa: Metric,
    pub payout_ratio: Metric,
    pub sector_multiples: Multiples,
    pub notes: Vec<String>,
}

impl KeyData {
    pub fn from_snapshot(snapshot: &FundamentalsSnapshot, consistency: &[ConsistencyIssue]) -> Self {
        let mut notes: Vec<String> = consistency.iter().map(ToString::to_string).collect();
        let tracked = [
            ("Price", snapshot.price),
            ("EPS", snapshot.eps),
            ("Revenue", snapshot.revenue),
            ("Net income", snapshot.net_income),
            ("Free cash flow", snapshot.free_cash_flow),
            ("Net debt", snapshot.net_debt),
            ("Growth", snapshot.growth_rate),
            ("ROE", snapshot.roe),
            ("ROA", snapshot.roa),
            ("Payout ratio", snapshot.payout_ratio),
        ];
        notes.extend(
            tracked
                .iter()
                .filter(|(_, metric)| metric.is_indeterminate())
                .map(|(label, _)| format!("{} missing", label)),
        );

        Self {
            price: snapshot.price,
            eps: snapshot.eps,
            revenue: snapshot.revenue,
            net_income: snapshot.net_income,
            free_cash_flow: snapshot.free_cash_flow,
            debt: snapshot.net_debt.or(snapshot.total_debt),
            growth_rate: snapshot.growth_rate,
            net_margin: safe_divide(snapshot.net_income, snapshot.revenue),
            roe: snapshot.roe,
            roa: snapshot.roa,
            payout_ratio: snapshot.payout_ratio,
            sector_multiples: snapshot.sector_multiples,
            notes,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DcfBlock {
    pub pv_sum: Metric,
    pub terminal_value: Metric,
    pub wacc: f64,
    pub terminal_growth: Metric,
    pub intrinsic_value: Metric,
    pub price: Metric,
    pub comparison: String,
    pub growth_source: GrowthSource,
    pub projections: Vec<CashFlowYear>,
    pub notes: Vec<String>,
}

impl DcfBlock {
    pub fn new(valuation: &Valuation, snapshot: &FundamentalsSnapshot, wacc: f64, assumptions: &[String]) -> Self {
        let dcf = &valuation.dcf;
        let mut notes = assumptions.to_vec();
        if dcf.growth_source == GrowthSource::AssumedDefault {
            notes.push(format!(
                "Default growth rate used ({}).",
                format_percent(dcf.growth_rate, 0)
            ));
        }

        let comparison = if dcf.is_usable() {
            describe_price_gap(snapshot.price, dcf.intrinsic_value)
        } else {
            notes.push("DCF not computed: free cash flow or share count missing.".to_string());
            "Intrinsic value unavailable".to_string()
        };

        Self {
            pv_sum: dcf.pv_sum(),
            terminal_value: dcf.terminal_value,
            wacc,
            terminal_growth: dcf.terminal_growth,
            intrinsic_value: dcf.intrinsic_value,
            price: snapshot.price,
            comparison,
            growth_source: dcf.growth_source,
            projections: dcf.projections.clone(),
            notes,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    pub action: Action,
    pub horizon: Horizon,
    pub horizon_label: String,
    pub risks: Vec<String>,
    pub catalysts: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MacroRisk {
    pub vix: Metric,
    pub level: String,
}

impl MacroRisk {
    pub fn from_vix(vix: Metric) -> Self {
        let level = if vix.value().is_some_and(|v| v > VIX_ELEVATED) {
            "elevated"
        } else {
            "moderate"
        };
        Self {
            vix,
            level: level.to_string(),
        }
    }
}

impl Default for MacroRisk {
    fn default() -> Self {
        Self::from_vix(Metric::Indeterminate)
    }
}

/// Blocks sourced straight from the market-data provider.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MarketContext {
    pub price_history: Vec<PricePoint>,
    pub benchmark_symbol: Option<String>,
    pub benchmark_history: Vec<PricePoint>,
    pub macro_risk: MacroRisk,
    pub news: Vec<NewsItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub ticker: String,
    pub name: String,
    pub sector: Option<String>,
    pub industry: Option<String>,
    pub currency: Option<String>,
    pub key_data: KeyData,
    pub ratios: Vec<RatioResult>,
    pub dcf: DcfBlock,
    pub scenarios: ScenarioBundle,
    pub monte_carlo: MonteCarloResult,
    pub advanced_metrics: AdvancedMetrics,
    pub scores: ScoreSet,
    pub verdict: Verdict,
    pub summary: Vec<String>,
    pub recommendation: Recommendation,
    #[serde(flatten)]
    pub market: MarketContext,
    pub assumptions: Vec<String>,
    pub generated_at: DateTime<Utc>,
}

impl AnalysisReport {
    /// Merge the engine outputs and the provider blocks into one report.
    pub fn assemble(
        snapshot: &FundamentalsSnapshot,
        assumptions: Vec<String>,
        fundamentals: FundamentalAnalysis,
        valuation: Valuation,
        wacc: f64,
        market: MarketContext,
    ) -> Self {
        let scores = fundamentals.scores;
        let verdict = assemble_verdict(
            snapshot.price,
            valuation.dcf.intrinsic_value,
            scores.composite,
            snapshot.currency_label(),
        );
        let recommendation = Recommendation {
            action: verdict.action,
            horizon: verdict.horizon,
            horizon_label: verdict.horizon.to_label().to_string(),
            risks: risk_points(snapshot, &scores),
            catalysts: catalysts(snapshot, &scores),
        };

        Self {
            ticker: snapshot.ticker.clone(),
            name: snapshot.name.clone(),
            sector: snapshot.sector.clone(),
            industry: snapshot.industry.clone(),
            currency: snapshot.currency.clone(),
            key_data: KeyData::from_snapshot(snapshot, &fundamentals.consistency),
            summary: investor_summary(snapshot, &fundamentals.ratios, &valuation.dcf),
            dcf: DcfBlock::new(&valuation, snapshot, wacc, &assumptions),
            ratios: fundamentals.ratios,
            scenarios: valuation.scenarios,
            monte_carlo: valuation.monte_carlo,
            advanced_metrics: fundamentals.advanced,
            scores,
            verdict,
            recommendation,
            market,
            assumptions,
            generated_at: Utc::now(),
        }
    }
}
