use analysis_core::{
    AnalysisError, EngineConfig, GapFiller, MarketDataProvider, Metric, OverridableField,
    PricePoint, RawBundle, DEFAULT_TERMINAL_GROWTH, DEFAULT_WACC,
};
use fundamental_analysis::{apply_overrides, fill_gaps, FundamentalAnalysisEngine, NormalizedSnapshot};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::BTreeMap;
use std::sync::Arc;
use valuation_model::ValuationModel;

pub mod cache;
pub mod narrative;
pub mod report;
pub mod verdict;

pub use cache::TtlCache;
pub use report::{AnalysisReport, DcfBlock, KeyData, MacroRisk, MarketContext, Recommendation};

pub const DEFAULT_CACHE_TTL_SECS: i64 = 600;
const NEWS_LIMIT: usize = 8;
const BENCHMARK_SYMBOLS: [&str; 2] = ["SPY", "^GSPC"];
const VIX_SYMBOL: &str = "^VIX";

/// One analysis run: a ticker plus the caller's discount assumptions.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisRequest {
    pub ticker: String,
    pub wacc: f64,
    pub terminal_growth: f64,
    pub sector: Option<String>,
    pub overrides: BTreeMap<OverridableField, f64>,
}

impl AnalysisRequest {
    pub fn new(ticker: &str) -> Self {
        Self {
            ticker: ticker.trim().to_uppercase(),
            wacc: DEFAULT_WACC,
            terminal_growth: DEFAULT_TERMINAL_GROWTH,
            sector: None,
            overrides: BTreeMap::new(),
        }
    }

    /// `TICKER|wacc|tg|sector|overrides`, with overrides sorted by key.
    pub fn cache_key(&self) -> String {
        let mut overrides: Vec<String> = self
            .overrides
            .iter()
            .map(|(field, value)| format!("{}={}", field.key(), value))
            .collect();
        overrides.sort();
        format!(
            "{}|{:.4}|{:.4}|{}|{}",
            self.ticker,
            self.wacc,
            self.terminal_growth,
            self.sector.as_deref().unwrap_or(""),
            overrides.join(",")
        )
    }
}

pub struct AnalysisOrchestrator {
    provider: Arc<dyn MarketDataProvider>,
    gap_filler: Option<Arc<dyn GapFiller>>,
    fundamental_analyzer: Arc<FundamentalAnalysisEngine>,
    valuation_model: Arc<ValuationModel>,
    report_cache: TtlCache<Arc<AnalysisReport>>,
    /// Fixed Monte Carlo seed; entropy-seeded per run when unset.
    seed: Option<u64>,
}

impl AnalysisOrchestrator {
    pub fn new(provider: Arc<dyn MarketDataProvider>, config: EngineConfig) -> Self {
        Self {
            provider,
            gap_filler: None,
            fundamental_analyzer: Arc::new(FundamentalAnalysisEngine::new(config.benchmarks.clone())),
            valuation_model: Arc::new(ValuationModel::new(config)),
            report_cache: TtlCache::new(DEFAULT_CACHE_TTL_SECS),
            seed: None,
        }
    }

    pub fn with_gap_filler(mut self, filler: Arc<dyn GapFiller>) -> Self {
        self.gap_filler = Some(filler);
        self
    }

    pub fn with_cache_ttl(mut self, ttl_secs: i64) -> Self {
        self.report_cache = TtlCache::new(ttl_secs);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Run the full pipeline for one request, serving identical requests
    /// from the cache while they are fresh.
    pub async fn analyze(&self, request: &AnalysisRequest) -> Result<Arc<AnalysisReport>, AnalysisError> {
        let cache_key = request.cache_key();
        if let Some(report) = self.report_cache.get(&cache_key) {
            tracing::debug!("Serving cached analysis for {}", cache_key);
            return Ok(report);
        }

        tracing::info!(
            "Starting analysis for {} (wacc: {:.4}, terminal growth: {:.4})",
            request.ticker,
            request.wacc,
            request.terminal_growth
        );

        let NormalizedSnapshot {
            mut snapshot,
            mut assumptions,
        } = self.resolve_snapshot(request).await?;

        apply_overrides(&mut snapshot, &request.overrides, &mut assumptions);
        fill_gaps(&mut snapshot, self.gap_filler.as_deref(), &mut assumptions);

        if !snapshot.has_core_data() {
            tracing::warn!("No usable fundamentals for {}", request.ticker);
            return Err(AnalysisError::InsufficientData(format!(
                "Unable to retrieve fundamentals for {}",
                request.ticker
            )));
        }

        let engine_run = {
            let snapshot = snapshot.clone();
            let fundamental_analyzer = Arc::clone(&self.fundamental_analyzer);
            let valuation_model = Arc::clone(&self.valuation_model);
            let (wacc, terminal_growth, seed) = (request.wacc, request.terminal_growth, self.seed);
            tokio::task::spawn_blocking(move || {
                let mut rng = match seed {
                    Some(seed) => StdRng::seed_from_u64(seed),
                    None => StdRng::from_entropy(),
                };
                let fundamentals = fundamental_analyzer.analyze(&snapshot);
                let valuation = valuation_model.value(&snapshot, wacc, terminal_growth, &mut rng);
                (fundamentals, valuation)
            })
        };

        let (engine_result, market) = tokio::join!(engine_run, self.market_context(&snapshot.ticker));
        let (fundamentals, valuation) =
            engine_result.map_err(|e| AnalysisError::Unknown(format!("Analysis task failed: {}", e)))?;

        let report = Arc::new(AnalysisReport::assemble(
            &snapshot,
            assumptions,
            fundamentals,
            valuation,
            request.wacc,
            market,
        ));
        tracing::info!(
            "Analysis complete for {}: {} (composite {:.1})",
            report.ticker,
            report.verdict.label.to_label(),
            report.scores.composite
        );

        self.report_cache.insert(cache_key, Arc::clone(&report));
        Ok(report)
    }

    /// Fetch and normalize, retrying through symbol search when the ticker
    /// as given yields nothing usable.
    async fn resolve_snapshot(&self, request: &AnalysisRequest) -> Result<NormalizedSnapshot, AnalysisError> {
        let raw = self.fetch_raw(&request.ticker).await?;
        let normalized = self
            .fundamental_analyzer
            .normalize(&raw, request.sector.as_deref());
        if normalized.snapshot.has_core_data() {
            return Ok(normalized);
        }

        tracing::warn!("Sparse data for {}, trying symbol search", request.ticker);
        let found = match self.provider.search_symbol(&request.ticker).await {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!("Symbol search for {} failed: {}", request.ticker, e);
                None
            }
        };
        let Some(found) = found.filter(|m| !m.symbol.eq_ignore_ascii_case(&request.ticker)) else {
            return Ok(normalized);
        };

        let raw = self.fetch_raw(&found.symbol).await?;
        let mut resolved = self
            .fundamental_analyzer
            .normalize(&raw, request.sector.as_deref());
        resolved.assumptions.insert(
            0,
            format!(
                "Name '{}' mapped automatically to ticker {} ({}).",
                request.ticker,
                found.symbol,
                found.name.as_deref().unwrap_or(&found.symbol)
            ),
        );
        Ok(resolved)
    }

    /// An unknown symbol is an empty bundle; other provider failures surface.
    async fn fetch_raw(&self, symbol: &str) -> Result<RawBundle, AnalysisError> {
        match self.provider.fetch_fundamentals(symbol).await {
            Ok(raw) => Ok(raw),
            Err(AnalysisError::SymbolNotFound(_)) => {
                tracing::warn!("Provider does not know {}", symbol);
                Ok(RawBundle::new(symbol))
            }
            Err(e) => Err(e),
        }
    }

    async fn market_context(&self, symbol: &str) -> MarketContext {
        let (history, benchmark, vix, news) = tokio::join!(
            self.provider.price_history(symbol, "1y", "1wk"),
            self.benchmark_history(),
            self.provider.price_history(VIX_SYMBOL, "6mo", "1wk"),
            self.provider.news(symbol, NEWS_LIMIT),
        );

        let vix = or_empty(vix, "VIX history", VIX_SYMBOL)
            .last()
            .map(|p| Metric::new(p.close))
            .unwrap_or_default();
        let mut news = or_empty(news, "news", symbol);
        news.truncate(NEWS_LIMIT);
        let (benchmark_symbol, benchmark_history) = match benchmark {
            Some((symbol, points)) => (Some(symbol), points),
            None => (None, Vec::new()),
        };

        MarketContext {
            price_history: or_empty(history, "price history", symbol),
            benchmark_symbol,
            benchmark_history,
            macro_risk: MacroRisk::from_vix(vix),
            news,
        }
    }

    async fn benchmark_history(&self) -> Option<(String, Vec<PricePoint>)> {
        for symbol in BENCHMARK_SYMBOLS {
            match self.provider.price_history(symbol, "1y", "1wk").await {
                Ok(points) if !points.is_empty() => return Some((symbol.to_string(), points)),
                Ok(_) => tracing::debug!("Benchmark {} returned no prices", symbol),
                Err(e) => tracing::warn!("Benchmark {} unavailable: {}", symbol, e),
            }
        }
        None
    }
}

fn or_empty<T>(result: Result<Vec<T>, AnalysisError>, what: &str, symbol: &str) -> Vec<T> {
    result.unwrap_or_else(|e| {
        tracing::warn!("Failed to fetch {} for {}: {}", what, symbol, e);
        Vec::new()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use analysis_core::{FundamentalsSnapshot, NewsItem, SymbolMatch, VerdictLabel};
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct StubProvider {
        bundles: HashMap<String, RawBundle>,
        search: Option<SymbolMatch>,
        prices: HashMap<String, Vec<PricePoint>>,
        fetches: AtomicUsize,
    }

    #[async_trait]
    impl MarketDataProvider for StubProvider {
        async fn fetch_fundamentals(&self, symbol: &str) -> Result<RawBundle, AnalysisError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            self.bundles
                .get(symbol)
                .cloned()
                .ok_or_else(|| AnalysisError::SymbolNotFound(symbol.to_string()))
        }

        async fn search_symbol(&self, _query: &str) -> Result<Option<SymbolMatch>, AnalysisError> {
            Ok(self.search.clone())
        }

        async fn price_history(&self, symbol: &str, _period: &str, _interval: &str) -> Result<Vec<PricePoint>, AnalysisError> {
            self.prices
                .get(symbol)
                .cloned()
                .ok_or_else(|| AnalysisError::ApiError(format!("no chart for {}", symbol)))
        }

        async fn news(&self, symbol: &str, limit: usize) -> Result<Vec<NewsItem>, AnalysisError> {
            Ok((0..limit + 2)
                .map(|i| NewsItem {
                    title: format!("{} headline {}", symbol, i),
                    link: format!("https://news.example/{}", i),
                    publisher: None,
                    published_at: None,
                })
                .collect())
        }
    }

    fn acme_bundle(symbol: &str) -> RawBundle {
        let mut raw = RawBundle::new(symbol);
        raw.summary.insert("longName".into(), json!("Acme Corp"));
        raw.summary.insert("sector".into(), json!("Technology"));
        raw.summary.insert("currency".into(), json!("USD"));
        raw.summary.insert("currentPrice".into(), json!(50.0));
        raw.summary.insert("trailingEps".into(), json!(2.5));
        raw.summary.insert("earningsGrowth".into(), json!(0.08));
        raw.summary.insert("bookValue".into(), json!(10.0));
        raw.summary.insert("sharesOutstanding".into(), json!(1000.0));
        raw.summary.insert("totalDebt".into(), json!(3000.0));
        raw.summary.insert("totalCash".into(), json!(1000.0));
        raw.summary.insert("totalRevenue".into(), json!(20000.0));
        raw.summary.insert("netIncomeToCommon".into(), json!(2500.0));
        raw.cash_flow.insert("FreeCashFlow".into(), vec![Some(3000.0)]);
        raw
    }

    fn point(close: f64) -> PricePoint {
        PricePoint {
            date: "2024-01-05".into(),
            close,
        }
    }

    fn orchestrator(provider: StubProvider) -> (Arc<StubProvider>, AnalysisOrchestrator) {
        let provider = Arc::new(provider);
        let orchestrator = AnalysisOrchestrator::new(provider.clone(), EngineConfig::default().with_monte_carlo_iterations(50))
            .with_seed(7);
        (provider, orchestrator)
    }

    #[test]
    fn test_cache_key_is_order_independent() {
        let mut a = AnalysisRequest::new(" acme ");
        a.overrides.insert(OverridableField::Price, 10.0);
        a.overrides.insert(OverridableField::Eps, 2.0);
        let mut b = AnalysisRequest::new("ACME");
        b.overrides.insert(OverridableField::Eps, 2.0);
        b.overrides.insert(OverridableField::Price, 10.0);

        assert_eq!(a.cache_key(), b.cache_key());
        assert_eq!(a.cache_key(), "ACME|0.0800|0.0250||eps=2,price=10");
    }

    #[tokio::test]
    async fn test_full_pipeline() {
        let mut stub = StubProvider::default();
        stub.bundles.insert("ACME".into(), acme_bundle("ACME"));
        stub.prices.insert("ACME".into(), vec![point(48.0), point(50.0)]);
        stub.prices.insert("^GSPC".into(), vec![point(4700.0)]);
        stub.prices.insert("^VIX".into(), vec![point(18.0), point(24.5)]);
        let (_, orchestrator) = orchestrator(stub);

        let report = orchestrator.analyze(&AnalysisRequest::new("acme")).await.unwrap();

        assert_eq!(report.ticker, "ACME");
        assert_eq!(report.name, "Acme Corp");
        assert!(report.dcf.intrinsic_value.is_present());
        assert_eq!(report.monte_carlo.iterations, 50);
        assert_eq!(report.scenarios.scenarios.len(), 3);
        assert!(report.summary.len() <= 10);
        assert!(!report.recommendation.risks.is_empty() && report.recommendation.risks.len() <= 4);
        assert_eq!(report.market.benchmark_symbol.as_deref(), Some("^GSPC"));
        assert_eq!(report.market.macro_risk.vix, Metric::Value(24.5));
        assert_eq!(report.market.macro_risk.level, "elevated");
        assert_eq!(report.market.news.len(), NEWS_LIMIT);
        assert_eq!(report.market.price_history.len(), 2);
        assert!(report.scores.composite >= 0.0 && report.scores.composite <= 100.0);
    }

    #[tokio::test]
    async fn test_collaborator_failures_degrade_to_empty_blocks() {
        let mut stub = StubProvider::default();
        stub.bundles.insert("ACME".into(), acme_bundle("ACME"));
        let (_, orchestrator) = orchestrator(stub);

        let report = orchestrator.analyze(&AnalysisRequest::new("ACME")).await.unwrap();
        assert!(report.market.price_history.is_empty());
        assert!(report.market.benchmark_symbol.is_none());
        assert!(report.market.macro_risk.vix.is_indeterminate());
        assert_eq!(report.market.macro_risk.level, "moderate");
    }

    #[tokio::test]
    async fn test_identical_requests_hit_cache() {
        let mut stub = StubProvider::default();
        stub.bundles.insert("ACME".into(), acme_bundle("ACME"));
        let (provider, orchestrator) = orchestrator(stub);

        let request = AnalysisRequest::new("ACME");
        let first = orchestrator.analyze(&request).await.unwrap();
        let second = orchestrator.analyze(&request).await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(provider.fetches.load(Ordering::SeqCst), 1);

        let mut other = request.clone();
        other.wacc = 0.09;
        orchestrator.analyze(&other).await.unwrap();
        assert_eq!(provider.fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_name_resolved_through_search() {
        let mut stub = StubProvider::default();
        stub.bundles.insert("ACME".into(), acme_bundle("ACME"));
        stub.search = Some(SymbolMatch {
            symbol: "ACME".into(),
            name: Some("Acme Corp".into()),
        });
        let (_, orchestrator) = orchestrator(stub);

        let report = orchestrator.analyze(&AnalysisRequest::new("acme corp")).await.unwrap();
        assert_eq!(report.ticker, "ACME");
        assert_eq!(
            report.assumptions[0],
            "Name 'ACME CORP' mapped automatically to ticker ACME (Acme Corp)."
        );
    }

    #[tokio::test]
    async fn test_unknown_symbol_is_insufficient_data() {
        let (_, orchestrator) = orchestrator(StubProvider::default());
        let err = orchestrator.analyze(&AnalysisRequest::new("NOPE")).await.unwrap_err();
        assert!(matches!(err, AnalysisError::InsufficientData(_)));
    }

    #[tokio::test]
    async fn test_overrides_applied_and_noted() {
        let mut stub = StubProvider::default();
        stub.bundles.insert("ACME".into(), acme_bundle("ACME"));
        let (_, orchestrator) = orchestrator(stub);

        let mut request = AnalysisRequest::new("ACME");
        request.overrides.insert(OverridableField::Price, 500.0);
        let report = orchestrator.analyze(&request).await.unwrap();

        assert_eq!(report.key_data.price, Metric::Value(500.0));
        assert!(report.assumptions.iter().any(|a| a == "Current price forced to 500."));
        assert_eq!(report.verdict.label, VerdictLabel::Overvalued);
    }

    struct FixedGrowth;

    impl GapFiller for FixedGrowth {
        fn supply(&self, field: OverridableField, _snapshot: &FundamentalsSnapshot) -> Option<f64> {
            (field == OverridableField::GrowthRate).then_some(12.0)
        }
    }

    #[tokio::test]
    async fn test_gap_filler_supplies_missing_growth() {
        let mut raw = acme_bundle("ACME");
        raw.summary.remove("earningsGrowth");
        let mut stub = StubProvider::default();
        stub.bundles.insert("ACME".into(), raw);
        let (_, orchestrator) = orchestrator(stub);
        let orchestrator = orchestrator.with_gap_filler(Arc::new(FixedGrowth));

        let report = orchestrator.analyze(&AnalysisRequest::new("ACME")).await.unwrap();
        assert_eq!(report.key_data.growth_rate, Metric::Value(0.12));
        assert!(report.assumptions.iter().any(|a| a.starts_with("Expected growth supplied manually")));
    }
}
