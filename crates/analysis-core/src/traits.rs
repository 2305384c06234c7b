use async_trait::async_trait;
use crate::{AnalysisError, FundamentalsSnapshot, NewsItem, OverridableField, PricePoint, RawBundle, SymbolMatch};

/// Trait for external market-data sources feeding the engine
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    async fn fetch_fundamentals(&self, symbol: &str) -> Result<RawBundle, AnalysisError>;

    /// Resolve a free-text name to a listed symbol (preferring equities).
    async fn search_symbol(&self, query: &str) -> Result<Option<SymbolMatch>, AnalysisError>;

    /// Closing prices over `period` (e.g. "1y") sampled at `interval` (e.g. "1wk").
    async fn price_history(&self, symbol: &str, period: &str, interval: &str) -> Result<Vec<PricePoint>, AnalysisError>;

    async fn news(&self, symbol: &str, limit: usize) -> Result<Vec<NewsItem>, AnalysisError>;
}

/// Hook that supplies values for fields still missing after normalization.
///
/// Returning `None` leaves the field indeterminate.
pub trait GapFiller: Send + Sync {
    fn supply(&self, field: OverridableField, snapshot: &FundamentalsSnapshot) -> Option<f64>;
}
