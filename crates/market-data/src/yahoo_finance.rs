use std::time::Duration;

use analysis_core::math::net_debt;
use analysis_core::{
    AnalysisError, MarketDataProvider, NewsItem, PricePoint, RawBundle, SymbolMatch,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use crate::parse;

const QUOTE_URL: &str = "https://query2.finance.yahoo.com/v7/finance/quote";
const SUMMARY_URL: &str = "https://query2.finance.yahoo.com/v10/finance/quoteSummary";
const CHART_URL: &str = "https://query2.finance.yahoo.com/v8/finance/chart";
const SEARCH_URL: &str = "https://query2.finance.yahoo.com/v1/finance/search";

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";
const SEARCH_QUOTES: usize = 8;

#[derive(Clone)]
pub struct YahooFinanceClient {
    client: reqwest::Client,
}

impl YahooFinanceClient {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(15))
            .build()
            .context("Failed to build Yahoo Finance HTTP client")?;
        Ok(Self { client })
    }

    async fn get_json(&self, url: &str, query: &[(&str, String)]) -> Result<Value> {
        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .with_context(|| format!("Request to {} failed", url))?
            .error_for_status()?;
        let body = response.text().await?;
        serde_json::from_str(&body).with_context(|| format!("Malformed JSON from {}", url))
    }

    /// Real-time quote fields; empty when the symbol has no quote.
    pub async fn get_quote(&self, symbol: &str) -> Result<Map<String, Value>> {
        let json = self.get_json(QUOTE_URL, &[("symbols", symbol.to_string())]).await?;
        let quote = json
            .get("quoteResponse")
            .and_then(|v| v.get("result"))
            .and_then(Value::as_array)
            .and_then(|arr| arr.first())
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();
        Ok(quote)
    }

    /// The quoteSummary result object with every module the normalizer reads.
    pub async fn get_summary(&self, symbol: &str) -> Result<Option<Value>> {
        let url = format!("{}/{}", SUMMARY_URL, symbol);
        let json = self
            .get_json(&url, &[("modules", parse::SUMMARY_MODULES.join(","))])
            .await?;
        Ok(parse::first_result(&json, "quoteSummary").cloned())
    }

    /// Closing prices over a Yahoo `range` such as `1y` or `5y`.
    pub async fn get_closes(&self, symbol: &str, range: &str, interval: &str) -> Result<Vec<(DateTime<Utc>, f64)>> {
        let url = format!("{}/{}", CHART_URL, symbol);
        let json = self
            .get_json(&url, &[("range", range.to_string()), ("interval", interval.to_string())])
            .await?;
        Ok(parse::chart_closes(&json))
    }

    pub async fn search(&self, query: &str, quotes: usize, news: usize) -> Result<Value> {
        self.get_json(
            SEARCH_URL,
            &[
                ("q", query.to_string()),
                ("quotesCount", quotes.to_string()),
                ("newsCount", news.to_string()),
                ("enableFuzzyQuery", "true".to_string()),
            ],
        )
        .await
    }
}

/// A 404 from Yahoo means the symbol is unknown and an undecodable body is
/// invalid data; anything else is an API failure.
fn to_analysis_error(symbol: &str, err: anyhow::Error) -> AnalysisError {
    if err.downcast_ref::<serde_json::Error>().is_some() {
        return AnalysisError::InvalidData(format!("{:#}", err));
    }
    let status = err.downcast_ref::<reqwest::Error>().and_then(|e| e.status());
    if status == Some(reqwest::StatusCode::NOT_FOUND) {
        AnalysisError::SymbolNotFound(symbol.to_string())
    } else {
        AnalysisError::ApiError(format!("{:#}", err))
    }
}

#[async_trait]
impl MarketDataProvider for YahooFinanceClient {
    async fn fetch_fundamentals(&self, symbol: &str) -> Result<RawBundle, AnalysisError> {
        tracing::info!("Fetching fundamentals for {} from Yahoo Finance", symbol);

        let (quote, summary, history) = tokio::join!(
            self.get_quote(symbol),
            self.get_summary(symbol),
            self.get_closes(symbol, "5y", "1mo"),
        );

        let summary = summary.map_err(|e| to_analysis_error(symbol, e))?;
        let mut bundle = RawBundle::new(symbol);
        bundle.quote = quote.unwrap_or_else(|e| {
            tracing::warn!("Quote for {} unavailable: {:#}", symbol, e);
            Map::new()
        });

        let Some(result) = summary else {
            return Ok(bundle);
        };

        bundle.summary = parse::flatten_summary(&result);
        bundle.cash_flow = parse::cash_flow_rows(&result);
        bundle.earnings_trend_growth = parse::earnings_trend_growth(&result);

        let history = history.unwrap_or_else(|e| {
            tracing::warn!("Five-year history for {} unavailable: {:#}", symbol, e);
            Vec::new()
        });
        let net_debt = net_debt(
            bundle.summary_number("netDebt"),
            bundle.summary_number("totalDebt"),
            bundle.summary_number("totalCash"),
        );
        bundle.historical_multiples = parse::historical_multiples(
            &parse::yearly_average_closes(&history),
            &parse::yearly_figures(&result),
            &parse::statement_series(
                &result,
                &["balanceSheetHistory", "balanceSheetStatements"],
                "totalStockholderEquity",
            ),
            &parse::statement_series(&result, &["incomeStatementHistory", "incomeStatementHistory"], "ebitda"),
            bundle.summary_number("sharesOutstanding"),
            net_debt,
        );

        Ok(bundle)
    }

    async fn search_symbol(&self, query: &str) -> Result<Option<SymbolMatch>, AnalysisError> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(None);
        }
        let json = self
            .search(query, SEARCH_QUOTES, 0)
            .await
            .map_err(|e| to_analysis_error(query, e))?;
        Ok(parse::symbol_match(&json))
    }

    async fn price_history(&self, symbol: &str, period: &str, interval: &str) -> Result<Vec<PricePoint>, AnalysisError> {
        let closes = self
            .get_closes(symbol, period, interval)
            .await
            .map_err(|e| to_analysis_error(symbol, e))?;
        Ok(parse::price_points(&closes))
    }

    async fn news(&self, symbol: &str, limit: usize) -> Result<Vec<NewsItem>, AnalysisError> {
        let json = self
            .search(symbol, 0, limit)
            .await
            .map_err(|e| to_analysis_error(symbol, e))?;
        Ok(parse::news_items(&json, limit))
    }
}
