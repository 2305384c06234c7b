//! Pure extraction of Yahoo Finance JSON payloads into engine types.

use std::collections::{BTreeMap, BTreeSet};

use analysis_core::math::mean;
use analysis_core::{Metric, Multiples, NewsItem, PricePoint, SymbolMatch};
use chrono::{DateTime, Datelike, Utc};
use serde_json::{Map, Value};

/// quoteSummary modules flattened into the raw bundle summary, in priority order.
pub const PROFILE_MODULES: [&str; 5] = [
    "price",
    "summaryDetail",
    "defaultKeyStatistics",
    "financialData",
    "assetProfile",
];

/// Every module requested from quoteSummary.
pub const SUMMARY_MODULES: [&str; 10] = [
    "price",
    "summaryDetail",
    "defaultKeyStatistics",
    "financialData",
    "assetProfile",
    "earningsTrend",
    "cashflowStatementHistory",
    "earnings",
    "balanceSheetHistory",
    "incomeStatementHistory",
];

/// Yearly fiscal figures used for historical multiples.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct YearlyFigures {
    pub year: i32,
    pub earnings: Option<f64>,
    pub revenue: Option<f64>,
}

/// `{"raw": n}` objects or plain numbers; non-finite values are dropped.
fn raw_f64(value: &Value) -> Option<f64> {
    let v = match value {
        Value::Number(n) => n.as_f64(),
        Value::Object(obj) => obj.get("raw").and_then(Value::as_f64),
        _ => None,
    }?;
    v.is_finite().then_some(v)
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(obj) => obj.is_empty(),
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

/// `json[root].result[0]`, the envelope shared by quote, quoteSummary and chart.
pub fn first_result<'a>(json: &'a Value, root: &str) -> Option<&'a Value> {
    json.get(root)?.get("result")?.as_array()?.first()
}

fn array_at<'a>(value: &'a Value, path: &[&str]) -> &'a [Value] {
    path.iter()
        .try_fold(value, |v, key| v.get(*key))
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

/// Merge the profile modules into one flat map; earlier modules win.
pub fn flatten_summary(result: &Value) -> Map<String, Value> {
    let mut flat = Map::new();
    for module in PROFILE_MODULES {
        let Some(fields) = result.get(module).and_then(Value::as_object) else {
            continue;
        };
        for (key, value) in fields {
            if is_blank(value) || flat.contains_key(key) {
                continue;
            }
            flat.insert(key.clone(), value.clone());
        }
    }
    flat
}

/// Analyst growth for the current fiscal year (`period == "0y"`).
pub fn earnings_trend_growth(result: &Value) -> Option<f64> {
    array_at(result, &["earningsTrend", "trend"])
        .iter()
        .find(|t| t.get("period").and_then(Value::as_str) == Some("0y"))
        .and_then(|t| t.get("growth"))
        .and_then(raw_f64)
}

/// `totalCashFromOperatingActivities` → `Total Cash From Operating Activities`.
pub fn row_label(key: &str) -> String {
    let mut label = String::with_capacity(key.len() + 8);
    for (i, ch) in key.chars().enumerate() {
        if i == 0 {
            label.extend(ch.to_uppercase());
        } else if ch.is_uppercase() {
            label.push(' ');
            label.push(ch);
        } else {
            label.push(ch);
        }
    }
    label
}

/// Cash-flow statements as labelled rows, most recent period first.
pub fn cash_flow_rows(result: &Value) -> BTreeMap<String, Vec<Option<f64>>> {
    let statements = array_at(result, &["cashflowStatementHistory", "cashflowStatements"]);
    let keys: BTreeSet<&str> = statements
        .iter()
        .filter_map(Value::as_object)
        .flat_map(|s| s.keys().map(String::as_str))
        .filter(|k| !matches!(*k, "maxAge" | "endDate"))
        .collect();

    keys.into_iter()
        .map(|key| {
            let row = statements.iter().map(|s| s.get(key).and_then(raw_f64)).collect();
            (row_label(key), row)
        })
        .collect()
}

pub fn yearly_figures(result: &Value) -> Vec<YearlyFigures> {
    array_at(result, &["earnings", "financialsChart", "yearly"])
        .iter()
        .filter_map(|row| {
            let year = row.get("date").and_then(Value::as_i64)? as i32;
            Some(YearlyFigures {
                year,
                earnings: row.get("earnings").and_then(raw_f64),
                revenue: row.get("revenue").and_then(raw_f64),
            })
        })
        .collect()
}

fn statement_year(statement: &Value) -> Option<i32> {
    let ts = statement.get("endDate").and_then(raw_f64)? as i64;
    DateTime::from_timestamp(ts, 0).map(|d| d.year())
}

/// `(fiscal year, value)` pairs for one field of a yearly statement list.
pub fn statement_series(result: &Value, path: &[&str], field: &str) -> Vec<(i32, f64)> {
    array_at(result, path)
        .iter()
        .filter_map(|s| Some((statement_year(s)?, s.get(field).and_then(raw_f64)?)))
        .collect()
}

/// Timestamped closes from a chart payload, skipping null closes.
pub fn chart_closes(json: &Value) -> Vec<(DateTime<Utc>, f64)> {
    let Some(chart) = first_result(json, "chart") else {
        return Vec::new();
    };
    let timestamps = array_at(chart, &["timestamp"]);
    let closes = chart
        .get("indicators")
        .and_then(|v| v.get("quote"))
        .and_then(Value::as_array)
        .and_then(|arr| arr.first())
        .map(|q| array_at(q, &["close"]))
        .unwrap_or(&[]);

    timestamps
        .iter()
        .zip(closes)
        .filter_map(|(ts, close)| {
            let ts = DateTime::from_timestamp(ts.as_i64()?, 0)?;
            Some((ts, raw_f64(close)?))
        })
        .collect()
}

pub fn price_points(closes: &[(DateTime<Utc>, f64)]) -> Vec<PricePoint> {
    closes
        .iter()
        .map(|(ts, close)| PricePoint {
            date: ts.date_naive().to_string(),
            close: *close,
        })
        .collect()
}

pub fn yearly_average_closes(closes: &[(DateTime<Utc>, f64)]) -> BTreeMap<i32, f64> {
    let mut buckets: BTreeMap<i32, Vec<f64>> = BTreeMap::new();
    for (ts, close) in closes {
        buckets.entry(ts.year()).or_default().push(*close);
    }
    buckets
        .into_iter()
        .filter_map(|(year, values)| Some((year, mean(&values).non_zero()?)))
        .collect()
}

/// Five-year average multiples from yearly average prices and yearly
/// fundamentals, all per share against the current share count.
pub fn historical_multiples(
    prices: &BTreeMap<i32, f64>,
    yearly: &[YearlyFigures],
    equities: &[(i32, f64)],
    ebitdas: &[(i32, f64)],
    shares: Metric,
    net_debt: Metric,
) -> Multiples {
    let Some(shares) = shares.value().filter(|s| *s > 0.0) else {
        return Multiples::default();
    };

    let mut pe = Vec::new();
    let mut ps = Vec::new();
    for row in yearly {
        let Some(price) = prices.get(&row.year) else {
            continue;
        };
        if let Some(earnings) = row.earnings.filter(|e| *e != 0.0) {
            pe.push(price / (earnings / shares));
        }
        if let Some(revenue) = row.revenue.filter(|r| *r > 0.0) {
            ps.push(price / (revenue / shares));
        }
    }

    let pb: Vec<f64> = equities
        .iter()
        .filter(|(_, equity)| *equity != 0.0)
        .filter_map(|(year, equity)| prices.get(year).map(|price| price / (equity / shares)))
        .collect();

    let ev_ebitda: Vec<f64> = match net_debt.value() {
        Some(net_debt) => ebitdas
            .iter()
            .filter(|(_, ebitda)| *ebitda != 0.0)
            .filter_map(|(year, ebitda)| prices.get(year).map(|price| (price * shares + net_debt) / ebitda))
            .collect(),
        None => Vec::new(),
    };

    Multiples {
        pe: mean(&pe),
        pb: mean(&pb),
        ps: mean(&ps),
        ev_ebitda: mean(&ev_ebitda),
    }
}

/// Prefer the first equity quote, else the first quote with a symbol.
pub fn symbol_match(search: &Value) -> Option<SymbolMatch> {
    let quotes = array_at(search, &["quotes"]);
    let chosen = quotes
        .iter()
        .find(|q| q.get("quoteType").and_then(Value::as_str) == Some("EQUITY"))
        .or_else(|| quotes.first())?;

    let symbol = chosen.get("symbol").and_then(Value::as_str)?.trim();
    if symbol.is_empty() {
        return None;
    }
    let name = ["shortname", "longname", "name"]
        .iter()
        .find_map(|key| chosen.get(*key).and_then(Value::as_str))
        .map(str::to_string);

    Some(SymbolMatch {
        symbol: symbol.to_uppercase(),
        name,
    })
}

/// News items carrying both a title and a link, at most `limit`.
pub fn news_items(search: &Value, limit: usize) -> Vec<NewsItem> {
    array_at(search, &["news"])
        .iter()
        .filter_map(|item| {
            let title = item.get("title").and_then(Value::as_str).filter(|s| !s.is_empty())?;
            let link = item.get("link").and_then(Value::as_str).filter(|s| !s.is_empty())?;
            Some(NewsItem {
                title: title.to_string(),
                link: link.to_string(),
                publisher: item.get("publisher").and_then(Value::as_str).map(str::to_string),
                published_at: item
                    .get("providerPublishTime")
                    .and_then(Value::as_i64)
                    .and_then(|ts| DateTime::from_timestamp(ts, 0)),
            })
        })
        .take(limit)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn ts(year: i32, month: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(year, month, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_flatten_summary_skips_blank_and_keeps_first() {
        let result = json!({
            "price": {"regularMarketPrice": {"raw": 10.0}, "marketCap": {}, "longName": "Acme Corp"},
            "summaryDetail": {"marketCap": {"raw": 500.0}, "regularMarketPrice": {"raw": 99.0}},
            "assetProfile": {"sector": "Technology"}
        });
        let flat = flatten_summary(&result);
        assert_eq!(raw_f64(&flat["regularMarketPrice"]), Some(10.0));
        assert_eq!(raw_f64(&flat["marketCap"]), Some(500.0));
        assert_eq!(flat["sector"], json!("Technology"));
    }

    #[test]
    fn test_earnings_trend_current_year() {
        let result = json!({"earningsTrend": {"trend": [
            {"period": "0q", "growth": {"raw": 0.5}},
            {"period": "0y", "growth": {"raw": 0.12}}
        ]}});
        assert_eq!(earnings_trend_growth(&result), Some(0.12));
        assert_eq!(earnings_trend_growth(&json!({})), None);
    }

    #[test]
    fn test_cash_flow_rows_aligned() {
        let result = json!({"cashflowStatementHistory": {"cashflowStatements": [
            {"endDate": {"raw": 1_700_000_000}, "totalCashFromOperatingActivities": {"raw": 900.0}},
            {"totalCashFromOperatingActivities": {"raw": 800.0}, "capitalExpenditures": {"raw": -200.0}}
        ]}});
        let rows = cash_flow_rows(&result);
        assert_eq!(rows["Total Cash From Operating Activities"], vec![Some(900.0), Some(800.0)]);
        assert_eq!(rows["Capital Expenditures"], vec![None, Some(-200.0)]);
        assert!(!rows.contains_key("End Date"));
    }

    #[test]
    fn test_row_label() {
        assert_eq!(row_label("freeCashFlow"), "Free Cash Flow");
        assert_eq!(row_label("capitalExpenditures"), "Capital Expenditures");
    }

    #[test]
    fn test_chart_closes_skip_nulls() {
        let json = json!({"chart": {"result": [{
            "timestamp": [1_700_000_000, 1_700_604_800, 1_701_209_600],
            "indicators": {"quote": [{"close": [10.5, null, 11.0]}]}
        }]}});
        let closes = chart_closes(&json);
        assert_eq!(closes.len(), 2);
        let points = price_points(&closes);
        assert_eq!(points[0].date, "2023-11-14");
        assert_eq!(points[1].close, 11.0);
    }

    #[test]
    fn test_historical_multiples() {
        let prices = yearly_average_closes(&[(ts(2022, 1), 40.0), (ts(2022, 7), 60.0), (ts(2023, 3), 80.0)]);
        assert_eq!(prices[&2022], 50.0);

        let yearly = [
            YearlyFigures { year: 2022, earnings: Some(500.0), revenue: Some(2_500.0) },
            YearlyFigures { year: 2023, earnings: Some(800.0), revenue: None },
            YearlyFigures { year: 2019, earnings: Some(100.0), revenue: Some(100.0) },
        ];
        let equities = [(2022, 1_000.0), (2023, 0.0)];
        let ebitdas = [(2023, 1_000.0)];

        let m = historical_multiples(&prices, &yearly, &equities, &ebitdas, Metric::Value(100.0), Metric::Value(2_000.0));
        // P/E: 50 / 5 = 10 and 80 / 8 = 10
        assert_eq!(m.pe, Metric::Value(10.0));
        assert_eq!(m.ps, Metric::Value(2.0));
        assert_eq!(m.pb, Metric::Value(5.0));
        assert_eq!(m.ev_ebitda, Metric::Value(10.0));

        let m = historical_multiples(&prices, &yearly, &equities, &ebitdas, Metric::Indeterminate, Metric::Value(0.0));
        assert_eq!(m, Multiples::default());

        let m = historical_multiples(&prices, &yearly, &equities, &ebitdas, Metric::Value(100.0), Metric::Indeterminate);
        assert!(m.ev_ebitda.is_indeterminate());
    }

    #[test]
    fn test_symbol_match_prefers_equity() {
        let search = json!({"quotes": [
            {"symbol": "acme.f", "quoteType": "FUTURE"},
            {"symbol": "acme", "quoteType": "EQUITY", "longname": "Acme Corporation"}
        ]});
        assert_eq!(
            symbol_match(&search),
            Some(SymbolMatch { symbol: "ACME".into(), name: Some("Acme Corporation".into()) })
        );

        let fallback = json!({"quotes": [{"symbol": "ETF1", "quoteType": "ETF", "shortname": "Fund"}]});
        assert_eq!(symbol_match(&fallback).unwrap().symbol, "ETF1");
        assert_eq!(symbol_match(&json!({"quotes": []})), None);
    }

    #[test]
    fn test_news_items_filter_and_limit() {
        let search = json!({"news": [
            {"title": "A", "link": "https://a", "publisher": "Wire", "providerPublishTime": 1_700_000_000},
            {"title": "", "link": "https://b"},
            {"title": "C"},
            {"title": "D", "link": "https://d"},
            {"title": "E", "link": "https://e"}
        ]});
        let items = news_items(&search, 2);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].publisher.as_deref(), Some("Wire"));
        assert!(items[0].published_at.is_some());
        assert_eq!(items[1].title, "D");
    }
}
