//! Yahoo Finance market data client

use crate::error::{Result, StockError};
use crate::record::LookbackWindow;
use crate::source::{MarketDataSource, PriceBar, QuoteSummary, ResolvedTicker};
use async_trait::async_trait;
use chrono::DateTime;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use time::OffsetDateTime;
use tracing::{debug, instrument};
use yahoo_finance_api as yahoo;

const QUOTE_SUMMARY_URL: &str = "https://query2.finance.yahoo.com/v10/finance/quoteSummary";
const SUMMARY_MODULES: &str = "summaryDetail,defaultKeyStatistics,financialData,price,assetProfile";
const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) stockeval/0.1";

/// Yahoo Finance client
///
/// Price history goes through `yahoo_finance_api`; the company summary is
/// read from the `quoteSummary` endpoint directly.
#[derive(Clone)]
pub struct YahooFinanceClient {
    http: Client,
    summary_url: String,
}

impl YahooFinanceClient {
    pub fn new(timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            http,
            summary_url: QUOTE_SUMMARY_URL.to_string(),
        })
    }

    /// Point summary requests somewhere else
    pub fn with_summary_url(mut self, url: impl Into<String>) -> Self {
        self.summary_url = url.into();
        self
    }

    fn connector() -> Result<yahoo::YahooConnector> {
        yahoo::YahooConnector::new().map_err(|e| StockError::api("Yahoo", None, e.to_string()))
    }
}

/// Map a `yahoo_finance_api` failure onto the error taxonomy
///
/// Unknown and delisted symbols become `InvalidTicker`; connection trouble is
/// reported as a 503 so the retry policy treats it as transient.
fn map_yahoo_error(symbol: &str, err: &yahoo::YahooError) -> StockError {
    let text = err.to_string();
    let lower = text.to_lowercase();

    if lower.contains("not found") || lower.contains("no data found") || lower.contains("delisted")
    {
        StockError::InvalidTicker(symbol.to_string())
    } else if lower.contains("connection") || lower.contains("timed out") || lower.contains("fetch")
    {
        StockError::api("Yahoo", Some(503), text)
    } else {
        StockError::api("Yahoo", None, text)
    }
}

fn to_offset(ts: i64) -> Result<OffsetDateTime> {
    OffsetDateTime::from_unix_timestamp(ts)
        .map_err(|e| StockError::Config(format!("Invalid timestamp {ts}: {e}")))
}

#[async_trait]
impl MarketDataSource for YahooFinanceClient {
    #[instrument(skip(self))]
    async fn resolve(&self, symbol: &str) -> Result<ResolvedTicker> {
        let provider = Self::connector()?;

        let response = provider
            .get_latest_quotes(symbol, "1d")
            .await
            .map_err(|e| map_yahoo_error(symbol, &e))?;

        response
            .last_quote()
            .map_err(|_| StockError::InvalidTicker(symbol.to_string()))?;

        Ok(ResolvedTicker {
            symbol: symbol.to_string(),
            name: None,
            exchange: None,
        })
    }

    #[instrument(skip(self, window), fields(days = window.days))]
    async fn price_history(&self, symbol: &str, window: &LookbackWindow) -> Result<Vec<PriceBar>> {
        let provider = Self::connector()?;

        let start = to_offset(window.start().timestamp())?;
        let end = to_offset(window.end.timestamp())?;

        let response = provider
            .get_quote_history(symbol, start, end)
            .await
            .map_err(|e| map_yahoo_error(symbol, &e))?;

        let quotes = response
            .quotes()
            .map_err(|e| map_yahoo_error(symbol, &e))?;

        let bars: Vec<PriceBar> = quotes
            .iter()
            .filter(|q| q.close.is_finite() && q.close > 0.0)
            .filter_map(|q| {
                DateTime::from_timestamp(q.timestamp as i64, 0).map(|timestamp| PriceBar {
                    timestamp,
                    open: q.open,
                    high: q.high,
                    low: q.low,
                    close: q.close,
                    volume: q.volume,
                })
            })
            .collect();

        debug!("Fetched {} bars for {}", bars.len(), symbol);
        Ok(bars)
    }

    #[instrument(skip(self))]
    async fn quote_summary(&self, symbol: &str) -> Result<QuoteSummary> {
        let url = format!("{}/{}", self.summary_url, symbol);

        let response = self
            .http
            .get(&url)
            .query(&[("modules", SUMMARY_MODULES)])
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        let body: Value = serde_json::from_str(&text).unwrap_or(Value::Null);

        if status.as_u16() == 404 {
            return Err(StockError::InvalidTicker(symbol.to_string()));
        }
        if status.as_u16() == 429 {
            return Err(StockError::RateLimitExceeded {
                provider: "Yahoo".to_string(),
            });
        }
        if !status.is_success() {
            return Err(StockError::api(
                "Yahoo",
                Some(status.as_u16()),
                summary_error(&body).unwrap_or_else(|| status.to_string()),
            ));
        }

        parse_quote_summary(symbol, &body)
    }
}

fn summary_error(body: &Value) -> Option<String> {
    body.pointer("/quoteSummary/error/description")
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// Flatten a `quoteSummary` response
fn parse_quote_summary(symbol: &str, body: &Value) -> Result<QuoteSummary> {
    let Some(result) = body.pointer("/quoteSummary/result/0") else {
        return match summary_error(body) {
            Some(reason) if reason.to_lowercase().contains("not found") => {
                Err(StockError::InvalidTicker(symbol.to_string()))
            }
            Some(reason) => Err(StockError::api("Yahoo", None, reason)),
            None => Err(StockError::api("Yahoo", None, "empty quoteSummary result")),
        };
    };

    let num = |module: &str, field: &str| raw_number(result, module, field);
    let text = |module: &str, field: &str| {
        result
            .get(module)
            .and_then(|m| m.get(field))
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };

    Ok(QuoteSummary {
        long_name: text("price", "longName"),
        short_name: text("price", "shortName"),
        exchange: text("price", "exchangeName"),
        sector: text("assetProfile", "sector"),
        industry: text("assetProfile", "industry"),
        current_price: num("financialData", "currentPrice")
            .or_else(|| num("price", "regularMarketPrice")),
        market_cap: num("summaryDetail", "marketCap").or_else(|| num("price", "marketCap")),
        trailing_pe: num("summaryDetail", "trailingPE"),
        forward_pe: num("summaryDetail", "forwardPE")
            .or_else(|| num("defaultKeyStatistics", "forwardPE")),
        price_to_sales: num("summaryDetail", "priceToSalesTrailing12Months"),
        price_to_book: num("defaultKeyStatistics", "priceToBook"),
        trailing_eps: num("defaultKeyStatistics", "trailingEps"),
        earnings_growth: num("financialData", "earningsGrowth"),
        total_revenue: num("financialData", "totalRevenue"),
        profit_margins: num("financialData", "profitMargins"),
        operating_margins: num("financialData", "operatingMargins"),
        debt_to_equity: num("financialData", "debtToEquity"),
        current_ratio: num("financialData", "currentRatio"),
        return_on_equity: num("financialData", "returnOnEquity"),
        return_on_assets: num("financialData", "returnOnAssets"),
        dividend_yield: num("summaryDetail", "dividendYield"),
        payout_ratio: num("summaryDetail", "payoutRatio"),
        book_value: num("defaultKeyStatistics", "bookValue"),
        fifty_two_week_high: num("summaryDetail", "fiftyTwoWeekHigh"),
        fifty_two_week_low: num("summaryDetail", "fiftyTwoWeekLow"),
        beta: num("summaryDetail", "beta").or_else(|| num("defaultKeyStatistics", "beta")),
        target_mean_price: num("financialData", "targetMeanPrice"),
        target_high_price: num("financialData", "targetHighPrice"),
        target_low_price: num("financialData", "targetLowPrice"),
        number_of_analyst_opinions: num("financialData", "numberOfAnalystOpinions")
            .map(|n| n.max(0.0) as u32),
        recommendation_key: text("financialData", "recommendationKey"),
    })
}

/// Yahoo wraps numbers as `{"raw": 1.0, "fmt": "1.00"}`; empty objects mean missing
fn raw_number(result: &Value, module: &str, field: &str) -> Option<f64> {
    let value = result.get(module)?.get(field)?;
    value
        .get("raw")
        .and_then(Value::as_f64)
        .or_else(|| value.as_f64())
        .filter(|v| v.is_finite())
}
