//! Metric providers
//!
//! Each provider turns fetched raw data for one ticker into one
//! [`MetricSection`]. A provider that cannot produce any value fails with
//! `DataUnavailable`; the aggregator then records its category as absent.

pub mod analyst;
pub mod fundamental;
pub mod indicators;
pub mod risk;
pub mod sentiment;
pub mod technical;

pub use analyst::AnalystProvider;
pub use fundamental::FundamentalProvider;
pub use risk::RiskProvider;
pub use sentiment::{LexiconScorer, SentimentProvider};
pub use technical::TechnicalProvider;

use crate::error::{Result, StockError};
use crate::record::{LookbackWindow, MetricCategory, MetricSection, TickerRequest};
use crate::retry::RetryPolicy;
use crate::source::{MarketDataSource, PriceBar, QuoteSummary};
use async_trait::async_trait;
use std::sync::Arc;

/// Computes one metric category for a ticker
#[async_trait]
pub trait MetricProvider: Send + Sync {
    fn category(&self) -> MetricCategory;

    async fn compute(
        &self,
        ticker: &TickerRequest,
        window: &LookbackWindow,
    ) -> Result<MetricSection>;
}

/// Market access shared by the price and summary based providers
#[derive(Clone)]
pub struct MarketAccess {
    pub source: Arc<dyn MarketDataSource>,
    pub retry: RetryPolicy,
}

impl MarketAccess {
    pub fn new(source: Arc<dyn MarketDataSource>, retry: RetryPolicy) -> Self {
        Self { source, retry }
    }

    pub async fn history(&self, symbol: &str, window: &LookbackWindow) -> Result<Vec<PriceBar>> {
        self.retry
            .execute("price_history", || self.source.price_history(symbol, window))
            .await
    }

    pub async fn summary(&self, symbol: &str) -> Result<QuoteSummary> {
        self.retry
            .execute("quote_summary", || self.source.quote_summary(symbol))
            .await
    }
}

/// Closes of a non-empty history, or `DataUnavailable`
pub(crate) fn closes_of(
    bars: &[PriceBar],
    category: MetricCategory,
    symbol: &str,
) -> Result<Vec<f64>> {
    if bars.is_empty() {
        return Err(StockError::unavailable(
            category,
            symbol,
            "empty price history",
        ));
    }
    Ok(bars.iter().map(|b| b.close).collect())
}

/// Build the standard provider set over one market source
pub fn default_providers(
    market: &MarketAccess,
    news: Arc<dyn crate::source::NewsSource>,
    config: &crate::config::AnalysisConfig,
) -> Vec<Arc<dyn MetricProvider>> {
    vec![
        Arc::new(FundamentalProvider::new(market.clone())),
        Arc::new(TechnicalProvider::new(market.clone())),
        Arc::new(SentimentProvider::new(
            news,
            market.clone(),
            config.fetch_retry.clone(),
            config.news_window_days,
            config.news_limit,
        )),
        Arc::new(AnalystProvider::new(market.clone())),
        Arc::new(RiskProvider::new(
            market.clone(),
            config.benchmark_symbol.clone(),
            config.risk_free_rate,
        )),
    ]
}
