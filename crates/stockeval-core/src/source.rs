//! Seams to third-party market and news data

use crate::error::Result;
use crate::record::LookbackWindow;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identity of a resolved ticker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedTicker {
    pub symbol: String,
    pub name: Option<String>,
    pub exchange: Option<String>,
}

/// Daily OHLCV bar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

/// Flattened company summary
///
/// Ratios are fractions where the upstream reports fractions; dividend
/// yield 0.0191 means 1.91%.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuoteSummary {
    pub long_name: Option<String>,
    pub short_name: Option<String>,
    pub exchange: Option<String>,
    pub sector: Option<String>,
    pub industry: Option<String>,
    pub current_price: Option<f64>,
    pub market_cap: Option<f64>,
    pub trailing_pe: Option<f64>,
    pub forward_pe: Option<f64>,
    pub price_to_sales: Option<f64>,
    pub price_to_book: Option<f64>,
    pub trailing_eps: Option<f64>,
    pub earnings_growth: Option<f64>,
    pub total_revenue: Option<f64>,
    pub profit_margins: Option<f64>,
    pub operating_margins: Option<f64>,
    pub debt_to_equity: Option<f64>,
    pub current_ratio: Option<f64>,
    pub return_on_equity: Option<f64>,
    pub return_on_assets: Option<f64>,
    pub dividend_yield: Option<f64>,
    pub payout_ratio: Option<f64>,
    pub book_value: Option<f64>,
    pub fifty_two_week_high: Option<f64>,
    pub fifty_two_week_low: Option<f64>,
    pub beta: Option<f64>,
    pub target_mean_price: Option<f64>,
    pub target_high_price: Option<f64>,
    pub target_low_price: Option<f64>,
    pub number_of_analyst_opinions: Option<u32>,
    pub recommendation_key: Option<String>,
}

impl QuoteSummary {
    /// Long name, falling back to the short name
    pub fn display_name(&self) -> Option<&str> {
        self.long_name.as_deref().or(self.short_name.as_deref())
    }
}

/// A news article as returned by a news source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsArticle {
    pub title: String,
    pub description: Option<String>,
    pub source: String,
    pub url: Option<String>,
    pub published_at: DateTime<Utc>,
    /// Polarity supplied by the source, if any
    pub score: Option<f64>,
}

/// What to search news for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewsQuery {
    pub symbol: String,
    pub company_name: Option<String>,
    pub limit: usize,
}

impl NewsQuery {
    /// Search expression, `"<company> stock OR <symbol>"` when the name is known
    pub fn search_terms(&self) -> String {
        match &self.company_name {
            Some(name) => format!("{name} stock OR {}", self.symbol),
            None => self.symbol.clone(),
        }
    }
}

/// Market data provider
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// Confirm the ticker exists; `InvalidTicker` when it does not
    async fn resolve(&self, symbol: &str) -> Result<ResolvedTicker>;

    /// Daily bars inside the window, oldest first
    async fn price_history(&self, symbol: &str, window: &LookbackWindow) -> Result<Vec<PriceBar>>;

    async fn quote_summary(&self, symbol: &str) -> Result<QuoteSummary>;
}

/// News provider
#[async_trait]
pub trait NewsSource: Send + Sync {
    /// Articles matching the query inside the window, newest first
    async fn articles(&self, query: &NewsQuery, window: &LookbackWindow)
    -> Result<Vec<NewsArticle>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_terms() {
        let query = NewsQuery {
            symbol: "TCS".to_string(),
            company_name: Some("Tata Consultancy Services Limited".to_string()),
            limit: 10,
        };
        assert_eq!(
            query.search_terms(),
            "Tata Consultancy Services Limited stock OR TCS"
        );

        let query = NewsQuery {
            company_name: None,
            ..query
        };
        assert_eq!(query.search_terms(), "TCS");
    }

    #[test]
    fn test_display_name_fallback() {
        let summary = QuoteSummary {
            short_name: Some("Apple".to_string()),
            ..Default::default()
        };
        assert_eq!(summary.display_name(), Some("Apple"));
    }
}
