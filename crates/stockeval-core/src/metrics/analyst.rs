//! Analyst consensus from the quote summary

use super::{MarketAccess, MetricProvider};
use crate::error::{Result, StockError};
use crate::record::{AnalystMetrics, LookbackWindow, MetricCategory, MetricSection, TickerRequest};
use crate::source::QuoteSummary;
use async_trait::async_trait;

/// Human-readable form of a recommendation key
pub fn recommendation_label(key: Option<&str>) -> &'static str {
    match key.unwrap_or("none") {
        "strongBuy" | "strong_buy" => "Strong Buy",
        "buy" => "Buy",
        "hold" => "Hold",
        "sell" => "Sell",
        "strongSell" | "strong_sell" => "Strong Sell",
        "none" => "No Rating",
        _ => "Unknown",
    }
}

pub fn analyst_from_summary(summary: &QuoteSummary) -> Option<AnalystMetrics> {
    let has_consensus = summary.target_mean_price.is_some()
        || summary.target_high_price.is_some()
        || summary.target_low_price.is_some()
        || summary.number_of_analyst_opinions.is_some()
        || summary.recommendation_key.is_some();

    has_consensus.then(|| AnalystMetrics {
        target_mean_price: summary.target_mean_price,
        target_high_price: summary.target_high_price,
        target_low_price: summary.target_low_price,
        analyst_count: summary.number_of_analyst_opinions,
        recommendation_key: summary.recommendation_key.clone(),
        recommendation: recommendation_label(summary.recommendation_key.as_deref()).to_string(),
    })
}

pub struct AnalystProvider {
    market: MarketAccess,
}

impl AnalystProvider {
    pub fn new(market: MarketAccess) -> Self {
        Self { market }
    }
}

#[async_trait]
impl MetricProvider for AnalystProvider {
    fn category(&self) -> MetricCategory {
        MetricCategory::Analyst
    }

    async fn compute(
        &self,
        ticker: &TickerRequest,
        _window: &LookbackWindow,
    ) -> Result<MetricSection> {
        let symbol = ticker.symbol();
        let summary = self
            .market
            .summary(symbol)
            .await
            .map_err(|e| StockError::unavailable(self.category(), symbol, e))?;

        analyst_from_summary(&summary)
            .map(MetricSection::Analyst)
            .ok_or_else(|| StockError::unavailable(self.category(), symbol, "no analyst coverage"))
    }
}
