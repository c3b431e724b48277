//! Company fundamentals from the quote summary

use super::{MarketAccess, MetricProvider};
use crate::error::{Result, StockError};
use crate::record::{
    FundamentalMetrics, LookbackWindow, MetricCategory, MetricSection, PeBand, TickerRequest,
};
use crate::source::QuoteSummary;
use async_trait::async_trait;
use tracing::debug;

pub struct FundamentalProvider {
    market: MarketAccess,
}

impl FundamentalProvider {
    pub fn new(market: MarketAccess) -> Self {
        Self { market }
    }
}

/// Project a summary onto the fundamental section
///
/// `None` when the summary carries no fundamental figure at all.
pub fn fundamentals_from_summary(summary: &QuoteSummary) -> Option<FundamentalMetrics> {
    let metrics = FundamentalMetrics {
        company_name: summary.display_name().map(str::to_string),
        sector: summary.sector.clone(),
        industry: summary.industry.clone(),
        market_cap: summary.market_cap,
        pe_ratio: summary.trailing_pe,
        forward_pe: summary.forward_pe,
        price_to_sales: summary.price_to_sales,
        price_to_book: summary.price_to_book,
        eps: summary.trailing_eps,
        earnings_growth: summary.earnings_growth,
        revenue: summary.total_revenue,
        profit_margin: summary.profit_margins,
        operating_margin: summary.operating_margins,
        debt_to_equity: summary.debt_to_equity,
        current_ratio: summary.current_ratio,
        return_on_equity: summary.return_on_equity,
        return_on_assets: summary.return_on_assets,
        dividend_yield: summary.dividend_yield,
        payout_ratio: summary.payout_ratio,
        book_value: summary.book_value,
        fifty_two_week_high: summary.fifty_two_week_high,
        fifty_two_week_low: summary.fifty_two_week_low,
        current_price: summary.current_price,
        pe_band: summary.trailing_pe.map(PeBand::classify),
    };

    let figures = [
        metrics.market_cap,
        metrics.pe_ratio,
        metrics.forward_pe,
        metrics.price_to_sales,
        metrics.price_to_book,
        metrics.eps,
        metrics.earnings_growth,
        metrics.revenue,
        metrics.profit_margin,
        metrics.operating_margin,
        metrics.debt_to_equity,
        metrics.current_ratio,
        metrics.return_on_equity,
        metrics.return_on_assets,
        metrics.dividend_yield,
        metrics.payout_ratio,
        metrics.book_value,
    ];

    figures.iter().any(Option::is_some).then_some(metrics)
}

#[async_trait]
impl MetricProvider for FundamentalProvider {
    fn category(&self) -> MetricCategory {
        MetricCategory::Fundamental
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

        let metrics = fundamentals_from_summary(&summary).ok_or_else(|| {
            StockError::unavailable(self.category(), symbol, "no fundamental figures reported")
        })?;

        debug!(
            "Fundamentals for {}: P/E {:?}, P/B {:?}",
            symbol, metrics.pe_ratio, metrics.price_to_book
        );
        Ok(MetricSection::Fundamental(metrics))
    }
}
