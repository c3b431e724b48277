//! Return-distribution risk against a benchmark index

use super::indicators::{
    annualized_volatility, beta, daily_returns, dated_returns, max_drawdown, quantile, round_to,
    sharpe_ratio,
};
use super::{MarketAccess, MetricProvider, closes_of};
use crate::error::{Result, StockError};
use crate::record::{
    BetaSource, LookbackWindow, MetricCategory, MetricSection, RiskMetrics, SharpeRatio,
    TickerRequest, VolatilityLevel,
};
use crate::source::PriceBar;
use async_trait::async_trait;
use tracing::{debug, warn};

/// Confidence level for historical VaR
const VAR_QUANTILE: f64 = 0.05;

/// Compute the risk section
///
/// `benchmark` may be empty; beta is then left out.
pub fn risk_from_bars(
    bars: &[PriceBar],
    benchmark: &[PriceBar],
    risk_free_rate: f64,
    symbol: &str,
) -> Result<RiskMetrics> {
    let category = MetricCategory::Risk;
    let closes = closes_of(bars, category, symbol)?;
    let returns = daily_returns(&closes);

    let insufficient =
        || StockError::unavailable(category, symbol, "need at least three closes for risk");

    let volatility = annualized_volatility(&returns).ok_or_else(insufficient)?;
    let sharpe = sharpe_ratio(&returns, risk_free_rate).ok_or_else(insufficient)?;
    let var_95 = quantile(&returns, VAR_QUANTILE).ok_or_else(insufficient)?;
    let drawdown = max_drawdown(&returns).ok_or_else(insufficient)?;

    let stock_dated = dated_returns(bars);
    let benchmark_dated = dated_returns(benchmark);
    let beta = beta(&stock_dated, &benchmark_dated).map(|b| round_to(b, 2));
    if beta.is_none() {
        debug!(
            "Beta unavailable for {}: {} stock returns vs {} benchmark returns",
            symbol,
            stock_dated.len(),
            benchmark_dated.len()
        );
    }

    Ok(RiskMetrics {
        volatility: round_to(volatility, 4),
        volatility_level: VolatilityLevel::classify(volatility),
        beta,
        beta_source: beta.map(|_| BetaSource::Benchmark),
        sharpe_ratio: match sharpe {
            SharpeRatio::Value(v) => SharpeRatio::Value(round_to(v, 2)),
            SharpeRatio::Undefined => SharpeRatio::Undefined,
        },
        var_95: round_to(var_95, 4),
        max_drawdown: round_to(drawdown, 4),
    })
}

pub struct RiskProvider {
    market: MarketAccess,
    benchmark: String,
    risk_free_rate: f64,
}

impl RiskProvider {
    pub fn new(market: MarketAccess, benchmark: impl Into<String>, risk_free_rate: f64) -> Self {
        Self {
            market,
            benchmark: benchmark.into(),
            risk_free_rate,
        }
    }
}

#[async_trait]
impl MetricProvider for RiskProvider {
    fn category(&self) -> MetricCategory {
        MetricCategory::Risk
    }

    async fn compute(
        &self,
        ticker: &TickerRequest,
        window: &LookbackWindow,
    ) -> Result<MetricSection> {
        let symbol = ticker.symbol();

        let (stock, benchmark) = tokio::join!(
            self.market.history(symbol, window),
            self.market.history(&self.benchmark, window)
        );

        let bars = stock.map_err(|e| StockError::unavailable(self.category(), symbol, e))?;

        let benchmark = match benchmark {
            Ok(bench_bars) => bench_bars,
            Err(e) => {
                warn!(
                    "Benchmark {} unavailable for {}: {}",
                    self.benchmark, symbol, e
                );
                Vec::new()
            }
        };

        let mut metrics = risk_from_bars(&bars, &benchmark, self.risk_free_rate, symbol)?;

        if metrics.beta.is_none() {
            match self.market.summary(symbol).await {
                Ok(summary) => {
                    if let Some(reported) = summary.beta {
                        debug!("Using reported beta {} for {}", reported, symbol);
                        metrics.beta = Some(round_to(reported, 2));
                        metrics.beta_source = Some(BetaSource::Reported);
                    }
                }
                Err(e) => debug!("No reported beta for {}: {}", symbol, e),
            }
        }

        Ok(MetricSection::Risk(metrics))
    }
}
