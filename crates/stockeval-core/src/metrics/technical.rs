//! Moving averages, RSI and volume from daily bars

use super::indicators::{mean, rsi, sma};
use super::{MarketAccess, MetricProvider, closes_of};
use crate::error::{Result, StockError};
use crate::record::{
    CrossSignal, LookbackWindow, MetricCategory, MetricSection, RsiSignal, TechnicalMetrics,
    TickerRequest, VolumeTrend,
};
use crate::source::PriceBar;
use async_trait::async_trait;
use tracing::debug;

pub const SMA_SHORT: usize = 50;
pub const SMA_LONG: usize = 200;
pub const RSI_PERIOD: usize = 14;

/// Current volume above this multiple of the average is "High"
const HIGH_VOLUME_FACTOR: f64 = 1.2;

/// Compute the technical section from bars ordered oldest first
///
/// SMA(50) and RSI(14) are mandatory; SMA(200) is left out when fewer than
/// 200 closes exist.
pub fn technical_from_bars(bars: &[PriceBar], symbol: &str) -> Result<TechnicalMetrics> {
    let category = MetricCategory::Technical;
    let closes = closes_of(bars, category, symbol)?;

    let sma_50 = sma(&closes, SMA_SHORT).ok_or_else(|| {
        StockError::unavailable(
            category,
            symbol,
            format!("SMA({SMA_SHORT}) needs {SMA_SHORT} closes, got {}", closes.len()),
        )
    })?;
    let rsi_value = rsi(&closes, RSI_PERIOD).ok_or_else(|| {
        StockError::unavailable(
            category,
            symbol,
            format!("RSI({RSI_PERIOD}) needs {} closes", RSI_PERIOD + 1),
        )
    })?;
    let sma_200 = sma(&closes, SMA_LONG);

    let cross_signal = sma_200.and_then(|long| {
        if sma_50 > long {
            Some(CrossSignal::GoldenCross)
        } else if sma_50 < long {
            Some(CrossSignal::DeathCross)
        } else {
            None
        }
    });

    let first = closes[0];
    let current_price = closes[closes.len() - 1];
    let price_change = current_price - first;
    let price_change_pct = if first == 0.0 {
        0.0
    } else {
        price_change / first * 100.0
    };

    let volumes: Vec<f64> = bars.iter().map(|b| b.volume as f64).collect();
    let average_volume = mean(&volumes).unwrap_or(0.0);
    let current_volume = bars[bars.len() - 1].volume;
    let volume_trend = if current_volume as f64 > average_volume * HIGH_VOLUME_FACTOR {
        VolumeTrend::High
    } else {
        VolumeTrend::Normal
    };

    let period_high = bars.iter().map(|b| b.high).fold(f64::MIN, f64::max);
    let period_low = bars.iter().map(|b| b.low).fold(f64::MAX, f64::min);

    Ok(TechnicalMetrics {
        current_price,
        price_change,
        price_change_pct,
        sma_50,
        sma_200,
        cross_signal,
        rsi: rsi_value,
        rsi_signal: RsiSignal::classify(rsi_value),
        average_volume,
        current_volume,
        volume_trend,
        period_high,
        period_low,
    })
}

pub struct TechnicalProvider {
    market: MarketAccess,
}

impl TechnicalProvider {
    pub fn new(market: MarketAccess) -> Self {
        Self { market }
    }
}

#[async_trait]
impl MetricProvider for TechnicalProvider {
    fn category(&self) -> MetricCategory {
        MetricCategory::Technical
    }

    async fn compute(
        &self,
        ticker: &TickerRequest,
        window: &LookbackWindow,
    ) -> Result<MetricSection> {
        let symbol = ticker.symbol();
        let bars = self
            .market
            .history(symbol, window)
            .await
            .map_err(|e| StockError::unavailable(self.category(), symbol, e))?;

        let metrics = technical_from_bars(&bars, symbol)?;
        debug!(
            "Technicals for {}: SMA50 {:.2}, RSI {:.2}",
            symbol, metrics.sma_50, metrics.rsi
        );
        Ok(MetricSection::Technical(metrics))
    }
}
