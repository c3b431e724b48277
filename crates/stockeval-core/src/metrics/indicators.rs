//! Numeric building blocks for the technical and risk providers
//!
//! Functions return `None` when the input cannot support the statistic
//! instead of producing NaN or a sentinel zero.

use crate::record::SharpeRatio;
use crate::source::PriceBar;
use chrono::NaiveDate;
use std::collections::HashMap;
use ta::Next;
use ta::indicators::SimpleMovingAverage;

/// Trading days per year used for annualization
pub const TRADING_DAYS: f64 = 252.0;

/// Spread below this is treated as zero
const ZERO_SPREAD: f64 = 1e-12;

/// Mean of the last `period` closes; `None` when fewer exist
pub fn sma(closes: &[f64], period: usize) -> Option<f64> {
    if period == 0 || closes.len() < period {
        return None;
    }

    let mut indicator = SimpleMovingAverage::new(period).ok()?;
    let mut value = None;
    for &close in &closes[closes.len() - period..] {
        value = Some(indicator.next(close));
    }
    value
}

/// RSI from simple means of the last `period` gains and losses
///
/// Needs `period + 1` closes. A window without losses is 100 when there were
/// gains and 0 when flat. Rounded to two decimals.
pub fn rsi(closes: &[f64], period: usize) -> Option<f64> {
    if period == 0 || closes.len() < period + 1 {
        return None;
    }

    let recent = &closes[closes.len() - period - 1..];
    let (gains, losses) = recent
        .windows(2)
        .map(|w| w[1] - w[0])
        .fold((0.0, 0.0), |(g, l), delta| {
            if delta > 0.0 {
                (g + delta, l)
            } else {
                (g, l - delta)
            }
        });

    let avg_gain = gains / period as f64;
    let avg_loss = losses / period as f64;

    if avg_loss == 0.0 {
        return Some(if avg_gain > 0.0 { 100.0 } else { 0.0 });
    }

    let rs = avg_gain / avg_loss;
    Some(round_to(100.0 - 100.0 / (1.0 + rs), 2))
}

/// Simple daily returns, one shorter than the input
pub fn daily_returns(closes: &[f64]) -> Vec<f64> {
    closes
        .windows(2)
        .filter(|w| w[0] != 0.0)
        .map(|w| w[1] / w[0] - 1.0)
        .collect()
}

/// Daily returns keyed by the session date of the later bar
pub fn dated_returns(bars: &[PriceBar]) -> Vec<(NaiveDate, f64)> {
    bars.windows(2)
        .filter(|w| w[0].close != 0.0)
        .map(|w| (w[1].timestamp.date_naive(), w[1].close / w[0].close - 1.0))
        .collect()
}

/// Pair stock and benchmark returns that share a session date
///
/// Output keeps the stock's order. Sessions missing on either side are
/// dropped.
pub fn align_by_date(
    stock: &[(NaiveDate, f64)],
    benchmark: &[(NaiveDate, f64)],
) -> (Vec<f64>, Vec<f64>) {
    let by_date: HashMap<NaiveDate, f64> = benchmark.iter().copied().collect();
    stock
        .iter()
        .filter_map(|(date, r)| by_date.get(date).map(|b| (*r, *b)))
        .unzip()
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Sample standard deviation (n - 1)
pub fn sample_std(values: &[f64]) -> Option<f64> {
    sample_covariance(values, values).map(f64::sqrt)
}

/// Sample covariance (n - 1) of equal-length series
pub fn sample_covariance(a: &[f64], b: &[f64]) -> Option<f64> {
    if a.len() != b.len() || a.len() < 2 {
        return None;
    }
    let mean_a = mean(a)?;
    let mean_b = mean(b)?;
    let sum: f64 = a
        .iter()
        .zip(b)
        .map(|(x, y)| (x - mean_a) * (y - mean_b))
        .sum();
    Some(sum / (a.len() - 1) as f64)
}

/// Beta of dated `stock` returns against dated `benchmark` returns
///
/// Returns are paired on session date. `None` when the benchmark series is
/// shorter than the stock series, when fewer than two dates are shared, or
/// when the benchmark has no variance over the shared dates.
pub fn beta(stock: &[(NaiveDate, f64)], benchmark: &[(NaiveDate, f64)]) -> Option<f64> {
    if benchmark.len() < stock.len() {
        return None;
    }
    let (stock, aligned) = align_by_date(stock, benchmark);

    let variance = sample_covariance(&aligned, &aligned)?;
    if variance < ZERO_SPREAD * ZERO_SPREAD {
        return None;
    }
    Some(sample_covariance(&stock, &aligned)? / variance)
}

/// Annualized standard deviation of daily returns
pub fn annualized_volatility(returns: &[f64]) -> Option<f64> {
    sample_std(returns).map(|s| s * TRADING_DAYS.sqrt())
}

/// `(mean * 252 - rf) / (std * sqrt(252))`
pub fn sharpe_ratio(returns: &[f64], risk_free_rate: f64) -> Option<SharpeRatio> {
    let avg = mean(returns)?;
    let std = sample_std(returns)?;

    if std < ZERO_SPREAD {
        return Some(SharpeRatio::Undefined);
    }

    let excess = avg * TRADING_DAYS - risk_free_rate;
    Some(SharpeRatio::Value(excess / (std * TRADING_DAYS.sqrt())))
}

/// Quantile with linear interpolation between order statistics
pub fn quantile(values: &[f64], q: f64) -> Option<f64> {
    if values.is_empty() || !(0.0..=1.0).contains(&q) {
        return None;
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let position = q * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let fraction = position - lower as f64;

    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * fraction)
}

/// Lowest point of the running sum of returns
pub fn max_drawdown(returns: &[f64]) -> Option<f64> {
    returns
        .iter()
        .scan(0.0, |acc, r| {
            *acc += r;
            Some(*acc)
        })
        .reduce(f64::min)
}

pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10_f64.powi(decimals);
    (value * factor).round() / factor
}
