//! Per-ticker metric record and the types it is built from
//!
//! A [`MetricRecord`] groups metrics by [`MetricCategory`]. A category is either
//! present with all of its mandatory fields, or absent (`None`). Absent
//! categories are never defaulted to zero. Individual optional fields inside a
//! present category are `None` when the source could not supply them.
//!
//! All types serialize with struct field order and no hash maps, so identical
//! inputs produce byte-identical JSON.

use crate::error::{Result, StockError};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

const MAX_SYMBOL_LEN: usize = 20;

/// A validated ticker symbol
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TickerRequest {
    symbol: String,
}

impl TickerRequest {
    /// Normalize and validate a raw symbol
    ///
    /// Trims whitespace and upper-cases. Empty symbols, symbols longer than
    /// 20 characters and symbols containing characters outside
    /// `A-Z 0-9 . ^ = -` are rejected with `InvalidTicker`.
    pub fn parse(raw: &str) -> Result<Self> {
        let symbol = raw.trim().to_uppercase();

        if symbol.is_empty() || symbol.len() > MAX_SYMBOL_LEN {
            return Err(StockError::InvalidTicker(raw.trim().to_string()));
        }

        let valid = symbol
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '^' | '=' | '-'));
        if !valid {
            return Err(StockError::InvalidTicker(raw.trim().to_string()));
        }

        Ok(Self { symbol })
    }

    /// The normalized symbol
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Symbol without an exchange suffix (`TCS.NS` -> `TCS`)
    pub fn base_symbol(&self) -> &str {
        self.symbol
            .split_once('.')
            .map_or(self.symbol.as_str(), |(base, _)| base)
    }
}

impl fmt::Display for TickerRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.symbol)
    }
}

/// Time range a metric is computed over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookbackWindow {
    /// Inclusive end of the window
    pub end: DateTime<Utc>,
    /// Length of the window in calendar days
    pub days: u32,
}

impl LookbackWindow {
    /// Window ending at a fixed instant
    pub fn ending_at(end: DateTime<Utc>, days: u32) -> Self {
        Self { end, days }
    }

    /// Window ending now
    pub fn trailing(days: u32) -> Self {
        Self::ending_at(Utc::now(), days)
    }

    /// Inclusive start of the window
    pub fn start(&self) -> DateTime<Utc> {
        self.end - ChronoDuration::days(i64::from(self.days))
    }

    /// A shorter window with the same end
    pub fn narrowed(&self, days: u32) -> Self {
        Self {
            end: self.end,
            days: days.min(self.days),
        }
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.start() && instant <= self.end
    }
}

/// Metric groups produced by the providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricCategory {
    Fundamental,
    Technical,
    Sentiment,
    Analyst,
    Risk,
}

impl MetricCategory {
    /// All categories in record order
    pub const ALL: [Self; 5] = [
        Self::Fundamental,
        Self::Technical,
        Self::Sentiment,
        Self::Analyst,
        Self::Risk,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fundamental => "fundamental",
            Self::Technical => "technical",
            Self::Sentiment => "sentiment",
            Self::Analyst => "analyst",
            Self::Risk => "risk",
        }
    }
}

impl fmt::Display for MetricCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Trailing P/E classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeBand {
    /// P/E below 15
    Undervalued,
    /// P/E from 15 to 25
    FairlyValued,
    /// P/E above 25
    Overvalued,
}

impl PeBand {
    pub fn classify(pe: f64) -> Self {
        if pe < 15.0 {
            Self::Undervalued
        } else if pe <= 25.0 {
            Self::FairlyValued
        } else {
            Self::Overvalued
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Undervalued => "Potentially Undervalued",
            Self::FairlyValued => "Fairly Valued",
            Self::Overvalued => "Potentially Overvalued",
        }
    }
}

/// Company fundamentals from the quote summary
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FundamentalMetrics {
    pub company_name: Option<String>,
    pub sector: Option<String>,
    pub industry: Option<String>,
    pub market_cap: Option<f64>,
    pub pe_ratio: Option<f64>,
    pub forward_pe: Option<f64>,
    pub price_to_sales: Option<f64>,
    pub price_to_book: Option<f64>,
    pub eps: Option<f64>,
    pub earnings_growth: Option<f64>,
    pub revenue: Option<f64>,
    pub profit_margin: Option<f64>,
    pub operating_margin: Option<f64>,
    pub debt_to_equity: Option<f64>,
    pub current_ratio: Option<f64>,
    pub return_on_equity: Option<f64>,
    pub return_on_assets: Option<f64>,
    /// Fraction, 0.0191 means 1.91%
    pub dividend_yield: Option<f64>,
    pub payout_ratio: Option<f64>,
    pub book_value: Option<f64>,
    pub fifty_two_week_high: Option<f64>,
    pub fifty_two_week_low: Option<f64>,
    pub current_price: Option<f64>,
    pub pe_band: Option<PeBand>,
}

/// SMA50 vs SMA200 relationship
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrossSignal {
    GoldenCross,
    DeathCross,
}

impl CrossSignal {
    pub fn label(&self) -> &'static str {
        match self {
            Self::GoldenCross => "Golden Cross (Bullish)",
            Self::DeathCross => "Death Cross (Bearish)",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RsiSignal {
    Overbought,
    Oversold,
    Neutral,
}

impl RsiSignal {
    /// >= 70 overbought, <= 30 oversold
    pub fn classify(rsi: f64) -> Self {
        if rsi >= 70.0 {
            Self::Overbought
        } else if rsi <= 30.0 {
            Self::Oversold
        } else {
            Self::Neutral
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Overbought => "Overbought (Bearish)",
            Self::Oversold => "Oversold (Bullish)",
            Self::Neutral => "Neutral",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VolumeTrend {
    High,
    Normal,
}

/// Price-derived indicators
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechnicalMetrics {
    pub current_price: f64,
    pub price_change: f64,
    pub price_change_pct: f64,
    pub sma_50: f64,
    /// Absent when fewer than 200 closes exist
    pub sma_200: Option<f64>,
    pub cross_signal: Option<CrossSignal>,
    pub rsi: f64,
    pub rsi_signal: RsiSignal,
    pub average_volume: f64,
    pub current_volume: u64,
    pub volume_trend: VolumeTrend,
    pub period_high: f64,
    pub period_low: f64,
}

/// One scored news item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentSample {
    pub title: String,
    pub source: String,
    pub published_at: DateTime<Utc>,
    /// Polarity in [-1, 1]
    pub score: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SentimentLabel {
    Positive,
    Neutral,
    Negative,
}

impl SentimentLabel {
    /// Positive above 0.25, negative below -0.25
    pub fn classify(score: f64) -> Self {
        if score > 0.25 {
            Self::Positive
        } else if score < -0.25 {
            Self::Negative
        } else {
            Self::Neutral
        }
    }
}

/// News sentiment over the window
///
/// `score` is the arithmetic mean of the sample scores. With no samples the
/// score is 0.0 and `no_coverage` is set, which separates "nothing was
/// written" from a computed neutral mean.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentMetrics {
    pub score: f64,
    pub label: SentimentLabel,
    pub sample_count: usize,
    pub no_coverage: bool,
    pub samples: Vec<SentimentSample>,
}

/// Analyst consensus
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalystMetrics {
    pub target_mean_price: Option<f64>,
    pub target_high_price: Option<f64>,
    pub target_low_price: Option<f64>,
    pub analyst_count: Option<u32>,
    pub recommendation_key: Option<String>,
    /// Human readable recommendation
    pub recommendation: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VolatilityLevel {
    Low,
    Moderate,
    High,
}

impl VolatilityLevel {
    /// Below 0.20 low, below 0.35 moderate
    pub fn classify(annualized: f64) -> Self {
        if annualized < 0.20 {
            Self::Low
        } else if annualized < 0.35 {
            Self::Moderate
        } else {
            Self::High
        }
    }
}

/// Sharpe ratio, undefined when returns have zero spread
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum SharpeRatio {
    Value(f64),
    Undefined,
}

impl fmt::Display for SharpeRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(v) => write!(f, "{v:.2}"),
            Self::Undefined => f.write_str("undefined (zero volatility)"),
        }
    }
}

/// Where a beta figure came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BetaSource {
    /// Regressed against the benchmark index over the window
    Benchmark,
    /// Published by the market data source
    Reported,
}

/// Return-distribution risk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskMetrics {
    pub volatility: f64,
    pub volatility_level: VolatilityLevel,
    /// Absent when neither the benchmark series nor the data source supports it
    pub beta: Option<f64>,
    pub beta_source: Option<BetaSource>,
    pub sharpe_ratio: SharpeRatio,
    pub var_95: f64,
    pub max_drawdown: f64,
}

/// Output of a single metric provider
#[derive(Debug, Clone, PartialEq)]
pub enum MetricSection {
    Fundamental(FundamentalMetrics),
    Technical(TechnicalMetrics),
    Sentiment(SentimentMetrics),
    Analyst(AnalystMetrics),
    Risk(RiskMetrics),
}

impl MetricSection {
    pub fn category(&self) -> MetricCategory {
        match self {
            Self::Fundamental(_) => MetricCategory::Fundamental,
            Self::Technical(_) => MetricCategory::Technical,
            Self::Sentiment(_) => MetricCategory::Sentiment,
            Self::Analyst(_) => MetricCategory::Analyst,
            Self::Risk(_) => MetricCategory::Risk,
        }
    }
}

/// All metrics gathered for one ticker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRecord {
    pub symbol: String,
    pub company_name: Option<String>,
    pub fundamental: Option<FundamentalMetrics>,
    pub technical: Option<TechnicalMetrics>,
    pub sentiment: Option<SentimentMetrics>,
    pub analyst: Option<AnalystMetrics>,
    pub risk: Option<RiskMetrics>,
}

impl MetricRecord {
    /// Record with every category absent
    pub fn empty(ticker: &TickerRequest) -> Self {
        Self {
            symbol: ticker.symbol().to_string(),
            company_name: None,
            fundamental: None,
            technical: None,
            sentiment: None,
            analyst: None,
            risk: None,
        }
    }

    /// Store a section in its category slot
    pub fn insert(&mut self, section: MetricSection) {
        match section {
            MetricSection::Fundamental(m) => {
                if self.company_name.is_none() {
                    self.company_name.clone_from(&m.company_name);
                }
                self.fundamental = Some(m);
            }
            MetricSection::Technical(m) => self.technical = Some(m),
            MetricSection::Sentiment(m) => self.sentiment = Some(m),
            MetricSection::Analyst(m) => self.analyst = Some(m),
            MetricSection::Risk(m) => self.risk = Some(m),
        }
    }

    pub fn is_present(&self, category: MetricCategory) -> bool {
        match category {
            MetricCategory::Fundamental => self.fundamental.is_some(),
            MetricCategory::Technical => self.technical.is_some(),
            MetricCategory::Sentiment => self.sentiment.is_some(),
            MetricCategory::Analyst => self.analyst.is_some(),
            MetricCategory::Risk => self.risk.is_some(),
        }
    }

    /// Absent categories in record order
    pub fn absent_categories(&self) -> Vec<MetricCategory> {
        MetricCategory::ALL
            .into_iter()
            .filter(|c| !self.is_present(*c))
            .collect()
    }

    /// Deterministic JSON form
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// A provider failure recorded during aggregation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryFailure {
    pub category: MetricCategory,
    pub reason: String,
}

/// Merged provider output for one ticker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregationResult {
    pub record: MetricRecord,
    /// Failed categories in record order
    pub failures: Vec<CategoryFailure>,
}

impl AggregationResult {
    pub fn failure_reason(&self, category: MetricCategory) -> Option<&str> {
        self.failures
            .iter()
            .find(|f| f.category == category)
            .map(|f| f.reason.as_str())
    }
}
