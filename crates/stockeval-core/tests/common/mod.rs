//! Fixed-data sources and a scripted model for pipeline tests

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use stockeval_core::error::{Result, StockError};
use stockeval_core::source::ResolvedTicker;
use stockeval_core::synthesis::{Prompt, RawDecision};
use stockeval_core::{
    AnalysisConfig, LookbackWindow, MarketDataSource, NewsArticle, NewsQuery, NewsSource,
    PriceBar, QuoteSummary, RetryPolicy, VerdictModel,
};

pub const BENCHMARK: &str = "^NSEI";

/// Route pipeline logs to the test harness; `RUST_LOG` narrows them
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

/// Bars ending at `end`, one per day, oldest first
pub fn bars_ending(end: DateTime<Utc>, closes: &[f64]) -> Vec<PriceBar> {
    let count = closes.len() as i64;
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| PriceBar {
            timestamp: end - Duration::days(count - 1 - i as i64),
            open: close,
            high: close * 1.01,
            low: close * 0.99,
            close,
            volume: 10_000,
        })
        .collect()
}

/// 260 gently rising closes with some noise
pub fn steady_closes(start: f64) -> Vec<f64> {
    (0..260)
        .map(|i| start + f64::from(i) * 0.5 + if i % 3 == 0 { 1.5 } else { -0.5 })
        .collect()
}

#[derive(Default)]
pub struct FixedMarket {
    pub bars: HashMap<String, Vec<PriceBar>>,
    pub summaries: HashMap<String, QuoteSummary>,
    pub delays: HashMap<String, std::time::Duration>,
}

impl FixedMarket {
    pub fn with_bars(mut self, symbol: &str, bars: Vec<PriceBar>) -> Self {
        self.bars.insert(symbol.to_string(), bars);
        self
    }

    pub fn with_summary(mut self, symbol: &str, summary: QuoteSummary) -> Self {
        self.summaries.insert(symbol.to_string(), summary);
        self
    }

    pub fn with_delay(mut self, symbol: &str, delay: std::time::Duration) -> Self {
        self.delays.insert(symbol.to_string(), delay);
        self
    }

    fn known(&self, symbol: &str) -> bool {
        self.bars.contains_key(symbol) || self.summaries.contains_key(symbol)
    }
}

#[async_trait]
impl MarketDataSource for FixedMarket {
    async fn resolve(&self, symbol: &str) -> Result<ResolvedTicker> {
        if let Some(delay) = self.delays.get(symbol) {
            tokio::time::sleep(*delay).await;
        }
        if !self.known(symbol) {
            return Err(StockError::InvalidTicker(symbol.to_string()));
        }
        Ok(ResolvedTicker {
            symbol: symbol.to_string(),
            name: self
                .summaries
                .get(symbol)
                .and_then(|s| s.display_name().map(str::to_string)),
            exchange: None,
        })
    }

    async fn price_history(&self, symbol: &str, _: &LookbackWindow) -> Result<Vec<PriceBar>> {
        Ok(self.bars.get(symbol).cloned().unwrap_or_default())
    }

    async fn quote_summary(&self, symbol: &str) -> Result<QuoteSummary> {
        Ok(self.summaries.get(symbol).cloned().unwrap_or_default())
    }
}

/// Counts inner fetches per symbol and holds each one open for `latency`
pub struct CountingMarket {
    inner: FixedMarket,
    latency: std::time::Duration,
    pub history_calls: Mutex<HashMap<String, usize>>,
    pub summary_calls: Mutex<HashMap<String, usize>>,
}

impl CountingMarket {
    pub fn new(inner: FixedMarket, latency: std::time::Duration) -> Self {
        Self {
            inner,
            latency,
            history_calls: Mutex::new(HashMap::new()),
            summary_calls: Mutex::new(HashMap::new()),
        }
    }

    pub fn history_count(&self, symbol: &str) -> usize {
        self.history_calls.lock().unwrap().get(symbol).copied().unwrap_or(0)
    }

    pub fn summary_count(&self, symbol: &str) -> usize {
        self.summary_calls.lock().unwrap().get(symbol).copied().unwrap_or(0)
    }
}

#[async_trait]
impl MarketDataSource for CountingMarket {
    async fn resolve(&self, symbol: &str) -> Result<ResolvedTicker> {
        self.inner.resolve(symbol).await
    }

    async fn price_history(&self, symbol: &str, window: &LookbackWindow) -> Result<Vec<PriceBar>> {
        *self
            .history_calls
            .lock()
            .unwrap()
            .entry(symbol.to_string())
            .or_default() += 1;
        tokio::time::sleep(self.latency).await;
        self.inner.price_history(symbol, window).await
    }

    async fn quote_summary(&self, symbol: &str) -> Result<QuoteSummary> {
        *self
            .summary_calls
            .lock()
            .unwrap()
            .entry(symbol.to_string())
            .or_default() += 1;
        tokio::time::sleep(self.latency).await;
        self.inner.quote_summary(symbol).await
    }
}

pub enum FixedNews {
    Articles(Vec<NewsArticle>),
    Outage,
}

#[async_trait]
impl NewsSource for FixedNews {
    async fn articles(&self, _: &NewsQuery, _: &LookbackWindow) -> Result<Vec<NewsArticle>> {
        match self {
            Self::Articles(articles) => Ok(articles.clone()),
            Self::Outage => Err(StockError::api("NewsAPI", Some(400), "forced failure")),
        }
    }
}

pub fn article(title: &str, published_at: DateTime<Utc>, score: f64) -> NewsArticle {
    NewsArticle {
        title: title.to_string(),
        description: None,
        source: "Wire".to_string(),
        url: None,
        published_at,
        score: Some(score),
    }
}

/// Replies with queued texts, then with the fallback; records every prompt
///
/// Prompts for a symbol listed in `unreachable` fail with a timeout.
pub struct ScriptedModel {
    queue: Mutex<VecDeque<String>>,
    fallback: String,
    unreachable: Vec<String>,
    pub prompts: Mutex<Vec<Prompt>>,
}

impl ScriptedModel {
    pub fn always(reply: &str) -> Self {
        Self::queued(Vec::new(), reply)
    }

    pub fn queued(replies: Vec<&str>, fallback: &str) -> Self {
        Self {
            queue: Mutex::new(replies.into_iter().map(str::to_string).collect()),
            fallback: fallback.to_string(),
            unreachable: Vec::new(),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn unreachable_for(mut self, symbol: &str) -> Self {
        self.unreachable.push(symbol.to_string());
        self
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl VerdictModel for ScriptedModel {
    async fn synthesize(&self, prompt: &Prompt) -> Result<RawDecision> {
        self.prompts.lock().unwrap().push(prompt.clone());
        let stock_line = prompt.user.lines().find(|l| l.contains("evaluating the stock"));
        if let Some(symbol) = self
            .unreachable
            .iter()
            .find(|s| stock_line.is_some_and(|l| l.contains(&format!(": {s}"))))
        {
            return Err(StockError::ProviderTimeout {
                operation: format!("verdict for {symbol}"),
                timeout: std::time::Duration::from_secs(120),
            });
        }
        let reply = self
            .queue
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());
        Ok(RawDecision::new(reply))
    }
}

pub fn verdict_json(verdict: &str) -> String {
    format!(
        r#"{{"verdict":"{verdict}","executive_summary":"Summary.","valuation":"Valuation.","technical":"Technical.","sentiment":"Sentiment.","risk":"Risk.","catalysts":["Order book"],"recommendation":"Recommendation."}}"#
    )
}

pub fn test_config(concurrency: usize) -> AnalysisConfig {
    AnalysisConfig::builder()
        .benchmark_symbol(BENCHMARK)
        .max_concurrent_tickers(concurrency)
        .fetch_retry(RetryPolicy::no_retry())
        .model_retry(RetryPolicy::no_retry())
        .build()
        .unwrap()
}
