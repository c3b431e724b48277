//! Configuration for a portfolio evaluation run

use crate::error::{Result, StockError};
use crate::retry::RetryPolicy;
use std::time::Duration;

pub const OPENAI_API_KEY: &str = "OPENAI_API_KEY";
pub const OPENAI_API_BASE: &str = "OPENAI_API_BASE";
pub const OPENAI_MODEL: &str = "OPENAI_MODEL";
pub const NEWS_API_KEY: &str = "NEWS_API_KEY";
pub const BENCHMARK: &str = "STOCKEVAL_BENCHMARK";

const DEFAULT_MODEL: &str = "gpt-4-turbo-preview";
const DEFAULT_BENCHMARK: &str = "^NSEI";

/// API credentials, loaded once at startup
#[derive(Clone)]
pub struct Credentials {
    pub openai_api_key: String,
    pub news_api_key: String,
}

impl Credentials {
    /// Read both keys from the environment
    ///
    /// Fails with `CredentialMissing` naming the first unset or blank variable.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(env_var)
    }

    /// Read both keys through `lookup`
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        Ok(Self {
            openai_api_key: required_var(&lookup, OPENAI_API_KEY)?,
            news_api_key: required_var(&lookup, NEWS_API_KEY)?,
        })
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("openai_api_key", &"<redacted>")
            .field("news_api_key", &"<redacted>")
            .finish()
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

fn required_var(lookup: impl Fn(&str) -> Option<String>, name: &str) -> Result<String> {
    optional_var(lookup, name).ok_or_else(|| StockError::CredentialMissing(name.to_string()))
}

fn optional_var(lookup: impl Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    lookup(name).filter(|v| !v.trim().is_empty())
}

/// Immutable settings for one orchestrator run
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisConfig {
    /// Chat model identifier
    pub model: String,

    /// OpenAI-compatible API base URL, `None` for the default endpoint
    pub api_base: Option<String>,

    /// Sampling temperature for the verdict call
    pub temperature: f32,

    /// Completion token limit for the verdict call
    pub max_tokens: usize,

    /// Index used for beta
    pub benchmark_symbol: String,

    /// Price history lookback in calendar days
    pub window_days: u32,

    /// News lookback in calendar days
    pub news_window_days: u32,

    /// Articles requested per ticker
    pub news_limit: usize,

    /// Annual risk-free rate used for Sharpe
    pub risk_free_rate: f64,

    /// Tickers evaluated at once
    pub max_concurrent_tickers: usize,

    /// Retry and timeout for data fetches
    pub fetch_retry: RetryPolicy,

    /// Retry and timeout for the model call
    pub model_retry: RetryPolicy,

    /// Outbound news requests per minute
    pub news_rate_limit: u32,

    /// Lifetime of cached market data
    pub cache_ttl: Duration,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            api_base: None,
            temperature: 0.3,
            max_tokens: 2000,
            benchmark_symbol: DEFAULT_BENCHMARK.to_string(),
            window_days: 365,
            news_window_days: 30,
            news_limit: 10,
            risk_free_rate: 0.02,
            max_concurrent_tickers: 3,
            fetch_retry: RetryPolicy::default(),
            model_retry: RetryPolicy::default().with_call_timeout(Duration::from_secs(120)),
            news_rate_limit: 60,
            cache_ttl: Duration::from_secs(600),
        }
    }
}

impl AnalysisConfig {
    /// Create a new configuration builder
    pub fn builder() -> AnalysisConfigBuilder {
        AnalysisConfigBuilder::default()
    }

    /// Defaults overlaid with `OPENAI_MODEL`, `OPENAI_API_BASE` and
    /// `STOCKEVAL_BENCHMARK`
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(env_var)
    }

    /// Defaults overlaid with the variables `lookup` knows about
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut builder = Self::builder();
        if let Some(model) = optional_var(&lookup, OPENAI_MODEL) {
            builder = builder.model(model);
        }
        if let Some(base) = optional_var(&lookup, OPENAI_API_BASE) {
            builder = builder.api_base(base);
        }
        if let Some(benchmark) = optional_var(&lookup, BENCHMARK) {
            builder = builder.benchmark_symbol(benchmark);
        }
        builder.build()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.model.trim().is_empty() {
            return Err(StockError::Config("model must not be empty".to_string()));
        }

        if self.benchmark_symbol.trim().is_empty() {
            return Err(StockError::Config(
                "benchmark_symbol must not be empty".to_string(),
            ));
        }

        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(StockError::Config(
                "temperature must be between 0.0 and 2.0".to_string(),
            ));
        }

        if self.max_concurrent_tickers == 0 {
            return Err(StockError::Config(
                "max_concurrent_tickers must be greater than 0".to_string(),
            ));
        }

        if self.window_days == 0 || self.news_window_days == 0 {
            return Err(StockError::Config(
                "lookback windows must be at least one day".to_string(),
            ));
        }

        if self.news_limit == 0 || self.news_rate_limit == 0 {
            return Err(StockError::Config(
                "news_limit and news_rate_limit must be greater than 0".to_string(),
            ));
        }

        if self.fetch_retry.max_attempts == 0 || self.model_retry.max_attempts == 0 {
            return Err(StockError::Config(
                "retry policies need at least one attempt".to_string(),
            ));
        }

        Ok(())
    }
}

/// Builder for AnalysisConfig
#[derive(Debug, Default)]
pub struct AnalysisConfigBuilder {
    model: Option<String>,
    api_base: Option<String>,
    temperature: Option<f32>,
    max_tokens: Option<usize>,
    benchmark_symbol: Option<String>,
    window_days: Option<u32>,
    news_window_days: Option<u32>,
    news_limit: Option<usize>,
    risk_free_rate: Option<f64>,
    max_concurrent_tickers: Option<usize>,
    fetch_retry: Option<RetryPolicy>,
    model_retry: Option<RetryPolicy>,
    news_rate_limit: Option<u32>,
    cache_ttl: Option<Duration>,
}

impl AnalysisConfigBuilder {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = Some(api_base.into());
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn benchmark_symbol(mut self, symbol: impl Into<String>) -> Self {
        self.benchmark_symbol = Some(symbol.into());
        self
    }

    pub fn window_days(mut self, days: u32) -> Self {
        self.window_days = Some(days);
        self
    }

    pub fn news_window_days(mut self, days: u32) -> Self {
        self.news_window_days = Some(days);
        self
    }

    pub fn news_limit(mut self, limit: usize) -> Self {
        self.news_limit = Some(limit);
        self
    }

    pub fn risk_free_rate(mut self, rate: f64) -> Self {
        self.risk_free_rate = Some(rate);
        self
    }

    pub fn max_concurrent_tickers(mut self, n: usize) -> Self {
        self.max_concurrent_tickers = Some(n);
        self
    }

    pub fn fetch_retry(mut self, policy: RetryPolicy) -> Self {
        self.fetch_retry = Some(policy);
        self
    }

    pub fn model_retry(mut self, policy: RetryPolicy) -> Self {
        self.model_retry = Some(policy);
        self
    }

    pub fn news_rate_limit(mut self, per_minute: u32) -> Self {
        self.news_rate_limit = Some(per_minute);
        self
    }

    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = Some(ttl);
        self
    }

    /// Build and validate the configuration
    pub fn build(self) -> Result<AnalysisConfig> {
        let defaults = AnalysisConfig::default();

        let config = AnalysisConfig {
            model: self.model.unwrap_or(defaults.model),
            api_base: self.api_base.or(defaults.api_base),
            temperature: self.temperature.unwrap_or(defaults.temperature),
            max_tokens: self.max_tokens.unwrap_or(defaults.max_tokens),
            benchmark_symbol: self.benchmark_symbol.unwrap_or(defaults.benchmark_symbol),
            window_days: self.window_days.unwrap_or(defaults.window_days),
            news_window_days: self.news_window_days.unwrap_or(defaults.news_window_days),
            news_limit: self.news_limit.unwrap_or(defaults.news_limit),
            risk_free_rate: self.risk_free_rate.unwrap_or(defaults.risk_free_rate),
            max_concurrent_tickers: self
                .max_concurrent_tickers
                .unwrap_or(defaults.max_concurrent_tickers),
            fetch_retry: self.fetch_retry.unwrap_or(defaults.fetch_retry),
            model_retry: self.model_retry.unwrap_or(defaults.model_retry),
            news_rate_limit: self.news_rate_limit.unwrap_or(defaults.news_rate_limit),
            cache_ttl: self.cache_ttl.unwrap_or(defaults.cache_ttl),
        };

        config.validate()?;
        Ok(config)
    }
}
