//! Error types for stock evaluation operations

use crate::record::MetricCategory;
use std::time::Duration;
use stockeval_llm::LLMError;
use thiserror::Error;

/// Stock evaluation specific errors
#[derive(Debug, Error)]
pub enum StockError {
    /// A metric category could not be produced for a ticker
    #[error("{category} data unavailable for {symbol}: {reason}")]
    DataUnavailable {
        category: MetricCategory,
        symbol: String,
        reason: String,
    },

    /// Ticker identity could not be resolved
    #[error("Invalid ticker: {0}")]
    InvalidTicker(String),

    /// Model output did not match the verdict schema
    #[error("Malformed verdict: {0}")]
    MalformedVerdict(String),

    /// No valid verdict after the stricter re-prompt
    #[error("Verdict unavailable for {symbol}: {reason}")]
    VerdictUnavailable { symbol: String, reason: String },

    /// A required credential is not configured
    #[error("Missing credential: {0} is not set")]
    CredentialMissing(String),

    /// An external call exceeded its timeout
    #[error("{operation} timed out after {timeout:?}")]
    ProviderTimeout { operation: String, timeout: Duration },

    /// Upstream API returned an error response
    #[error("{service} API error: {message}")]
    Api {
        service: &'static str,
        status: Option<u16>,
        message: String,
    },

    /// Network or HTTP error
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Rate limit exceeded for API
    #[error("Rate limit exceeded for {provider}")]
    RateLimitExceeded { provider: String },

    /// Generative model error
    #[error("LLM error: {0}")]
    Llm(#[from] LLMError),

    /// Prompt template rendering error
    #[error("Template error: {0}")]
    Template(#[from] minijinja::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl StockError {
    /// Wrap any failure as `DataUnavailable` for a category
    pub fn unavailable(
        category: MetricCategory,
        symbol: impl Into<String>,
        reason: impl std::fmt::Display,
    ) -> Self {
        Self::DataUnavailable {
            category,
            symbol: symbol.into(),
            reason: reason.to_string(),
        }
    }

    /// Build an `Api` error
    pub fn api(service: &'static str, status: Option<u16>, message: impl Into<String>) -> Self {
        Self::Api {
            service,
            status,
            message: message.into(),
        }
    }

    /// Whether a retry may succeed
    ///
    /// Network failures, timeouts, rate limits and HTTP 5xx are retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) | Self::ProviderTimeout { .. } | Self::RateLimitExceeded { .. } => {
                true
            }
            Self::Api { status, .. } => status.is_some_and(|s| s >= 500),
            Self::Llm(e) => e.is_transient(),
            _ => false,
        }
    }
}

/// Result type alias for stock operations
pub type Result<T> = std::result::Result<T, StockError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StockError::InvalidTicker("INVALID".to_string());
        assert_eq!(err.to_string(), "Invalid ticker: INVALID");

        let err = StockError::unavailable(MetricCategory::Sentiment, "AAPL", "no response");
        assert_eq!(
            err.to_string(),
            "sentiment data unavailable for AAPL: no response"
        );

        let err = StockError::CredentialMissing("NEWS_API_KEY".to_string());
        assert_eq!(err.to_string(), "Missing credential: NEWS_API_KEY is not set");
    }

    #[test]
    fn test_retryable_classification() {
        assert!(StockError::api("Yahoo", Some(503), "unavailable").is_retryable());
        assert!(!StockError::api("Yahoo", Some(404), "missing").is_retryable());
        assert!(!StockError::api("Yahoo", None, "bad body").is_retryable());
        assert!(
            StockError::ProviderTimeout {
                operation: "price_history".to_string(),
                timeout: Duration::from_secs(1),
            }
            .is_retryable()
        );
        assert!(
            StockError::RateLimitExceeded {
                provider: "NewsAPI".to_string()
            }
            .is_retryable()
        );
        assert!(!StockError::InvalidTicker("X".to_string()).is_retryable());
        assert!(!StockError::MalformedVerdict("x".to_string()).is_retryable());
        assert!(StockError::Llm(LLMError::Timeout).is_retryable());
        assert!(!StockError::Llm(LLMError::AuthenticationFailed).is_retryable());
    }
}
