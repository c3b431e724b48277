//! Stock portfolio evaluation
//!
//! This crate gathers market data for a list of tickers, derives
//! fundamental, technical, sentiment, analyst and risk metrics, and asks a
//! generative model for a BUY / HOLD / SELL verdict per ticker. It includes:
//!
//! - Market data from Yahoo Finance and news from NewsAPI
//! - Technical indicators (SMA, RSI) and risk statistics (volatility, beta,
//!   Sharpe, VaR, drawdown)
//! - Lexicon-based news sentiment
//! - Verdict synthesis with schema validation and one stricter re-prompt
//! - A Markdown portfolio report
//!
//! # Architecture
//!
//! Each ticker runs through a fixed pipeline:
//! - `DataAggregator`: runs the metric providers concurrently and merges
//!   their sections; a failing provider leaves its category absent
//! - `ReportSynthesizer`: renders the prompt, calls the `VerdictModel` and
//!   validates the reply
//!
//! `PortfolioOrchestrator` runs the pipeline for every ticker with bounded
//! concurrency and assembles a `PortfolioReport` in input order.
//!
//! # Example
//!
//! ```rust,ignore
//! use stockeval_core::{AnalysisConfig, Credentials, PortfolioOrchestrator};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let credentials = Credentials::from_env()?;
//!     let orchestrator =
//!         PortfolioOrchestrator::from_credentials(AnalysisConfig::from_env()?, &credentials)?;
//!
//!     let report = orchestrator
//!         .run(&["TCS.NS".to_string(), "INFY.NS".to_string()])
//!         .await;
//!     println!("{}", report.render_markdown());
//!
//!     Ok(())
//! }
//! ```

pub mod aggregator;
pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod metrics;
pub mod orchestrator;
pub mod record;
pub mod report;
pub mod retry;
pub mod source;
pub mod synthesis;

// Re-export main types
pub use aggregator::DataAggregator;
pub use config::{AnalysisConfig, AnalysisConfigBuilder, Credentials};
pub use error::{Result, StockError};
pub use metrics::{MarketAccess, MetricProvider};
pub use orchestrator::PortfolioOrchestrator;
pub use record::{
    AggregationResult, BetaSource, CategoryFailure, LookbackWindow, MetricCategory,
    MetricRecord, MetricSection, TickerRequest,
};
pub use report::{PortfolioReport, TickerEntry, TickerOutcome};
pub use retry::RetryPolicy;
pub use source::{MarketDataSource, NewsArticle, NewsQuery, NewsSource, PriceBar, QuoteSummary};
pub use synthesis::{Verdict, VerdictModel, VerdictReport};
