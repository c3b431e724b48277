//! Portfolio pipeline: aggregate then synthesize, per ticker

use crate::aggregator::DataAggregator;
use crate::api::{NewsApiClient, YahooFinanceClient};
use crate::cache::CachingMarketSource;
use crate::config::{AnalysisConfig, Credentials};
use crate::error::Result;
use crate::metrics::{MarketAccess, default_providers};
use crate::record::TickerRequest;
use crate::report::{PortfolioReport, TickerEntry};
use crate::source::{MarketDataSource, NewsSource};
use crate::synthesis::{LlmVerdictModel, ReportSynthesizer, VerdictModel};
use chrono::Local;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use stockeval_llm::providers::{OpenAIConfig, OpenAIProvider};
use tracing::{Instrument, info, info_span, instrument, warn};
use uuid::Uuid;

/// HTTP timeout for the market and news clients
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Runs the evaluation pipeline over a list of tickers
///
/// Tickers run concurrently up to `max_concurrent_tickers`; entries come back
/// in input order. A failure for one ticker becomes a skipped entry and never
/// stops the batch.
pub struct PortfolioOrchestrator {
    config: AnalysisConfig,
    aggregator: DataAggregator,
    synthesizer: ReportSynthesizer,
}

impl PortfolioOrchestrator {
    pub fn new(
        config: AnalysisConfig,
        aggregator: DataAggregator,
        synthesizer: ReportSynthesizer,
    ) -> Self {
        Self {
            config,
            aggregator,
            synthesizer,
        }
    }

    /// Wire the standard providers over the given sources
    pub fn from_sources(
        config: AnalysisConfig,
        market: Arc<dyn MarketDataSource>,
        news: Arc<dyn NewsSource>,
        model: Arc<dyn VerdictModel>,
    ) -> Result<Self> {
        config.validate()?;

        let access = MarketAccess::new(Arc::clone(&market), config.fetch_retry.clone());
        let providers = default_providers(&access, news, &config);
        let aggregator = DataAggregator::new(
            market,
            providers,
            config.fetch_retry.clone(),
            config.window_days,
        );
        let synthesizer = ReportSynthesizer::new(model, config.model_retry.clone())?;

        Ok(Self::new(config, aggregator, synthesizer))
    }

    /// Yahoo Finance behind a run cache, NewsAPI and an OpenAI-compatible model
    pub fn from_credentials(config: AnalysisConfig, credentials: &Credentials) -> Result<Self> {
        let yahoo = YahooFinanceClient::new(HTTP_TIMEOUT)?;
        let market: Arc<dyn MarketDataSource> =
            Arc::new(CachingMarketSource::new(Arc::new(yahoo), config.cache_ttl));

        let news: Arc<dyn NewsSource> = Arc::new(NewsApiClient::new(
            &credentials.news_api_key,
            config.news_rate_limit,
            HTTP_TIMEOUT,
        )?);

        let mut openai = OpenAIConfig::new(&credentials.openai_api_key)
            .with_timeout(config.model_retry.call_timeout.map_or(120, |t| t.as_secs()));
        if let Some(base) = &config.api_base {
            openai = openai.with_api_base(base);
        }
        let provider = Arc::new(OpenAIProvider::with_config(openai)?);
        let model: Arc<dyn VerdictModel> = Arc::new(LlmVerdictModel::new(provider, &config));

        Self::from_sources(config, market, news, model)
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Evaluate every ticker and assemble the report
    pub async fn run(&self, tickers: &[String]) -> PortfolioReport {
        let run_id = Uuid::new_v4();
        let span = info_span!("portfolio_run", %run_id, tickers = tickers.len());

        async {
            info!("Evaluating {} tickers", tickers.len());

            let entries: Vec<TickerEntry> = stream::iter(tickers.iter().map(|t| self.evaluate(t)))
                .buffered(self.config.max_concurrent_tickers.max(1))
                .collect()
                .await;

            let report = PortfolioReport::new(run_id, Local::now(), entries);
            info!(
                "Run complete: {} evaluated, {} skipped",
                report.evaluated(),
                report.skipped()
            );
            report
        }
        .instrument(span)
        .await
    }

    #[instrument(skip(self))]
    async fn evaluate(&self, raw: &str) -> TickerEntry {
        let ticker = match TickerRequest::parse(raw) {
            Ok(ticker) => ticker,
            Err(e) => {
                warn!("Skipping '{}': {}", raw, e);
                return TickerEntry::skipped(raw.trim(), e.to_string());
            }
        };

        let aggregation = match self.aggregator.aggregate(&ticker).await {
            Ok(aggregation) => aggregation,
            Err(e) => {
                warn!("Skipping {}: {}", ticker, e);
                return TickerEntry::skipped(ticker.symbol(), e.to_string());
            }
        };

        match self.synthesizer.synthesize(&aggregation.record).await {
            Ok(verdict) => TickerEntry::evaluated(aggregation, verdict),
            Err(e) => {
                warn!("No verdict for {}: {}", ticker, e);
                TickerEntry::skipped(ticker.symbol(), e.to_string())
            }
        }
    }
}
