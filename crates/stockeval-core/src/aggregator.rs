//! Runs the metric providers for one ticker and merges their sections

use crate::error::{Result, StockError};
use crate::metrics::MetricProvider;
use crate::record::{
    AggregationResult, CategoryFailure, LookbackWindow, MetricCategory, MetricRecord,
    TickerRequest,
};
use crate::retry::RetryPolicy;
use crate::source::MarketDataSource;
use futures::future::join_all;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Per-ticker data gathering
///
/// Providers run concurrently. A failing provider leaves its category absent
/// and is listed in `failures`; only an unresolvable ticker fails the whole
/// aggregation.
pub struct DataAggregator {
    market: Arc<dyn MarketDataSource>,
    providers: Vec<Arc<dyn MetricProvider>>,
    retry: RetryPolicy,
    window_days: u32,
}

impl DataAggregator {
    pub fn new(
        market: Arc<dyn MarketDataSource>,
        providers: Vec<Arc<dyn MetricProvider>>,
        retry: RetryPolicy,
        window_days: u32,
    ) -> Self {
        Self {
            market,
            providers,
            retry,
            window_days,
        }
    }

    /// Aggregate over a window ending now
    pub async fn aggregate(&self, ticker: &TickerRequest) -> Result<AggregationResult> {
        self.aggregate_window(ticker, &LookbackWindow::trailing(self.window_days))
            .await
    }

    /// Aggregate over an explicit window
    #[instrument(skip(self, window), fields(symbol = %ticker))]
    pub async fn aggregate_window(
        &self,
        ticker: &TickerRequest,
        window: &LookbackWindow,
    ) -> Result<AggregationResult> {
        let symbol = ticker.symbol();

        match self
            .retry
            .execute("resolve", || self.market.resolve(symbol))
            .await
        {
            Ok(_) => {}
            Err(StockError::InvalidTicker(s)) => return Err(StockError::InvalidTicker(s)),
            Err(e) => warn!("Could not resolve {}, continuing: {}", symbol, e),
        }

        let results = join_all(self.providers.iter().map(|provider| async move {
            (provider.category(), provider.compute(ticker, window).await)
        }))
        .await;

        let mut record = MetricRecord::empty(ticker);
        let mut failures = Vec::new();

        for (category, result) in results {
            match result {
                Ok(section) if section.category() == category => record.insert(section),
                Ok(section) => {
                    warn!(
                        "Provider for {} returned a {} section; ignoring",
                        category,
                        section.category()
                    );
                    failures.push(CategoryFailure {
                        category,
                        reason: "provider returned the wrong category".to_string(),
                    });
                }
                Err(e) => {
                    warn!("{} metrics unavailable for {}: {}", category, symbol, e);
                    failures.push(CategoryFailure {
                        category,
                        reason: e.to_string(),
                    });
                }
            }
        }

        failures.sort_by_key(|f| f.category);

        let absent = record.absent_categories().len();
        info!(
            "Aggregated {}: {} categories present, {} absent",
            symbol,
            MetricCategory::ALL.len() - absent,
            absent
        );

        Ok(AggregationResult { record, failures })
    }
}
