//! Run-scoped caching so sibling providers share market data fetches

use crate::error::Result;
use crate::record::LookbackWindow;
use crate::source::{MarketDataSource, PriceBar, QuoteSummary, ResolvedTicker};
use async_trait::async_trait;
use cached::{Cached, TimedCache};
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OnceCell, RwLock};

/// Cache key for market data requests
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// Stock symbol
    pub symbol: String,
    /// Operation the value came from
    pub endpoint: &'static str,
    /// Extra discriminator (window end date and length for histories)
    pub params: String,
}

impl CacheKey {
    pub fn new(symbol: impl Into<String>, endpoint: &'static str, params: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            endpoint,
            params: params.into(),
        }
    }

    fn history(symbol: &str, window: &LookbackWindow) -> Self {
        Self::new(
            symbol,
            "price_history",
            format!("{}:{}", window.end.format("%Y-%m-%d"), window.days),
        )
    }
}

/// Thread-safe timed cache
///
/// Each key holds a cell that is filled at most once per lifespan, so
/// concurrent callers for the same key wait on a single fetch.
pub struct StockCache<V> {
    cache: Arc<RwLock<TimedCache<CacheKey, Arc<OnceCell<V>>>>>,
}

impl<V: Clone> StockCache<V> {
    /// Create a new cache with specified TTL
    pub fn new(ttl: Duration) -> Self {
        Self {
            cache: Arc::new(RwLock::new(TimedCache::with_lifespan(ttl))),
        }
    }

    /// Get a value from the cache
    pub async fn get(&self, key: &CacheKey) -> Option<V> {
        let mut cache = self.cache.write().await;
        cache.cache_get(key).and_then(|cell| cell.get().cloned())
    }

    /// Insert a value into the cache
    pub async fn insert(&self, key: CacheKey, value: V) {
        let mut cache = self.cache.write().await;
        let _ = cache.cache_set(key, Arc::new(OnceCell::new_with(Some(value))));
    }

    /// Get or fetch a value using the provided fetcher function
    ///
    /// Only one fetch per key runs at a time. Errors are not cached; the
    /// next waiter fetches again.
    pub async fn get_or_fetch<F, Fut>(&self, key: CacheKey, fetcher: F) -> Result<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V>>,
    {
        let cell = {
            let mut cache = self.cache.write().await;
            Arc::clone(cache.cache_get_or_set_with(key.clone(), || Arc::new(OnceCell::new())))
        };

        if let Some(value) = cell.get() {
            tracing::debug!("Cache hit for {} {}", key.endpoint, key.symbol);
            return Ok(value.clone());
        }

        let value = cell
            .get_or_try_init(move || async move {
                tracing::debug!("Cache miss for {} {}", key.endpoint, key.symbol);
                fetcher().await
            })
            .await?;

        Ok(value.clone())
    }

    /// Clear all cached entries
    pub async fn clear(&self) {
        let mut cache = self.cache.write().await;
        cache.cache_clear();
    }

    /// Get the number of cached entries
    pub async fn len(&self) -> usize {
        let cache = self.cache.read().await;
        cache.cache_size()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl<V> Clone for StockCache<V> {
    fn clone(&self) -> Self {
        Self {
            cache: Arc::clone(&self.cache),
        }
    }
}

/// Market source decorator that memoizes histories and summaries
///
/// Concurrent requests for the same key share one inner fetch.
pub struct CachingMarketSource {
    inner: Arc<dyn MarketDataSource>,
    resolved: StockCache<ResolvedTicker>,
    history: StockCache<Arc<Vec<PriceBar>>>,
    summaries: StockCache<QuoteSummary>,
}

impl CachingMarketSource {
    pub fn new(inner: Arc<dyn MarketDataSource>, ttl: Duration) -> Self {
        Self {
            inner,
            resolved: StockCache::new(ttl),
            history: StockCache::new(ttl),
            summaries: StockCache::new(ttl),
        }
    }

    pub async fn clear_all(&self) {
        self.resolved.clear().await;
        self.history.clear().await;
        self.summaries.clear().await;
    }
}

#[async_trait]
impl MarketDataSource for CachingMarketSource {
    async fn resolve(&self, symbol: &str) -> Result<ResolvedTicker> {
        self.resolved
            .get_or_fetch(CacheKey::new(symbol, "resolve", ""), || {
                self.inner.resolve(symbol)
            })
            .await
    }

    async fn price_history(&self, symbol: &str, window: &LookbackWindow) -> Result<Vec<PriceBar>> {
        let bars = self
            .history
            .get_or_fetch(CacheKey::history(symbol, window), || async {
                self.inner.price_history(symbol, window).await.map(Arc::new)
            })
            .await?;
        Ok(bars.as_ref().clone())
    }

    async fn quote_summary(&self, symbol: &str) -> Result<QuoteSummary> {
        self.summaries
            .get_or_fetch(CacheKey::new(symbol, "quote_summary", ""), || {
                self.inner.quote_summary(symbol)
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StockError;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingSource {
        history_calls: AtomicUsize,
        summary_calls: AtomicUsize,
    }

    #[async_trait]
    impl MarketDataSource for CountingSource {
        async fn resolve(&self, symbol: &str) -> Result<ResolvedTicker> {
            Ok(ResolvedTicker {
                symbol: symbol.to_string(),
                name: None,
                exchange: None,
            })
        }

        async fn price_history(&self, _: &str, _: &LookbackWindow) -> Result<Vec<PriceBar>> {
            self.history_calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok(vec![PriceBar {
                timestamp: Utc::now(),
                open: 1.0,
                high: 1.0,
                low: 1.0,
                close: 1.0,
                volume: 10,
            }])
        }

        async fn quote_summary(&self, symbol: &str) -> Result<QuoteSummary> {
            self.summary_calls.fetch_add(1, Ordering::SeqCst);
            if symbol == "FAIL" {
                return Err(StockError::api("Yahoo", Some(500), "boom"));
            }
            Ok(QuoteSummary {
                trailing_pe: Some(20.0),
                ..Default::default()
            })
        }
    }

    #[tokio::test]
    async fn test_cache_insert_and_get() {
        let cache = StockCache::new(Duration::from_secs(60));
        let key = CacheKey::new("AAPL", "quote", "");

        cache.insert(key.clone(), 150.0_f64).await;

        assert_eq!(cache.get(&key).await, Some(150.0));
        assert_eq!(cache.len().await, 1);

        cache.clear().await;
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_history_shared_between_callers() {
        let inner = Arc::new(CountingSource::default());
        let source = CachingMarketSource::new(inner.clone(), Duration::from_secs(60));
        let window = LookbackWindow::trailing(365);

        let first = source.price_history("AAPL", &window).await.unwrap();
        let second = source.price_history("AAPL", &window).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(inner.history_calls.load(Ordering::SeqCst), 1);

        // A different window is a different key
        source
            .price_history("AAPL", &window.narrowed(30))
            .await
            .unwrap();
        assert_eq!(inner.history_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_concurrent_misses_share_one_fetch() {
        let inner = Arc::new(CountingSource::default());
        let source = CachingMarketSource::new(inner.clone(), Duration::from_secs(60));
        let window = LookbackWindow::trailing(365);

        let (a, b, c) = tokio::join!(
            source.price_history("AAPL", &window),
            source.price_history("AAPL", &window),
            source.price_history("AAPL", &window)
        );

        assert_eq!(a.unwrap(), b.unwrap());
        assert!(c.is_ok());
        assert_eq!(inner.history_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_errors_are_not_cached() {
        let inner = Arc::new(CountingSource::default());
        let source = CachingMarketSource::new(inner.clone(), Duration::from_secs(60));

        assert!(source.quote_summary("FAIL").await.is_err());
        assert!(source.quote_summary("FAIL").await.is_err());
        assert_eq!(inner.summary_calls.load(Ordering::SeqCst), 2);

        source.quote_summary("AAPL").await.unwrap();
        source.quote_summary("AAPL").await.unwrap();
        assert_eq!(inner.summary_calls.load(Ordering::SeqCst), 3);

        source.clear_all().await;
        source.quote_summary("AAPL").await.unwrap();
        assert_eq!(inner.summary_calls.load(Ordering::SeqCst), 4);
    }
}
