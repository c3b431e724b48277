//! NewsAPI client for company headlines

use crate::error::{Result, StockError};
use crate::record::LookbackWindow;
use crate::source::{NewsArticle, NewsQuery, NewsSource};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use reqwest::Client;
use serde::Deserialize;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

type SharedRateLimiter = Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>;

const NEWS_API_URL: &str = "https://newsapi.org/v2/everything";
const REMOVED_MARKER: &str = "[Removed]";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EverythingResponse {
    #[serde(default)]
    articles: Vec<RawArticle>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawArticle {
    #[serde(default)]
    source: Option<RawSource>,
    title: Option<String>,
    description: Option<String>,
    url: Option<String>,
    published_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct RawSource {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    code: Option<String>,
    message: Option<String>,
}

/// NewsAPI `everything` client
///
/// The rate limiter is shared by clones, so one client handed to every
/// ticker keeps the whole run inside the quota.
#[derive(Clone)]
pub struct NewsApiClient {
    client: Client,
    api_key: String,
    base_url: String,
    rate_limiter: SharedRateLimiter,
}

impl NewsApiClient {
    /// Create a client allowing `rate_limit` requests per minute
    pub fn new(api_key: impl Into<String>, rate_limit: u32, timeout: Duration) -> Result<Self> {
        let per_minute = NonZeroU32::new(rate_limit).unwrap_or(NonZeroU32::MIN);
        let rate_limiter = Arc::new(RateLimiter::direct(Quota::per_minute(per_minute)));

        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: NEWS_API_URL.to_string(),
            rate_limiter,
        })
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }
}

#[async_trait]
impl NewsSource for NewsApiClient {
    #[instrument(skip(self, window), fields(symbol = %query.symbol))]
    async fn articles(
        &self,
        query: &NewsQuery,
        window: &LookbackWindow,
    ) -> Result<Vec<NewsArticle>> {
        self.rate_limiter.until_ready().await;

        let page_size = query.limit.to_string();
        let from = window.start().to_rfc3339_opts(SecondsFormat::Secs, true);
        let to = window.end.to_rfc3339_opts(SecondsFormat::Secs, true);

        let response = self
            .client
            .get(&self.base_url)
            .header("X-Api-Key", &self.api_key)
            .query(&[
                ("q", query.search_terms().as_str()),
                ("from", from.as_str()),
                ("to", to.as_str()),
                ("sortBy", "publishedAt"),
                ("language", "en"),
                ("pageSize", page_size.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(map_error_response(status.as_u16(), &body));
        }

        let parsed: EverythingResponse = response.json().await?;
        let articles = convert_articles(parsed.articles, query.limit);

        debug!("NewsAPI returned {} usable articles", articles.len());
        Ok(articles)
    }
}

fn map_error_response(status: u16, body: &str) -> StockError {
    let parsed: Option<ErrorBody> = serde_json::from_str(body).ok();
    let code = parsed.as_ref().and_then(|b| b.code.clone()).unwrap_or_default();
    let message = parsed
        .and_then(|b| b.message)
        .unwrap_or_else(|| body.to_string());

    if status == 429 || code == "rateLimited" {
        StockError::RateLimitExceeded {
            provider: "NewsAPI".to_string(),
        }
    } else {
        StockError::api("NewsAPI", Some(status), format!("{code}: {message}"))
    }
}

/// Drop removed or undated articles and cap at `limit`
fn convert_articles(raw: Vec<RawArticle>, limit: usize) -> Vec<NewsArticle> {
    raw.into_iter()
        .filter_map(|a| {
            let title = a.title.filter(|t| !t.trim().is_empty() && t != REMOVED_MARKER)?;
            let published_at = a.published_at?;
            Some(NewsArticle {
                title,
                description: a.description,
                source: a
                    .source
                    .and_then(|s| s.name)
                    .unwrap_or_else(|| "Unknown".to_string()),
                url: a.url,
                published_at,
                score: None,
            })
        })
        .take(limit)
        .collect()
}
