//! News sentiment
//!
//! Articles are scored individually, either with the polarity the news source
//! supplies or with a keyword lexicon, and reduced with an arithmetic mean.

use super::indicators::{mean, round_to};
use super::{MarketAccess, MetricProvider};
use crate::error::{Result, StockError};
use crate::record::{
    LookbackWindow, MetricCategory, MetricSection, SentimentLabel, SentimentMetrics,
    SentimentSample, TickerRequest,
};
use crate::retry::RetryPolicy;
use crate::source::{NewsArticle, NewsQuery, NewsSource};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};

const POSITIVE_WORDS: &[&str] = &[
    "beat", "beats", "bullish", "gain", "gains", "growth", "grows", "high", "jump", "jumps",
    "outperform", "profit", "profits", "rally", "rallies", "record", "rise", "rises", "soar",
    "soars", "strong", "surge", "surges", "upgrade", "upgraded", "win", "wins",
];

const NEGATIVE_WORDS: &[&str] = &[
    "bearish", "cut", "cuts", "decline", "declines", "downgrade", "downgraded", "drop", "drops",
    "fall", "falls", "fraud", "lawsuit", "loss", "losses", "miss", "misses", "plunge", "plunges",
    "probe", "slump", "slumps", "tumble", "tumbles", "underperform", "warning", "weak",
];

/// Keyword polarity scorer for financial headlines
#[derive(Debug, Default, Clone, Copy)]
pub struct LexiconScorer;

impl LexiconScorer {
    /// `(positive - negative) / (positive + negative)`, 0.0 when neither appears
    pub fn score(&self, text: &str) -> f64 {
        let lowered = text.to_lowercase();
        let (positive, negative) = lowered
            .split(|c: char| !c.is_ascii_alphabetic())
            .filter(|w| !w.is_empty())
            .fold((0_u32, 0_u32), |(p, n), word| {
                if POSITIVE_WORDS.contains(&word) {
                    (p + 1, n)
                } else if NEGATIVE_WORDS.contains(&word) {
                    (p, n + 1)
                } else {
                    (p, n)
                }
            });

        let total = positive + negative;
        if total == 0 {
            0.0
        } else {
            (f64::from(positive) - f64::from(negative)) / f64::from(total)
        }
    }

    fn score_article(&self, article: &NewsArticle) -> f64 {
        match article.score {
            Some(score) if score.is_finite() => score.clamp(-1.0, 1.0),
            _ => {
                let text = match &article.description {
                    Some(description) => format!("{} {}", article.title, description),
                    None => article.title.clone(),
                };
                self.score(&text)
            }
        }
    }
}

/// Reduce articles to the sentiment section
///
/// Only articles published inside `window` count. With none left the section
/// reports a 0.0 score with `no_coverage` set.
pub fn sentiment_from_articles(
    articles: &[NewsArticle],
    window: &LookbackWindow,
    scorer: &LexiconScorer,
) -> SentimentMetrics {
    let samples: Vec<SentimentSample> = articles
        .iter()
        .filter(|a| window.contains(a.published_at))
        .map(|a| SentimentSample {
            title: a.title.clone(),
            source: a.source.clone(),
            published_at: a.published_at,
            score: scorer.score_article(a),
        })
        .collect();

    let scores: Vec<f64> = samples.iter().map(|s| s.score).collect();
    let score = mean(&scores).map_or(0.0, |m| round_to(m, 3));

    SentimentMetrics {
        score,
        label: SentimentLabel::classify(score),
        sample_count: samples.len(),
        no_coverage: samples.is_empty(),
        samples,
    }
}

pub struct SentimentProvider {
    news: Arc<dyn NewsSource>,
    market: MarketAccess,
    retry: RetryPolicy,
    window_days: u32,
    limit: usize,
    scorer: LexiconScorer,
}

impl SentimentProvider {
    pub fn new(
        news: Arc<dyn NewsSource>,
        market: MarketAccess,
        retry: RetryPolicy,
        window_days: u32,
        limit: usize,
    ) -> Self {
        Self {
            news,
            market,
            retry,
            window_days,
            limit,
            scorer: LexiconScorer,
        }
    }
}

#[async_trait]
impl MetricProvider for SentimentProvider {
    fn category(&self) -> MetricCategory {
        MetricCategory::Sentiment
    }

    async fn compute(
        &self,
        ticker: &TickerRequest,
        window: &LookbackWindow,
    ) -> Result<MetricSection> {
        let symbol = ticker.symbol();

        // Company name only sharpens the query
        let company_name = match self.market.summary(symbol).await {
            Ok(summary) => summary.display_name().map(str::to_string),
            Err(e) => {
                debug!("No company name for {} news query: {}", symbol, e);
                None
            }
        };

        let query = NewsQuery {
            symbol: ticker.base_symbol().to_string(),
            company_name,
            limit: self.limit,
        };
        let news_window = window.narrowed(self.window_days);

        let articles = self
            .retry
            .execute("news", || self.news.articles(&query, &news_window))
            .await
            .map_err(|e| StockError::unavailable(self.category(), symbol, e))?;

        let metrics = sentiment_from_articles(&articles, &news_window, &self.scorer);
        info!(
            "Sentiment for {}: {:.3} over {} articles",
            symbol, metrics.score, metrics.sample_count
        );
        Ok(MetricSection::Sentiment(metrics))
    }
}
