//! End-to-end pipeline behaviour over fixed-data sources

mod common;

use chrono::{Duration, TimeZone, Utc};
use common::*;
use std::sync::Arc;
use std::time::Duration as StdDuration;
use stockeval_core::cache::CachingMarketSource;
use stockeval_core::metrics::{MarketAccess, default_providers};
use stockeval_core::{
    BetaSource, DataAggregator, LookbackWindow, MarketDataSource, MetricCategory,
    PortfolioOrchestrator, QuoteSummary, RetryPolicy, TickerOutcome, TickerRequest, Verdict,
};

fn orchestrator(
    market: FixedMarket,
    news: FixedNews,
    model: Arc<ScriptedModel>,
    concurrency: usize,
) -> PortfolioOrchestrator {
    init_logging();
    PortfolioOrchestrator::from_sources(
        test_config(concurrency),
        Arc::new(market),
        Arc::new(news),
        model,
    )
    .unwrap()
}

fn summary(name: &str) -> QuoteSummary {
    QuoteSummary {
        long_name: Some(name.to_string()),
        trailing_pe: Some(18.0),
        market_cap: Some(2.0e11),
        target_mean_price: Some(150.0),
        number_of_analyst_opinions: Some(12),
        recommendation_key: Some("buy".to_string()),
        ..Default::default()
    }
}

fn full_market(symbols: &[&str]) -> FixedMarket {
    let now = Utc::now();
    let mut market = FixedMarket::default().with_bars(BENCHMARK, bars_ending(now, &steady_closes(18_000.0)));
    for (i, symbol) in symbols.iter().enumerate() {
        market = market
            .with_bars(symbol, bars_ending(now, &steady_closes(100.0 + 50.0 * i as f64)))
            .with_summary(symbol, summary(&format!("{symbol} Corp")));
    }
    market
}

fn recent_news() -> FixedNews {
    let now = Utc::now();
    FixedNews::Articles(vec![
        article("Profit beats estimates", now - Duration::days(2), 0.6),
        article("Shares slip on guidance", now - Duration::days(5), -0.2),
    ])
}

#[tokio::test]
async fn test_aggregation_is_idempotent() {
    let end = Utc.with_ymd_and_hms(2024, 6, 28, 0, 0, 0).unwrap();
    let market = Arc::new(
        FixedMarket::default()
            .with_bars(BENCHMARK, bars_ending(end, &steady_closes(18_000.0)))
            .with_bars("INFY.NS", bars_ending(end, &steady_closes(1_400.0)))
            .with_summary("INFY.NS", summary("Infosys Limited")),
    );
    let news = Arc::new(FixedNews::Articles(vec![article(
        "Infosys wins large deal",
        end - Duration::days(3),
        0.5,
    )]));
    let config = test_config(1);
    let access = MarketAccess::new(market.clone(), RetryPolicy::no_retry());
    let aggregator = DataAggregator::new(
        market,
        default_providers(&access, news, &config),
        RetryPolicy::no_retry(),
        config.window_days,
    );

    let ticker = TickerRequest::parse("INFY.NS").unwrap();
    let window = LookbackWindow::ending_at(end, 365);
    let first = aggregator.aggregate_window(&ticker, &window).await.unwrap();
    let second = aggregator.aggregate_window(&ticker, &window).await.unwrap();

    assert!(first.failures.is_empty(), "{:?}", first.failures);
    assert_eq!(
        first.record.to_json().unwrap(),
        second.record.to_json().unwrap()
    );
}

#[tokio::test]
async fn test_sibling_providers_share_market_fetches() {
    init_logging();
    let counting = Arc::new(CountingMarket::new(
        full_market(&["AAPL", "MSFT"]),
        StdDuration::from_millis(50),
    ));
    let market: Arc<dyn MarketDataSource> = Arc::new(CachingMarketSource::new(
        counting.clone(),
        StdDuration::from_secs(3600),
    ));
    let config = test_config(2);
    let access = MarketAccess::new(Arc::clone(&market), RetryPolicy::no_retry());
    let aggregator = DataAggregator::new(
        market,
        default_providers(&access, Arc::new(recent_news()), &config),
        RetryPolicy::no_retry(),
        config.window_days,
    );

    let aapl = TickerRequest::parse("AAPL").unwrap();
    let msft = TickerRequest::parse("MSFT").unwrap();
    let (first, second) = tokio::join!(aggregator.aggregate(&aapl), aggregator.aggregate(&msft));

    for result in [first.unwrap(), second.unwrap()] {
        assert!(result.failures.is_empty(), "{:?}", result.failures);
    }
    for symbol in ["AAPL", "MSFT", BENCHMARK] {
        assert_eq!(counting.history_count(symbol), 1, "history fetches for {symbol}");
    }
    for symbol in ["AAPL", "MSFT"] {
        assert_eq!(counting.summary_count(symbol), 1, "summary fetches for {symbol}");
    }
}

#[tokio::test]
async fn test_news_failure_leaves_only_sentiment_absent() {
    let model = Arc::new(ScriptedModel::always(&verdict_json("BUY")));
    let orchestrator = orchestrator(full_market(&["AAPL"]), FixedNews::Outage, model, 1);

    let report = orchestrator.run(&["AAPL".to_string()]).await;
    let record = report.entries[0].record().unwrap();

    assert!(record.sentiment.is_none());
    assert!(record.fundamental.is_some());
    assert!(record.technical.is_some());
    assert!(record.analyst.is_some());
    assert!(record.risk.is_some());

    let markdown = report.render_markdown();
    assert!(markdown.contains("### 1. AAPL - **BUY**"));
    assert!(markdown.contains(
        "#### Sentiment Analysis\nSentiment.\n_Data unavailable: sentiment metrics could not be retrieved._\n"
    ));
    assert!(!markdown.contains("_Data unavailable: technical"));
}

#[tokio::test]
async fn test_entries_keep_input_order() {
    let model = Arc::new(ScriptedModel::always(&verdict_json("HOLD")));
    let market = full_market(&["AAA", "BBB", "CCC"])
        .with_delay("AAA", StdDuration::from_millis(300))
        .with_delay("BBB", StdDuration::from_millis(10))
        .with_delay("CCC", StdDuration::from_millis(120));
    let orchestrator = orchestrator(market, recent_news(), model, 3);

    let tickers: Vec<String> = ["AAA", "BBB", "CCC"].map(String::from).to_vec();
    let report = orchestrator.run(&tickers).await;

    let order: Vec<&str> = report.entries.iter().map(|e| e.ticker.as_str()).collect();
    assert_eq!(order, ["AAA", "BBB", "CCC"]);

    let markdown = report.render_markdown();
    let a = markdown.find("### 1. AAA").unwrap();
    let b = markdown.find("### 2. BBB").unwrap();
    let c = markdown.find("### 3. CCC").unwrap();
    assert!(a < b && b < c);
}

#[tokio::test]
async fn test_short_history_fails_technical_only() {
    let now = Utc::now();
    let closes: Vec<f64> = (0..49).map(|i| 100.0 + f64::from(i % 5)).collect();
    let market = FixedMarket::default()
        .with_bars(BENCHMARK, bars_ending(now, &steady_closes(18_000.0)))
        .with_bars("NEWCO", bars_ending(now, &closes))
        .with_summary("NEWCO", summary("Newco"));
    let model = Arc::new(ScriptedModel::always(&verdict_json("HOLD")));
    let orchestrator = orchestrator(market, recent_news(), model, 1);

    let report = orchestrator.run(&["NEWCO".to_string()]).await;
    match &report.entries[0].outcome {
        TickerOutcome::Evaluated { aggregation, .. } => {
            assert!(aggregation.record.technical.is_none());
            assert!(aggregation.record.risk.is_some());
            assert!(
                aggregation
                    .failure_reason(MetricCategory::Technical)
                    .unwrap()
                    .contains("SMA(50)")
            );
        }
        other => panic!("expected an evaluated entry, got {other:?}"),
    }
}

#[tokio::test]
async fn test_tcs_scenario_yields_hold() {
    let now = Utc::now();
    // Long decline, then a fortnight of gains: price under SMA(200), RSI overbought
    let mut closes: Vec<f64> = (0..235).map(|i| 4_200.0 - 4.0 * f64::from(i)).collect();
    closes.extend((1..=15).map(|i| 3_264.0 + 5.0 * f64::from(i)));

    let tcs = QuoteSummary {
        long_name: Some("Tata Consultancy Services Limited".to_string()),
        trailing_pe: Some(23.69),
        forward_pe: Some(20.93),
        price_to_book: Some(11.01),
        dividend_yield: Some(0.0191),
        beta: Some(0.9),
        ..Default::default()
    };
    // No benchmark history, so beta comes from the quote summary
    let market = FixedMarket::default()
        .with_bars("TCS.NS", bars_ending(now, &closes))
        .with_summary("TCS.NS", tcs);
    let news = FixedNews::Articles(vec![
        article("TCS signs contract", now - Duration::days(1), 0.2),
        article("IT sector muted", now - Duration::days(4), -0.016),
        article("TCS steady quarter", now - Duration::days(9), 0.092),
    ]);
    let model = Arc::new(ScriptedModel::always(&verdict_json("hold")));
    let orchestrator = orchestrator(market, news, model.clone(), 1);

    let report = orchestrator.run(&["tcs.ns".to_string()]).await;
    let record = report.entries[0].record().unwrap();

    let technical = record.technical.as_ref().unwrap();
    assert!(technical.sma_200.unwrap() > technical.current_price);
    assert!(technical.rsi > 70.0);
    assert!((record.sentiment.as_ref().unwrap().score - 0.092).abs() < 1e-9);
    let risk = record.risk.as_ref().unwrap();
    assert_eq!(risk.beta, Some(0.9));
    assert_eq!(risk.beta_source, Some(BetaSource::Reported));

    let prompt = model.prompts.lock().unwrap()[0].clone();
    assert!(prompt.user.contains("P/E (trailing): 23.69"));
    assert!(prompt.user.contains("P/E (forward): 20.93"));
    assert!(prompt.user.contains("P/B: 11.01"));
    assert!(prompt.user.contains("Dividend yield: 1.91%"));
    assert!(prompt.user.contains("Beta (reported by data source): 0.90"));

    assert_eq!(report.entries[0].verdict(), Some(Verdict::Hold));
    let markdown = report.render_markdown();
    assert!(markdown.contains("- **Total Stocks Analyzed**: 1\n"));
    assert!(markdown.contains("- **BUY Recommendations**: 0\n"));
    assert!(markdown.contains("- **HOLD Recommendations**: 1\n"));
    assert!(markdown.contains("- **SELL Recommendations**: 0\n"));
    assert!(markdown.contains("### 1. TCS.NS - **HOLD**"));
}

#[tokio::test]
async fn test_three_categories_unavailable_still_rendered() {
    let now = Utc::now();
    let analyst_only = QuoteSummary {
        target_mean_price: Some(90.0),
        number_of_analyst_opinions: Some(4),
        recommendation_key: Some("hold".to_string()),
        ..Default::default()
    };
    let market = FixedMarket::default()
        .with_bars(BENCHMARK, bars_ending(now, &steady_closes(18_000.0)))
        .with_summary("THIN", analyst_only);
    let model = Arc::new(ScriptedModel::always(&verdict_json("SELL")));
    let orchestrator = orchestrator(market, recent_news(), model, 1);

    let report = orchestrator.run(&["THIN".to_string()]).await;
    assert_eq!(report.entries[0].verdict(), Some(Verdict::Sell));

    let markdown = report.render_markdown();
    for category in ["fundamental", "technical", "risk"] {
        assert!(
            markdown.contains(&format!(
                "_Data unavailable: {category} metrics could not be retrieved._"
            )),
            "missing note for {category}"
        );
    }
    assert!(!markdown.contains("_Data unavailable: sentiment"));
    assert!(!markdown.contains("_Data unavailable: analyst"));
}

#[tokio::test]
async fn test_two_malformed_replies_skip_ticker() {
    let model = Arc::new(ScriptedModel::always("Honestly, I would buy it."));
    let orchestrator = orchestrator(full_market(&["AAPL"]), recent_news(), model.clone(), 1);

    let report = orchestrator.run(&["AAPL".to_string()]).await;
    assert_eq!(model.calls(), 2);
    match &report.entries[0].outcome {
        TickerOutcome::Skipped { reason } => assert!(reason.contains("Verdict unavailable")),
        other => panic!("expected a skipped entry, got {other:?}"),
    }
    assert_eq!(report.evaluated(), 0);
    assert!(report.render_markdown().contains("### 1. AAPL - **UNAVAILABLE**"));
}

#[tokio::test]
async fn test_reprompt_recovers_verdict() {
    let model = Arc::new(ScriptedModel::queued(
        vec![r#"{"verdict": "ACCUMULATE"}"#],
        &verdict_json("BUY"),
    ));
    let orchestrator = orchestrator(full_market(&["AAPL"]), recent_news(), model.clone(), 1);

    let report = orchestrator.run(&["AAPL".to_string()]).await;
    assert_eq!(model.calls(), 2);
    assert_eq!(report.entries[0].verdict(), Some(Verdict::Buy));
}

#[tokio::test]
async fn test_model_failure_skips_only_that_ticker() {
    let model = Arc::new(ScriptedModel::always(&verdict_json("SELL")).unreachable_for("MSFT"));
    let orchestrator = orchestrator(
        full_market(&["AAPL", "MSFT", "INTC"]),
        recent_news(),
        model.clone(),
        3,
    );

    let tickers: Vec<String> = ["AAPL", "MSFT", "INTC"].map(String::from).to_vec();
    let report = orchestrator.run(&tickers).await;

    // A model error is not a malformed reply, so it is never re-prompted
    assert_eq!(model.calls(), 3);
    assert_eq!(report.entries[0].verdict(), Some(Verdict::Sell));
    assert_eq!(report.entries[2].verdict(), Some(Verdict::Sell));
    match &report.entries[1].outcome {
        TickerOutcome::Skipped { reason } => assert!(reason.contains("timed out"), "{reason}"),
        other => panic!("expected a skipped entry, got {other:?}"),
    }

    let markdown = report.render_markdown();
    assert!(markdown.contains("- **SELL Recommendations**: 2\n"));
    assert!(markdown.contains("- **Skipped**: 1\n"));
    assert!(markdown.contains("### 1. AAPL - **SELL**"));
    assert!(markdown.contains("### 2. MSFT - **UNAVAILABLE**"));
    assert!(markdown.contains("### 3. INTC - **SELL**"));
}

#[tokio::test]
async fn test_bad_tickers_do_not_stop_the_batch() {
    let model = Arc::new(ScriptedModel::always(&verdict_json("BUY")));
    let orchestrator = orchestrator(full_market(&["AAPL", "MSFT"]), recent_news(), model, 2);

    let tickers: Vec<String> = ["AAPL", "ZZZZ", "bad ticker!", "MSFT", "AAPL"]
        .map(String::from)
        .to_vec();
    let report = orchestrator.run(&tickers).await;

    assert_eq!(report.total(), 5);
    assert_eq!(report.count(Verdict::Buy), 3);
    assert_eq!(report.skipped(), 2);
    assert!(matches!(
        &report.entries[1].outcome,
        TickerOutcome::Skipped { reason } if reason.contains("Invalid ticker")
    ));
    assert_eq!(report.entries[2].verdict(), None);
    assert!(report.render_markdown().contains("- **Skipped**: 2\n"));
}
