//! Prompt construction for the verdict model
//!
//! The record is first flattened into titled sections of preformatted lines
//! (values with units), then rendered through MiniJinja templates. Absent
//! categories are listed with an UNAVAILABLE marker so the model does not
//! invent values for them.

use crate::error::Result;
use crate::record::{
    AnalystMetrics, BetaSource, FundamentalMetrics, MetricCategory, MetricRecord, RiskMetrics,
    SentimentMetrics, TechnicalMetrics,
};
use minijinja::{Environment, context};
use serde::Serialize;

const SYSTEM_PROMPT: &str = "\
You are an expert financial analyst with deep expertise in stock valuation, \
technical analysis, risk assessment, and market sentiment analysis.

Your task is to analyze the provided stock data and decide on a single verdict: \
BUY, HOLD or SELL, with a structured explanation.

Guidelines for the verdict:
- BUY: strong fundamentals, positive technicals, good sentiment, reasonable valuation
- HOLD: mixed signals or unclear direction
- SELL: weak fundamentals, negative signals, overvaluation, or high risk

Your analysis must be data-driven and use only the figures provided. \
Never invent a value for a category marked UNAVAILABLE.";

const USER_TEMPLATE: &str = "\
You are evaluating the stock: {{ symbol }}{% if company %} ({{ company }}){% endif %}.

Consolidated analysis data:
{% for section in sections %}
## {{ section.title }}{% if not section.available %} (UNAVAILABLE){% endif %}
{% if section.available %}{% for line in section.lines %}- {{ line }}
{% endfor %}{% else %}- UNAVAILABLE: {{ section.category }} metrics could not be retrieved.
{% endif %}{% endfor %}
Respond with a single JSON object and nothing else. Keys:
- \"verdict\": exactly one of \"BUY\", \"HOLD\", \"SELL\"
- \"executive_summary\": string
- \"valuation\": string
- \"technical\": string
- \"sentiment\": string
- \"risk\": string
- \"catalysts\": array of strings
- \"recommendation\": string";

const STRICT_TEMPLATE: &str = "\
{{ user_prompt }}

IMPORTANT: your previous reply could not be used ({{ problem }}).
Reply with ONLY the JSON object, no Markdown and no commentary.
The \"verdict\" value must be the single uppercase word BUY, HOLD or SELL.";

/// System and user text for one model call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

#[derive(Debug, Serialize)]
struct PromptSection {
    title: &'static str,
    category: &'static str,
    available: bool,
    lines: Vec<String>,
}

/// Renders prompts from a metric record
pub struct PromptBuilder {
    env: Environment<'static>,
}

impl PromptBuilder {
    pub fn new() -> Result<Self> {
        let mut env = Environment::new();
        env.add_template("user", USER_TEMPLATE)?;
        env.add_template("strict", STRICT_TEMPLATE)?;
        Ok(Self { env })
    }

    /// First-attempt prompt
    pub fn verdict_prompt(&self, record: &MetricRecord) -> Result<Prompt> {
        let user = self.env.get_template("user")?.render(context! {
            symbol => &record.symbol,
            company => &record.company_name,
            sections => sections(record),
        })?;

        Ok(Prompt {
            system: SYSTEM_PROMPT.to_string(),
            user,
        })
    }

    /// Stricter re-prompt after a malformed reply
    pub fn strict_prompt(&self, previous: &Prompt, problem: &str) -> Result<Prompt> {
        let user = self.env.get_template("strict")?.render(context! {
            user_prompt => &previous.user,
            problem => problem,
        })?;

        Ok(Prompt {
            system: previous.system.clone(),
            user,
        })
    }
}

fn sections(record: &MetricRecord) -> Vec<PromptSection> {
    let section = |category: MetricCategory, title: &'static str, lines: Option<Vec<String>>| {
        PromptSection {
            title,
            category: category.as_str(),
            available: lines.is_some(),
            lines: lines.unwrap_or_default(),
        }
    };

    vec![
        section(
            MetricCategory::Fundamental,
            "Fundamental Metrics",
            record.fundamental.as_ref().map(fundamental_lines),
        ),
        section(
            MetricCategory::Technical,
            "Technical Indicators",
            record.technical.as_ref().map(technical_lines),
        ),
        section(
            MetricCategory::Sentiment,
            "News Sentiment",
            record.sentiment.as_ref().map(sentiment_lines),
        ),
        section(
            MetricCategory::Analyst,
            "Analyst Ratings",
            record.analyst.as_ref().map(analyst_lines),
        ),
        section(
            MetricCategory::Risk,
            "Risk Metrics",
            record.risk.as_ref().map(risk_lines),
        ),
    ]
}

fn number(value: Option<f64>) -> String {
    value.map_or_else(|| "unavailable".to_string(), |v| format!("{v:.2}"))
}

fn percent(fraction: Option<f64>) -> String {
    fraction.map_or_else(
        || "unavailable".to_string(),
        |v| format!("{:.2}%", v * 100.0),
    )
}

fn large(value: Option<f64>) -> String {
    match value {
        None => "unavailable".to_string(),
        Some(v) if v.abs() >= 1e12 => format!("{:.2}T", v / 1e12),
        Some(v) if v.abs() >= 1e9 => format!("{:.2}B", v / 1e9),
        Some(v) if v.abs() >= 1e6 => format!("{:.2}M", v / 1e6),
        Some(v) => format!("{v:.0}"),
    }
}

fn text(value: Option<&str>) -> &str {
    value.unwrap_or("unavailable")
}

fn fundamental_lines(m: &FundamentalMetrics) -> Vec<String> {
    vec![
        format!("Company: {}", text(m.company_name.as_deref())),
        format!(
            "Sector / Industry: {} / {}",
            text(m.sector.as_deref()),
            text(m.industry.as_deref())
        ),
        format!("Current price: {}", number(m.current_price)),
        format!("Market cap: {}", large(m.market_cap)),
        format!(
            "P/E (trailing): {}{}",
            number(m.pe_ratio),
            m.pe_band
                .map(|b| format!(" ({})", b.label()))
                .unwrap_or_default()
        ),
        format!("P/E (forward): {}", number(m.forward_pe)),
        format!("P/S: {}", number(m.price_to_sales)),
        format!("P/B: {}", number(m.price_to_book)),
        format!("EPS: {}", number(m.eps)),
        format!("Earnings growth: {}", percent(m.earnings_growth)),
        format!("Revenue: {}", large(m.revenue)),
        format!("Profit margin: {}", percent(m.profit_margin)),
        format!("Operating margin: {}", percent(m.operating_margin)),
        format!("Debt to equity: {}", number(m.debt_to_equity)),
        format!("Current ratio: {}", number(m.current_ratio)),
        format!("Return on equity: {}", percent(m.return_on_equity)),
        format!("Return on assets: {}", percent(m.return_on_assets)),
        format!("Dividend yield: {}", percent(m.dividend_yield)),
        format!("Payout ratio: {}", percent(m.payout_ratio)),
        format!("Book value per share: {}", number(m.book_value)),
        format!(
            "52-week range: {} - {}",
            number(m.fifty_two_week_low),
            number(m.fifty_two_week_high)
        ),
    ]
}

fn technical_lines(m: &TechnicalMetrics) -> Vec<String> {
    vec![
        format!("Current price: {:.2}", m.current_price),
        format!(
            "Price change over window: {:.2} ({:.2}%)",
            m.price_change, m.price_change_pct
        ),
        format!("SMA(50): {:.2}", m.sma_50),
        format!("SMA(200): {}", number(m.sma_200)),
        format!(
            "Moving average signal: {}",
            m.cross_signal.map_or("unavailable", |s| s.label())
        ),
        format!("RSI(14): {:.2} - {}", m.rsi, m.rsi_signal.label()),
        format!(
            "Volume: current {} vs average {:.0} ({:?})",
            m.current_volume, m.average_volume, m.volume_trend
        ),
        format!("Window range: {:.2} - {:.2}", m.period_low, m.period_high),
    ]
}

fn sentiment_lines(m: &SentimentMetrics) -> Vec<String> {
    let mut lines = if m.no_coverage {
        vec![
            "No news coverage found in the window (score 0.000 reflects absence of news)"
                .to_string(),
        ]
    } else {
        vec![format!(
            "Overall sentiment score: {:.3} in [-1, 1] ({:?}) from {} articles",
            m.score, m.label, m.sample_count
        )]
    };
    lines.extend(m.samples.iter().map(|s| {
        format!(
            "{} | {} | {} | score {:.2}",
            s.published_at.format("%Y-%m-%d"),
            s.source,
            s.title,
            s.score
        )
    }));
    lines
}

fn analyst_lines(m: &AnalystMetrics) -> Vec<String> {
    vec![
        format!("Consensus: {}", m.recommendation),
        format!(
            "Number of analysts: {}",
            m.analyst_count
                .map_or_else(|| "unavailable".to_string(), |n| n.to_string())
        ),
        format!("Target price (mean): {}", number(m.target_mean_price)),
        format!(
            "Target price range: {} - {}",
            number(m.target_low_price),
            number(m.target_high_price)
        ),
    ]
}

fn risk_lines(m: &RiskMetrics) -> Vec<String> {
    vec![
        format!(
            "Annualized volatility: {:.2}% ({:?})",
            m.volatility * 100.0,
            m.volatility_level
        ),
        match m.beta_source {
            Some(BetaSource::Reported) => {
                format!("Beta (reported by data source): {}", number(m.beta))
            }
            _ => format!("Beta vs benchmark: {}", number(m.beta)),
        },
        format!("Sharpe ratio: {}", m.sharpe_ratio),
        format!("Value at Risk (95%, daily): {:.2}%", m.var_95 * 100.0),
        format!(
            "Max drawdown (cumulative daily returns): {:.2}%",
            m.max_drawdown * 100.0
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{MetricSection, PeBand, TickerRequest};

    fn record_with_fundamentals() -> MetricRecord {
        let mut record = MetricRecord::empty(&TickerRequest::parse("TCS.NS").unwrap());
        record.insert(MetricSection::Fundamental(FundamentalMetrics {
            company_name: Some("Tata Consultancy Services Limited".to_string()),
            pe_ratio: Some(23.69),
            pe_band: Some(PeBand::FairlyValued),
            dividend_yield: Some(0.0191),
            ..Default::default()
        }));
        record
    }

    #[test]
    fn test_prompt_lists_values_and_unavailable_categories() {
        let builder = PromptBuilder::new().unwrap();
        let prompt = builder.verdict_prompt(&record_with_fundamentals()).unwrap();

        assert!(prompt.system.contains("BUY, HOLD or SELL"));
        assert!(
            prompt
                .user
                .contains("TCS.NS (Tata Consultancy Services Limited)")
        );
        assert!(prompt.user.contains("P/E (trailing): 23.69 (Fairly Valued)"));
        assert!(prompt.user.contains("Dividend yield: 1.91%"));
        assert!(prompt.user.contains("## Risk Metrics (UNAVAILABLE)"));
        assert!(
            prompt
                .user
                .contains("UNAVAILABLE: technical metrics could not be retrieved.")
        );
        assert!(!prompt.user.contains("## Fundamental Metrics (UNAVAILABLE)"));
    }

    #[test]
    fn test_prompt_is_deterministic() {
        let builder = PromptBuilder::new().unwrap();
        let record = record_with_fundamentals();
        assert_eq!(
            builder.verdict_prompt(&record).unwrap(),
            builder.verdict_prompt(&record).unwrap()
        );
    }

    #[test]
    fn test_strict_prompt_wraps_previous() {
        let builder = PromptBuilder::new().unwrap();
        let first = builder.verdict_prompt(&record_with_fundamentals()).unwrap();
        let strict = builder
            .strict_prompt(&first, "verdict 'MAYBE' is not BUY, HOLD or SELL")
            .unwrap();

        assert_eq!(strict.system, first.system);
        assert!(strict.user.starts_with(&first.user));
        assert!(strict.user.contains("MAYBE"));
        assert!(strict.user.contains("ONLY the JSON object"));
    }

    #[test]
    fn test_large_number_format() {
        assert_eq!(large(Some(1.5e12)), "1.50T");
        assert_eq!(large(Some(2.25e9)), "2.25B");
        assert_eq!(large(Some(3.0e6)), "3.00M");
        assert_eq!(large(None), "unavailable");
    }
}
