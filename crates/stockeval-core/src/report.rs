//! Portfolio report assembly and Markdown rendering

use crate::record::{AggregationResult, MetricCategory, MetricRecord};
use crate::synthesis::{Verdict, VerdictReport};
use chrono::{DateTime, Local};
use std::fmt;
use uuid::Uuid;

/// Result of one ticker's pipeline
#[derive(Debug, Clone, PartialEq)]
pub enum TickerOutcome {
    Evaluated {
        aggregation: AggregationResult,
        verdict: VerdictReport,
    },
    Skipped {
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct TickerEntry {
    /// Symbol as normalized, or the raw input when it did not parse
    pub ticker: String,
    pub outcome: TickerOutcome,
}

impl TickerEntry {
    pub fn evaluated(aggregation: AggregationResult, verdict: VerdictReport) -> Self {
        Self {
            ticker: aggregation.record.symbol.clone(),
            outcome: TickerOutcome::Evaluated {
                aggregation,
                verdict,
            },
        }
    }

    pub fn skipped(ticker: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            ticker: ticker.into(),
            outcome: TickerOutcome::Skipped {
                reason: reason.into(),
            },
        }
    }

    pub fn verdict(&self) -> Option<Verdict> {
        match &self.outcome {
            TickerOutcome::Evaluated { verdict, .. } => Some(verdict.verdict),
            TickerOutcome::Skipped { .. } => None,
        }
    }

    pub fn record(&self) -> Option<&MetricRecord> {
        match &self.outcome {
            TickerOutcome::Evaluated { aggregation, .. } => Some(&aggregation.record),
            TickerOutcome::Skipped { .. } => None,
        }
    }
}

/// Outcome of one orchestrator run, in input order
///
/// Rendering through [`fmt::Display`] produces the Markdown report.
#[derive(Debug, Clone, PartialEq)]
pub struct PortfolioReport {
    pub run_id: Uuid,
    pub generated_at: DateTime<Local>,
    pub entries: Vec<TickerEntry>,
}

impl PortfolioReport {
    pub fn new(run_id: Uuid, generated_at: DateTime<Local>, entries: Vec<TickerEntry>) -> Self {
        Self {
            run_id,
            generated_at,
            entries,
        }
    }

    /// Every entry, evaluated or skipped
    pub fn total(&self) -> usize {
        self.entries.len()
    }

    pub fn count(&self, verdict: Verdict) -> usize {
        self.entries
            .iter()
            .filter(|e| e.verdict() == Some(verdict))
            .count()
    }

    pub fn evaluated(&self) -> usize {
        self.entries.iter().filter(|e| e.verdict().is_some()).count()
    }

    pub fn skipped(&self) -> usize {
        self.total() - self.evaluated()
    }

    pub fn render_markdown(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for PortfolioReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "# Stock Portfolio Analysis Report")?;
        writeln!(
            f,
            "Generated: {}",
            self.generated_at.format("%Y-%m-%d %H:%M:%S")
        )?;
        writeln!(f)?;

        writeln!(f, "## Portfolio Overview")?;
        writeln!(f, "- **Total Stocks Analyzed**: {}", self.total())?;
        writeln!(f, "- **BUY Recommendations**: {}", self.count(Verdict::Buy))?;
        writeln!(f, "- **HOLD Recommendations**: {}", self.count(Verdict::Hold))?;
        writeln!(f, "- **SELL Recommendations**: {}", self.count(Verdict::Sell))?;
        let skipped = self.skipped();
        if skipped > 0 {
            writeln!(f, "- **Skipped**: {skipped}")?;
        }
        writeln!(f)?;

        writeln!(f, "## Individual Stock Analysis")?;
        writeln!(f)?;

        for (index, entry) in self.entries.iter().enumerate() {
            write_entry(f, index + 1, entry)?;
        }
        Ok(())
    }
}

fn write_entry(f: &mut fmt::Formatter<'_>, position: usize, entry: &TickerEntry) -> fmt::Result {
    match &entry.outcome {
        TickerOutcome::Skipped { reason } => {
            writeln!(f, "### {position}. {} - **UNAVAILABLE**", entry.ticker)?;
            writeln!(f)?;
            writeln!(f, "Skipped: {reason}")?;
            writeln!(f)?;
        }
        TickerOutcome::Evaluated {
            aggregation,
            verdict,
        } => {
            let record = &aggregation.record;
            writeln!(f, "### {position}. {} - **{}**", entry.ticker, verdict.verdict)?;
            writeln!(f)?;

            write_section(f, "Executive Summary", &verdict.executive_summary, record, &[])?;
            write_section(
                f,
                "Valuation Analysis",
                &verdict.valuation,
                record,
                &[MetricCategory::Fundamental, MetricCategory::Analyst],
            )?;
            write_section(
                f,
                "Technical Analysis",
                &verdict.technical,
                record,
                &[MetricCategory::Technical],
            )?;
            write_section(
                f,
                "Sentiment Analysis",
                &verdict.sentiment,
                record,
                &[MetricCategory::Sentiment],
            )?;
            write_section(
                f,
                "Risk Assessment",
                &verdict.risk,
                record,
                &[MetricCategory::Risk],
            )?;

            writeln!(f, "#### Key Catalysts")?;
            if verdict.catalysts.is_empty() {
                writeln!(f, "- None identified")?;
            }
            for catalyst in &verdict.catalysts {
                writeln!(f, "- {catalyst}")?;
            }
            writeln!(f)?;

            write_section(
                f,
                "Recommendation Summary",
                &verdict.recommendation,
                record,
                &[],
            )?;
        }
    }

    writeln!(f, "---")?;
    writeln!(f)
}

fn write_section(
    f: &mut fmt::Formatter<'_>,
    title: &str,
    prose: &str,
    record: &MetricRecord,
    backing: &[MetricCategory],
) -> fmt::Result {
    writeln!(f, "#### {title}")?;
    if !prose.is_empty() {
        writeln!(f, "{prose}")?;
    }
    for category in backing.iter().filter(|c| !record.is_present(**c)) {
        writeln!(
            f,
            "_Data unavailable: {category} metrics could not be retrieved._"
        )?;
    }
    writeln!(f)
}
