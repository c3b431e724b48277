//! Command-line interface for stockeval
//!
//! ```bash
//! export OPENAI_API_KEY=...
//! export NEWS_API_KEY=...
//! stockeval analyze --tickers TCS.NS,INFY.NS --output report.md
//! ```

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use stockeval_core::{AnalysisConfig, Credentials, PortfolioOrchestrator, StockError};
use stockeval_utils::{TelemetryConfig, init_tracing};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "stockeval")]
#[command(about = "BUY / HOLD / SELL verdicts for a stock portfolio", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Evaluate tickers and write a Markdown report
    Analyze {
        /// Ticker symbols, space or comma separated (e.g. TCS.NS INFY.NS)
        #[arg(short, long, required = true, num_args = 1.., value_delimiter = ',')]
        tickers: Vec<String>,

        /// Write the report here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Tickers evaluated at once
        #[arg(short, long)]
        concurrency: Option<usize>,

        /// Price history lookback in days
        #[arg(short, long)]
        window_days: Option<u32>,
    },
}

const EXIT_ALL_FAILED: u8 = 1;
const EXIT_CREDENTIALS: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    init_tracing(&TelemetryConfig::from_env());

    let cli = Cli::parse();

    match run(cli.command).await {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {e:#}");
            ExitCode::from(exit_status(&e))
        }
    }
}

async fn run(command: Command) -> anyhow::Result<ExitCode> {
    match command {
        Command::Analyze {
            tickers,
            output,
            concurrency,
            window_days,
        } => {
            // Credentials are checked before any ticker is touched
            let credentials = Credentials::from_env()?;

            let tickers = normalize_tickers(&tickers);
            anyhow::ensure!(!tickers.is_empty(), "no tickers given");

            let mut config = AnalysisConfig::from_env()?;
            if let Some(n) = concurrency {
                config.max_concurrent_tickers = n;
            }
            if let Some(days) = window_days {
                config.window_days = days;
            }
            config.validate()?;

            info!(
                "Analyzing {} tickers with {} (concurrency {})",
                tickers.len(),
                config.model,
                config.max_concurrent_tickers
            );

            let orchestrator = PortfolioOrchestrator::from_credentials(config, &credentials)?;
            let report = orchestrator.run(&tickers).await;
            let markdown = report.render_markdown();

            match output {
                Some(path) => {
                    tokio::fs::write(&path, &markdown)
                        .await
                        .with_context(|| format!("writing report to {}", path.display()))?;
                    info!("Report written to {}", path.display());
                }
                None => println!("{markdown}"),
            }

            if report.evaluated() == 0 {
                error!("Every ticker failed");
                return Ok(ExitCode::from(EXIT_ALL_FAILED));
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Trim and upper-case; blank entries are dropped
fn normalize_tickers(raw: &[String]) -> Vec<String> {
    raw.iter()
        .map(|t| t.trim().to_uppercase())
        .filter(|t| !t.is_empty())
        .collect()
}

fn exit_status(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<StockError>() {
        Some(StockError::CredentialMissing(_)) => EXIT_CREDENTIALS,
        _ => EXIT_ALL_FAILED,
    }
}
