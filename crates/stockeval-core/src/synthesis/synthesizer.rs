//! Verdict synthesis over a generative model

use super::parser::{RawDecision, VerdictReport, parse_decision};
use super::prompt::{Prompt, PromptBuilder};
use crate::config::AnalysisConfig;
use crate::error::{Result, StockError};
use crate::record::MetricRecord;
use crate::retry::RetryPolicy;
use async_trait::async_trait;
use std::sync::Arc;
use stockeval_llm::{CompletionRequest, LLMProvider, Message};
use tracing::{debug, info, instrument, warn};

/// Turns a prompt into a raw model reply
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VerdictModel: Send + Sync {
    async fn synthesize(&self, prompt: &Prompt) -> Result<RawDecision>;
}

/// [`VerdictModel`] over any chat completion provider
pub struct LlmVerdictModel {
    provider: Arc<dyn LLMProvider>,
    model: String,
    temperature: f32,
    max_tokens: usize,
}

impl LlmVerdictModel {
    pub fn new(provider: Arc<dyn LLMProvider>, config: &AnalysisConfig) -> Self {
        Self {
            provider,
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }
}

#[async_trait]
impl VerdictModel for LlmVerdictModel {
    async fn synthesize(&self, prompt: &Prompt) -> Result<RawDecision> {
        let request = CompletionRequest::builder(&self.model)
            .system(&prompt.system)
            .add_message(Message::user(&prompt.user))
            .max_tokens(self.max_tokens)
            .temperature(self.temperature)
            .json_output()
            .build();

        let response = self.provider.complete(request).await?;
        debug!(
            "{} reply: {} tokens, stop reason {:?}",
            self.provider.name(),
            response.usage.total(),
            response.stop_reason
        );

        Ok(RawDecision::new(response.message.text()))
    }
}

/// Produces a validated verdict for a metric record
///
/// A malformed first reply earns exactly one stricter re-prompt. A second
/// malformed reply yields `VerdictUnavailable`. Model errors and timeouts
/// propagate unchanged.
pub struct ReportSynthesizer {
    model: Arc<dyn VerdictModel>,
    prompts: PromptBuilder,
    retry: RetryPolicy,
}

impl ReportSynthesizer {
    pub fn new(model: Arc<dyn VerdictModel>, retry: RetryPolicy) -> Result<Self> {
        Ok(Self {
            model,
            prompts: PromptBuilder::new()?,
            retry,
        })
    }

    #[instrument(skip(self, record), fields(symbol = %record.symbol))]
    pub async fn synthesize(&self, record: &MetricRecord) -> Result<VerdictReport> {
        let prompt = self.prompts.verdict_prompt(record)?;
        let raw = self.call(&prompt).await?;

        let problem = match parse_decision(&raw) {
            Ok(report) => {
                info!("Verdict for {}: {}", record.symbol, report.verdict);
                return Ok(report);
            }
            Err(StockError::MalformedVerdict(problem)) => problem,
            Err(e) => return Err(e),
        };

        warn!(
            "Malformed verdict for {} ({}), re-prompting",
            record.symbol, problem
        );
        let strict = self.prompts.strict_prompt(&prompt, &problem)?;
        let raw = self.call(&strict).await?;

        match parse_decision(&raw) {
            Ok(report) => {
                info!(
                    "Verdict for {} after re-prompt: {}",
                    record.symbol, report.verdict
                );
                Ok(report)
            }
            Err(StockError::MalformedVerdict(reason)) => Err(StockError::VerdictUnavailable {
                symbol: record.symbol.clone(),
                reason,
            }),
            Err(e) => Err(e),
        }
    }

    async fn call(&self, prompt: &Prompt) -> Result<RawDecision> {
        self.retry
            .execute("verdict", || self.model.synthesize(prompt))
            .await
    }
}
