//! Verdict parsing and validation

use crate::error::{Result, StockError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Final recommendation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    Buy,
    Hold,
    Sell,
}

impl Verdict {
    pub const ALL: [Verdict; 3] = [Verdict::Buy, Verdict::Hold, Verdict::Sell];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Buy => "BUY",
            Self::Hold => "HOLD",
            Self::Sell => "SELL",
        }
    }

    /// Trim and upper-case, then match exactly
    pub fn normalize(raw: &str) -> Option<Self> {
        match raw.trim().to_uppercase().as_str() {
            "BUY" => Some(Self::Buy),
            "HOLD" => Some(Self::Hold),
            "SELL" => Some(Self::Sell),
            _ => None,
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unparsed model reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawDecision {
    pub text: String,
}

impl RawDecision {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// Wire shape of the model reply
///
/// Every prose section is required; only `catalysts` may be left out.
#[derive(Debug, Deserialize)]
struct DecisionWire {
    verdict: String,
    executive_summary: String,
    valuation: String,
    technical: String,
    sentiment: String,
    risk: String,
    #[serde(default)]
    catalysts: Vec<String>,
    recommendation: String,
}

impl DecisionWire {
    fn sections(&self) -> [(&'static str, &str); 6] {
        [
            ("executive_summary", self.executive_summary.as_str()),
            ("valuation", self.valuation.as_str()),
            ("technical", self.technical.as_str()),
            ("sentiment", self.sentiment.as_str()),
            ("risk", self.risk.as_str()),
            ("recommendation", self.recommendation.as_str()),
        ]
    }
}

/// Validated verdict with its explanation sections
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerdictReport {
    pub verdict: Verdict,
    pub executive_summary: String,
    pub valuation: String,
    pub technical: String,
    pub sentiment: String,
    pub risk: String,
    pub catalysts: Vec<String>,
    pub recommendation: String,
}

/// Pull a JSON object out of a model reply
///
/// Handles fenced ```json blocks and prose around the object.
pub fn extract_json(text: &str) -> Option<&str> {
    let trimmed = text.trim();

    if let Some(start) = trimmed.find("```") {
        let after = &trimmed[start + 3..];
        let body_start = after.find('\n').map_or(0, |i| i + 1);
        let body = &after[body_start..];
        if let Some(end) = body.find("```") {
            let inner = body[..end].trim();
            if inner.starts_with('{') {
                return Some(inner);
            }
        }
    }

    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    (end > start).then(|| &trimmed[start..=end])
}

/// Parse and validate a reply
pub fn parse_decision(raw: &RawDecision) -> Result<VerdictReport> {
    let json = extract_json(&raw.text)
        .ok_or_else(|| StockError::MalformedVerdict("reply contains no JSON object".to_string()))?;

    let wire: DecisionWire = serde_json::from_str(json)
        .map_err(|e| StockError::MalformedVerdict(format!("reply does not match schema: {e}")))?;

    let verdict = Verdict::normalize(&wire.verdict).ok_or_else(|| {
        StockError::MalformedVerdict(format!(
            "verdict '{}' is not BUY, HOLD or SELL",
            wire.verdict
        ))
    })?;

    let blank = wire
        .sections()
        .into_iter()
        .find(|(_, text)| text.trim().is_empty());
    if let Some((name, _)) = blank {
        return Err(StockError::MalformedVerdict(format!(
            "reply leaves the '{name}' section empty"
        )));
    }

    Ok(VerdictReport {
        verdict,
        executive_summary: wire.executive_summary.trim().to_string(),
        valuation: wire.valuation.trim().to_string(),
        technical: wire.technical.trim().to_string(),
        sentiment: wire.sentiment.trim().to_string(),
        risk: wire.risk.trim().to_string(),
        catalysts: wire
            .catalysts
            .into_iter()
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .collect(),
        recommendation: wire.recommendation.trim().to_string(),
    })
}
