//! Verdict synthesis: prompt rendering, model call and reply validation

pub mod parser;
pub mod prompt;
pub mod synthesizer;

pub use parser::{RawDecision, Verdict, VerdictReport, extract_json, parse_decision};
pub use prompt::{Prompt, PromptBuilder};
pub use synthesizer::{LlmVerdictModel, ReportSynthesizer, VerdictModel};
