//! Telemetry configuration

use serde::{Deserialize, Serialize};

/// Output format for log events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human readable, one event per line
    #[default]
    Pretty,
    /// Newline-delimited JSON
    Json,
}

impl LogFormat {
    /// Parse a format name, falling back to [`LogFormat::Pretty`]
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "json" => Self::Json,
            _ => Self::Pretty,
        }
    }
}

/// Optional tracing/telemetry toggles consumed once at startup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Application name attached to startup events
    pub app_name: String,
    /// Default filter directive used when `RUST_LOG` is not set
    pub default_filter: String,
    /// Output format
    pub format: LogFormat,
    /// Emit span open/close events (pipeline step timings)
    pub span_events: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            app_name: "stockeval".to_string(),
            default_filter: "info".to_string(),
            format: LogFormat::Pretty,
            span_events: false,
        }
    }
}

impl TelemetryConfig {
    /// Read `STOCKEVAL_LOG_FORMAT` and `STOCKEVAL_TRACING` from the environment
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(format) = std::env::var("STOCKEVAL_LOG_FORMAT") {
            config.format = LogFormat::parse(&format);
        }
        if let Ok(flag) = std::env::var("STOCKEVAL_TRACING") {
            config.span_events = is_truthy(&flag);
        }
        config
    }

    /// Set the output format
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Set the default filter directive
    pub fn with_default_filter(mut self, filter: impl Into<String>) -> Self {
        self.default_filter = filter.into();
        self
    }
}

/// `1`, `true` and `yes` (any case) enable a toggle
pub fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes"
    )
}
