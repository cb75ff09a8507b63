//! Error types for InsightFlow.
//!
//! Library crates use [`InsightFlowError`] via `thiserror`.
//! App crates (cli) wrap this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all InsightFlow operations.
#[derive(Debug, thiserror::Error)]
pub enum InsightFlowError {
    /// The tabular source could not be read or parsed.
    #[error("intake error: {message}")]
    Intake { message: String },

    /// Monthly chart could not be built or rendered.
    ///
    /// Only ever raised inside the KPI stage, which logs it and drops the chart.
    #[error("chart generation error: {0}")]
    ChartGeneration(String),

    /// A text generation provider is configured but cannot produce text.
    #[error("text generation failed: {0}")]
    TextGenerationFatal(String),

    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Long-term memory store error.
    #[error("storage error: {0}")]
    Storage(String),

    /// JSON/TOML (de)serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, InsightFlowError>;

impl InsightFlowError {
    /// Create an intake error from any displayable message.
    pub fn intake(msg: impl Into<String>) -> Self {
        Self::Intake {
            message: msg.into(),
        }
    }

    /// Create a chart generation error from any displayable message.
    pub fn chart(msg: impl Into<String>) -> Self {
        Self::ChartGeneration(msg.into())
    }

    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// True for failures of the intake step (unreadable or unparsable source).
    pub fn is_intake(&self) -> bool {
        matches!(self, Self::Intake { .. })
    }
}

impl From<serde_json::Error> for InsightFlowError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
