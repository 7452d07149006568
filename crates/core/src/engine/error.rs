//! Error types for the engine module.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that an engine adapter can return from a conversion attempt.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The backing executable could not be located.
    #[error("{engine} executable not found")]
    ExecutableNotFound { engine: String },

    /// The backend exists but cannot be used right now.
    #[error("{engine} is not available: {reason}")]
    Unavailable { engine: String, reason: String },

    /// Input file not found.
    #[error("Input file not found: {path}")]
    InputNotFound { path: PathBuf },

    /// The engine does not handle this format pair.
    #[error("Unsupported conversion: {input} -> {output}")]
    UnsupportedConversion { input: String, output: String },

    /// Output directory does not exist and could not be created.
    #[error("Failed to create output directory: {path}")]
    OutputDirectoryFailed { path: PathBuf },

    /// The backend ran and reported failure.
    #[error("Conversion failed: {reason}")]
    ConversionFailed {
        reason: String,
        stderr: Option<String>,
    },

    /// Conversion timed out.
    #[error("Conversion timed out after {timeout_secs} seconds")]
    Timeout { timeout_secs: u64 },

    /// A conversion server rejected or failed the request.
    #[error("Server request failed: {reason}")]
    Server { reason: String },

    /// Failed to decode a document, image or tool output.
    #[error("Failed to parse {what}: {reason}")]
    Parse { what: String, reason: String },

    /// I/O error during conversion.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    /// Creates a new conversion failed error with optional stderr output.
    pub fn conversion_failed(reason: impl Into<String>, stderr: Option<String>) -> Self {
        Self::ConversionFailed {
            reason: reason.into(),
            stderr,
        }
    }

    /// Creates a new server error.
    pub fn server(reason: impl Into<String>) -> Self {
        Self::Server {
            reason: reason.into(),
        }
    }

    /// Creates a new parse error.
    pub fn parse(what: impl Into<String>, reason: impl ToString) -> Self {
        Self::Parse {
            what: what.into(),
            reason: reason.to_string(),
        }
    }

    /// Creates a new unsupported conversion error.
    pub fn unsupported(input: impl Into<String>, output: impl Into<String>) -> Self {
        Self::UnsupportedConversion {
            input: input.into(),
            output: output.into(),
        }
    }

    /// Whether this error came from the engine exceeding its time budget.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}
