//! Error types for the router module.

use std::path::PathBuf;
use thiserror::Error;

/// Errors produced while routing a conversion job.
///
/// `EngineUnavailable` and `EngineFailure` describe single candidates and are
/// recorded in the attempt list. They only become terminal through
/// `AllEnginesExhausted`.
#[derive(Debug, Clone, Error)]
pub enum RouteError {
    /// Input and output formats are identical.
    #[error("Input and output formats are the same: {format}")]
    SameFormat { format: String },

    /// The input or output format is unknown.
    #[error("Unsupported format: {format}")]
    UnsupportedFormat { format: String },

    /// The input file does not exist.
    #[error("Input file not found: {path}")]
    FileNotFound { path: PathBuf },

    /// No engine declares support for the pair.
    #[error("No engine can convert {input} to {output}")]
    NoCandidateEngine { input: String, output: String },

    /// A candidate was skipped because it cannot run right now.
    #[error("{engine} is not available")]
    EngineUnavailable { engine: String },

    /// A candidate ran and failed, timed out or panicked.
    #[error("{message}")]
    EngineFailure {
        engine: String,
        message: String,
        timed_out: bool,
    },

    /// Every candidate was skipped or failed.
    ///
    /// `message` is the last candidate's message. `attempts` lists every
    /// candidate outcome in order.
    #[error("{message}")]
    AllEnginesExhausted {
        message: String,
        attempts: Vec<RouteError>,
    },
}

impl RouteError {
    /// Name of the engine this error is about, for per-candidate errors.
    pub fn engine(&self) -> Option<&str> {
        match self {
            Self::EngineUnavailable { engine } | Self::EngineFailure { engine, .. } => {
                Some(engine)
            }
            _ => None,
        }
    }

    /// Whether the job was rejected before any engine was consulted.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::SameFormat { .. } | Self::UnsupportedFormat { .. } | Self::FileNotFound { .. }
        )
    }

    /// Candidate outcomes, empty unless every engine was exhausted.
    pub fn attempts(&self) -> &[RouteError] {
        match self {
            Self::AllEnginesExhausted { attempts, .. } => attempts,
            _ => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exhausted_displays_last_message_only() {
        let err = RouteError::AllEnginesExhausted {
            message: "Conversion failed: third".to_string(),
            attempts: vec![
                RouteError::EngineUnavailable {
                    engine: "first".to_string(),
                },
                RouteError::EngineFailure {
                    engine: "third".to_string(),
                    message: "Conversion failed: third".to_string(),
                    timed_out: false,
                },
            ],
        };
        assert_eq!(err.to_string(), "Conversion failed: third");
        assert_eq!(err.attempts().len(), 2);
        assert_eq!(err.attempts()[0].engine(), Some("first"));
    }

    #[test]
    fn test_validation_kinds() {
        assert!(RouteError::SameFormat {
            format: "pdf".to_string()
        }
        .is_validation());
        assert!(!RouteError::NoCandidateEngine {
            input: "a".to_string(),
            output: "b".to_string()
        }
        .is_validation());
    }

    #[test]
    fn test_display() {
        let err = RouteError::NoCandidateEngine {
            input: "pdf".to_string(),
            output: "mp3".to_string(),
        };
        assert_eq!(err.to_string(), "No engine can convert pdf to mp3");
        let err = RouteError::EngineUnavailable {
            engine: "libreoffice".to_string(),
        };
        assert_eq!(err.to_string(), "libreoffice is not available");
    }
}
