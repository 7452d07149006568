//! Trait definitions for the engine module.

use async_trait::async_trait;
use std::time::Duration;

use super::error::EngineError;
use super::progress::ProgressReporter;
use super::types::{EngineKind, EngineOutput, EngineRequest, EngineStatus};
use crate::format::normalize_format;

/// A conversion backend wrapped behind a uniform contract.
#[async_trait]
pub trait Engine: Send + Sync {
    /// Returns the name of this engine implementation.
    fn name(&self) -> &str;

    /// How the engine reaches its backend.
    fn kind(&self) -> EngineKind;

    /// Static priority rank; lower ranks are tried first.
    fn priority(&self) -> u8;

    /// Declared input formats.
    fn supported_input_formats(&self) -> &[&str];

    /// Declared output formats.
    fn supported_output_formats(&self) -> &[&str];

    /// Whether the engine handles `input -> output`. Static, performs no I/O.
    ///
    /// The default accepts any distinct pair drawn from the declared lists.
    fn can_convert(&self, input_format: &str, output_format: &str) -> bool {
        let input = normalize_format(input_format);
        let output = normalize_format(output_format);
        input != output
            && self.supported_input_formats().contains(&input.as_str())
            && self.supported_output_formats().contains(&output.as_str())
    }

    /// Live check that the backend is usable right now.
    async fn is_available(&self) -> bool;

    /// Upper bound for a single conversion.
    fn timeout(&self) -> Duration;

    /// Converts a file, reporting progress on a 0-100 scale.
    async fn convert(
        &self,
        request: EngineRequest,
        progress: ProgressReporter,
    ) -> Result<EngineOutput, EngineError>;

    /// Executable path or server URL, when the engine has one.
    fn location(&self) -> Option<String> {
        None
    }

    /// Backend version string, when obtainable.
    async fn version(&self) -> Option<String> {
        None
    }

    /// One line description for status reports.
    fn description(&self) -> &str;

    /// Builds a status report, probing availability and version.
    async fn status(&self) -> EngineStatus {
        let available = self.is_available().await;
        let version = if available { self.version().await } else { None };
        EngineStatus {
            name: self.name().to_string(),
            kind: self.kind(),
            priority: self.priority(),
            available,
            location: self.location(),
            version,
            description: self.description().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    struct StaticEngine;

    #[async_trait]
    impl Engine for StaticEngine {
        fn name(&self) -> &str {
            "static"
        }

        fn kind(&self) -> EngineKind {
            EngineKind::Library
        }

        fn priority(&self) -> u8 {
            50
        }

        fn supported_input_formats(&self) -> &[&str] {
            &["txt", "docx"]
        }

        fn supported_output_formats(&self) -> &[&str] {
            &["txt", "html"]
        }

        async fn is_available(&self) -> bool {
            true
        }

        fn timeout(&self) -> Duration {
            Duration::from_secs(1)
        }

        async fn convert(
            &self,
            request: EngineRequest,
            progress: ProgressReporter,
        ) -> Result<EngineOutput, EngineError> {
            progress.report(100, "done");
            Ok(EngineOutput {
                output_path: request.output_path,
                output_size_bytes: 0,
                duration_ms: 0,
                message: "ok".to_string(),
            })
        }

        fn description(&self) -> &str {
            "Static test engine"
        }
    }

    #[test]
    fn test_default_can_convert() {
        let engine = StaticEngine;
        assert!(engine.can_convert("txt", "html"));
        assert!(engine.can_convert("DOCX", ".txt"));
        assert!(!engine.can_convert("txt", "txt"));
        assert!(!engine.can_convert("pdf", "txt"));
        assert!(!engine.can_convert("txt", "pdf"));
    }

    #[tokio::test]
    async fn test_default_status() {
        let status = StaticEngine.status().await;
        assert_eq!(status.name, "static");
        assert!(status.available);
        assert!(status.location.is_none());
        assert!(status.version.is_none());
    }

    #[tokio::test]
    async fn test_convert_reports_progress() {
        let (reporter, mut rx) = ProgressReporter::channel();
        let request = EngineRequest {
            job_id: "job-1".to_string(),
            input_path: PathBuf::from("/in/a.txt"),
            output_path: PathBuf::from("/out/a.html"),
            input_format: "txt".to_string(),
            target_format: "html".to_string(),
            quality: Default::default(),
        };
        let output = StaticEngine.convert(request, reporter).await.unwrap();
        assert_eq!(output.output_path, PathBuf::from("/out/a.html"));
        assert_eq!(rx.recv().await.unwrap().percent, 100);
    }
}
