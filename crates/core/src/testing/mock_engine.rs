//! Mock engine for testing.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{RwLock, Semaphore};

use crate::engine::{
    priority, Engine, EngineError, EngineKind, EngineOutput, EngineRequest, ProgressReporter,
};
use crate::format::normalize_format;

/// What a [`MockEngine`] does when asked to convert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockBehavior {
    /// Writes a small output file and succeeds.
    Succeed,
    /// Fails with `Conversion failed: <reason>`.
    Fail(String),
    /// Panics inside `convert`.
    Panic,
    /// Never finishes; only a timeout ends the attempt.
    Hang,
}

/// Mock implementation of the Engine trait.
///
/// Provides controllable behavior for testing:
/// - Record every request for assertions
/// - Succeed, fail, panic or hang on demand
/// - Toggle availability
/// - Hold conversions at a gate until the test releases them
///
/// # Example
///
/// ```rust,ignore
/// use multiconvert_core::testing::{MockBehavior, MockEngine};
///
/// let engine = MockEngine::new("office", &["docx"], &["pdf"])
///     .with_behavior(MockBehavior::Fail("broken".into()));
///
/// // Route a job through it...
///
/// assert_eq!(engine.call_count().await, 1);
/// ```
#[derive(Debug, Clone)]
pub struct MockEngine {
    name: String,
    kind: EngineKind,
    priority: u8,
    inputs: &'static [&'static str],
    outputs: &'static [&'static str],
    /// Pairs accepted by `can_convert` without being declared.
    extra_pairs: Vec<(String, String)>,
    timeout: Duration,
    /// Held until a permit is available, when set.
    gate: Option<Arc<Semaphore>>,
    behavior: Arc<RwLock<MockBehavior>>,
    available: Arc<RwLock<bool>>,
    /// Simulated conversion duration in milliseconds.
    delay_ms: Arc<RwLock<u64>>,
    /// Percentages reported before finishing.
    progress_steps: Arc<RwLock<Vec<u8>>>,
    calls: Arc<RwLock<Vec<EngineRequest>>>,
}

impl MockEngine {
    /// Create an available, succeeding mock engine.
    pub fn new(
        name: &str,
        inputs: &'static [&'static str],
        outputs: &'static [&'static str],
    ) -> Self {
        Self {
            name: name.to_string(),
            kind: EngineKind::Library,
            priority: priority::LIBRARY,
            inputs,
            outputs,
            extra_pairs: Vec::new(),
            timeout: Duration::from_secs(5),
            gate: None,
            behavior: Arc::new(RwLock::new(MockBehavior::Succeed)),
            available: Arc::new(RwLock::new(true)),
            delay_ms: Arc::new(RwLock::new(0)),
            progress_steps: Arc::new(RwLock::new(vec![25, 50, 75])),
            calls: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_kind(mut self, kind: EngineKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Accepts `input -> output` in `can_convert` without declaring either format.
    pub fn with_extra_pair(mut self, input: &str, output: &str) -> Self {
        self.extra_pairs
            .push((normalize_format(input), normalize_format(output)));
        self
    }

    /// Every conversion waits for (and consumes) one permit of `gate`.
    pub fn with_gate(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn with_behavior(self, behavior: MockBehavior) -> Self {
        Self {
            behavior: Arc::new(RwLock::new(behavior)),
            ..self
        }
    }

    pub fn with_available(self, available: bool) -> Self {
        Self {
            available: Arc::new(RwLock::new(available)),
            ..self
        }
    }

    pub fn with_progress_steps(self, steps: Vec<u8>) -> Self {
        Self {
            progress_steps: Arc::new(RwLock::new(steps)),
            ..self
        }
    }

    pub async fn set_behavior(&self, behavior: MockBehavior) {
        *self.behavior.write().await = behavior;
    }

    pub async fn set_available(&self, available: bool) {
        *self.available.write().await = available;
    }

    /// Set the simulated conversion duration.
    pub async fn set_delay(&self, delay: Duration) {
        *self.delay_ms.write().await = delay.as_millis() as u64;
    }

    /// Get all recorded requests.
    pub async fn recorded_calls(&self) -> Vec<EngineRequest> {
        self.calls.read().await.clone()
    }

    /// Get the number of conversions attempted.
    pub async fn call_count(&self) -> usize {
        self.calls.read().await.len()
    }

    /// Clear recorded requests.
    pub async fn clear_recorded(&self) {
        self.calls.write().await.clear();
    }
}

#[async_trait]
impl Engine for MockEngine {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> EngineKind {
        self.kind
    }

    fn priority(&self) -> u8 {
        self.priority
    }

    fn supported_input_formats(&self) -> &[&str] {
        self.inputs
    }

    fn supported_output_formats(&self) -> &[&str] {
        self.outputs
    }

    fn can_convert(&self, input_format: &str, output_format: &str) -> bool {
        let input = normalize_format(input_format);
        let output = normalize_format(output_format);
        if input == output {
            return false;
        }
        let declared = self.inputs.contains(&input.as_str()) && self.outputs.contains(&output.as_str());
        declared
            || self
                .extra_pairs
                .iter()
                .any(|(i, o)| *i == input && *o == output)
    }

    async fn is_available(&self) -> bool {
        *self.available.read().await
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn convert(
        &self,
        request: EngineRequest,
        progress: ProgressReporter,
    ) -> Result<EngineOutput, EngineError> {
        self.calls.write().await.push(request.clone());

        if let Some(gate) = &self.gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }

        let behavior = self.behavior.read().await.clone();
        let steps = self.progress_steps.read().await.clone();
        let delay_ms = *self.delay_ms.read().await;
        let step_delay = delay_ms / (steps.len() as u64 + 1);

        for percent in steps {
            progress.report(percent.min(99), format!("step {}", percent));
            if step_delay > 0 {
                tokio::time::sleep(Duration::from_millis(step_delay)).await;
            }
        }
        if step_delay > 0 {
            tokio::time::sleep(Duration::from_millis(step_delay)).await;
        }

        match behavior {
            MockBehavior::Succeed => {
                if let Some(parent) = request.output_path.parent() {
                    tokio::fs::create_dir_all(parent).await?;
                }
                let body = format!("converted by {}", self.name);
                tokio::fs::write(&request.output_path, &body).await?;
                progress.report(100, "done");
                Ok(EngineOutput {
                    output_path: request.output_path,
                    output_size_bytes: body.len() as u64,
                    duration_ms: delay_ms,
                    message: format!("Converted with {}", self.name),
                })
            }
            MockBehavior::Fail(reason) => Err(EngineError::conversion_failed(reason, None)),
            MockBehavior::Panic => panic!("{} exploded", self.name),
            MockBehavior::Hang => {
                std::future::pending::<()>().await;
                Err(EngineError::conversion_failed("unreachable", None))
            }
        }
    }

    fn description(&self) -> &str {
        "Mock engine for tests"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn request(dir: &std::path::Path) -> EngineRequest {
        EngineRequest {
            job_id: "job-1".to_string(),
            input_path: PathBuf::from("/input/a.docx"),
            output_path: dir.join("a.pdf"),
            input_format: "docx".to_string(),
            target_format: "pdf".to_string(),
            quality: Default::default(),
        }
    }

    #[tokio::test]
    async fn test_succeed_writes_output() {
        let dir = tempfile::tempdir().unwrap();
        let engine = MockEngine::new("office", &["docx"], &["pdf"]);
        let (reporter, mut rx) = ProgressReporter::channel();

        let output = engine.convert(request(dir.path()), reporter).await.unwrap();
        assert!(output.output_path.exists());
        assert_eq!(engine.call_count().await, 1);

        let mut last = 0;
        while let Ok(update) = rx.try_recv() {
            last = update.percent;
        }
        assert_eq!(last, 100);
    }

    #[tokio::test]
    async fn test_failure_never_reports_100() {
        let dir = tempfile::tempdir().unwrap();
        let engine = MockEngine::new("office", &["docx"], &["pdf"])
            .with_behavior(MockBehavior::Fail("broken".to_string()))
            .with_progress_steps(vec![50, 100]);
        let (reporter, _rx) = ProgressReporter::channel();

        let err = engine
            .convert(request(dir.path()), reporter.clone())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Conversion failed: broken");
        assert_eq!(reporter.last_percent(), 99);
        assert!(!dir.path().join("a.pdf").exists());
    }

    #[tokio::test]
    async fn test_availability_toggle() {
        let engine = MockEngine::new("office", &["docx"], &["pdf"]).with_available(false);
        assert!(!engine.is_available().await);
        engine.set_available(true).await;
        assert!(engine.is_available().await);
    }

    #[test]
    fn test_extra_pairs() {
        let engine = MockEngine::new("office", &["docx"], &["pdf"]).with_extra_pair("md", "html");
        assert!(engine.can_convert("docx", "pdf"));
        assert!(engine.can_convert("MD", "html"));
        assert!(!engine.can_convert("html", "md"));
    }
}
