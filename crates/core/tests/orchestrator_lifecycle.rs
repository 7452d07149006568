//! Orchestrator lifecycle integration tests.
//!
//! These tests verify batch runs end to end over mock engines:
//! idle -> validating -> running -> {completed, stopped}

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use tokio::sync::{broadcast, Semaphore};

use multiconvert_core::{
    engine::{priority, Engine},
    testing::{fixtures, MockBehavior, MockEngine},
    ConversionOrchestrator, ConversionRouter, JobStatus, OrchestratorConfig, OrchestratorError,
    QualityTier, RunEvent, RunOptions, RunState,
};

/// Test helper holding the orchestrator, its engine and a scratch directory.
struct TestHarness {
    orchestrator: ConversionOrchestrator,
    engine: MockEngine,
    temp_dir: TempDir,
}

impl TestHarness {
    fn new(engine: MockEngine) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let router = ConversionRouter::new(vec![Arc::new(engine.clone()) as Arc<dyn Engine>]);
        let orchestrator =
            ConversionOrchestrator::new(OrchestratorConfig::default(), Arc::new(router));

        Self {
            orchestrator,
            engine,
            temp_dir,
        }
    }

    fn with_default_engine() -> Self {
        Self::new(
            MockEngine::new("office", &["docx", "txt"], &["pdf"]).with_priority(priority::NATIVE),
        )
    }

    /// Creates input files (missing ones are only named) and returns their paths.
    fn inputs(&self, present: &[&str], missing: &[&str]) -> Vec<PathBuf> {
        let mut paths = Vec::new();
        for name in present {
            paths.push(fixtures::input_file(self.temp_dir.path(), name).unwrap());
        }
        for name in missing {
            paths.push(self.temp_dir.path().join(name));
        }
        paths
    }

    fn options(&self, target: &str) -> RunOptions {
        RunOptions {
            output_dir: self.temp_dir.path().join("converted"),
            target_format: target.to_string(),
            quality: QualityTier::Medium,
        }
    }
}

async fn wait_for_job_start(events: &mut broadcast::Receiver<RunEvent>, wanted: usize) {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if let Ok(RunEvent::JobStarted { index, .. }) = events.recv().await {
                if index == wanted {
                    return;
                }
            }
        }
    })
    .await
    .expect("job never started");
}

#[tokio::test]
async fn test_missing_file_fails_only_its_job() {
    let harness = TestHarness::with_default_engine();
    let mut files = harness.inputs(&["one.docx"], &["two.docx"]);
    files.extend(harness.inputs(&["three.docx"], &[]));

    let started = harness
        .orchestrator
        .start(files, harness.options("pdf"))
        .await
        .unwrap();
    assert_eq!(started.accepted, 3);
    assert!(started.skipped.is_empty());

    let summary = harness.orchestrator.wait().await.unwrap();
    assert_eq!(summary.total, 3);
    assert_eq!(summary.completed, 2);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.pending, 0);

    // The missing file never reached an engine
    assert_eq!(harness.engine.call_count().await, 2);

    let status = harness.orchestrator.status().await;
    assert_eq!(status.state, RunState::Completed);
    assert_eq!(status.progress, 100);
    assert_eq!(status.jobs[0].status, JobStatus::Completed);
    assert_eq!(status.jobs[1].status, JobStatus::Failed);
    assert!(status.jobs[1]
        .message
        .as_deref()
        .unwrap_or_default()
        .contains("not found"));
    assert!(status.jobs[1].engine.is_none());
    assert_eq!(status.jobs[2].status, JobStatus::Completed);
    assert_eq!(status.jobs[2].engine.as_deref(), Some("office"));
    assert!(status.jobs[2].output_path.exists());
    assert!(status.jobs.iter().all(|j| j.finished_at.is_some()));
    assert!(!harness.orchestrator.is_running());
}

#[tokio::test]
async fn test_stop_between_jobs_leaves_rest_pending() {
    let gate = Arc::new(Semaphore::new(0));
    let harness = TestHarness::new(
        MockEngine::new("office", &["docx"], &["pdf"]).with_gate(Arc::clone(&gate)),
    );
    let files = harness.inputs(&["a.docx", "b.docx", "c.docx"], &[]);
    let mut events = harness.orchestrator.subscribe();

    harness
        .orchestrator
        .start(files, harness.options("pdf"))
        .await
        .unwrap();

    wait_for_job_start(&mut events, 0).await;
    assert!(harness.orchestrator.stop());
    gate.add_permits(1);

    let summary = harness.orchestrator.wait().await.unwrap();
    assert_eq!(summary.completed, 1);
    assert_eq!(summary.pending, 2);
    assert_eq!(summary.failed, 0);

    let status = harness.orchestrator.status().await;
    assert_eq!(status.state, RunState::Stopped);
    assert_eq!(status.jobs[0].status, JobStatus::Completed);
    assert_eq!(status.jobs[1].status, JobStatus::Pending);
    assert_eq!(status.jobs[2].status, JobStatus::Pending);
    assert_eq!(harness.engine.call_count().await, 1);
}

#[tokio::test]
async fn test_second_start_is_rejected_while_running() {
    let gate = Arc::new(Semaphore::new(0));
    let harness = TestHarness::new(
        MockEngine::new("office", &["docx"], &["pdf"]).with_gate(Arc::clone(&gate)),
    );
    let files = harness.inputs(&["a.docx"], &[]);
    let mut events = harness.orchestrator.subscribe();

    harness
        .orchestrator
        .start(files.clone(), harness.options("pdf"))
        .await
        .unwrap();
    wait_for_job_start(&mut events, 0).await;

    let err = harness
        .orchestrator
        .start(files, harness.options("pdf"))
        .await
        .unwrap_err();
    assert!(matches!(err, OrchestratorError::AlreadyRunning));
    assert!(matches!(
        harness.orchestrator.clear().await,
        Err(OrchestratorError::RunActive(_))
    ));

    let status = harness.orchestrator.status().await;
    assert_eq!(status.state, RunState::Running);
    assert_eq!(status.current_job, Some(0));
    assert_eq!(status.jobs[0].status, JobStatus::Processing);

    gate.add_permits(1);
    let summary = harness.orchestrator.wait().await.unwrap();
    assert_eq!(summary.completed, 1);
}

#[tokio::test]
async fn test_validation_drops_unroutable_files() {
    let harness = TestHarness::with_default_engine();
    let files = harness.inputs(&["keep.docx", "same.pdf", "clip.mp4", "notes.xyz"], &[]);

    let started = harness
        .orchestrator
        .start(files, harness.options("pdf"))
        .await
        .unwrap();
    assert_eq!(started.accepted, 1);

    let skipped: Vec<_> = started
        .skipped
        .iter()
        .map(|s| s.path.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(skipped, ["same.pdf", "clip.mp4", "notes.xyz"]);
    assert!(started.skipped[0].reason.contains("pdf"));
    assert!(started.skipped[1].reason.contains("no engine converts mp4 to pdf"));

    let summary = harness.orchestrator.wait().await.unwrap();
    assert_eq!(summary.total, 1);
    assert_eq!(summary.completed, 1);
    assert_eq!(harness.orchestrator.status().await.skipped, started.skipped);
}

#[tokio::test]
async fn test_run_rejected_without_valid_jobs() {
    let harness = TestHarness::with_default_engine();

    let err = harness
        .orchestrator
        .start(Vec::new(), harness.options("pdf"))
        .await
        .unwrap_err();
    assert!(matches!(err, OrchestratorError::NoFiles));
    assert_eq!(harness.orchestrator.status().await.state, RunState::Failed);

    let files = harness.inputs(&["report.pdf"], &[]);
    let err = harness
        .orchestrator
        .start(files, harness.options("pdf"))
        .await
        .unwrap_err();
    assert!(matches!(err, OrchestratorError::NoValidJobs(1)));

    let status = harness.orchestrator.status().await;
    assert_eq!(status.state, RunState::Failed);
    assert!(status.jobs.is_empty());
    assert_eq!(status.skipped.len(), 1);
    assert!(status.error.is_some());
    assert_eq!(harness.engine.call_count().await, 0);
    assert!(!harness.orchestrator.is_running());
}

#[tokio::test]
async fn test_unusable_output_dir_rejects_run() {
    let harness = TestHarness::with_default_engine();
    let files = harness.inputs(&["a.docx"], &[]);
    let blocker = fixtures::input_file(harness.temp_dir.path(), "blocker").unwrap();

    let err = harness
        .orchestrator
        .start(
            files,
            RunOptions {
                output_dir: blocker.join("nested"),
                target_format: "pdf".to_string(),
                quality: QualityTier::Low,
            },
        )
        .await
        .unwrap_err();

    assert!(matches!(err, OrchestratorError::OutputDir { .. }));
    assert_eq!(harness.engine.call_count().await, 0);
}

#[tokio::test]
async fn test_failed_engine_marks_job_failed() {
    let harness = TestHarness::new(
        MockEngine::new("office", &["docx"], &["pdf"])
            .with_behavior(MockBehavior::Fail("fonts missing".to_string())),
    );
    let files = harness.inputs(&["a.docx"], &[]);

    harness
        .orchestrator
        .start(files, harness.options("pdf"))
        .await
        .unwrap();
    let summary = harness.orchestrator.wait().await.unwrap();
    assert_eq!(summary.failed, 1);

    let status = harness.orchestrator.status().await;
    assert_eq!(status.state, RunState::Completed);
    assert_eq!(
        status.jobs[0].message.as_deref(),
        Some("Conversion failed: fonts missing")
    );
}

#[tokio::test]
async fn test_events_and_progress_are_ordered() {
    let harness = TestHarness::with_default_engine();
    let files = harness.inputs(&["a.docx", "b.txt"], &[]);
    let mut events = harness.orchestrator.subscribe();

    harness
        .orchestrator
        .start(files, harness.options("pdf"))
        .await
        .unwrap();
    harness.orchestrator.wait().await.unwrap();

    let mut started = Vec::new();
    let mut finished = Vec::new();
    let mut overall = Vec::new();
    let mut run_finished = None;
    while let Ok(event) = events.try_recv() {
        match event {
            RunEvent::JobStarted { index, .. } => started.push(index),
            RunEvent::JobFinished { index, status, .. } => finished.push((index, status)),
            RunEvent::Progress {
                overall_percent, ..
            } => overall.push(overall_percent),
            RunEvent::RunFinished { state, summary } => run_finished = Some((state, summary)),
        }
    }

    assert_eq!(started, [0, 1]);
    assert_eq!(
        finished,
        [(0, JobStatus::Completed), (1, JobStatus::Completed)]
    );
    assert!(overall.windows(2).all(|w| w[0] <= w[1]));
    assert!(overall.iter().all(|p| *p <= 100));

    let (state, summary) = run_finished.expect("run finished event");
    assert_eq!(state, RunState::Completed);
    assert_eq!(summary.completed, 2);
}

#[tokio::test]
async fn test_clear_and_rerun() {
    let harness = TestHarness::with_default_engine();
    let files = harness.inputs(&["a.docx"], &[]);

    harness
        .orchestrator
        .start(files.clone(), harness.options("pdf"))
        .await
        .unwrap();
    harness.orchestrator.wait().await.unwrap();

    harness.orchestrator.clear().await.unwrap();
    let status = harness.orchestrator.status().await;
    assert_eq!(status.state, RunState::Idle);
    assert!(status.jobs.is_empty());

    harness
        .orchestrator
        .start(files, harness.options("pdf"))
        .await
        .unwrap();
    let summary = harness.orchestrator.wait().await.unwrap();
    assert_eq!(summary.completed, 1);
    assert_eq!(harness.engine.call_count().await, 2);
}
