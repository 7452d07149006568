//! Conversion orchestrator implementation.
//!
//! Drives one batch run at a time on a background task:
//! - Validation: builds the job list, dropping files that cannot be routed
//! - Running: converts jobs strictly one after another through the router
//! - Stop: cooperative, checked between jobs

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tokio::sync::{broadcast, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::engine::{ProgressReporter, ProgressUpdate};
use crate::metrics;
use crate::router::ConversionRouter;

use super::config::OrchestratorConfig;
use super::types::{
    overall_progress, ConversionJob, JobStatus, OrchestratorError, RunEvent, RunOptions, RunState,
    RunStart, RunStatus, RunSummary, SkippedFile,
};

/// Mutable run state. Only the run worker touches jobs while a run is active.
#[derive(Debug, Default)]
struct RunData {
    state: RunState,
    progress: u8,
    current_job: Option<usize>,
    jobs: Vec<ConversionJob>,
    skipped: Vec<SkippedFile>,
    error: Option<String>,
}

impl RunData {
    fn snapshot(&self) -> RunStatus {
        RunStatus {
            state: self.state,
            progress: self.progress,
            current_job: self.current_job,
            jobs: self.jobs.clone(),
            skipped: self.skipped.clone(),
            summary: RunSummary::from_jobs(&self.jobs),
            error: self.error.clone(),
        }
    }
}

/// Handles shared between the orchestrator and its run worker.
#[derive(Clone)]
struct RunContext {
    router: Arc<ConversionRouter>,
    data: Arc<RwLock<RunData>>,
    running: Arc<AtomicBool>,
    stop_requested: Arc<AtomicBool>,
    events_tx: broadcast::Sender<RunEvent>,
}

/// The conversion orchestrator - runs batches of jobs through the router.
pub struct ConversionOrchestrator {
    config: OrchestratorConfig,
    ctx: RunContext,
    worker: Mutex<Option<JoinHandle<RunSummary>>>,
}

impl ConversionOrchestrator {
    /// Create a new orchestrator.
    pub fn new(config: OrchestratorConfig, router: Arc<ConversionRouter>) -> Self {
        let (events_tx, _) = broadcast::channel(config.event_capacity.max(1));

        Self {
            config,
            ctx: RunContext {
                router,
                data: Arc::new(RwLock::new(RunData::default())),
                running: Arc::new(AtomicBool::new(false)),
                stop_requested: Arc::new(AtomicBool::new(false)),
                events_tx,
            },
            worker: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn router(&self) -> &ConversionRouter {
        &self.ctx.router
    }

    /// Whether a run is validating or running.
    pub fn is_running(&self) -> bool {
        self.ctx.running.load(Ordering::SeqCst)
    }

    /// Validates `files` and starts converting them in the background.
    ///
    /// Files targeting their own format and files no engine can convert are
    /// dropped with a warning and listed in the returned [`RunStart`]. Missing
    /// files are accepted and fail when their turn comes.
    pub async fn start(
        &self,
        files: Vec<PathBuf>,
        options: RunOptions,
    ) -> Result<RunStart, OrchestratorError> {
        if self.ctx.running.swap(true, Ordering::SeqCst) {
            warn!("Conversion run already active");
            return Err(OrchestratorError::AlreadyRunning);
        }

        info!(
            "Starting conversion run: {} file(s) to {} ({})",
            files.len(),
            options.target_format,
            options.quality
        );

        self.ctx.stop_requested.store(false, Ordering::SeqCst);
        *self.ctx.data.write().await = RunData {
            state: RunState::Validating,
            ..RunData::default()
        };

        let mut skipped = Vec::new();
        let jobs = match self.validate(&files, &options, &mut skipped).await {
            Ok(jobs) => jobs,
            Err(e) => {
                error!("Conversion run rejected: {}", e);
                {
                    let mut data = self.ctx.data.write().await;
                    data.state = RunState::Failed;
                    data.skipped = skipped;
                    data.error = Some(e.to_string());
                }
                metrics::RUNS_TOTAL
                    .with_label_values(&[RunState::Failed.as_str()])
                    .inc();
                self.ctx.running.store(false, Ordering::SeqCst);
                return Err(e);
            }
        };

        let started = RunStart {
            accepted: jobs.len(),
            skipped: skipped.clone(),
        };
        {
            let mut data = self.ctx.data.write().await;
            data.jobs = jobs;
            data.skipped = skipped;
            data.state = RunState::Running;
        }

        let ctx = self.ctx.clone();
        let inner = tokio::spawn(run_jobs(ctx.clone()));
        let handle = tokio::spawn(async move { supervise(inner, &ctx).await });
        *self.worker.lock().await = Some(handle);

        info!(
            "Conversion run started with {} job(s), {} skipped",
            started.accepted,
            started.skipped.len()
        );
        Ok(started)
    }

    /// Builds the job list for a run, recording dropped files in `skipped`.
    async fn validate(
        &self,
        files: &[PathBuf],
        options: &RunOptions,
        skipped: &mut Vec<SkippedFile>,
    ) -> Result<Vec<ConversionJob>, OrchestratorError> {
        if files.is_empty() {
            return Err(OrchestratorError::NoFiles);
        }

        tokio::fs::create_dir_all(&options.output_dir)
            .await
            .map_err(|e| OrchestratorError::OutputDir {
                path: options.output_dir.clone(),
                reason: e.to_string(),
            })?;

        let mut jobs = Vec::with_capacity(files.len());
        for file in files {
            let job = match ConversionJob::new(
                file,
                &options.output_dir,
                &options.target_format,
                options.quality,
            ) {
                Ok(job) => job,
                Err(e) => {
                    warn!("Skipping {}: {}", file.display(), e);
                    skipped.push(SkippedFile {
                        path: file.clone(),
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            if self
                .ctx
                .router
                .matrix()
                .candidates(&job.input_format, &job.target_format)
                .is_empty()
            {
                let reason = format!(
                    "no engine converts {} to {}",
                    job.input_format, job.target_format
                );
                warn!("Skipping {}: {}", file.display(), reason);
                skipped.push(SkippedFile {
                    path: file.clone(),
                    reason,
                });
                continue;
            }

            if !file.exists() {
                debug!("{} does not exist; its job will fail", file.display());
            }
            jobs.push(job);
        }

        if jobs.is_empty() {
            return Err(OrchestratorError::NoValidJobs(files.len()));
        }
        Ok(jobs)
    }

    /// Asks the active run to stop after the current job.
    ///
    /// Returns false when no run is active.
    pub fn stop(&self) -> bool {
        if !self.ctx.running.load(Ordering::SeqCst) {
            warn!("No conversion run to stop");
            return false;
        }

        info!("Stopping conversion run after the current job");
        self.ctx.stop_requested.store(true, Ordering::SeqCst);
        true
    }

    /// Get a snapshot of the current or last run.
    pub async fn status(&self) -> RunStatus {
        self.ctx.data.read().await.snapshot()
    }

    /// Subscribe to run events.
    pub fn subscribe(&self) -> broadcast::Receiver<RunEvent> {
        self.ctx.events_tx.subscribe()
    }

    /// Waits for the active run to finish and returns its summary.
    ///
    /// Only the first caller waits on the worker. Later calls, or calls with no
    /// run started, return the summary of the current job list.
    pub async fn wait(&self) -> Result<RunSummary, OrchestratorError> {
        let handle = self.worker.lock().await.take();
        match handle {
            Some(handle) => handle
                .await
                .map_err(|e| OrchestratorError::Worker(e.to_string())),
            None => Ok(RunSummary::from_jobs(&self.ctx.data.read().await.jobs)),
        }
    }

    /// Empties the job list and resets to idle.
    pub async fn clear(&self) -> Result<(), OrchestratorError> {
        if self.ctx.running.load(Ordering::SeqCst) {
            return Err(OrchestratorError::RunActive("clear jobs"));
        }

        *self.ctx.data.write().await = RunData::default();
        self.worker.lock().await.take();
        debug!("Job list cleared");
        Ok(())
    }
}

/// Converts every job in order until done or asked to stop.
async fn run_jobs(ctx: RunContext) -> RunState {
    let total = ctx.data.read().await.jobs.len();

    for index in 0..total {
        if ctx.stop_requested.load(Ordering::SeqCst) {
            info!("Run stopped with {} job(s) left pending", total - index);
            return RunState::Stopped;
        }
        process_job(&ctx, index, total).await;
    }

    RunState::Completed
}

async fn process_job(ctx: &RunContext, index: usize, total: usize) {
    let job = {
        let mut data = ctx.data.write().await;
        data.current_job = Some(index);
        let job = &mut data.jobs[index];
        job.status = JobStatus::Processing;
        job.started_at = Some(Utc::now());
        job.clone()
    };

    info!(
        "Job {}/{}: converting {} to {}",
        index + 1,
        total,
        job.file_name(),
        job.target_format
    );
    let _ = ctx.events_tx.send(RunEvent::JobStarted {
        index,
        job_id: job.id.clone(),
        input_path: job.input_path.clone(),
    });

    let started = Instant::now();
    let request = job.route_request();
    let (reporter, mut rx) = ProgressReporter::channel();

    let result = {
        let convert = ctx.router.convert(&request, &reporter);
        tokio::pin!(convert);
        loop {
            tokio::select! {
                result = &mut convert => break result,
                Some(update) = rx.recv() => apply_progress(ctx, index, total, update).await,
            }
        }
    };
    while let Ok(update) = rx.try_recv() {
        apply_progress(ctx, index, total, update).await;
    }

    let (status, message, engine) = match result {
        Ok(success) => {
            let message = success.message().to_string();
            info!(
                "Job {}/{} completed by {}: {}",
                index + 1,
                total,
                success.engine,
                message
            );
            (JobStatus::Completed, message, Some(success.engine))
        }
        Err(e) => {
            warn!("Job {}/{} failed: {}", index + 1, total, e);
            (JobStatus::Failed, e.to_string(), None)
        }
    };

    metrics::JOBS_TOTAL
        .with_label_values(&[status.as_str()])
        .inc();
    metrics::JOB_DURATION
        .with_label_values(&[status.as_str()])
        .observe(started.elapsed().as_secs_f64());

    {
        let mut data = ctx.data.write().await;
        let job = &mut data.jobs[index];
        job.status = status;
        job.message = Some(message.clone());
        job.engine = engine.clone();
        job.finished_at = Some(Utc::now());
        if status == JobStatus::Completed {
            job.progress = 100;
        }
        data.progress = data.progress.max(overall_progress(index + 1, 0, total));
        data.current_job = None;
    }

    let _ = ctx.events_tx.send(RunEvent::JobFinished {
        index,
        job_id: job.id,
        status,
        message,
        engine,
    });
}

async fn apply_progress(ctx: &RunContext, index: usize, total: usize, update: ProgressUpdate) {
    let overall = {
        let mut data = ctx.data.write().await;
        let job = &mut data.jobs[index];
        job.progress = job.progress.max(update.percent);
        let job_percent = job.progress;
        data.progress = data
            .progress
            .max(overall_progress(index, job_percent, total));
        data.progress
    };

    let _ = ctx.events_tx.send(RunEvent::Progress {
        index,
        job_percent: update.percent,
        overall_percent: overall,
        message: update.message,
    });
}

/// Awaits the run worker and records how the run ended.
///
/// A panicking worker ends the run `failed`; the job it was on is marked
/// failed so every job still ends in a terminal or pending state.
async fn supervise(inner: JoinHandle<RunState>, ctx: &RunContext) -> RunSummary {
    let (state, reason) = match inner.await {
        Ok(state) => (state, None),
        Err(e) => {
            let reason = if e.is_panic() {
                "run worker panicked".to_string()
            } else {
                "run worker was cancelled".to_string()
            };
            error!("Conversion run failed: {}", reason);
            (RunState::Failed, Some(reason))
        }
    };

    let summary = {
        let mut data = ctx.data.write().await;
        data.state = state;
        data.current_job = None;
        if state == RunState::Completed {
            data.progress = 100;
        }
        if let Some(reason) = reason {
            for job in data
                .jobs
                .iter_mut()
                .filter(|j| j.status == JobStatus::Processing)
            {
                job.status = JobStatus::Failed;
                job.message = Some(reason.clone());
                job.finished_at = Some(Utc::now());
            }
            data.error = Some(reason);
        }
        RunSummary::from_jobs(&data.jobs)
    };

    metrics::RUNS_TOTAL
        .with_label_values(&[state.as_str()])
        .inc();
    info!("Conversion run {}: {}", state, summary);

    ctx.running.store(false, Ordering::SeqCst);
    let _ = ctx.events_tx.send(RunEvent::RunFinished { state, summary });
    summary
}
