//! Types for the conversion orchestrator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::engine::QualityTier;
use crate::format::{category_of, extension_of, normalize_format, output_path_for};
use crate::router::{RouteError, RouteRequest};

/// Errors that can occur during orchestration.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// A run is already validating or running.
    #[error("a conversion run is already active")]
    AlreadyRunning,

    /// The operation needs the current run to finish first.
    #[error("cannot {0} while a run is active")]
    RunActive(&'static str),

    /// Start was called with an empty file list.
    #[error("no files to convert")]
    NoFiles,

    /// Every file was dropped during validation.
    #[error("none of the {0} file(s) can be converted to the requested format")]
    NoValidJobs(usize),

    /// The destination directory does not exist and could not be created.
    #[error("output directory {path} is not usable: {reason}")]
    OutputDir { path: PathBuf, reason: String },

    /// The run task itself died.
    #[error("run worker failed: {0}")]
    Worker(String),
}

/// Status of one conversion job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Completed and failed jobs never change again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One file in a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionJob {
    pub id: String,
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub input_format: String,
    pub target_format: String,
    pub quality: QualityTier,
    pub status: JobStatus,
    /// Job progress, 0-100.
    pub progress: u8,
    /// Success message or failure reason once the job is finished.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Engine that produced the output.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub engine: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl ConversionJob {
    /// Creates a pending job writing `<output_dir>/<stem>.<target>`.
    ///
    /// Fails when the input has no known extension, when the target is not
    /// a known format, or when both are the same format. The input file is not
    /// checked here; a missing file fails the job when it runs.
    pub fn new(
        input_path: impl AsRef<Path>,
        output_dir: impl AsRef<Path>,
        target_format: &str,
        quality: QualityTier,
    ) -> Result<Self, RouteError> {
        let input_path = input_path.as_ref();
        let target_format = normalize_format(target_format);
        let input_format =
            extension_of(input_path).ok_or_else(|| RouteError::UnsupportedFormat {
                format: input_path.display().to_string(),
            })?;

        if input_format == target_format {
            return Err(RouteError::SameFormat {
                format: input_format,
            });
        }
        if category_of(&input_format).is_none() {
            return Err(RouteError::UnsupportedFormat {
                format: input_format,
            });
        }
        if category_of(&target_format).is_none() {
            return Err(RouteError::UnsupportedFormat {
                format: target_format,
            });
        }

        Ok(Self {
            id: uuid::Uuid::new_v4().to_string(),
            input_path: input_path.to_path_buf(),
            output_path: output_path_for(input_path, output_dir.as_ref(), &target_format),
            input_format,
            target_format,
            quality,
            status: JobStatus::Pending,
            progress: 0,
            message: None,
            engine: None,
            started_at: None,
            finished_at: None,
        })
    }

    /// Router request for this job.
    pub fn route_request(&self) -> RouteRequest {
        RouteRequest {
            job_id: self.id.clone(),
            input_path: self.input_path.clone(),
            output_path: self.output_path.clone(),
            target_format: self.target_format.clone(),
            quality: self.quality,
        }
    }

    /// Input file name for log lines.
    pub fn file_name(&self) -> String {
        self.input_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.input_path.display().to_string())
    }
}

/// Run-level state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    #[default]
    Idle,
    Validating,
    Running,
    Completed,
    Stopped,
    Failed,
}

impl RunState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Validating => "validating",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Stopped => "stopped",
            Self::Failed => "failed",
        }
    }

    /// Whether a run currently owns the job list.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Validating | Self::Running)
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Options shared by every job of a run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub output_dir: PathBuf,
    pub target_format: String,
    pub quality: QualityTier,
}

/// A file left out of a run during validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}

/// What `start` accepted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStart {
    /// Number of jobs queued.
    pub accepted: usize,
    /// Files dropped before the run began, in submission order.
    pub skipped: Vec<SkippedFile>,
}

/// Tally of job outcomes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    /// Jobs not yet finished, including one still processing.
    pub pending: usize,
}

impl RunSummary {
    pub fn from_jobs(jobs: &[ConversionJob]) -> Self {
        let mut summary = Self {
            total: jobs.len(),
            ..Self::default()
        };
        for job in jobs {
            match job.status {
                JobStatus::Completed => summary.completed += 1,
                JobStatus::Failed => summary.failed += 1,
                JobStatus::Pending | JobStatus::Processing => summary.pending += 1,
            }
        }
        summary
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} total, {} completed, {} failed, {} pending",
            self.total, self.completed, self.failed, self.pending
        )
    }
}

/// Snapshot of the orchestrator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunStatus {
    pub state: RunState,
    /// Overall run progress, 0-100.
    pub progress: u8,
    /// Index of the job being processed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_job: Option<usize>,
    pub jobs: Vec<ConversionJob>,
    /// Files dropped during validation.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<SkippedFile>,
    pub summary: RunSummary,
    /// Reason the run failed, when it did.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Events broadcast while a run executes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunEvent {
    JobStarted {
        index: usize,
        job_id: String,
        input_path: PathBuf,
    },
    Progress {
        index: usize,
        job_percent: u8,
        overall_percent: u8,
        message: String,
    },
    JobFinished {
        index: usize,
        job_id: String,
        status: JobStatus,
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        engine: Option<String>,
    },
    RunFinished {
        state: RunState,
        summary: RunSummary,
    },
}

/// Overall progress of a run: `(100 * index + job_percent) / total`.
pub fn overall_progress(index: usize, job_percent: u8, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    let done = 100 * index + usize::from(job_percent.min(100));
    (done / total).min(100) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_rejects_same_format() {
        let err = ConversionJob::new("/in/report.pdf", "/out", "PDF", QualityTier::Medium)
            .unwrap_err();
        assert!(matches!(err, RouteError::SameFormat { ref format } if format == "pdf"));
    }

    #[test]
    fn test_job_rejects_unknown_formats() {
        assert!(matches!(
            ConversionJob::new("/in/archive.xyz", "/out", "pdf", QualityTier::Low),
            Err(RouteError::UnsupportedFormat { .. })
        ));
        assert!(matches!(
            ConversionJob::new("/in/report.docx", "/out", "xyz", QualityTier::Low),
            Err(RouteError::UnsupportedFormat { .. })
        ));
        assert!(matches!(
            ConversionJob::new("/in/Makefile", "/out", "pdf", QualityTier::Low),
            Err(RouteError::UnsupportedFormat { .. })
        ));
    }

    #[test]
    fn test_job_output_path() {
        let job = ConversionJob::new("/in/report.docx", "/out", ".PDF", QualityTier::High).unwrap();
        assert_eq!(job.output_path, PathBuf::from("/out/report.pdf"));
        assert_eq!(job.input_format, "docx");
        assert_eq!(job.target_format, "pdf");
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.file_name(), "report.docx");

        let request = job.route_request();
        assert_eq!(request.job_id, job.id);
        assert_eq!(request.quality, QualityTier::High);
    }

    #[test]
    fn test_overall_progress() {
        assert_eq!(overall_progress(0, 0, 3), 0);
        assert_eq!(overall_progress(0, 50, 2), 25);
        assert_eq!(overall_progress(1, 0, 2), 50);
        assert_eq!(overall_progress(2, 100, 3), 100);
        assert_eq!(overall_progress(0, 100, 0), 0);
    }

    #[test]
    fn test_summary_from_jobs() {
        let mut jobs: Vec<ConversionJob> = ["a.docx", "b.docx", "c.docx", "d.docx"]
            .iter()
            .map(|f| ConversionJob::new(f, "/out", "pdf", QualityTier::Medium).unwrap())
            .collect();
        jobs[0].status = JobStatus::Completed;
        jobs[1].status = JobStatus::Failed;
        jobs[2].status = JobStatus::Processing;

        let summary = RunSummary::from_jobs(&jobs);
        assert_eq!(
            summary,
            RunSummary {
                total: 4,
                completed: 1,
                failed: 1,
                pending: 2,
            }
        );
        assert_eq!(
            summary.to_string(),
            "4 total, 1 completed, 1 failed, 2 pending"
        );
    }

    #[test]
    fn test_run_state() {
        assert!(RunState::Running.is_active());
        assert!(RunState::Validating.is_active());
        assert!(!RunState::Stopped.is_active());
        assert_eq!(RunState::default(), RunState::Idle);
        assert!(JobStatus::Failed.is_terminal());
        assert!(!JobStatus::Processing.is_terminal());
    }

    #[test]
    fn test_event_serialization() {
        let event = RunEvent::RunFinished {
            state: RunState::Stopped,
            summary: RunSummary::default(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"run_finished\""));
        assert!(json.contains("\"state\":\"stopped\""));
    }
}
