//! Conversion orchestrator for batch runs.
//!
//! The orchestrator owns the job list of one run and drives it through the
//! router:
//! - **Validation**: one job per accepted file, rejected runs never start
//! - **Running**: sequential, one job at a time in submission order
//! - **Stop**: cooperative, honoured between jobs

mod config;
mod runner;
mod types;

pub use config::OrchestratorConfig;
pub use runner::ConversionOrchestrator;
pub use types::{
    overall_progress, ConversionJob, JobStatus, OrchestratorError, RunEvent, RunOptions,
    RunStart, RunState, RunStatus, RunSummary, SkippedFile,
};
