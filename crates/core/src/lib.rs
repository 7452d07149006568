pub mod config;
pub mod engine;
pub mod format;
pub mod metrics;
pub mod orchestrator;
pub mod router;
pub mod testing;

pub use config::{load_config, load_config_from_str, validate_config, Config, ConfigError};
pub use engine::{
    build_engines, Engine, EngineError, EngineKind, EngineOutput, EngineRequest, EngineStatus,
    EnginesConfig, ProgressReporter, ProgressUpdate, QualityTier,
};
pub use format::{category_of, detect_category, output_path_for, MediaCategory};
pub use orchestrator::{
    ConversionJob, ConversionOrchestrator, JobStatus, OrchestratorConfig, OrchestratorError,
    RunEvent, RunOptions, RunStart, RunState, RunStatus, RunSummary, SkippedFile,
};
pub use router::{
    CapabilityMatrix, ConversionRouter, ConversionStrategy, RouteError, RouteRequest,
    RouteSuccess,
};
