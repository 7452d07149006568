//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Router (engine attempts and their outcomes)
//! - Orchestrator (jobs and runs)

use once_cell::sync::Lazy;
use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder};

// =============================================================================
// Router - Engine Metrics
// =============================================================================

/// Engine attempts by engine and outcome.
pub static ENGINE_ATTEMPTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "multiconvert_engine_attempts_total",
            "Total conversion attempts per engine",
        ),
        &["engine", "outcome"], // "succeeded", "failed", "timed_out", "unavailable"
    )
    .unwrap()
});

/// Engine attempt duration in seconds.
pub static ENGINE_ATTEMPT_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "multiconvert_engine_attempt_duration_seconds",
            "Duration of a single engine attempt",
        )
        .buckets(vec![0.1, 0.5, 1.0, 5.0, 15.0, 30.0, 60.0, 300.0, 900.0, 3600.0]),
        &["engine"],
    )
    .unwrap()
});

// =============================================================================
// Orchestrator - Job Metrics
// =============================================================================

/// Jobs finished by result.
pub static JOBS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("multiconvert_jobs_total", "Total conversion jobs finished"),
        &["result"], // "completed", "failed"
    )
    .unwrap()
});

/// Job duration in seconds, including every fallback attempt.
pub static JOB_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "multiconvert_job_duration_seconds",
            "Duration of a conversion job",
        )
        .buckets(vec![0.1, 0.5, 1.0, 5.0, 15.0, 30.0, 60.0, 300.0, 900.0, 3600.0]),
        &["result"],
    )
    .unwrap()
});

/// Runs finished by outcome.
pub static RUNS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("multiconvert_runs_total", "Total batch runs finished"),
        &["outcome"], // "completed", "stopped", "failed"
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Router
        Box::new(ENGINE_ATTEMPTS.clone()),
        Box::new(ENGINE_ATTEMPT_DURATION.clone()),
        // Orchestrator
        Box::new(JOBS_TOTAL.clone()),
        Box::new(JOB_DURATION.clone()),
        Box::new(RUNS_TOTAL.clone()),
    ]
}

/// Creates a registry holding every core metric.
pub fn registry() -> Result<Registry, prometheus::Error> {
    let registry = Registry::new();
    for metric in all_metrics() {
        registry.register(metric)?;
    }
    Ok(registry)
}

/// Renders a registry in the Prometheus text exposition format.
pub fn render(registry: &Registry) -> Result<String, prometheus::Error> {
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&registry.gather(), &mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}
