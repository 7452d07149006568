//! Conversion router: candidate selection and sequential fallback.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use super::error::RouteError;
use super::matrix::CapabilityMatrix;
use super::progress::{candidate_budget, map_progress};
use super::types::{ConversionStrategy, RouteRequest, RouteSuccess, StrategyEntry};
use crate::engine::{Engine, EngineOutput, EngineRequest, EngineStatus, ProgressReporter};
use crate::format::{category_of, extension_of, normalize_format};
use crate::metrics;

/// Routes conversion jobs to engines, falling back through candidates.
#[derive(Debug, Clone)]
pub struct ConversionRouter {
    matrix: CapabilityMatrix,
}

impl ConversionRouter {
    /// Creates a router over the given engines.
    pub fn new(engines: Vec<Arc<dyn Engine>>) -> Self {
        Self::from_matrix(CapabilityMatrix::build(engines))
    }

    pub fn from_matrix(matrix: CapabilityMatrix) -> Self {
        Self { matrix }
    }

    pub fn matrix(&self) -> &CapabilityMatrix {
        &self.matrix
    }

    /// Ordered engines that would be tried for a pair.
    pub fn strategy(&self, input_format: &str, output_format: &str) -> ConversionStrategy {
        let engines = self
            .matrix
            .candidates(input_format, output_format)
            .iter()
            .map(|e| StrategyEntry {
                engine: e.name().to_string(),
                kind: e.kind(),
                priority: e.priority(),
            })
            .collect();

        ConversionStrategy {
            input_format: normalize_format(input_format),
            output_format: normalize_format(output_format),
            inferred: self.matrix.is_inferred(input_format, output_format),
            engines,
        }
    }

    /// Status of every registered engine, in priority order.
    pub async fn engines_status(&self) -> Vec<EngineStatus> {
        let mut statuses = Vec::with_capacity(self.matrix.engines().len());
        for engine in self.matrix.engines() {
            statuses.push(engine.status().await);
        }
        statuses
    }

    /// Validates a request and returns the normalised `(input, output)` formats.
    pub fn validate(&self, request: &RouteRequest) -> Result<(String, String), RouteError> {
        let target = normalize_format(&request.target_format);
        let input = extension_of(&request.input_path).ok_or_else(|| {
            RouteError::UnsupportedFormat {
                format: request.input_path.display().to_string(),
            }
        })?;

        if input == target {
            return Err(RouteError::SameFormat { format: input });
        }
        if category_of(&input).is_none() {
            return Err(RouteError::UnsupportedFormat { format: input });
        }
        if category_of(&target).is_none() {
            return Err(RouteError::UnsupportedFormat { format: target });
        }
        Ok((input, target))
    }

    /// Converts one file, trying each candidate engine in order.
    ///
    /// Progress reported on `progress` is job-level and never decreases. It
    /// only reaches 100 once an engine succeeded.
    pub async fn convert(
        &self,
        request: &RouteRequest,
        progress: &ProgressReporter,
    ) -> Result<RouteSuccess, RouteError> {
        let (input, output) = self.validate(request)?;

        if !request.input_path.exists() {
            return Err(RouteError::FileNotFound {
                path: request.input_path.clone(),
            });
        }

        let candidates = self.matrix.candidates(&input, &output);
        if candidates.is_empty() {
            return Err(RouteError::NoCandidateEngine { input, output });
        }

        let budget = candidate_budget(candidates.len());
        let mut base = 0.0;
        let mut attempts: Vec<RouteError> = Vec::new();

        debug!(
            "Job {}: {} candidate(s) for {} -> {}",
            request.job_id,
            candidates.len(),
            input,
            output
        );

        for engine in candidates {
            let name = engine.name().to_string();

            if !engine.can_convert(&input, &output) || !engine.is_available().await {
                warn!("Job {}: skipping {} (not available)", request.job_id, name);
                metrics::ENGINE_ATTEMPTS
                    .with_label_values(&[name.as_str(), "unavailable"])
                    .inc();
                attempts.push(RouteError::EngineUnavailable { engine: name });
                base += budget;
                continue;
            }

            info!(
                "Job {}: trying {} for {} -> {}",
                request.job_id, name, input, output
            );

            let engine_request = EngineRequest {
                job_id: request.job_id.clone(),
                input_path: request.input_path.clone(),
                output_path: request.output_path.clone(),
                input_format: input.clone(),
                target_format: output.clone(),
                quality: request.quality,
            };

            let started = Instant::now();
            let result =
                run_attempt(Arc::clone(&engine), engine_request, progress, base, budget).await;
            metrics::ENGINE_ATTEMPT_DURATION
                .with_label_values(&[name.as_str()])
                .observe(started.elapsed().as_secs_f64());

            match result {
                Ok(engine_output) => {
                    metrics::ENGINE_ATTEMPTS
                        .with_label_values(&[name.as_str(), "succeeded"])
                        .inc();
                    info!(
                        "Job {}: {} succeeded in {} ms",
                        request.job_id, name, engine_output.duration_ms
                    );
                    progress.report(100, engine_output.message.clone());
                    return Ok(RouteSuccess {
                        engine: name,
                        output: engine_output,
                        failed_attempts: attempts,
                    });
                }
                Err(failure) => {
                    let outcome = match failure {
                        RouteError::EngineFailure {
                            timed_out: true, ..
                        } => "timed_out",
                        _ => "failed",
                    };
                    metrics::ENGINE_ATTEMPTS
                        .with_label_values(&[name.as_str(), outcome])
                        .inc();
                    warn!("Job {}: {} failed: {}", request.job_id, name, failure);
                    attempts.push(failure);
                    base += budget;
                }
            }
        }

        let message = attempts
            .last()
            .map(ToString::to_string)
            .unwrap_or_else(|| "No engine attempted the conversion".to_string());
        Err(RouteError::AllEnginesExhausted { message, attempts })
    }
}

/// Runs one engine on its own task under the engine's timeout.
///
/// Engine progress is mapped into `[base, base + budget]` and forwarded to the
/// job reporter. Errors, panics and timeouts all come back as `EngineFailure`.
async fn run_attempt(
    engine: Arc<dyn Engine>,
    request: EngineRequest,
    progress: &ProgressReporter,
    base: f64,
    budget: f64,
) -> Result<EngineOutput, RouteError> {
    let name = engine.name().to_string();
    let limit = engine.timeout();
    let (sub_reporter, mut rx) = ProgressReporter::channel();

    let task_engine = Arc::clone(&engine);
    let mut handle =
        tokio::spawn(async move { task_engine.convert(request, sub_reporter).await });

    let forward = |percent: u8, message: &str| {
        progress.report(
            map_progress(base, budget, percent),
            format!("{}: {}", name, message),
        );
    };

    let attempt = async {
        loop {
            tokio::select! {
                joined = &mut handle => {
                    while let Ok(update) = rx.try_recv() {
                        forward(update.percent, &update.message);
                    }
                    return joined;
                }
                Some(update) = rx.recv() => forward(update.percent, &update.message),
            }
        }
    };

    let outcome = tokio::time::timeout(limit, attempt).await;

    match outcome {
        Ok(Ok(Ok(output))) => Ok(output),
        Ok(Ok(Err(e))) => Err(RouteError::EngineFailure {
            engine: engine.name().to_string(),
            message: e.to_string(),
            timed_out: e.is_timeout(),
        }),
        Ok(Err(join_error)) => {
            let message = if join_error.is_panic() {
                format!("{} panicked during conversion", engine.name())
            } else {
                format!("{} task was cancelled", engine.name())
            };
            Err(RouteError::EngineFailure {
                engine: engine.name().to_string(),
                message,
                timed_out: false,
            })
        }
        Err(_) => {
            handle.abort();
            Err(RouteError::EngineFailure {
                engine: engine.name().to_string(),
                message: format!("{} timed out after {:?}", engine.name(), limit),
                timed_out: true,
            })
        }
    }
}
