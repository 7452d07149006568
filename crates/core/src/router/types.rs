//! Types for the router module.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::error::RouteError;
use crate::engine::{EngineKind, EngineOutput, QualityTier};

/// A conversion the router should carry out.
#[derive(Debug, Clone)]
pub struct RouteRequest {
    pub job_id: String,
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    /// Target format token; normalised by the router.
    pub target_format: String,
    pub quality: QualityTier,
}

/// Result of a successful routed conversion.
#[derive(Debug, Clone)]
pub struct RouteSuccess {
    /// Engine that produced the output.
    pub engine: String,
    pub output: EngineOutput,
    /// Candidates that were skipped or failed before the winner.
    pub failed_attempts: Vec<RouteError>,
}

impl RouteSuccess {
    /// Human readable success message.
    pub fn message(&self) -> &str {
        &self.output.message
    }
}

/// One engine in a conversion strategy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyEntry {
    pub engine: String,
    pub kind: EngineKind,
    pub priority: u8,
}

/// Ordered engines the router would try for a pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionStrategy {
    pub input_format: String,
    pub output_format: String,
    /// True when the list came from capability inference rather than the matrix.
    pub inferred: bool,
    pub engines: Vec<StrategyEntry>,
}

impl ConversionStrategy {
    pub fn is_empty(&self) -> bool {
        self.engines.is_empty()
    }
}
