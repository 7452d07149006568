//! Orchestrator configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::engine::QualityTier;

/// Configuration for the conversion orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Quality tier used when a run does not ask for one.
    #[serde(default)]
    pub default_quality: QualityTier,

    /// Output directory used when a run does not name one.
    /// Unset means the working directory.
    #[serde(default)]
    pub default_output_dir: Option<PathBuf>,

    /// Capacity of the run event channel.
    /// Slow subscribers skip events once this many are queued.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

fn default_event_capacity() -> usize {
    256
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            default_quality: QualityTier::default(),
            default_output_dir: None,
            event_capacity: default_event_capacity(),
        }
    }
}
