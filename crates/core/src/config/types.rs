use serde::{Deserialize, Serialize};

use crate::engine::EnginesConfig;
use crate::orchestrator::OrchestratorConfig;

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub engines: EnginesConfig,
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
}
