//! Types for the engine module.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use super::quality::QualityTier;

/// How an engine reaches its backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineKind {
    /// Spawns a locally installed command line tool.
    NativeTool,
    /// Talks to a conversion server over HTTP.
    ServerApi,
    /// Converts in-process with Rust libraries.
    Library,
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::NativeTool => "native_tool",
            Self::ServerApi => "server_api",
            Self::Library => "library",
        })
    }
}

/// Static priority ranks. Lower ranks are tried first.
pub mod priority {
    /// Conversion servers with the richest layout fidelity.
    pub const SERVER: u8 = 10;
    /// Native desktop tools.
    pub const NATIVE: u8 = 20;
    /// In-process libraries that are the only option for their domain.
    pub const LIBRARY: u8 = 50;
    /// Generic last-resort fallbacks.
    pub const FALLBACK: u8 = 90;
}

/// One conversion request handed to an engine.
#[derive(Debug, Clone)]
pub struct EngineRequest {
    /// ID of the job this attempt belongs to.
    pub job_id: String,
    /// Input file path.
    pub input_path: PathBuf,
    /// Output file path.
    pub output_path: PathBuf,
    /// Normalised input format.
    pub input_format: String,
    /// Normalised target format.
    pub target_format: String,
    /// Quality tier; the engine picks its own domain preset.
    pub quality: QualityTier,
}

/// Result of a successful engine conversion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineOutput {
    /// Output file path.
    pub output_path: PathBuf,
    /// Output file size in bytes.
    pub output_size_bytes: u64,
    /// Conversion duration in milliseconds.
    pub duration_ms: u64,
    /// Human readable summary.
    pub message: String,
}

/// Status report for one engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineStatus {
    pub name: String,
    pub kind: EngineKind,
    pub priority: u8,
    pub available: bool,
    /// Executable path or server URL, when the engine has one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub description: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_kind_display() {
        assert_eq!(EngineKind::NativeTool.to_string(), "native_tool");
        assert_eq!(EngineKind::ServerApi.to_string(), "server_api");
        assert_eq!(EngineKind::Library.to_string(), "library");
    }

    #[test]
    fn test_priority_order() {
        assert!(priority::SERVER < priority::NATIVE);
        assert!(priority::NATIVE < priority::LIBRARY);
        assert!(priority::LIBRARY < priority::FALLBACK);
    }

    #[test]
    fn test_status_serialization_skips_empty_fields() {
        let status = EngineStatus {
            name: "library".to_string(),
            kind: EngineKind::Library,
            priority: priority::FALLBACK,
            available: true,
            location: None,
            version: None,
            description: "Built-in document conversion".to_string(),
        };
        let json = serde_json::to_string(&status).unwrap();
        assert!(!json.contains("location"));
        assert!(json.contains("\"kind\":\"library\""));
    }
}
