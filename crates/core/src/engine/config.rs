//! Configuration for the engine adapters.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for every engine, one section per backend.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnginesConfig {
    #[serde(default)]
    pub ffmpeg: FfmpegConfig,
    #[serde(default)]
    pub libreoffice: LibreOfficeConfig,
    #[serde(default)]
    pub onlyoffice: OnlyOfficeConfig,
    #[serde(default)]
    pub library: LibraryConfig,
    #[serde(default)]
    pub image: ImageConfig,
}

/// Configuration for the FFmpeg engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FfmpegConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Path or command name of the ffmpeg binary.
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: PathBuf,

    /// Path or command name of the ffprobe binary.
    #[serde(default = "default_ffprobe_path")]
    pub ffprobe_path: PathBuf,

    /// Timeout for a single conversion in seconds.
    #[serde(default = "default_media_timeout")]
    pub timeout_secs: u64,

    /// FFmpeg log level (quiet, panic, fatal, error, warning, info, verbose, debug, trace).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Additional global ffmpeg arguments.
    #[serde(default)]
    pub extra_args: Vec<String>,
}

impl Default for FfmpegConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ffmpeg_path: default_ffmpeg_path(),
            ffprobe_path: default_ffprobe_path(),
            timeout_secs: default_media_timeout(),
            log_level: default_log_level(),
            extra_args: Vec::new(),
        }
    }
}

/// Configuration for the LibreOffice engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LibreOfficeConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Explicit soffice path. When unset the platform defaults are searched.
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// Extra locations searched after `path`, before the platform defaults.
    #[serde(default)]
    pub search_paths: Vec<PathBuf>,

    /// Timeout for a single conversion in seconds.
    #[serde(default = "default_document_timeout")]
    pub timeout_secs: u64,
}

impl Default for LibreOfficeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: None,
            search_paths: Vec::new(),
            timeout_secs: default_document_timeout(),
        }
    }
}

/// Configuration for the OnlyOffice engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OnlyOfficeConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Base URL of the Document Server.
    #[serde(default = "default_server_url")]
    pub server_url: String,

    /// Prefer the Document Server over the local DocumentBuilder.
    #[serde(default = "default_true")]
    pub use_server: bool,

    /// Directory shared with the Document Server; inputs are copied here.
    #[serde(default = "default_shared_dir")]
    pub shared_dir: PathBuf,

    /// URL prefix under which the server sees `shared_dir`.
    #[serde(default = "default_shared_url_prefix")]
    pub shared_url_prefix: String,

    /// Explicit DocumentBuilder path.
    #[serde(default)]
    pub docbuilder_path: Option<PathBuf>,

    /// Timeout for the availability health check in seconds.
    #[serde(default = "default_health_timeout")]
    pub health_timeout_secs: u64,

    /// Timeout for a single conversion in seconds.
    #[serde(default = "default_document_timeout")]
    pub timeout_secs: u64,
}

impl Default for OnlyOfficeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            server_url: default_server_url(),
            use_server: true,
            shared_dir: default_shared_dir(),
            shared_url_prefix: default_shared_url_prefix(),
            docbuilder_path: None,
            health_timeout_secs: default_health_timeout(),
            timeout_secs: default_document_timeout(),
        }
    }
}

/// Configuration for the built-in document library engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LibraryConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Timeout for a single conversion in seconds.
    #[serde(default = "default_library_timeout")]
    pub timeout_secs: u64,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout_secs: default_library_timeout(),
        }
    }
}

/// Configuration for the built-in image engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Timeout for a single conversion in seconds.
    #[serde(default = "default_library_timeout")]
    pub timeout_secs: u64,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout_secs: default_library_timeout(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_ffmpeg_path() -> PathBuf {
    PathBuf::from("ffmpeg")
}

fn default_ffprobe_path() -> PathBuf {
    PathBuf::from("ffprobe")
}

fn default_media_timeout() -> u64 {
    3600 // 1 hour
}

fn default_document_timeout() -> u64 {
    300 // 5 minutes
}

fn default_library_timeout() -> u64 {
    120
}

fn default_health_timeout() -> u64 {
    5
}

fn default_log_level() -> String {
    "warning".to_string()
}

fn default_server_url() -> String {
    "http://localhost".to_string()
}

fn default_shared_dir() -> PathBuf {
    std::env::temp_dir().join("onlyoffice-shared")
}

fn default_shared_url_prefix() -> String {
    "file:///var/www/onlyoffice/documentserver/shared".to_string()
}
