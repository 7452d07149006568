//! File format helpers: extension normalisation and category detection.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Broad category a file format belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaCategory {
    Video,
    Audio,
    Image,
    Document,
}

impl MediaCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Video => "video",
            Self::Audio => "audio",
            Self::Image => "image",
            Self::Document => "document",
        }
    }
}

impl fmt::Display for MediaCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub const VIDEO_FORMATS: &[&str] = &[
    "mp4", "avi", "mkv", "mov", "wmv", "flv", "webm", "m4v", "mpg", "mpeg", "3gp", "ogv",
];

pub const AUDIO_FORMATS: &[&str] = &[
    "mp3", "wav", "flac", "aac", "ogg", "m4a", "wma", "opus", "aiff", "au",
];

pub const IMAGE_FORMATS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "bmp", "tiff", "tif", "webp", "ico", "ppm", "pgm", "pbm",
];

pub const DOCUMENT_FORMATS: &[&str] = &[
    "pdf", "doc", "docx", "odt", "rtf", "txt", "html", "htm", "xls", "xlsx", "ods", "csv",
    "ppt", "pptx", "odp",
];

/// Office document family, used to decide which office conversions make sense.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentFamily {
    Text,
    Spreadsheet,
    Presentation,
}

impl DocumentFamily {
    /// Family of a normalised format token. PDF belongs to no family.
    pub fn of(format: &str) -> Option<Self> {
        match format {
            "doc" | "docx" | "odt" | "rtf" | "txt" | "html" | "htm" => Some(Self::Text),
            "xls" | "xlsx" | "ods" | "csv" => Some(Self::Spreadsheet),
            "ppt" | "pptx" | "odp" => Some(Self::Presentation),
            _ => None,
        }
    }
}

/// Lower-cases a format token and strips a leading dot.
pub fn normalize_format(format: &str) -> String {
    format.trim().trim_start_matches('.').to_ascii_lowercase()
}

/// Returns the normalised extension of `path`, if it has one.
pub fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(normalize_format)
        .filter(|e| !e.is_empty())
}

/// Detects the category of a format token.
pub fn category_of(format: &str) -> Option<MediaCategory> {
    let format = normalize_format(format);
    let format = format.as_str();
    if VIDEO_FORMATS.contains(&format) {
        Some(MediaCategory::Video)
    } else if AUDIO_FORMATS.contains(&format) {
        Some(MediaCategory::Audio)
    } else if IMAGE_FORMATS.contains(&format) {
        Some(MediaCategory::Image)
    } else if DOCUMENT_FORMATS.contains(&format) {
        Some(MediaCategory::Document)
    } else {
        None
    }
}

/// Detects the category of a file from its extension.
pub fn detect_category(path: &Path) -> Option<MediaCategory> {
    extension_of(path).and_then(|ext| category_of(&ext))
}

/// Builds `<output_dir>/<input stem>.<target_format>`.
pub fn output_path_for(input: &Path, output_dir: &Path, target_format: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    output_dir.join(format!("{}.{}", stem, normalize_format(target_format)))
}
