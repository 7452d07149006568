//! Engine adapters that wrap concrete conversion backends.
//!
//! Every backend sits behind the [`Engine`] trait and declares the formats it
//! reads and writes, so the router can pick candidates without knowing any
//! concrete type.
//!
//! # Engines
//!
//! - [`OnlyOfficeEngine`]: Document Server API, DocumentBuilder as secondary path
//! - [`LibreOfficeEngine`]: headless `soffice`
//! - [`FfmpegEngine`]: audio and video transcoding
//! - [`ImageEngine`]: raster images via the `image` crate
//! - [`LibraryEngine`]: in-process txt/docx/rtf/html/pdf fallback
//!
//! # Example
//!
//! ```ignore
//! use multiconvert_core::engine::{build_engines, EnginesConfig};
//!
//! let engines = build_engines(&EnginesConfig::default())?;
//! for engine in &engines {
//!     println!("{} available: {}", engine.name(), engine.is_available().await);
//! }
//! ```

mod config;
mod discovery;
mod error;
mod ffmpeg;
mod library;
mod libreoffice;
mod onlyoffice;
mod output;
mod progress;
mod quality;
mod raster;
mod traits;
mod types;

use std::sync::Arc;

pub use config::{
    EnginesConfig, FfmpegConfig, ImageConfig, LibraryConfig, LibreOfficeConfig, OnlyOfficeConfig,
};
pub use discovery::{locate_executable, probe_version};
pub use error::EngineError;
pub use ffmpeg::FfmpegEngine;
pub use library::LibraryEngine;
pub use libreoffice::LibreOfficeEngine;
pub use onlyoffice::OnlyOfficeEngine;
pub use progress::{ProgressReporter, ProgressUpdate};
pub use quality::{
    AudioPreset, DocumentPreset, ImagePreset, QualityTier, UnknownQualityTier, VideoPreset,
};
pub use raster::ImageEngine;
pub use traits::Engine;
pub use types::{priority, EngineKind, EngineOutput, EngineRequest, EngineStatus};

/// Builds every enabled engine in registration order.
pub fn build_engines(config: &EnginesConfig) -> Result<Vec<Arc<dyn Engine>>, EngineError> {
    let mut engines: Vec<Arc<dyn Engine>> = Vec::new();

    if config.onlyoffice.enabled {
        engines.push(Arc::new(OnlyOfficeEngine::new(config.onlyoffice.clone())?));
    }
    if config.libreoffice.enabled {
        engines.push(Arc::new(LibreOfficeEngine::new(config.libreoffice.clone())));
    }
    if config.ffmpeg.enabled {
        engines.push(Arc::new(FfmpegEngine::new(config.ffmpeg.clone())));
    }
    if config.image.enabled {
        engines.push(Arc::new(ImageEngine::new(config.image.clone())));
    }
    if config.library.enabled {
        engines.push(Arc::new(LibraryEngine::new(config.library.clone())));
    }

    Ok(engines)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_engines_default() {
        let engines = build_engines(&EnginesConfig::default()).unwrap();
        let names: Vec<_> = engines.iter().map(|e| e.name().to_string()).collect();
        assert_eq!(
            names,
            ["onlyoffice", "libreoffice", "ffmpeg", "image", "library"]
        );
    }

    #[test]
    fn test_build_engines_skips_disabled() {
        let mut config = EnginesConfig::default();
        config.onlyoffice.enabled = false;
        config.ffmpeg.enabled = false;

        let engines = build_engines(&config).unwrap();
        let names: Vec<_> = engines.iter().map(|e| e.name().to_string()).collect();
        assert_eq!(names, ["libreoffice", "image", "library"]);
    }

    #[test]
    fn test_pdf_pairs_have_library_route() {
        let router =
            crate::router::ConversionRouter::new(build_engines(&EnginesConfig::default()).unwrap());
        let names = |input: &str, output: &str| -> Vec<String> {
            router
                .strategy(input, output)
                .engines
                .into_iter()
                .map(|e| e.engine)
                .collect()
        };

        assert_eq!(names("pdf", "txt"), ["library"]);
        assert_eq!(names("pdf", "docx"), ["library"]);
        assert_eq!(names("txt", "pdf"), ["onlyoffice", "libreoffice", "library"]);
        assert_eq!(names("docx", "pdf").last().map(String::as_str), Some("library"));
    }
}
