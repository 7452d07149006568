//! Built-in image engine backed by the `image` crate.

use async_trait::async_trait;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageFormat, ImageReader};
use std::io::BufWriter;
use std::path::Path;
use std::time::{Duration, Instant};

use super::config::ImageConfig;
use super::error::EngineError;
use super::output::{commit, ensure_parent_dir, run_staged, stage};
use super::progress::ProgressReporter;
use super::quality::ImagePreset;
use super::traits::Engine;
use super::types::{priority, EngineKind, EngineOutput, EngineRequest};
use crate::format::normalize_format;

const INPUT_FORMATS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "bmp", "tiff", "tif", "webp", "ico", "ppm", "pgm", "pbm",
];

const OUTPUT_FORMATS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "bmp", "tiff", "tif", "webp", "ico", "ppm",
];

/// ICO entries cannot exceed 256 pixels per side.
const ICO_MAX_SIDE: u32 = 256;

/// Resizes `img` to fit inside `bounds`, never upscaling.
fn fit_within(img: DynamicImage, bounds: Option<(u32, u32)>) -> DynamicImage {
    let Some((max_w, max_h)) = bounds else {
        return img;
    };
    let (w, h) = img.dimensions();
    if w <= max_w && h <= max_h {
        return img;
    }
    img.resize(max_w, max_h, FilterType::Lanczos3)
}

/// Decodes, resizes and encodes one image. Blocking.
fn convert_image(
    input: &Path,
    output: &Path,
    target: &str,
    preset: &ImagePreset,
    progress: &ProgressReporter,
) -> Result<(u32, u32), EngineError> {
    let format = ImageFormat::from_extension(target)
        .ok_or_else(|| EngineError::unsupported("image", target))?;

    let img = ImageReader::open(input)?
        .with_guessed_format()?
        .decode()
        .map_err(|e| EngineError::parse("image", e))?;
    progress.report(40, "Image decoded");

    let bounds = match format {
        ImageFormat::Ico => {
            let (w, h) = preset.max_size.unwrap_or((ICO_MAX_SIDE, ICO_MAX_SIDE));
            Some((w.min(ICO_MAX_SIDE), h.min(ICO_MAX_SIDE)))
        }
        _ => preset.max_size,
    };
    let img = fit_within(img, bounds);
    progress.report(60, "Encoding image");

    let encode_err = |e: image::ImageError| EngineError::conversion_failed(e.to_string(), None);
    match format {
        ImageFormat::Jpeg => {
            // JPEG has no alpha channel
            let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
            let file = std::fs::File::create(output)?;
            let encoder = JpegEncoder::new_with_quality(BufWriter::new(file), preset.jpeg_quality);
            rgb.write_with_encoder(encoder).map_err(encode_err)?;
        }
        ImageFormat::Pnm => {
            DynamicImage::ImageRgb8(img.to_rgb8())
                .save_with_format(output, format)
                .map_err(encode_err)?;
        }
        ImageFormat::WebP | ImageFormat::Gif | ImageFormat::Ico => {
            DynamicImage::ImageRgba8(img.to_rgba8())
                .save_with_format(output, format)
                .map_err(encode_err)?;
        }
        _ => img.save_with_format(output, format).map_err(encode_err)?,
    }

    Ok(img.dimensions())
}

/// Image engine for raster formats.
pub struct ImageEngine {
    config: ImageConfig,
}

impl ImageEngine {
    pub fn new(config: ImageConfig) -> Self {
        Self { config }
    }

    pub fn with_defaults() -> Self {
        Self::new(ImageConfig::default())
    }
}

#[async_trait]
impl Engine for ImageEngine {
    fn name(&self) -> &str {
        "image"
    }

    fn kind(&self) -> EngineKind {
        EngineKind::Library
    }

    fn priority(&self) -> u8 {
        priority::LIBRARY
    }

    fn supported_input_formats(&self) -> &[&str] {
        INPUT_FORMATS
    }

    fn supported_output_formats(&self) -> &[&str] {
        OUTPUT_FORMATS
    }

    /// Any distinct pair, except that jpg and jpeg (tif and tiff) are the same format.
    fn can_convert(&self, input_format: &str, output_format: &str) -> bool {
        let canonical = |f: &str| match normalize_format(f).as_str() {
            "jpeg" => "jpg".to_string(),
            "tif" => "tiff".to_string(),
            other => other.to_string(),
        };
        let input = normalize_format(input_format);
        let output = normalize_format(output_format);
        INPUT_FORMATS.contains(&input.as_str())
            && OUTPUT_FORMATS.contains(&output.as_str())
            && canonical(&input) != canonical(&output)
    }

    async fn is_available(&self) -> bool {
        self.config.enabled
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(self.config.timeout_secs)
    }

    async fn convert(
        &self,
        request: EngineRequest,
        progress: ProgressReporter,
    ) -> Result<EngineOutput, EngineError> {
        let start = Instant::now();

        if !request.input_path.exists() {
            return Err(EngineError::InputNotFound {
                path: request.input_path.clone(),
            });
        }

        let target = normalize_format(&request.target_format);
        progress.report(10, "Decoding image");

        ensure_parent_dir(&request.output_path).await?;
        let staged = stage(&request.output_path)?;

        let input_path = request.input_path.clone();
        let preset = request.quality.image();
        let reporter = progress.clone();
        let target_for_task = target.clone();

        let (staged, (width, height)) = run_staged(staged, move |staged_path| {
            convert_image(
                &input_path,
                staged_path,
                &target_for_task,
                &preset,
                &reporter,
            )
        })
        .await?;

        let output_size_bytes = commit(staged, &request.output_path).await?;
        progress.report(100, "Image conversion finished");

        Ok(EngineOutput {
            output_path: request.output_path.clone(),
            output_size_bytes,
            duration_ms: start.elapsed().as_millis() as u64,
            message: format!(
                "Converted {} to {} ({}x{})",
                normalize_format(&request.input_format),
                target.to_uppercase(),
                width,
                height
            ),
        })
    }

    fn description(&self) -> &str {
        "Built-in raster image conversion"
    }
}
