//! LibreOffice engine driving `soffice --headless --convert-to`.

use async_trait::async_trait;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Instant;
use tokio::process::Command;
use tokio::time::{timeout, Duration};
use tracing::debug;

use super::config::LibreOfficeConfig;
use super::discovery::{libreoffice_candidates, locate_executable, probe_version};
use super::error::EngineError;
use super::output::{commit, ensure_parent_dir, stage};
use super::progress::ProgressReporter;
use super::quality::DocumentPreset;
use super::traits::Engine;
use super::types::{priority, EngineKind, EngineOutput, EngineRequest};
use crate::format::{normalize_format, DocumentFamily};

const INPUT_FORMATS: &[&str] = &[
    "doc", "docx", "odt", "rtf", "txt", "html", "htm", "xls", "xlsx", "ods", "csv", "ppt",
    "pptx", "odp",
];

const OUTPUT_FORMATS: &[&str] = &[
    "pdf", "docx", "doc", "odt", "rtf", "txt", "html", "xlsx", "xls", "ods", "csv", "pptx",
    "ppt", "odp",
];

/// PDF export filter for a document family.
fn pdf_filter(family: DocumentFamily) -> &'static str {
    match family {
        DocumentFamily::Text => "writer_pdf_Export",
        DocumentFamily::Spreadsheet => "calc_pdf_Export",
        DocumentFamily::Presentation => "impress_pdf_Export",
    }
}

/// Export filter name for a non-PDF target.
fn export_filter(format: &str) -> Option<&'static str> {
    Some(match format {
        "docx" => "MS Word 2007 XML",
        "doc" => "MS Word 97",
        "odt" => "writer8",
        "rtf" => "Rich Text Format",
        "txt" => "Text (encoded):UTF8",
        "html" => "HTML (StarWriter)",
        "xlsx" => "Calc MS Excel 2007 XML",
        "xls" => "MS Excel 97",
        "ods" => "calc8",
        "csv" => "Text - txt - csv (StarCalc)",
        "pptx" => "Impress MS PowerPoint 2007 XML",
        "ppt" => "MS PowerPoint 97",
        "odp" => "impress8",
        _ => return None,
    })
}

/// PDF export options in the JSON filter syntax.
fn pdf_filter_options(preset: &DocumentPreset) -> serde_json::Value {
    let mut options = json!({
        "SelectPdfVersion": { "type": "long", "value": "1" },
        "Quality": { "type": "long", "value": preset.image_quality.to_string() },
        "UseLosslessCompression": {
            "type": "boolean",
            "value": preset.lossless_images.to_string()
        },
        "ReduceImageResolution": {
            "type": "boolean",
            "value": preset.max_image_resolution.is_some().to_string()
        },
    });
    if let (Some(resolution), Some(map)) = (preset.max_image_resolution, options.as_object_mut()) {
        map.insert(
            "MaxImageResolution".to_string(),
            json!({ "type": "long", "value": resolution.to_string() }),
        );
    }
    options
}

/// LibreOffice-based engine.
pub struct LibreOfficeEngine {
    config: LibreOfficeConfig,
}

impl LibreOfficeEngine {
    pub fn new(config: LibreOfficeConfig) -> Self {
        Self { config }
    }

    pub fn with_defaults() -> Self {
        Self::new(LibreOfficeConfig::default())
    }

    fn executable(&self) -> Option<PathBuf> {
        let mut candidates = self.config.search_paths.clone();
        candidates.extend(libreoffice_candidates());
        locate_executable(self.config.path.as_deref(), &candidates)
    }

    /// Builds the `--convert-to` argument for a target format.
    fn convert_to_arg(
        input_format: &str,
        target_format: &str,
        preset: &DocumentPreset,
    ) -> Option<String> {
        if target_format == "pdf" {
            let family = DocumentFamily::of(input_format)?;
            return Some(format!(
                "pdf:{}:{}",
                pdf_filter(family),
                pdf_filter_options(preset)
            ));
        }
        export_filter(target_format).map(|filter| format!("{}:{}", target_format, filter))
    }

    fn build_args(
        input_path: &Path,
        outdir: &Path,
        profile_dir: &Path,
        convert_to: &str,
    ) -> Vec<String> {
        vec![
            // A private profile keeps parallel instances from fighting over the lock
            format!("-env:UserInstallation=file://{}", profile_dir.display()),
            "--headless".to_string(),
            "--norestore".to_string(),
            "--convert-to".to_string(),
            convert_to.to_string(),
            "--outdir".to_string(),
            outdir.to_string_lossy().to_string(),
            input_path.to_string_lossy().to_string(),
        ]
    }

    async fn run_conversion(
        &self,
        request: &EngineRequest,
        progress: &ProgressReporter,
    ) -> Result<EngineOutput, EngineError> {
        let start = Instant::now();

        if !request.input_path.exists() {
            return Err(EngineError::InputNotFound {
                path: request.input_path.clone(),
            });
        }

        let soffice = self
            .executable()
            .ok_or_else(|| EngineError::ExecutableNotFound {
                engine: self.name().to_string(),
            })?;

        let input_format = normalize_format(&request.input_format);
        let target = normalize_format(&request.target_format);
        let convert_to =
            Self::convert_to_arg(&input_format, &target, &request.quality.document())
                .ok_or_else(|| EngineError::unsupported(input_format.clone(), target.clone()))?;

        progress.report(10, "Preparing LibreOffice conversion");

        ensure_parent_dir(&request.output_path).await?;
        let staged = stage(&request.output_path)?;
        let workdir = tempfile::Builder::new()
            .prefix("multiconvert-soffice-")
            .tempdir()?;
        let outdir = workdir.path().join("out");
        let profile_dir = workdir.path().join("profile");
        tokio::fs::create_dir_all(&outdir).await?;

        let args = Self::build_args(&request.input_path, &outdir, &profile_dir, &convert_to);
        debug!("Running {:?} {}", soffice, args.join(" "));

        progress.report(30, "Running LibreOffice");

        let child = Command::new(&soffice)
            .args(&args)
            .current_dir(workdir.path())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let output = match timeout(
            Duration::from_secs(self.config.timeout_secs),
            child.wait_with_output(),
        )
        .await
        {
            Ok(result) => result?,
            Err(_) => {
                return Err(EngineError::Timeout {
                    timeout_secs: self.config.timeout_secs,
                })
            }
        };

        progress.report(80, "Processing LibreOffice output");

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
            let detail = if !stderr.is_empty() { stderr } else { stdout };
            return Err(EngineError::conversion_failed(
                format!("LibreOffice exited with code: {:?}", output.status.code()),
                (!detail.is_empty()).then_some(detail),
            ));
        }

        let produced = Self::find_output(&outdir, &request.input_path, &target)
            .await?
            .ok_or_else(|| {
                EngineError::conversion_failed(
                    "LibreOffice did not produce an output file",
                    Some(String::from_utf8_lossy(&output.stderr).to_string()),
                )
            })?;

        tokio::fs::copy(&produced, &staged).await?;
        let output_size_bytes = commit(staged, &request.output_path).await?;
        progress.report(100, "LibreOffice conversion finished");

        Ok(EngineOutput {
            output_path: request.output_path.clone(),
            output_size_bytes,
            duration_ms: start.elapsed().as_millis() as u64,
            message: format!(
                "Converted {} to {} with LibreOffice",
                input_format,
                target.to_uppercase()
            ),
        })
    }

    /// Finds the file soffice wrote for `input` into `outdir`.
    async fn find_output(
        outdir: &Path,
        input: &Path,
        target: &str,
    ) -> Result<Option<PathBuf>, EngineError> {
        let expected = input
            .file_stem()
            .map(|stem| outdir.join(format!("{}.{}", stem.to_string_lossy(), target)));
        if let Some(path) = expected.filter(|p| p.is_file()) {
            return Ok(Some(path));
        }

        let mut entries = tokio::fs::read_dir(outdir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let matches = path
                .extension()
                .map(|e| e.to_string_lossy().eq_ignore_ascii_case(target))
                .unwrap_or(false);
            if matches {
                return Ok(Some(path));
            }
        }
        Ok(None)
    }
}

#[async_trait]
impl Engine for LibreOfficeEngine {
    fn name(&self) -> &str {
        "libreoffice"
    }

    fn kind(&self) -> EngineKind {
        EngineKind::NativeTool
    }

    fn priority(&self) -> u8 {
        priority::NATIVE
    }

    fn supported_input_formats(&self) -> &[&str] {
        INPUT_FORMATS
    }

    fn supported_output_formats(&self) -> &[&str] {
        OUTPUT_FORMATS
    }

    /// PDF from every family, otherwise only within the same family.
    fn can_convert(&self, input_format: &str, output_format: &str) -> bool {
        let input = normalize_format(input_format);
        let output = normalize_format(output_format);
        if input == output || !OUTPUT_FORMATS.contains(&output.as_str()) {
            return false;
        }
        let Some(family) = DocumentFamily::of(&input) else {
            return false;
        };
        output == "pdf" || DocumentFamily::of(&output) == Some(family)
    }

    async fn is_available(&self) -> bool {
        self.config.enabled && self.executable().is_some()
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(self.config.timeout_secs)
    }

    async fn convert(
        &self,
        request: EngineRequest,
        progress: ProgressReporter,
    ) -> Result<EngineOutput, EngineError> {
        self.run_conversion(&request, &progress).await
    }

    fn location(&self) -> Option<String> {
        self.executable().map(|p| p.display().to_string())
    }

    async fn version(&self) -> Option<String> {
        let soffice = self.executable()?;
        probe_version(&soffice, "--version").await
    }

    fn description(&self) -> &str {
        "LibreOffice office suite in headless mode"
    }
}
