//! Built-in document engine.
//!
//! Converts between simple text-centric formats in-process, keeping only
//! paragraph text. It is the last resort for document pairs when no office
//! suite is installed, and the only route out of PDF.

mod read;
mod write;

use async_trait::async_trait;
use std::io::Write;
use std::path::Path;
use std::time::{Duration, Instant};

use super::config::LibraryConfig;
use super::error::EngineError;
use super::output::{commit, ensure_parent_dir, run_staged, stage};
use super::progress::ProgressReporter;
use super::traits::Engine;
use super::types::{priority, EngineKind, EngineOutput, EngineRequest};
use crate::format::normalize_format;

const INPUT_FORMATS: &[&str] = &["txt", "docx", "rtf", "html", "htm", "pdf"];
const OUTPUT_FORMATS: &[&str] = &["txt", "docx", "html", "pdf"];

/// Paragraph text extracted from a document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct TextDocument {
    paragraphs: Vec<String>,
}

impl TextDocument {
    pub(crate) fn new(paragraphs: Vec<String>) -> Self {
        Self { paragraphs }
    }

    /// Builds a document from lines, dropping trailing blank lines.
    pub(crate) fn from_lines<'a>(lines: impl Iterator<Item = &'a str>) -> Self {
        let mut paragraphs: Vec<String> = lines.map(|l| l.trim_end().to_string()).collect();
        while paragraphs.last().is_some_and(|p| p.is_empty()) {
            paragraphs.pop();
        }
        Self { paragraphs }
    }

    pub(crate) fn paragraphs(&self) -> &[String] {
        &self.paragraphs
    }
}

fn read_document(
    path: &Path,
    format: &str,
    progress: &ProgressReporter,
) -> Result<TextDocument, EngineError> {
    match format {
        "txt" => Ok(read::read_txt(&std::fs::read(path)?)),
        "rtf" => read::read_rtf(&std::fs::read(path)?),
        "html" | "htm" => Ok(read::read_html(&std::fs::read(path)?)),
        "docx" => read::read_docx(std::fs::File::open(path)?),
        "pdf" => read::read_pdf(&std::fs::read(path)?, progress),
        other => Err(EngineError::unsupported(other, "document")),
    }
}

fn write_document(
    doc: &TextDocument,
    path: &Path,
    format: &str,
    title: &str,
) -> Result<(), EngineError> {
    match format {
        "txt" => std::fs::write(path, write::write_txt(doc))?,
        "html" => std::fs::write(path, write::write_html(doc, title))?,
        "docx" => write::write_docx(doc, std::fs::File::create(path)?)?,
        "pdf" => {
            let mut file = std::io::BufWriter::new(std::fs::File::create(path)?);
            write::write_pdf(doc, title, &mut file)?;
            file.flush()?;
        }
        other => return Err(EngineError::unsupported("document", other)),
    }
    Ok(())
}

/// In-process converter for txt, docx, rtf, html and pdf.
pub struct LibraryEngine {
    config: LibraryConfig,
}

impl LibraryEngine {
    pub fn new(config: LibraryConfig) -> Self {
        Self { config }
    }

    pub fn with_defaults() -> Self {
        Self::new(LibraryConfig::default())
    }
}

#[async_trait]
impl Engine for LibraryEngine {
    fn name(&self) -> &str {
        "library"
    }

    fn kind(&self) -> EngineKind {
        EngineKind::Library
    }

    fn priority(&self) -> u8 {
        priority::FALLBACK
    }

    fn supported_input_formats(&self) -> &[&str] {
        INPUT_FORMATS
    }

    fn supported_output_formats(&self) -> &[&str] {
        OUTPUT_FORMATS
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

        let input_format = normalize_format(&request.input_format);
        let target = normalize_format(&request.target_format);
        if !self.can_convert(&input_format, &target) {
            return Err(EngineError::unsupported(input_format, target));
        }

        progress.report(10, "Reading document");

        ensure_parent_dir(&request.output_path).await?;
        let staged = stage(&request.output_path)?;

        let input_path = request.input_path.clone();
        let title = request
            .input_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let reporter = progress.clone();
        let (from, to) = (input_format.clone(), target.clone());

        let (staged, ()) = run_staged(staged, move |staged_path| {
            let doc = read_document(&input_path, &from, &reporter)?;
            reporter.report(50, format!("Writing {} paragraphs", doc.paragraphs().len()));
            write_document(&doc, staged_path, &to, &title)
        })
        .await?;

        let output_size_bytes = commit(staged, &request.output_path).await?;
        progress.report(100, "Document conversion finished");

        Ok(EngineOutput {
            output_path: request.output_path.clone(),
            output_size_bytes,
            duration_ms: start.elapsed().as_millis() as u64,
            message: format!(
                "Converted {} to {} with the built-in document library",
                input_format,
                target.to_uppercase()
            ),
        })
    }

    fn description(&self) -> &str {
        "Built-in text extraction for txt, docx, rtf, html and pdf"
    }
}
