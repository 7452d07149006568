//! OnlyOffice engine.
//!
//! Conversions go through the Document Server conversion API when the server
//! answers its health check. Otherwise the local DocumentBuilder executable
//! runs a generated script.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Instant;
use tokio::process::Command;
use tokio::time::{timeout, Duration};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::config::OnlyOfficeConfig;
use super::discovery::{docbuilder_candidates, locate_executable, probe_version};
use super::error::EngineError;
use super::output::{commit, ensure_parent_dir, stage};
use super::progress::ProgressReporter;
use super::traits::Engine;
use super::types::{priority, EngineKind, EngineOutput, EngineRequest};
use crate::format::{normalize_format, DocumentFamily};

const INPUT_FORMATS: &[&str] = &[
    "txt", "docx", "doc", "odt", "rtf", "xlsx", "xls", "ods", "pptx", "ppt", "odp",
];

const OUTPUT_FORMATS: &[&str] = &[
    "pdf", "docx", "odt", "rtf", "txt", "html", "xlsx", "ods", "pptx", "odp",
];

/// Request body for `ConvertService.ashx`.
#[derive(Debug, Serialize)]
struct ConvertRequest<'a> {
    #[serde(rename = "async")]
    is_async: bool,
    filetype: &'a str,
    key: String,
    outputtype: &'a str,
    title: &'a str,
    url: String,
}

/// Response body from `ConvertService.ashx`.
#[derive(Debug, Deserialize)]
struct ConvertResponse {
    #[serde(default)]
    error: Option<i32>,
    #[serde(rename = "fileUrl", default)]
    file_url: Option<String>,
    #[serde(rename = "endConvert", default)]
    end_convert: Option<bool>,
}

/// Describes a Document Server conversion error code.
fn describe_error_code(code: i32) -> &'static str {
    match code {
        -1 => "unknown error",
        -2 => "conversion timeout",
        -3 => "conversion error",
        -4 => "error while downloading the source document",
        -5 => "incorrect password",
        -6 => "error while accessing the conversion result database",
        -7 => "input error",
        -8 => "invalid token",
        _ => "unrecognised error code",
    }
}

/// OnlyOffice Document Server and DocumentBuilder engine.
pub struct OnlyOfficeEngine {
    config: OnlyOfficeConfig,
    client: Client,
}

impl OnlyOfficeEngine {
    /// Creates a new OnlyOffice engine.
    pub fn new(config: OnlyOfficeConfig) -> Result<Self, EngineError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| EngineError::server(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { config, client })
    }

    fn base_url(&self) -> &str {
        self.config.server_url.trim_end_matches('/')
    }

    fn docbuilder(&self) -> Option<PathBuf> {
        locate_executable(
            self.config.docbuilder_path.as_deref(),
            &docbuilder_candidates(),
        )
    }

    /// Checks `/healthcheck`, then the server root.
    async fn server_healthy(&self) -> bool {
        if !self.config.use_server {
            return false;
        }
        let health_timeout = Duration::from_secs(self.config.health_timeout_secs);
        for path in ["/healthcheck", "/"] {
            let url = format!("{}{}", self.base_url(), path);
            match self.client.get(&url).timeout(health_timeout).send().await {
                Ok(response) if response.status().is_success() => return true,
                Ok(response) => debug!("OnlyOffice {} answered {}", url, response.status()),
                Err(e) => debug!("OnlyOffice {} unreachable: {}", url, e),
            }
        }
        false
    }

    /// Generates the DocumentBuilder script for one conversion.
    fn builder_script(input: &Path, output: &Path, target_format: &str) -> String {
        let to_js = |p: &Path| p.to_string_lossy().replace('\\', "/").replace('"', "\\\"");
        format!(
            "builder.OpenFile(\"{}\");\nbuilder.SaveFile(\"{}\", \"{}\");\nbuilder.CloseFile();\n",
            to_js(input),
            target_format,
            to_js(output)
        )
    }

    async fn convert_via_server(
        &self,
        request: &EngineRequest,
        staged: &Path,
        progress: &ProgressReporter,
    ) -> Result<(), EngineError> {
        progress.report(20, "Uploading document to OnlyOffice");

        let file_name = request
            .input_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| EngineError::conversion_failed("Input path has no file name", None))?;
        let shared_name = format!("{}-{}", Uuid::new_v4().simple(), file_name);

        tokio::fs::create_dir_all(&self.config.shared_dir).await?;
        let shared_path = self.config.shared_dir.join(&shared_name);
        tokio::fs::copy(&request.input_path, &shared_path).await?;

        let result = self
            .request_conversion(request, &file_name, &shared_name, staged, progress)
            .await;

        if let Err(e) = tokio::fs::remove_file(&shared_path).await {
            warn!("Failed to remove shared copy {:?}: {}", shared_path, e);
        }
        result
    }

    async fn request_conversion(
        &self,
        request: &EngineRequest,
        title: &str,
        shared_name: &str,
        staged: &Path,
        progress: &ProgressReporter,
    ) -> Result<(), EngineError> {
        let input_format = normalize_format(&request.input_format);
        let target = normalize_format(&request.target_format);
        let body = ConvertRequest {
            is_async: false,
            filetype: &input_format,
            key: Uuid::new_v4().simple().to_string(),
            outputtype: &target,
            title,
            url: format!(
                "{}/{}",
                self.config.shared_url_prefix.trim_end_matches('/'),
                shared_name
            ),
        };

        progress.report(50, "Converting on OnlyOffice Document Server");

        let url = format!("{}/ConvertService.ashx", self.base_url());
        debug!("OnlyOffice convert request to {}: {:?}", url, body);

        let response = self
            .client
            .post(&url)
            .header("Accept", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| EngineError::server(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(EngineError::server(format!("HTTP {}: {}", status, text)));
        }

        let result: ConvertResponse = response
            .json()
            .await
            .map_err(|e| EngineError::parse("OnlyOffice response", e))?;

        if let Some(code) = result.error.filter(|c| *c != 0) {
            return Err(EngineError::server(format!(
                "OnlyOffice error {}: {}",
                code,
                describe_error_code(code)
            )));
        }
        if result.end_convert == Some(false) {
            return Err(EngineError::server("OnlyOffice did not finish the conversion"));
        }
        let file_url = result
            .file_url
            .ok_or_else(|| EngineError::server("OnlyOffice response has no fileUrl"))?;

        progress.report(80, "Downloading converted document");

        let download = self
            .client
            .get(&file_url)
            .send()
            .await
            .map_err(|e| EngineError::server(e.to_string()))?;
        if !download.status().is_success() {
            return Err(EngineError::server(format!(
                "Download failed with HTTP {}",
                download.status()
            )));
        }
        let bytes = download
            .bytes()
            .await
            .map_err(|e| EngineError::server(e.to_string()))?;
        tokio::fs::write(staged, &bytes).await?;
        Ok(())
    }

    async fn convert_via_docbuilder(
        &self,
        docbuilder: &Path,
        request: &EngineRequest,
        staged: &Path,
        progress: &ProgressReporter,
    ) -> Result<(), EngineError> {
        progress.report(20, "Preparing DocumentBuilder script");

        let target = normalize_format(&request.target_format);
        let script = Self::builder_script(&request.input_path, staged, &target);
        let script_file = tempfile::Builder::new()
            .prefix("multiconvert-")
            .suffix(".docbuilder")
            .tempfile()?;
        tokio::fs::write(script_file.path(), script).await?;

        progress.report(40, "Running DocumentBuilder");
        debug!("Running {:?} {:?}", docbuilder, script_file.path());

        let child = Command::new(docbuilder)
            .arg(script_file.path())
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

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(EngineError::conversion_failed(
                format!("DocumentBuilder exited with code: {:?}", output.status.code()),
                (!stderr.is_empty()).then_some(stderr),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl Engine for OnlyOfficeEngine {
    fn name(&self) -> &str {
        "onlyoffice"
    }

    fn kind(&self) -> EngineKind {
        EngineKind::ServerApi
    }

    fn priority(&self) -> u8 {
        priority::SERVER
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
        if input == output
            || !INPUT_FORMATS.contains(&input.as_str())
            || !OUTPUT_FORMATS.contains(&output.as_str())
        {
            return false;
        }
        output == "pdf" || DocumentFamily::of(&input) == DocumentFamily::of(&output)
    }

    async fn is_available(&self) -> bool {
        self.config.enabled && (self.server_healthy().await || self.docbuilder().is_some())
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

        progress.report(10, "Preparing OnlyOffice conversion");

        ensure_parent_dir(&request.output_path).await?;
        let staged = stage(&request.output_path)?;

        let via = if self.server_healthy().await {
            self.convert_via_server(&request, &staged, &progress).await?;
            "Document Server"
        } else if let Some(docbuilder) = self.docbuilder() {
            info!("OnlyOffice server unreachable, using DocumentBuilder");
            self.convert_via_docbuilder(&docbuilder, &request, &staged, &progress)
                .await?;
            "DocumentBuilder"
        } else {
            return Err(EngineError::Unavailable {
                engine: self.name().to_string(),
                reason: format!(
                    "server {} unreachable and DocumentBuilder not found",
                    self.base_url()
                ),
            });
        };

        let output_size_bytes = commit(staged, &request.output_path).await?;
        progress.report(100, "OnlyOffice conversion finished");

        Ok(EngineOutput {
            output_path: request.output_path.clone(),
            output_size_bytes,
            duration_ms: start.elapsed().as_millis() as u64,
            message: format!(
                "Converted {} to {} with OnlyOffice {}",
                normalize_format(&request.input_format),
                normalize_format(&request.target_format).to_uppercase(),
                via
            ),
        })
    }

    fn location(&self) -> Option<String> {
        if self.config.use_server {
            Some(self.base_url().to_string())
        } else {
            self.docbuilder().map(|p| p.display().to_string())
        }
    }

    async fn version(&self) -> Option<String> {
        let docbuilder = self.docbuilder()?;
        probe_version(&docbuilder, "--version").await
    }

    fn description(&self) -> &str {
        "OnlyOffice Document Server with DocumentBuilder fallback"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offline_config() -> OnlyOfficeConfig {
        OnlyOfficeConfig {
            use_server: false,
            docbuilder_path: Some(PathBuf::from("/nonexistent/docbuilder")),
            ..Default::default()
        }
    }

    #[test]
    fn test_builder_script() {
        let script = OnlyOfficeEngine::builder_script(
            Path::new("/docs/in.docx"),
            Path::new("/out/.multiconvert-x.pdf"),
            "pdf",
        );
        assert!(script.contains("builder.OpenFile(\"/docs/in.docx\");"));
        assert!(script.contains("builder.SaveFile(\"pdf\", \"/out/.multiconvert-x.pdf\");"));
        assert!(script.ends_with("builder.CloseFile();\n"));
    }

    #[test]
    fn test_builder_script_windows_paths() {
        let script = OnlyOfficeEngine::builder_script(
            Path::new(r"C:\docs\in.docx"),
            Path::new(r"C:\out\out.odt"),
            "odt",
        );
        assert!(script.contains("C:/docs/in.docx"));
        assert!(script.contains("C:/out/out.odt"));
    }

    #[test]
    fn test_convert_request_body() {
        let body = ConvertRequest {
            is_async: false,
            filetype: "docx",
            key: "abc".to_string(),
            outputtype: "pdf",
            title: "report.docx",
            url: "file:///shared/x-report.docx".to_string(),
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["async"], false);
        assert_eq!(json["filetype"], "docx");
        assert_eq!(json["outputtype"], "pdf");
    }

    #[test]
    fn test_convert_response_parsing() {
        let ok: ConvertResponse =
            serde_json::from_str(r#"{"endConvert":true,"fileUrl":"http://x/out.pdf","percent":100}"#)
                .unwrap();
        assert_eq!(ok.file_url.as_deref(), Some("http://x/out.pdf"));
        assert!(ok.error.is_none());

        let failed: ConvertResponse = serde_json::from_str(r#"{"error":-3}"#).unwrap();
        assert_eq!(failed.error, Some(-3));
        assert_eq!(describe_error_code(-3), "conversion error");
    }

    #[test]
    fn test_can_convert() {
        let engine = OnlyOfficeEngine::new(offline_config()).unwrap();
        assert!(engine.can_convert("docx", "pdf"));
        assert!(engine.can_convert("xls", "xlsx"));
        assert!(engine.can_convert("txt", "docx"));
        assert!(!engine.can_convert("pptx", "docx"));
        assert!(!engine.can_convert("html", "pdf"));
    }

    #[tokio::test]
    async fn test_unavailable_without_server_or_builder() {
        let engine = OnlyOfficeEngine::new(offline_config()).unwrap();
        // A docbuilder on PATH would make this engine available
        if which::which("docbuilder").is_err() {
            assert!(!engine.is_available().await);
        }
    }

    #[tokio::test]
    async fn test_convert_missing_input() {
        let engine = OnlyOfficeEngine::new(offline_config()).unwrap();
        let request = EngineRequest {
            job_id: "job".to_string(),
            input_path: PathBuf::from("/nonexistent/in.docx"),
            output_path: PathBuf::from("/nonexistent/out.pdf"),
            input_format: "docx".to_string(),
            target_format: "pdf".to_string(),
            quality: Default::default(),
        };
        let err = engine
            .convert(request, ProgressReporter::disabled())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::InputNotFound { .. }));
    }
}
