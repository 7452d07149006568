//! FFmpeg engine for audio and video transcoding.

use async_trait::async_trait;
use regex_lite::Regex;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Instant;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::time::{timeout, Duration};
use tracing::debug;

use super::config::FfmpegConfig;
use super::discovery::{locate_executable, probe_version};
use super::error::EngineError;
use super::output::{commit, ensure_parent_dir, stage};
use super::progress::ProgressReporter;
use super::quality::{AudioPreset, VideoPreset};
use super::traits::Engine;
use super::types::{priority, EngineKind, EngineOutput, EngineRequest};
use crate::format::{category_of, normalize_format, MediaCategory, AUDIO_FORMATS, VIDEO_FORMATS};

const INPUT_FORMATS: &[&str] = &[
    "mp4", "avi", "mkv", "mov", "wmv", "flv", "webm", "m4v", "mpg", "mpeg", "3gp", "ogv", "mp3",
    "wav", "flac", "aac", "ogg", "m4a", "wma", "opus", "aiff", "au",
];

const OUTPUT_FORMATS: &[&str] = &[
    "mp4", "avi", "mkv", "mov", "wmv", "flv", "webm", "m4v", "mpg", "mpeg", "ogv", "mp3", "wav",
    "flac", "aac", "ogg", "m4a", "wma", "opus", "aiff",
];

/// Audio encoder for an output container.
fn audio_codec(format: &str) -> &'static str {
    match format {
        "mp3" => "libmp3lame",
        "wav" => "pcm_s16le",
        "aiff" => "pcm_s16be",
        "flac" => "flac",
        "ogg" | "ogv" => "libvorbis",
        "opus" | "webm" => "libopus",
        "wma" | "wmv" => "wmav2",
        "mpg" | "mpeg" => "mp2",
        "avi" | "flv" => "libmp3lame",
        _ => "aac",
    }
}

/// Video encoder for an output container.
fn video_codec(format: &str) -> &'static str {
    match format {
        "webm" => "libvpx-vp9",
        "ogv" => "libtheora",
        "wmv" => "wmv2",
        "flv" => "flv",
        "avi" => "mpeg4",
        "mpg" | "mpeg" => "mpeg2video",
        _ => "libx264",
    }
}

fn is_lossless_audio(format: &str) -> bool {
    matches!(format, "wav" | "aiff" | "flac")
}

/// FFmpeg-based engine.
pub struct FfmpegEngine {
    config: FfmpegConfig,
}

impl FfmpegEngine {
    /// Creates a new FFmpeg engine with the given configuration.
    pub fn new(config: FfmpegConfig) -> Self {
        Self { config }
    }

    /// Creates an engine with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(FfmpegConfig::default())
    }

    fn ffmpeg(&self) -> Option<PathBuf> {
        locate_executable(Some(&self.config.ffmpeg_path), &[])
    }

    /// Builds ffmpeg arguments for an audio output.
    ///
    /// Video inputs are handled the same way with the video stream dropped.
    fn build_audio_args(
        &self,
        input_path: &Path,
        output_path: &Path,
        target_format: &str,
        preset: &AudioPreset,
    ) -> Vec<String> {
        let mut args = vec![
            "-y".to_string(),
            "-i".to_string(),
            input_path.to_string_lossy().to_string(),
            "-vn".to_string(),
            "-c:a".to_string(),
            audio_codec(target_format).to_string(),
        ];

        if !is_lossless_audio(target_format) {
            args.extend(["-b:a".to_string(), format!("{}k", preset.bitrate_kbps)]);
        }

        // Opus only accepts a fixed set of rates
        if target_format != "opus" {
            args.extend(["-ar".to_string(), preset.sample_rate_hz.to_string()]);
        }
        args.extend(["-ac".to_string(), preset.channels.to_string()]);

        self.push_common_args(&mut args, output_path);
        args
    }

    /// Builds ffmpeg arguments for a video output.
    fn build_video_args(
        &self,
        input_path: &Path,
        output_path: &Path,
        target_format: &str,
        preset: &VideoPreset,
    ) -> Vec<String> {
        let mut args = vec![
            "-y".to_string(),
            "-i".to_string(),
            input_path.to_string_lossy().to_string(),
            "-c:v".to_string(),
            video_codec(target_format).to_string(),
            "-b:v".to_string(),
            format!("{}k", preset.video_bitrate_kbps),
        ];

        if let Some(height) = preset.max_height {
            // Only downscale, keep aspect ratio and an even width
            args.extend([
                "-vf".to_string(),
                format!("scale=-2:'min({},ih)'", height),
            ]);
        }

        if let Some(fps) = preset.fps {
            args.extend(["-r".to_string(), fps.to_string()]);
        }

        args.extend([
            "-c:a".to_string(),
            audio_codec(target_format).to_string(),
            "-b:a".to_string(),
            format!("{}k", preset.audio_bitrate_kbps),
        ]);

        self.push_common_args(&mut args, output_path);
        args
    }

    fn push_common_args(&self, args: &mut Vec<String>, output_path: &Path) {
        args.extend([
            "-loglevel".to_string(),
            self.config.log_level.clone(),
            "-progress".to_string(),
            "pipe:2".to_string(),
        ]);
        args.extend(self.config.extra_args.iter().cloned());
        args.push(output_path.to_string_lossy().to_string());
    }

    /// Parses the duration out of ffprobe JSON output.
    fn parse_probe_duration(output: &str) -> Result<Option<f64>, EngineError> {
        #[derive(Deserialize)]
        struct ProbeOutput {
            format: ProbeFormat,
        }

        #[derive(Deserialize)]
        struct ProbeFormat {
            duration: Option<String>,
        }

        let probe: ProbeOutput =
            serde_json::from_str(output).map_err(|e| EngineError::parse("ffprobe output", e))?;

        Ok(probe
            .format
            .duration
            .as_deref()
            .and_then(|d| d.parse::<f64>().ok())
            .filter(|d| *d > 0.0))
    }

    /// Probes the input duration in seconds. Failures only disable progress.
    async fn probe_duration(&self, path: &Path) -> Option<f64> {
        let output = Command::new(&self.config.ffprobe_path)
            .args([
                "-v",
                "quiet",
                "-print_format",
                "json",
                "-show_format",
            ])
            .arg(path)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .ok()?;

        if !output.status.success() {
            return None;
        }

        match Self::parse_probe_duration(&String::from_utf8_lossy(&output.stdout)) {
            Ok(duration) => duration,
            Err(e) => {
                debug!("Could not read duration of {:?}: {}", path, e);
                None
            }
        }
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

        let ffmpeg = self.ffmpeg().ok_or_else(|| EngineError::ExecutableNotFound {
            engine: self.name().to_string(),
        })?;

        ensure_parent_dir(&request.output_path).await?;
        let staged = stage(&request.output_path)?;

        let duration_secs = self.probe_duration(&request.input_path).await;
        progress.report(0, "Starting FFmpeg");

        let target = normalize_format(&request.target_format);
        let args = match category_of(&target) {
            Some(MediaCategory::Video) => self.build_video_args(
                &request.input_path,
                &staged,
                &target,
                &request.quality.video(),
            ),
            Some(MediaCategory::Audio) => self.build_audio_args(
                &request.input_path,
                &staged,
                &target,
                &request.quality.audio(),
            ),
            _ => {
                return Err(EngineError::unsupported(
                    request.input_format.clone(),
                    request.target_format.clone(),
                ))
            }
        };

        debug!("Running {:?} {}", ffmpeg, args.join(" "));

        let mut child = Command::new(&ffmpeg)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| EngineError::conversion_failed("FFmpeg stderr was not captured", None))?;
        let mut reader = BufReader::new(stderr).lines();

        let time_regex = Regex::new(r"out_time_ms=(\d+)").ok();
        let speed_regex = Regex::new(r"speed=\s*(\d+\.?\d*)x").ok();

        let timeout_duration = Duration::from_secs(self.config.timeout_secs);
        let result = timeout(timeout_duration, async {
            let mut error_output = String::new();
            let mut current_speed: Option<String> = None;

            while let Ok(Some(line)) = reader.next_line().await {
                if line.contains("Error") || line.contains("error") {
                    error_output.push_str(&line);
                    error_output.push('\n');
                }

                if let Some(caps) = speed_regex.as_ref().and_then(|re| re.captures(&line)) {
                    if let Some(speed) = caps.get(1) {
                        current_speed = Some(format!("{}x", speed.as_str()));
                    }
                }

                let Some(caps) = time_regex.as_ref().and_then(|re| re.captures(&line)) else {
                    continue;
                };
                let (Some(us), Some(dur)) = (
                    caps.get(1).and_then(|m| m.as_str().parse::<f64>().ok()),
                    duration_secs,
                ) else {
                    continue;
                };

                // out_time_ms is in microseconds
                let current = us / 1_000_000.0;
                let percent = (current / dur * 100.0).clamp(0.0, 99.0) as u8;
                let message = match current_speed {
                    Some(ref speed) => format!("Transcoding ({})", speed),
                    None => "Transcoding".to_string(),
                };
                progress.report(percent, message);
            }

            let status = child.wait().await?;
            Ok::<(std::process::ExitStatus, String), std::io::Error>((status, error_output))
        })
        .await;

        match result {
            Ok(Ok((status, error_output))) => {
                if !status.success() {
                    return Err(EngineError::conversion_failed(
                        format!("FFmpeg exited with code: {:?}", status.code()),
                        if error_output.is_empty() {
                            None
                        } else {
                            Some(error_output)
                        },
                    ));
                }
            }
            Ok(Err(e)) => return Err(EngineError::Io(e)),
            Err(_) => {
                let _ = child.kill().await;
                return Err(EngineError::Timeout {
                    timeout_secs: self.config.timeout_secs,
                });
            }
        }

        let output_size_bytes = commit(staged, &request.output_path).await?;
        progress.report(100, "FFmpeg conversion finished");

        Ok(EngineOutput {
            output_path: request.output_path.clone(),
            output_size_bytes,
            duration_ms: start.elapsed().as_millis() as u64,
            message: format!(
                "Converted {} to {} with FFmpeg",
                request.input_format, target
            ),
        })
    }
}

#[async_trait]
impl Engine for FfmpegEngine {
    fn name(&self) -> &str {
        "ffmpeg"
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

    /// Video to video, audio to audio, and audio extraction from video.
    fn can_convert(&self, input_format: &str, output_format: &str) -> bool {
        let input = normalize_format(input_format);
        let output = normalize_format(output_format);
        if input == output
            || !INPUT_FORMATS.contains(&input.as_str())
            || !OUTPUT_FORMATS.contains(&output.as_str())
        {
            return false;
        }
        let input_is_video = VIDEO_FORMATS.contains(&input.as_str());
        let output_is_video = VIDEO_FORMATS.contains(&output.as_str());
        let output_is_audio = AUDIO_FORMATS.contains(&output.as_str());
        if input_is_video {
            output_is_video || output_is_audio
        } else {
            output_is_audio
        }
    }

    async fn is_available(&self) -> bool {
        self.config.enabled && self.ffmpeg().is_some()
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
        self.ffmpeg().map(|p| p.display().to_string())
    }

    async fn version(&self) -> Option<String> {
        let ffmpeg = self.ffmpeg()?;
        probe_version(&ffmpeg, "-version").await
    }

    fn description(&self) -> &str {
        "FFmpeg command line tool for audio and video"
    }
}
