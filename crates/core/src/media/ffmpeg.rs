//! FFmpeg-based media probe.

use async_trait::async_trait;
use serde::Deserialize;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::error::MediaError;
use super::traits::MediaProbe;
use super::types::MediaInfo;
use crate::cancel::CancelToken;
use crate::process::{run_tool, tool_available};

pub struct FfmpegMedia {
    ffprobe_path: PathBuf,
    ffmpeg_path: PathBuf,
}

impl Default for FfmpegMedia {
    fn default() -> Self {
        Self::new("ffprobe", "ffmpeg")
    }
}

impl FfmpegMedia {
    pub fn new(ffprobe_path: impl Into<PathBuf>, ffmpeg_path: impl Into<PathBuf>) -> Self {
        Self {
            ffprobe_path: ffprobe_path.into(),
            ffmpeg_path: ffmpeg_path.into(),
        }
    }

    /// Parses ffprobe JSON output into MediaInfo.
    fn parse_probe_output(path: &Path, output: &str) -> Result<MediaInfo, MediaError> {
        #[derive(Deserialize)]
        struct ProbeOutput {
            format: ProbeFormat,
            #[serde(default)]
            streams: Vec<ProbeStream>,
        }

        #[derive(Deserialize)]
        struct ProbeFormat {
            format_name: String,
            duration: Option<String>,
        }

        #[derive(Deserialize)]
        struct ProbeStream {
            codec_type: String,
        }

        let probe: ProbeOutput =
            serde_json::from_str(output).map_err(|e| MediaError::ParseError {
                reason: format!("Failed to parse ffprobe output: {}", e),
            })?;

        // Offsets of later files depend on this, so a missing duration is a failure.
        let duration_secs = probe
            .format
            .duration
            .as_deref()
            .and_then(|d| d.parse::<f64>().ok())
            .filter(|d| d.is_finite() && *d >= 0.0)
            .ok_or_else(|| MediaError::ProbeFailed {
                path: path.to_path_buf(),
                stderr: "ffprobe reported no duration".to_string(),
            })?;

        let format = probe
            .format
            .format_name
            .split(',')
            .next()
            .unwrap_or("unknown")
            .to_string();

        Ok(MediaInfo {
            duration_ms: (duration_secs * 1000.0).round() as u64,
            format,
            has_audio: probe.streams.iter().any(|s| s.codec_type == "audio"),
            has_video: probe.streams.iter().any(|s| s.codec_type == "video"),
        })
    }
}

#[async_trait]
impl MediaProbe for FfmpegMedia {
    async fn probe(&self, path: &Path, cancel: &CancelToken) -> Result<MediaInfo, MediaError> {
        if !path.exists() {
            return Err(MediaError::InputNotFound {
                path: path.to_path_buf(),
            });
        }

        let args: Vec<OsString> = vec![
            "-v".into(),
            "error".into(),
            "-print_format".into(),
            "json".into(),
            "-show_format".into(),
            "-show_streams".into(),
            path.as_os_str().to_os_string(),
        ];
        let output = run_tool(&self.ffprobe_path, args, cancel)
            .await
            .map_err(|e| {
                MediaError::from_tool(e, |stderr| MediaError::ProbeFailed {
                    path: path.to_path_buf(),
                    stderr,
                })
            })?;

        let info = Self::parse_probe_output(path, &output.stdout)?;
        debug!(path = %path.display(), duration_ms = info.duration_ms, "Probed media");
        Ok(info)
    }

    async fn extract_audio(
        &self,
        input: &Path,
        output: &Path,
        cancel: &CancelToken,
    ) -> Result<(), MediaError> {
        if !input.exists() {
            return Err(MediaError::InputNotFound {
                path: input.to_path_buf(),
            });
        }

        let args: Vec<OsString> = vec![
            "-y".into(),
            "-i".into(),
            input.as_os_str().to_os_string(),
            "-vn".into(),
            "-ac".into(),
            "1".into(),
            "-ar".into(),
            "16000".into(),
            "-c:a".into(),
            "libmp3lame".into(),
            "-b:a".into(),
            "64k".into(),
            "-loglevel".into(),
            "error".into(),
            output.as_os_str().to_os_string(),
        ];

        run_tool(&self.ffmpeg_path, args, cancel)
            .await
            .map_err(|e| {
                MediaError::from_tool(e, |stderr| MediaError::ExtractFailed {
                    path: input.to_path_buf(),
                    stderr,
                })
            })?;

        debug!(input = %input.display(), output = %output.display(), "Extracted audio");
        Ok(())
    }

    async fn validate(&self) -> Result<(), MediaError> {
        for tool in [&self.ffmpeg_path, &self.ffprobe_path] {
            tool_available(tool, "-version").await.map_err(|e| {
                MediaError::from_tool(e, |_| MediaError::ToolNotFound { path: tool.clone() })
            })?;
        }
        Ok(())
    }
}
