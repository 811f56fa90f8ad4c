use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tokio::time::timeout;

use crate::config::Config;

/// The only container type accepted for video uploads.
pub const ACCEPTED_VIDEO_TYPE: &str = "video/mp4";

#[derive(Error, Debug)]
pub enum MediaToolError {
    #[error("failed to spawn {tool}: {source}")]
    Spawn {
        tool: &'static str,
        source: std::io::Error,
    },

    #[error("{tool} timed out after {timeout_secs}s")]
    Timeout { tool: &'static str, timeout_secs: u64 },

    #[error("{tool} failed ({status}): {diagnostic}")]
    Failed {
        tool: &'static str,
        status: String,
        diagnostic: String,
    },

    #[error("failed to parse {tool} output: {reason}")]
    Parse {
        tool: &'static str,
        reason: String,
    },
}

/// Structural metadata of a media file's primary video stream.
/// `aspect_ratio` is `None` when the container has no video stream.
#[derive(Debug, Clone, Default)]
pub struct StreamInfo {
    pub aspect_ratio: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub codec_name: Option<String>,
}

/// Process-execution boundary around the external media tools, so handlers
/// and tests never deal with subprocess mechanics directly.
#[async_trait]
pub trait MediaToolRunner: Send + Sync {
    /// Extract stream metadata from a fully written local file.
    async fn probe(&self, path: &Path) -> Result<StreamInfo, MediaToolError>;

    /// Rewrite the container so its index sits at the front of the file
    /// (stream copy, no re-encode). Returns the path of the new file.
    async fn remux(&self, path: &Path) -> Result<PathBuf, MediaToolError>;
}

/// Maps a display aspect ratio to a storage key prefix. Total over all
/// inputs: anything that is not exactly "16:9" or "9:16" lands in "other".
pub fn aspect_ratio_category(ratio: &str) -> &'static str {
    match ratio {
        "16:9" => "landscape",
        "9:16" => "portrait",
        _ => "other",
    }
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
    #[serde(default)]
    codec_name: Option<String>,
    #[serde(default)]
    display_aspect_ratio: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

/// Parse ffprobe's JSON stream listing into a StreamInfo for the first
/// video stream. No video stream is not an error here; the caller decides.
fn parse_probe_output(json: &str) -> Result<StreamInfo, MediaToolError> {
    let output: FfprobeOutput =
        serde_json::from_str(json).map_err(|e| MediaToolError::Parse {
            tool: "ffprobe",
            reason: e.to_string(),
        })?;

    let video_stream = output
        .streams
        .into_iter()
        .find(|s| s.codec_type.as_deref() == Some("video"));

    Ok(match video_stream {
        Some(s) => StreamInfo {
            aspect_ratio: s.display_aspect_ratio,
            width: s.width,
            height: s.height,
            codec_name: s.codec_name,
        },
        None => StreamInfo::default(),
    })
}

/// Runs ffprobe/ffmpeg as short-lived child processes. Each invocation is
/// bounded by a timeout; `kill_on_drop` reaps the child when the request
/// future is dropped mid-flight (client disconnect) or the timeout fires.
pub struct FfmpegToolRunner {
    ffmpeg_path: String,
    ffprobe_path: String,
    timeout: Duration,
}

impl FfmpegToolRunner {
    pub fn new(config: &Config) -> Self {
        Self {
            ffmpeg_path: config.ffmpeg_path.clone(),
            ffprobe_path: config.ffprobe_path.clone(),
            timeout: config.media_tool_timeout(),
        }
    }

    async fn run(
        &self,
        tool: &'static str,
        mut cmd: Command,
    ) -> Result<std::process::Output, MediaToolError> {
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = timeout(self.timeout, cmd.output())
            .await
            .map_err(|_| MediaToolError::Timeout {
                tool,
                timeout_secs: self.timeout.as_secs(),
            })?
            .map_err(|e| MediaToolError::Spawn { tool, source: e })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stdout = String::from_utf8_lossy(&output.stdout);
            return Err(MediaToolError::Failed {
                tool,
                status: output.status.to_string(),
                diagnostic: format!("{} {}", stderr.trim(), stdout.trim())
                    .trim()
                    .to_string(),
            });
        }

        Ok(output)
    }
}

#[async_trait]
impl MediaToolRunner for FfmpegToolRunner {
    async fn probe(&self, path: &Path) -> Result<StreamInfo, MediaToolError> {
        let mut cmd = Command::new(&self.ffprobe_path);
        cmd.arg("-v")
            .arg("error")
            .arg("-print_format")
            .arg("json")
            .arg("-show_streams")
            .arg(path);

        let output = self.run("ffprobe", cmd).await?;

        let json = String::from_utf8_lossy(&output.stdout);
        parse_probe_output(&json)
    }

    async fn remux(&self, path: &Path) -> Result<PathBuf, MediaToolError> {
        let output_path = PathBuf::from(format!("{}.faststart.mp4", path.display()));

        let mut cmd = Command::new(&self.ffmpeg_path);
        cmd.arg("-i")
            .arg(path)
            .arg("-c")
            .arg("copy")
            .arg("-movflags")
            .arg("faststart")
            .arg("-f")
            .arg("mp4")
            .arg(&output_path);

        if let Err(e) = self.run("ffmpeg", cmd).await {
            // ffmpeg may have left a partial output file behind
            let _ = tokio::fs::remove_file(&output_path).await;
            return Err(e);
        }

        Ok(output_path)
    }
}
