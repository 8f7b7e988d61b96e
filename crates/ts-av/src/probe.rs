//! FFprobe-based [`InspectionTool`] implementation.
//!
//! Feeds a stream prefix to `ffprobe -v quiet -print_format json
//! -show_format -show_streams -i pipe:0` and maps the JSON output into a
//! [`StreamProfile`].

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use ts_core::{AudioCodec, Container, InspectionTool, StreamProfile, VideoCodec};

use crate::command::ToolCommand;

/// Probing a prefix held in memory should never take long.
const PROBE_TIMEOUT: Duration = Duration::from_secs(30);

/// An inspector backed by the `ffprobe` CLI.
#[derive(Debug, Clone)]
pub struct FfprobeInspector {
    ffprobe_path: PathBuf,
    timeout: Duration,
}

impl FfprobeInspector {
    /// Create a new inspector using the given ffprobe path.
    pub fn new(ffprobe_path: PathBuf) -> Self {
        Self {
            ffprobe_path,
            timeout: PROBE_TIMEOUT,
        }
    }

    /// Create an inspector that finds ffprobe on `PATH`.
    pub fn from_path() -> Option<Self> {
        which::which("ffprobe").ok().map(Self::new)
    }
}

#[async_trait]
impl InspectionTool for FfprobeInspector {
    fn name(&self) -> &'static str {
        "ffprobe"
    }

    async fn inspect(&self, prefix: &[u8]) -> ts_core::Result<StreamProfile> {
        let mut cmd = ToolCommand::new(self.ffprobe_path.clone());
        cmd.args([
            "-v", "quiet",
            "-print_format", "json",
            "-show_format",
            "-show_streams",
            "-i", "pipe:0",
        ]);
        cmd.timeout(self.timeout);
        cmd.stdin(prefix.to_vec());

        let output = cmd.execute().await.map_err(|e| match e {
            ts_core::Error::Tool { message, .. } => ts_core::Error::Probe(message),
            other => other,
        })?;

        parse_profile(&output.stdout)
    }
}

// ---------------------------------------------------------------------------
// JSON structures
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    format: Option<FfprobeFormat>,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    format_name: Option<String>,
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
    codec_name: Option<String>,
}

// ---------------------------------------------------------------------------
// Parsing helpers
// ---------------------------------------------------------------------------

/// Map ffprobe's JSON report onto a [`StreamProfile`].
///
/// The first video and first audio stream win; anything else (subtitles,
/// attachments, extra tracks) is ignored.
pub(crate) fn parse_profile(json: &str) -> ts_core::Result<StreamProfile> {
    let ff: FfprobeOutput = serde_json::from_str(json)
        .map_err(|e| ts_core::Error::Probe(format!("ffprobe JSON parse error: {e}")))?;

    let format = ff
        .format
        .ok_or_else(|| ts_core::Error::Probe("no container format recognised".into()))?;

    let mut video = None;
    let mut audio = None;
    for stream in ff.streams {
        let Some(codec_name) = stream.codec_name else {
            continue;
        };
        match stream.codec_type.as_deref() {
            Some("video") if video.is_none() => video = Some(VideoCodec::from(codec_name)),
            Some("audio") if audio.is_none() => audio = Some(AudioCodec::from(codec_name)),
            _ => {}
        }
    }

    if video.is_none() && audio.is_none() {
        return Err(ts_core::Error::Probe(
            "no audio or video streams found".into(),
        ));
    }

    Ok(StreamProfile {
        video,
        audio,
        container: Container::from_format_name(format.format_name.as_deref().unwrap_or("")),
        duration_secs: format
            .duration
            .and_then(|s| s.parse::<f64>().ok())
            .filter(|d| d.is_finite() && *d > 0.0),
    })
}
