//! Media-domain types: containers, codecs, requested output formats, the
//! inspected [`StreamProfile`], and the [`TransformPlan`] derived from it.
//!
//! Codec and container enums carry an `Other` variant so that names the
//! inspection tool reports but we do not model are preserved verbatim. They
//! (de)serialize as plain lowercase strings and implement `Display` manually
//! for consistent string representation.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ---------------------------------------------------------------------------
// Container
// ---------------------------------------------------------------------------

/// Container formats.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Container {
    Mkv,
    Webm,
    Mp4,
    Mp3,
    Other(String),
}

impl Container {
    /// Map an inspection-tool format name (e.g. ffprobe's `format_name`,
    /// which may be a comma-separated alias list) to a container.
    ///
    /// ffprobe reports `matroska,webm` for WebM files as well, so those map
    /// to [`Container::Mkv`]; a bare `webm` is the only way to get `Webm`.
    pub fn from_format_name(format_name: &str) -> Self {
        let lower = format_name.trim().to_lowercase();
        let names: Vec<&str> = lower.split(',').map(str::trim).collect();
        if names.contains(&"matroska") {
            Self::Mkv
        } else if names.contains(&"webm") {
            Self::Webm
        } else if names.contains(&"mp4") || names.contains(&"mov") {
            Self::Mp4
        } else if names.contains(&"mp3") {
            Self::Mp3
        } else {
            Self::from(lower)
        }
    }

    /// File extension for this container.
    pub fn extension(&self) -> &str {
        match self {
            Self::Mkv => "mkv",
            Self::Webm => "webm",
            Self::Mp4 => "mp4",
            Self::Mp3 => "mp3",
            Self::Other(name) => name,
        }
    }

    /// Muxer name understood by ffmpeg's `-f` option.
    pub fn muxer(&self) -> &str {
        match self {
            Self::Mkv => "matroska",
            Self::Webm => "webm",
            Self::Mp4 => "mp4",
            Self::Mp3 => "mp3",
            Self::Other(name) => name,
        }
    }
}

impl fmt::Display for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl From<String> for Container {
    fn from(s: String) -> Self {
        match s.trim().to_lowercase().as_str() {
            "mkv" | "matroska" => Self::Mkv,
            "webm" => Self::Webm,
            "mp4" | "mov" | "m4v" => Self::Mp4,
            "mp3" => Self::Mp3,
            other => Self::Other(other.to_string()),
        }
    }
}

impl From<Container> for String {
    fn from(c: Container) -> Self {
        c.to_string()
    }
}

impl FromStr for Container {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// VideoCodec
// ---------------------------------------------------------------------------

/// Video codecs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum VideoCodec {
    H264,
    H265,
    Vp8,
    Vp9,
    Av1,
    Other(String),
}

impl VideoCodec {
    /// ffmpeg encoder used when re-encoding to this codec.
    pub fn encoder(&self) -> &str {
        match self {
            Self::H264 => "libx264",
            Self::H265 => "libx265",
            Self::Vp8 => "libvpx",
            Self::Vp9 => "libvpx-vp9",
            Self::Av1 => "libsvtav1",
            Self::Other(name) => name,
        }
    }
}

impl fmt::Display for VideoCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::H264 => write!(f, "h264"),
            Self::H265 => write!(f, "h265"),
            Self::Vp8 => write!(f, "vp8"),
            Self::Vp9 => write!(f, "vp9"),
            Self::Av1 => write!(f, "av1"),
            Self::Other(name) => f.write_str(name),
        }
    }
}

impl From<String> for VideoCodec {
    fn from(s: String) -> Self {
        match s.trim().to_lowercase().as_str() {
            "h264" | "avc" | "avc1" => Self::H264,
            "h265" | "hevc" | "hvc1" => Self::H265,
            "vp8" => Self::Vp8,
            "vp9" | "vp09" => Self::Vp9,
            "av1" | "av01" => Self::Av1,
            other => Self::Other(other.to_string()),
        }
    }
}

impl From<VideoCodec> for String {
    fn from(c: VideoCodec) -> Self {
        c.to_string()
    }
}

impl FromStr for VideoCodec {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// AudioCodec
// ---------------------------------------------------------------------------

/// Audio codecs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AudioCodec {
    Aac,
    Opus,
    Vorbis,
    Mp3,
    Flac,
    Ac3,
    Eac3,
    Other(String),
}

impl AudioCodec {
    /// ffmpeg encoder used when re-encoding to this codec.
    pub fn encoder(&self) -> &str {
        match self {
            Self::Aac => "aac",
            Self::Opus => "libopus",
            Self::Vorbis => "libvorbis",
            Self::Mp3 => "libmp3lame",
            Self::Flac => "flac",
            Self::Ac3 => "ac3",
            Self::Eac3 => "eac3",
            Self::Other(name) => name,
        }
    }
}

impl fmt::Display for AudioCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Aac => write!(f, "aac"),
            Self::Opus => write!(f, "opus"),
            Self::Vorbis => write!(f, "vorbis"),
            Self::Mp3 => write!(f, "mp3"),
            Self::Flac => write!(f, "flac"),
            Self::Ac3 => write!(f, "ac3"),
            Self::Eac3 => write!(f, "eac3"),
            Self::Other(name) => f.write_str(name),
        }
    }
}

impl From<String> for AudioCodec {
    fn from(s: String) -> Self {
        match s.trim().to_lowercase().as_str() {
            "aac" | "mp4a" => Self::Aac,
            "opus" => Self::Opus,
            "vorbis" => Self::Vorbis,
            "mp3" | "mp3float" => Self::Mp3,
            "flac" => Self::Flac,
            "ac3" => Self::Ac3,
            "eac3" => Self::Eac3,
            other => Self::Other(other.to_string()),
        }
    }
}

impl From<AudioCodec> for String {
    fn from(c: AudioCodec) -> Self {
        c.to_string()
    }
}

impl FromStr for AudioCodec {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// OutputFormat
// ---------------------------------------------------------------------------

/// The output a requester asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// A video playable in the target viewer.
    #[default]
    Video,
    /// Audio only, extracted to mp3.
    Mp3,
}

impl OutputFormat {
    /// Whether this format drops the video stream.
    pub fn is_audio_only(&self) -> bool {
        matches!(self, Self::Mp3)
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Video => write!(f, "video"),
            Self::Mp3 => write!(f, "mp3"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = std::convert::Infallible;

    /// `"mp3"` selects audio extraction; anything else is a video request.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("mp3") {
            Ok(Self::Mp3)
        } else {
            Ok(Self::Video)
        }
    }
}

// ---------------------------------------------------------------------------
// PlayableSet
// ---------------------------------------------------------------------------

/// Codecs and containers the target viewer can play without conversion.
///
/// Order matters: the first entry of each list is the conversion target
/// when a stream or container has to change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayableSet {
    pub video_codecs: Vec<VideoCodec>,
    pub audio_codecs: Vec<AudioCodec>,
    pub containers: Vec<Container>,
}

impl Default for PlayableSet {
    fn default() -> Self {
        Self {
            video_codecs: vec![VideoCodec::H264, VideoCodec::H265, VideoCodec::Vp9],
            audio_codecs: vec![AudioCodec::Aac, AudioCodec::Opus, AudioCodec::Mp3],
            containers: vec![Container::Mkv, Container::Mp4],
        }
    }
}

impl PlayableSet {
    pub fn accepts_video(&self, codec: &VideoCodec) -> bool {
        self.video_codecs.contains(codec)
    }

    pub fn accepts_audio(&self, codec: &AudioCodec) -> bool {
        self.audio_codecs.contains(codec)
    }

    pub fn accepts_container(&self, container: &Container) -> bool {
        self.containers.contains(container)
    }
}

// ---------------------------------------------------------------------------
// StreamProfile
// ---------------------------------------------------------------------------

/// Properties of a fetched stream, as reported by the inspection tool.
///
/// Produced once per job and immutable afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamProfile {
    /// Codec of the first video stream, if any.
    pub video: Option<VideoCodec>,
    /// Codec of the first audio stream, if any.
    pub audio: Option<AudioCodec>,
    pub container: Container,
    /// Duration in seconds when the headers carry one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<f64>,
}

impl StreamProfile {
    /// Video codec name for announcements, empty when there is no video.
    pub fn video_label(&self) -> String {
        self.video.as_ref().map(ToString::to_string).unwrap_or_default()
    }

    /// Audio codec name for announcements, empty when there is no audio.
    pub fn audio_label(&self) -> String {
        self.audio.as_ref().map(ToString::to_string).unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// TransformPlan
// ---------------------------------------------------------------------------

/// What happens to the stream as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransformAction {
    /// Deliver the source bytes unmodified.
    Passthrough,
    /// Rewrap the encoded streams into another container.
    Remux,
    /// Re-encode at least one stream.
    Transcode,
}

impl fmt::Display for TransformAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Passthrough => write!(f, "passthrough"),
            Self::Remux => write!(f, "remux"),
            Self::Transcode => write!(f, "transcode"),
        }
    }
}

/// What happens to one elementary stream during a remux or transcode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamDirective<C> {
    Copy,
    Encode(C),
    Drop,
}

/// Decision produced for one job. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformPlan {
    pub action: TransformAction,
    /// Container of the delivered stream.
    pub container: Container,
    pub video: StreamDirective<VideoCodec>,
    pub audio: StreamDirective<AudioCodec>,
    /// Human-readable description of the conversions needed.
    pub rationale: String,
}

impl TransformPlan {
    /// Whether the plan requires running the external transform tool.
    pub fn needs_tool(&self) -> bool {
        self.action != TransformAction::Passthrough
    }
}
