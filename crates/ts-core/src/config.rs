//! Application configuration types.
//!
//! The top-level [`Config`] struct carries all sub-configs for tools,
//! fetching, conversion, the job queue and output. Every section defaults
//! sensibly so a completely empty file is valid.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::media::{Container, PlayableSet};

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub tools: ToolsConfig,
    pub fetch: FetchConfig,
    pub conversion: ConversionConfig,
    pub queue: QueueConfig,
    pub output: OutputConfig,
}

impl Config {
    /// Return a list of validation warnings (non-fatal issues).
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        let playable = &self.conversion.playable;
        if playable.video_codecs.is_empty() {
            warnings.push("conversion.playable.video_codecs is empty; every video will be rejected".into());
        }
        if playable.audio_codecs.is_empty() {
            warnings.push("conversion.playable.audio_codecs is empty; every audio track will be rejected".into());
        }
        if playable.containers.is_empty() {
            warnings.push("conversion.playable.containers is empty".into());
        }
        if playable.containers.contains(&Container::Mp3) {
            warnings.push("conversion.playable.containers lists mp3, which cannot carry video".into());
        }

        if self.conversion.probe_size == 0 {
            warnings.push("conversion.probe_size is 0; inspection will always fail".into());
        }

        if self.queue.job_timeout_secs == 0 {
            warnings.push("queue.job_timeout_secs is 0; jobs will time out immediately".into());
        }

        if let Some(ref cookies) = self.fetch.cookies_file {
            if !cookies.exists() {
                warnings.push(format!(
                    "fetch.cookies_file {} does not exist",
                    cookies.display()
                ));
            }
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// Paths to external CLI tools. Unset entries are looked up on `PATH`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub ffmpeg_path: Option<PathBuf>,
    pub ffprobe_path: Option<PathBuf>,
    pub ytdlp_path: Option<PathBuf>,
}

/// Downloader settings.
///
/// The resolution cap and merge container are applied by the fetcher, not
/// by the conversion decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// yt-dlp `-S` sorting expression.
    pub format_sort: String,
    /// Container yt-dlp merges separate video/audio downloads into.
    pub merge_output_format: Container,
    pub cookies_file: Option<PathBuf>,
    /// Limit for the metadata lookup that precedes the download.
    pub info_timeout_secs: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            format_sort: "res:720".into(),
            merge_output_format: Container::Mkv,
            cookies_file: None,
            info_timeout_secs: 60,
        }
    }
}

impl FetchConfig {
    pub fn info_timeout(&self) -> Duration {
        Duration::from_secs(self.info_timeout_secs)
    }
}

/// Conversion decision and encoder settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversionConfig {
    /// What the target viewer plays without conversion.
    pub playable: PlayableSet,
    /// Bytes of the stream handed to the inspection tool.
    pub probe_size: usize,
    pub video_crf: u32,
    pub video_preset: String,
    pub audio_bitrate: String,
    /// Minimum spacing between progress reports.
    pub progress_interval_ms: u64,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            playable: PlayableSet::default(),
            probe_size: 1024 * 1024,
            video_crf: 23,
            video_preset: "veryfast".into(),
            audio_bitrate: "192k".into(),
            progress_interval_ms: 2000,
        }
    }
}

impl ConversionConfig {
    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms)
    }
}

/// Job queue settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Deadline for a whole fetch-and-convert job.
    pub job_timeout_secs: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            job_timeout_secs: 3600,
        }
    }
}

impl QueueConfig {
    pub fn job_timeout(&self) -> Duration {
        Duration::from_secs(self.job_timeout_secs)
    }
}

/// Where finished media is written by the directory uploader.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("./downloads"),
        }
    }
}
