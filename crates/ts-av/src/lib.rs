//! # ts-av
//!
//! External media tool backends for the tubeshift pipeline.
//!
//! This crate provides:
//!
//! - **Tool discovery** ([`ToolRegistry`]) -- find and cache paths to ffmpeg,
//!   ffprobe and yt-dlp.
//! - **Command execution** ([`ToolCommand`]) -- async builder with timeout
//!   support for one-shot invocations, plus piped spawning for streaming.
//! - **Fetching** ([`YtDlpFetcher`]) -- implements [`ts_core::Fetcher`] by
//!   streaming a yt-dlp download from stdout.
//! - **Inspection** ([`FfprobeInspector`]) -- implements
//!   [`ts_core::InspectionTool`] by feeding a stream prefix to ffprobe.
//! - **Transformation** ([`FfmpegTransformer`]) -- implements
//!   [`ts_core::TransformTool`] with ffmpeg running stdin to stdout.

pub mod command;
pub mod probe;
pub mod progress;
pub mod tools;
pub mod transcode;
pub mod ytdlp;

// ---- Re-exports for convenience ----

pub use command::{ToolCommand, ToolOutput};
pub use probe::FfprobeInspector;
pub use tools::{ToolConfig, ToolInfo, ToolRegistry, FFMPEG, FFPROBE, YTDLP};
pub use transcode::FfmpegTransformer;
pub use ytdlp::YtDlpFetcher;
