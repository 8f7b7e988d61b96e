//! Seams behind which the external tools live.
//!
//! The pipeline only talks to these traits; `ts-av` provides the yt-dlp,
//! ffprobe and ffmpeg backed implementations, and tests provide in-memory
//! doubles.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::media::{StreamProfile, TransformPlan};
use crate::progress::ProgressSender;
use crate::stream::{ByteStream, OutputStream};

/// A fetched remote media stream.
pub struct FetchedMedia {
    /// Single-pass byte source. Dropping it releases the download.
    pub stream: ByteStream,
    /// Title reported by the source.
    pub title: String,
    /// Duration reported by the source, if known.
    pub duration: Option<Duration>,
}

impl std::fmt::Debug for FetchedMedia {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchedMedia")
            .field("title", &self.title)
            .field("duration", &self.duration)
            .finish_non_exhaustive()
    }
}

/// Retrieves a remote URL as a byte stream.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Human-readable backend name (e.g. "yt-dlp").
    fn name(&self) -> &'static str;

    /// Start fetching `url`. Fails with [`crate::Error::Fetch`].
    async fn fetch(&self, url: &str, cancel: &CancellationToken) -> Result<FetchedMedia>;
}

/// Identifies codecs and container from a stream prefix.
#[async_trait]
pub trait InspectionTool: Send + Sync {
    /// Human-readable backend name (e.g. "ffprobe").
    fn name(&self) -> &'static str;

    /// Inspect the leading bytes of a stream. Fails with
    /// [`crate::Error::Probe`].
    async fn inspect(&self, prefix: &[u8]) -> Result<StreamProfile>;
}

/// Everything a transform tool needs to start producing output.
pub struct TransformRequest {
    /// Continuation of the source stream, starting at byte zero.
    pub input: ByteStream,
    pub plan: TransformPlan,
    pub profile: StreamProfile,
    /// Source duration used to turn tool progress into a percentage.
    pub duration: Option<Duration>,
    pub progress: Arc<ProgressSender>,
    pub cancel: CancellationToken,
}

/// Runs a remux or transcode, producing output incrementally.
pub trait TransformTool: Send + Sync {
    /// Human-readable backend name (e.g. "ffmpeg").
    fn name(&self) -> &'static str;

    /// Launch the transform. Returns as soon as output can be read; the
    /// returned stream reports failures of the running step when it ends.
    /// Fails with [`crate::Error::Transform`] if the step cannot start.
    fn launch(&self, request: TransformRequest) -> Result<OutputStream>;
}
