//! Wiring the real tool backends and local sinks into a job queue.

use std::sync::Arc;

use anyhow::{Context, Result};
use ts_av::{FfmpegTransformer, FfprobeInspector, ToolRegistry, YtDlpFetcher, FFMPEG, FFPROBE, YTDLP};
use ts_pipeline::{JobQueue, JobServices, QueueSettings};

use crate::config::Config;
use crate::sinks::{DirUploader, LogAnnouncer, LogNotifier, LogProgress};

/// Build the service bundle backed by yt-dlp, ffprobe and ffmpeg.
///
/// Fails if any of the three tools cannot be found.
pub fn build_services(config: &Config, registry: &ToolRegistry) -> Result<JobServices> {
    let ytdlp = registry.require(YTDLP).context("yt-dlp is required for fetching")?;
    let ffprobe = registry.require(FFPROBE).context("ffprobe is required for inspection")?;
    let ffmpeg = registry.require(FFMPEG).context("ffmpeg is required for conversion")?;

    let output_dir = shellexpand::tilde(&config.output.dir.to_string_lossy()).into_owned();

    let services = JobServices::new(
        Arc::new(YtDlpFetcher::new(ytdlp.path.clone(), &config.fetch)),
        Arc::new(FfprobeInspector::new(ffprobe.path.clone())),
        Arc::new(FfmpegTransformer::new(ffmpeg.path.clone(), &config.conversion)),
        Arc::new(DirUploader::new(output_dir)),
        Arc::new(LogNotifier),
    )
    .with_announcer(Arc::new(LogAnnouncer))
    .with_progress(Arc::new(LogProgress));

    tracing::debug!(?services, "services ready");
    Ok(services)
}

/// Discover the tools and start a queue with the configured settings.
pub fn build_queue(config: &Config) -> Result<JobQueue> {
    let registry = ToolRegistry::discover(&config.tools);
    let services = build_services(config, &registry)?;
    Ok(JobQueue::init(services, QueueSettings::from_config(config)))
}
