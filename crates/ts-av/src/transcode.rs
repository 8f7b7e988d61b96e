//! FFmpeg-backed [`TransformTool`]: streaming remux and transcode.
//!
//! ffmpeg reads the source from stdin and writes the converted container
//! to stdout, so the output can be uploaded while the conversion runs.
//! A supervisor task owns the child process: it turns the `-progress`
//! report on stderr into [`ProgressSender`] updates, kills the process on
//! cancellation, and delivers the final verdict to the [`OutputStream`].

use std::collections::VecDeque;
use std::path::PathBuf;
use std::process::ExitStatus;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdin};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use ts_core::config::ConversionConfig;
use ts_core::{
    ByteStream, Container, Error, OutputStream, ProgressSender, StreamDirective, TransformPlan,
    TransformRequest, TransformTool, VideoCodec,
};

use crate::command::ToolCommand;
use crate::progress::{parse_line, ProgressLine, ProgressTracker};

const TOOL: &str = "ffmpeg";

/// Number of trailing diagnostic lines kept for error reports.
const DIAGNOSTIC_LINES: usize = 20;

/// Fragmented MP4 flags: a regular MP4 needs a seekable output to write
/// its index.
const MP4_STREAMING_FLAGS: &str = "frag_keyframe+empty_moov+default_base_moof";

/// A [`TransformTool`] that drives the `ffmpeg` CLI over pipes.
#[derive(Debug, Clone)]
pub struct FfmpegTransformer {
    ffmpeg_path: PathBuf,
    video_crf: u32,
    video_preset: String,
    audio_bitrate: String,
    progress_interval: Duration,
}

impl FfmpegTransformer {
    /// Create a transformer using the given ffmpeg path and encoder settings.
    pub fn new(ffmpeg_path: PathBuf, conversion: &ConversionConfig) -> Self {
        Self {
            ffmpeg_path,
            video_crf: conversion.video_crf,
            video_preset: conversion.video_preset.clone(),
            audio_bitrate: conversion.audio_bitrate.clone(),
            progress_interval: conversion.progress_interval(),
        }
    }

    /// Build the ffmpeg argument list for a plan.
    pub fn build_args(&self, plan: &TransformPlan) -> Vec<String> {
        let mut args: Vec<String> = [
            "-hide_banner",
            "-loglevel", "error",
            "-nostats",
            "-progress", "pipe:2",
            "-i", "pipe:0",
        ]
        .into_iter()
        .map(String::from)
        .collect();

        match &plan.video {
            StreamDirective::Drop => args.push("-vn".into()),
            StreamDirective::Copy => {
                args.extend(["-map", "0:v:0?", "-c:v", "copy"].map(String::from));
            }
            StreamDirective::Encode(codec) => {
                args.extend(["-map", "0:v:0?", "-c:v", codec.encoder()].map(String::from));
                if matches!(codec, VideoCodec::H264 | VideoCodec::H265) {
                    args.extend(["-preset".to_string(), self.video_preset.clone()]);
                    args.extend(["-pix_fmt", "yuv420p"].map(String::from));
                }
                if matches!(codec, VideoCodec::Vp9 | VideoCodec::Av1) {
                    args.extend(["-b:v", "0"].map(String::from));
                }
                args.extend(["-crf".to_string(), self.video_crf.to_string()]);
            }
        }

        match &plan.audio {
            StreamDirective::Drop => args.push("-an".into()),
            StreamDirective::Copy => {
                args.extend(["-map", "0:a:0?", "-c:a", "copy"].map(String::from));
            }
            StreamDirective::Encode(codec) => {
                args.extend(["-map", "0:a:0?", "-c:a", codec.encoder()].map(String::from));
                args.extend(["-b:a".to_string(), self.audio_bitrate.clone()]);
            }
        }

        if plan.container == Container::Mp4 {
            args.extend(["-movflags", MP4_STREAMING_FLAGS].map(String::from));
        }
        args.extend(["-f".to_string(), plan.container.muxer().to_string()]);
        args.push("pipe:1".into());

        args
    }
}

impl TransformTool for FfmpegTransformer {
    fn name(&self) -> &'static str {
        TOOL
    }

    fn launch(&self, request: TransformRequest) -> ts_core::Result<OutputStream> {
        let TransformRequest {
            input,
            plan,
            profile,
            duration,
            progress,
            cancel,
        } = request;

        tracing::info!(
            action = %plan.action,
            from = %profile.container,
            to = %plan.container,
            "starting ffmpeg: {}",
            plan.rationale
        );

        let mut cmd = ToolCommand::new(self.ffmpeg_path.clone());
        cmd.args(self.build_args(&plan));
        let mut child = cmd.spawn_piped().map_err(Error::into_transform)?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::transform(TOOL, "stdin was not captured"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::transform(TOOL, "stdout was not captured"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| Error::transform(TOOL, "stderr was not captured"))?;

        let tracker = ProgressTracker::new(duration, self.progress_interval);
        let (verdict_tx, verdict_rx) = oneshot::channel();

        tokio::spawn(async move {
            let verdict = supervise(child, input, stdin, stderr, tracker, progress, cancel).await;
            if let Err(e) = &verdict {
                tracing::debug!("ffmpeg run ended with {e}");
            }
            // The receiver is gone if the consumer dropped the stream.
            let _ = verdict_tx.send(verdict);
        });

        Ok(OutputStream::supervised(
            Box::new(stdout),
            plan.container,
            verdict_rx,
        ))
    }
}

// ---------------------------------------------------------------------------
// Supervision
// ---------------------------------------------------------------------------

async fn supervise(
    mut child: Child,
    input: ByteStream,
    stdin: ChildStdin,
    stderr: ChildStderr,
    tracker: ProgressTracker,
    progress: Arc<ProgressSender>,
    cancel: CancellationToken,
) -> ts_core::Result<()> {
    let mut feeder = tokio::spawn(feed_input(input, stdin));
    let diagnostics = tokio::spawn(read_stderr(stderr, tracker, progress));
    let mut fed = false;

    let outcome: ts_core::Result<ExitStatus> = loop {
        tokio::select! {
            status = child.wait() => {
                break status.map_err(|e| Error::transform(TOOL, format!("waiting for process: {e}")));
            }
            _ = cancel.cancelled() => break Err(Error::Cancelled),
            joined = &mut feeder, if !fed => {
                fed = true;
                match joined {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        break Err(Error::relayed(&e).unwrap_or_else(|| {
                            Error::transform(TOOL, format!("reading source failed: {e}"))
                        }));
                    }
                    Err(e) => break Err(Error::Internal(format!("input feeder panicked: {e}"))),
                }
            }
        }
    };

    if outcome.is_err() {
        if let Err(e) = child.kill().await {
            tracing::warn!("failed to kill ffmpeg: {e}");
        }
    }
    feeder.abort();

    let diagnostics = diagnostics.await.unwrap_or_default();

    // A source that broke because of cancellation is still a cancellation.
    if cancel.is_cancelled() {
        return Err(Error::Cancelled);
    }

    let status = outcome?;
    if status.success() {
        Ok(())
    } else {
        let detail = if diagnostics.is_empty() {
            "no diagnostics".to_string()
        } else {
            diagnostics.join("; ")
        };
        Err(Error::transform(TOOL, format!("exited with {status}: {detail}")))
    }
}

/// Copy the source into ffmpeg's stdin, then close it.
async fn feed_input(mut input: ByteStream, mut stdin: ChildStdin) -> std::io::Result<()> {
    match tokio::io::copy(&mut input, &mut stdin).await {
        Ok(bytes) => {
            tracing::debug!(bytes, "source fully handed to ffmpeg");
            Ok(())
        }
        // ffmpeg stopped reading; its exit status tells the story.
        Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => Ok(()),
        Err(e) => Err(e),
    }
}

/// Consume stderr until ffmpeg closes it, reporting progress and returning
/// the trailing diagnostic lines.
async fn read_stderr(
    stderr: ChildStderr,
    mut tracker: ProgressTracker,
    progress: Arc<ProgressSender>,
) -> Vec<String> {
    let mut lines = BufReader::new(stderr).lines();
    let mut diagnostics = VecDeque::with_capacity(DIAGNOSTIC_LINES);

    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let parsed = parse_line(&line);
                if parsed == ProgressLine::Diagnostic {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    tracing::debug!("ffmpeg: {line}");
                    if diagnostics.len() == DIAGNOSTIC_LINES {
                        diagnostics.pop_front();
                    }
                    diagnostics.push_back(line.to_string());
                } else if let Some(percent) = tracker.observe(&parsed) {
                    progress.send("converting", percent);
                }
            }
            Ok(None) => break,
            Err(e) => {
                tracing::debug!("stopped reading ffmpeg stderr: {e}");
                break;
            }
        }
    }

    diagnostics.into()
}
