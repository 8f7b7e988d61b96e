//! yt-dlp backed [`Fetcher`].
//!
//! A fetch is two invocations: a metadata lookup (`--dump-single-json`) for
//! the title and duration, then the actual download streamed from stdout.
//! The download process is owned by a supervisor task that kills it when
//! the job is cancelled or the stream is dropped.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, ChildStderr};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use ts_core::config::FetchConfig;
use ts_core::{Container, Error, FetchedMedia, Fetcher, OutputStream};

use crate::command::ToolCommand;

const TOOL: &str = "yt-dlp";

/// A [`Fetcher`] that drives the `yt-dlp` CLI.
#[derive(Debug, Clone)]
pub struct YtDlpFetcher {
    ytdlp_path: PathBuf,
    format_sort: String,
    merge_output_format: Container,
    cookies_file: Option<PathBuf>,
    info_timeout: Duration,
}

impl YtDlpFetcher {
    pub fn new(ytdlp_path: PathBuf, fetch: &FetchConfig) -> Self {
        Self {
            ytdlp_path,
            format_sort: fetch.format_sort.clone(),
            merge_output_format: fetch.merge_output_format.clone(),
            cookies_file: fetch.cookies_file.clone(),
            info_timeout: fetch.info_timeout(),
        }
    }

    fn common_args(&self, cmd: &mut ToolCommand) {
        cmd.args(["--no-playlist", "--no-warnings"]);
        if let Some(cookies) = &self.cookies_file {
            cmd.args(["--cookies".to_string(), cookies.to_string_lossy().to_string()]);
        }
    }

    /// Arguments for the metadata lookup.
    pub fn info_command(&self, url: &str) -> ToolCommand {
        let mut cmd = ToolCommand::new(self.ytdlp_path.clone());
        cmd.arg("--dump-single-json");
        self.common_args(&mut cmd);
        cmd.args(["--", url]);
        cmd.timeout(self.info_timeout);
        cmd
    }

    /// Arguments for the streamed download.
    pub fn download_command(&self, url: &str) -> ToolCommand {
        let mut cmd = ToolCommand::new(self.ytdlp_path.clone());
        cmd.args(["--quiet", "-o", "-"]);
        cmd.args(["-S".to_string(), self.format_sort.clone()]);
        cmd.args([
            "--merge-output-format".to_string(),
            self.merge_output_format.extension().to_string(),
        ]);
        self.common_args(&mut cmd);
        cmd.args(["--", url]);
        cmd
    }

    async fn lookup(&self, url: &str) -> ts_core::Result<VideoInfo> {
        let output = self
            .info_command(url)
            .execute()
            .await
            .map_err(|e| Error::fetch(url, format!("metadata lookup failed: {e}")))?;
        parse_info(&output.stdout).map_err(|e| Error::fetch(url, e))
    }
}

#[async_trait]
impl Fetcher for YtDlpFetcher {
    fn name(&self) -> &'static str {
        TOOL
    }

    async fn fetch(&self, url: &str, cancel: &CancellationToken) -> ts_core::Result<FetchedMedia> {
        let info = tokio::select! {
            info = self.lookup(url) => info?,
            _ = cancel.cancelled() => return Err(Error::Cancelled),
        };
        tracing::info!(title = %info.title, duration = ?info.duration, "resolved {url}");

        let mut child = self
            .download_command(url)
            .spawn_piped()
            .map_err(|e| Error::fetch(url, e.to_string()))?;
        // Nothing is ever written to yt-dlp's stdin.
        drop(child.stdin.take());
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::fetch(url, "stdout was not captured"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| Error::fetch(url, "stderr was not captured"))?;

        let (verdict_tx, verdict_rx) = oneshot::channel();
        tokio::spawn(supervise(
            child,
            stderr,
            url.to_string(),
            cancel.clone(),
            verdict_tx,
        ));

        let stream = OutputStream::supervised(
            Box::new(stdout),
            self.merge_output_format.clone(),
            verdict_rx,
        );

        Ok(FetchedMedia {
            stream: Box::new(stream),
            title: info.title,
            duration: info.duration,
        })
    }
}

/// Wait for the download to end and report how it went. The process is
/// killed if the job is cancelled or the consumer drops the stream.
async fn supervise(
    mut child: Child,
    mut stderr: ChildStderr,
    url: String,
    cancel: CancellationToken,
    mut verdict_tx: oneshot::Sender<ts_core::Result<()>>,
) {
    let stderr_task = tokio::spawn(async move {
        let mut buf = String::new();
        let _ = stderr.read_to_string(&mut buf).await;
        buf
    });

    let verdict = tokio::select! {
        status = child.wait() => match status {
            Ok(status) if status.success() => Ok(()),
            Ok(status) => {
                let stderr = stderr_task.await.unwrap_or_default();
                Err(Error::fetch(&url, format!("exited with {status}: {}", stderr.trim())))
            }
            Err(e) => Err(Error::fetch(&url, format!("waiting for process: {e}"))),
        },
        _ = cancel.cancelled() => Err(Error::Cancelled),
        _ = verdict_tx.closed() => {
            tracing::debug!("download stream of {url} dropped; stopping yt-dlp");
            if let Err(e) = child.kill().await {
                tracing::warn!("failed to kill yt-dlp: {e}");
            }
            return;
        }
    };

    if verdict.is_err() {
        let _ = child.kill().await;
    }
    let _ = verdict_tx.send(verdict);
}

// ---------------------------------------------------------------------------
// Metadata
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct InfoJson {
    title: Option<String>,
    duration: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
struct VideoInfo {
    title: String,
    duration: Option<Duration>,
}

fn parse_info(json: &str) -> Result<VideoInfo, String> {
    let info: InfoJson =
        serde_json::from_str(json).map_err(|e| format!("metadata JSON parse error: {e}"))?;
    Ok(VideoInfo {
        title: info
            .title
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| "untitled".to_string()),
        duration: info
            .duration
            .filter(|d| d.is_finite() && *d > 0.0)
            .map(Duration::from_secs_f64),
    })
}
