//! Local stand-ins for the chat backend: finished media goes to a
//! directory and everything else goes to the log.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use ts_core::{JobId, Origin, OutputStream, ProgressEvent};
use ts_pipeline::{
    Announcement, DecisionAnnouncer, Notice, NoticeKind, Notifier, ProgressSink, UploadMeta,
    Uploader,
};

/// Longest file stem the uploader will produce, in characters.
const MAX_STEM_CHARS: usize = 180;

/// Writes each finished stream to `<dir>/<title>.<ext>`.
///
/// Bytes land in a `.part` file first and are renamed into place once the
/// stream ends, so a failed job never leaves a complete-looking file.
#[derive(Debug, Clone)]
pub struct DirUploader {
    dir: PathBuf,
}

impl DirUploader {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Final path for a finished stream. Falls back to the job id when the
    /// title has nothing usable, and appends it when the name is taken.
    pub fn target_path(&self, meta: &UploadMeta) -> PathBuf {
        let ext = meta.container.extension();
        let stem = sanitize_title(&meta.title);
        let stem = if stem.is_empty() {
            meta.job_id.to_string()
        } else {
            stem
        };

        let path = self.dir.join(format!("{stem}.{ext}"));
        if path.exists() {
            self.dir.join(format!("{stem}-{}.{ext}", meta.job_id))
        } else {
            path
        }
    }
}

#[async_trait]
impl Uploader for DirUploader {
    async fn upload(&self, stream: &mut OutputStream, meta: &UploadMeta) -> ts_core::Result<()> {
        tokio::fs::create_dir_all(&self.dir).await.map_err(|e| {
            ts_core::Error::Upload(format!("cannot create {}: {e}", self.dir.display()))
        })?;

        let target = self.target_path(meta);
        let mut partial = target.clone().into_os_string();
        partial.push(".part");
        let partial = PathBuf::from(partial);

        tracing::debug!(job_id = %meta.job_id, "writing {}", partial.display());

        match write_stream(stream, &partial).await {
            Ok(bytes) => {
                tokio::fs::rename(&partial, &target).await.map_err(|e| {
                    ts_core::Error::Upload(format!("cannot move into {}: {e}", target.display()))
                })?;
                tracing::info!(
                    job_id = %meta.job_id,
                    origin = %meta.origin,
                    bytes,
                    "saved {}",
                    target.display()
                );
                Ok(())
            }
            Err(e) => {
                if let Err(rm) = tokio::fs::remove_file(&partial).await {
                    tracing::debug!("could not remove {}: {rm}", partial.display());
                }
                // A failed producer explains the broken copy better than
                // the read error itself.
                Err(ts_core::Error::relayed(&e)
                    .unwrap_or_else(|| ts_core::Error::Upload(e.to_string())))
            }
        }
    }
}

async fn write_stream(stream: &mut OutputStream, path: &Path) -> std::io::Result<u64> {
    let mut file = tokio::fs::File::create(path).await?;
    let bytes = tokio::io::copy(stream, &mut file).await?;
    file.flush().await?;
    Ok(bytes)
}

/// Make a title safe to use as a file name on every common filesystem.
pub fn sanitize_title(title: &str) -> String {
    let cleaned: String = title
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .take(MAX_STEM_CHARS)
        .collect();

    cleaned.trim().trim_matches('.').trim().to_string()
}

/// Logs terminal reports of failed and cancelled jobs.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, notice: &Notice) {
        match notice.kind {
            NoticeKind::Cancelled => tracing::info!(
                job_id = %notice.job_id,
                origin = %notice.origin,
                "{} was cancelled",
                notice.url
            ),
            NoticeKind::Failed => tracing::error!(
                job_id = %notice.job_id,
                origin = %notice.origin,
                "{} failed: {}",
                notice.url,
                notice.reason
            ),
        }
    }
}

/// Logs what each job is about to do.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogAnnouncer;

impl DecisionAnnouncer for LogAnnouncer {
    fn on_decision(&self, announcement: &Announcement) {
        let video = or_none(&announcement.video_codecs);
        let audio = or_none(&announcement.audio_codecs);
        tracing::info!(
            job_id = %announcement.job_id,
            origin = %announcement.origin,
            "video: {video}, audio: {audio}; {}",
            announcement.action
        );
    }
}

/// Logs transform progress.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogProgress;

impl ProgressSink for LogProgress {
    fn on_progress(&self, job_id: JobId, origin: &Origin, event: &ProgressEvent) {
        tracing::info!(job_id = %job_id, origin = %origin, "{} {}%", event.status, event.percent);
    }
}

fn or_none(codecs: &str) -> &str {
    if codecs.is_empty() {
        "none"
    } else {
        codecs
    }
}
