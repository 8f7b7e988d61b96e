//! Collaborators the job queue hands its results to, and the bundle of
//! services a queue is constructed from.

use std::sync::Arc;

use async_trait::async_trait;
use ts_core::{
    Container, Fetcher, InspectionTool, JobId, Origin, OutputFormat, OutputStream, ProgressEvent,
    TransformTool,
};

/// Metadata accompanying a finished stream.
#[derive(Debug, Clone)]
pub struct UploadMeta {
    pub job_id: JobId,
    pub origin: Origin,
    pub title: String,
    /// What the requester asked for.
    pub format: OutputFormat,
    /// Container of the bytes in the stream.
    pub container: Container,
}

/// Consumes the final stream of a job.
///
/// The uploader is the single consumer of the stream and may start while
/// the transform is still producing it. Returning `Ok` means every byte it
/// wanted has been taken; the queue then confirms that the producer
/// finished cleanly before reporting success.
#[async_trait]
pub trait Uploader: Send + Sync {
    async fn upload(&self, stream: &mut OutputStream, meta: &UploadMeta) -> ts_core::Result<()>;
}

/// Why a job did not complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Failed,
    Cancelled,
}

impl std::fmt::Display for NoticeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Failed => write!(f, "failed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Terminal report for a job that did not reach the uploader successfully.
#[derive(Debug, Clone)]
pub struct Notice {
    pub job_id: JobId,
    pub origin: Origin,
    pub url: String,
    pub kind: NoticeKind,
    /// Human-readable reason.
    pub reason: String,
}

/// Informed once per failed or cancelled job.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notice: &Notice);
}

/// What the decision engine found, for telling the requester what is about
/// to happen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Announcement {
    pub job_id: JobId,
    pub origin: Origin,
    /// Video codec names, empty if the source has no video.
    pub video_codecs: String,
    /// Audio codec names, empty if the source has no audio.
    pub audio_codecs: String,
    /// Description of the conversions about to run.
    pub action: String,
}

/// Told about the decision of every job that reaches it.
pub trait DecisionAnnouncer: Send + Sync {
    fn on_decision(&self, announcement: &Announcement);
}

/// Receives transform progress of every job.
pub trait ProgressSink: Send + Sync {
    fn on_progress(&self, job_id: JobId, origin: &Origin, event: &ProgressEvent);
}

/// Everything a [`crate::JobQueue`] needs from the outside world.
#[derive(Clone)]
pub struct JobServices {
    pub fetcher: Arc<dyn Fetcher>,
    pub inspector: Arc<dyn InspectionTool>,
    pub transformer: Arc<dyn TransformTool>,
    pub uploader: Arc<dyn Uploader>,
    pub notifier: Arc<dyn Notifier>,
    pub announcer: Option<Arc<dyn DecisionAnnouncer>>,
    pub progress: Option<Arc<dyn ProgressSink>>,
}

impl JobServices {
    /// Create a service bundle with the required collaborators and no
    /// announcement or progress sinks.
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        inspector: Arc<dyn InspectionTool>,
        transformer: Arc<dyn TransformTool>,
        uploader: Arc<dyn Uploader>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            fetcher,
            inspector,
            transformer,
            uploader,
            notifier,
            announcer: None,
            progress: None,
        }
    }

    /// Builder: set the decision announcer.
    pub fn with_announcer(mut self, announcer: Arc<dyn DecisionAnnouncer>) -> Self {
        self.announcer = Some(announcer);
        self
    }

    /// Builder: set the progress sink.
    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = Some(progress);
        self
    }
}

impl std::fmt::Debug for JobServices {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobServices")
            .field("fetcher", &self.fetcher.name())
            .field("inspector", &self.inspector.name())
            .field("transformer", &self.transformer.name())
            .field("announcer", &self.announcer.is_some())
            .field("progress", &self.progress.is_some())
            .finish_non_exhaustive()
    }
}
