//! In-memory doubles for the collaborators of the job queue.

#![allow(dead_code)]

use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt, ReadBuf};
use tokio::sync::{oneshot, watch};
use tokio_util::sync::CancellationToken;
use ts_core::{
    AudioCodec, Container, Error, FetchedMedia, Fetcher, InspectionTool, JobId, Origin,
    OutputStream, ProgressEvent, Result, StreamProfile, TransformRequest, TransformTool,
    VideoCodec,
};
use ts_pipeline::{
    Announcement, DecisionAnnouncer, JobQueue, JobServices, Notice, Notifier, ProgressSink,
    QueueSettings, UploadMeta, Uploader,
};

// ---------------------------------------------------------------------------
// Source stream
// ---------------------------------------------------------------------------

/// A source handing out `chunk` bytes per read that counts how often it is
/// closed. With `stall` set it never reaches end-of-stream.
pub struct TrackedSource {
    data: Vec<u8>,
    pos: usize,
    chunk: usize,
    stall: bool,
    closes: Arc<AtomicUsize>,
}

impl AsyncRead for TrackedSource {
    fn poll_read(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        if this.pos == this.data.len() && this.stall {
            return Poll::Pending;
        }
        let n = this.chunk.min(buf.remaining()).min(this.data.len() - this.pos);
        buf.put_slice(&this.data[this.pos..this.pos + n]);
        this.pos += n;
        Poll::Ready(Ok(()))
    }
}

impl Drop for TrackedSource {
    fn drop(&mut self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

// ---------------------------------------------------------------------------
// Fetcher
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchMode {
    Serve,
    /// Serve the data, then stall forever.
    Stall,
    /// Never return from `fetch` until cancelled.
    Hang,
    Fail,
    /// Start the download, then have it fail before the first byte.
    Broken,
}

pub struct FakeFetcher {
    pub data: Vec<u8>,
    pub mode: FetchMode,
    pub closes: Arc<AtomicUsize>,
    pub fetches: AtomicUsize,
}

impl FakeFetcher {
    pub fn new(data: &[u8], mode: FetchMode) -> Arc<Self> {
        Arc::new(Self {
            data: data.to_vec(),
            mode,
            closes: Arc::new(AtomicUsize::new(0)),
            fetches: AtomicUsize::new(0),
        })
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Fetcher for FakeFetcher {
    fn name(&self) -> &'static str {
        "fake-fetcher"
    }

    async fn fetch(&self, url: &str, cancel: &CancellationToken) -> Result<FetchedMedia> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        match self.mode {
            FetchMode::Fail => return Err(Error::fetch(url, "HTTP Error 404: Not Found")),
            FetchMode::Hang => {
                cancel.cancelled().await;
                return Err(Error::Cancelled);
            }
            FetchMode::Broken => {
                let (tx, rx) = oneshot::channel();
                let _ = tx.send(Err(Error::fetch(
                    url,
                    "exited with exit status: 1: Requested format is not available",
                )));
                return Ok(FetchedMedia {
                    stream: Box::new(OutputStream::supervised(
                        Box::new(tokio::io::empty()),
                        Container::Mkv,
                        rx,
                    )),
                    title: "Test Clip".into(),
                    duration: None,
                });
            }
            FetchMode::Serve | FetchMode::Stall => {}
        }
        Ok(FetchedMedia {
            stream: Box::new(TrackedSource {
                data: self.data.clone(),
                pos: 0,
                chunk: 7,
                stall: self.mode == FetchMode::Stall,
                closes: self.closes.clone(),
            }),
            title: "Test Clip".into(),
            duration: Some(Duration::from_secs(10)),
        })
    }
}

// ---------------------------------------------------------------------------
// Inspection
// ---------------------------------------------------------------------------

pub struct FakeInspector {
    pub profile: Option<StreamProfile>,
    pub prefixes: Mutex<Vec<Vec<u8>>>,
}

impl FakeInspector {
    pub fn new(profile: StreamProfile) -> Arc<Self> {
        Arc::new(Self {
            profile: Some(profile),
            prefixes: Mutex::new(Vec::new()),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            profile: None,
            prefixes: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl InspectionTool for FakeInspector {
    fn name(&self) -> &'static str {
        "fake-inspector"
    }

    async fn inspect(&self, prefix: &[u8]) -> Result<StreamProfile> {
        self.prefixes.lock().push(prefix.to_vec());
        self.profile
            .clone()
            .ok_or_else(|| Error::Probe("Invalid data found when processing input".into()))
    }
}

pub fn vp9_opus(container: Container) -> StreamProfile {
    StreamProfile {
        video: Some(VideoCodec::Vp9),
        audio: Some(AudioCodec::Opus),
        container,
        duration_secs: Some(10.0),
    }
}

pub fn h264_aac_mp4() -> StreamProfile {
    StreamProfile {
        video: Some(VideoCodec::H264),
        audio: Some(AudioCodec::Aac),
        container: Container::Mp4,
        duration_secs: Some(10.0),
    }
}

// ---------------------------------------------------------------------------
// Transform
// ---------------------------------------------------------------------------

/// Reverses its input, reporting a fixed progress sequence on the way.
pub struct FakeTransformer {
    pub fail: bool,
    pub progress: Vec<u8>,
    pub launches: AtomicUsize,
}

impl FakeTransformer {
    pub fn new(progress: &[u8]) -> Arc<Self> {
        Arc::new(Self {
            fail: false,
            progress: progress.to_vec(),
            launches: AtomicUsize::new(0),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            fail: true,
            progress: vec![10],
            launches: AtomicUsize::new(0),
        })
    }

    pub fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }
}

impl TransformTool for FakeTransformer {
    fn name(&self) -> &'static str {
        "fake-ffmpeg"
    }

    fn launch(&self, request: TransformRequest) -> Result<OutputStream> {
        self.launches.fetch_add(1, Ordering::SeqCst);
        let (mut writer, reader) = tokio::io::duplex(64 * 1024);
        let (tx, rx) = oneshot::channel();
        let fail = self.fail;
        let steps = self.progress.clone();
        let TransformRequest {
            mut input,
            plan,
            progress,
            cancel,
            ..
        } = request;

        tokio::spawn(async move {
            let mut data = Vec::new();
            let read = tokio::select! {
                read = input.read_to_end(&mut data) => read,
                _ = cancel.cancelled() => {
                    let _ = tx.send(Err(Error::Cancelled));
                    return;
                }
            };
            drop(input);
            if let Err(e) = read {
                let _ = tx.send(Err(Error::transform("fake-ffmpeg", e.to_string())));
                return;
            }
            for percent in steps {
                progress.send("converting", percent);
            }
            data.reverse();
            let _ = writer.write_all(&data).await;
            drop(writer);
            let verdict = if fail {
                Err(Error::transform(
                    "fake-ffmpeg",
                    "Conversion failed! exit status 1",
                ))
            } else {
                Ok(())
            };
            let _ = tx.send(verdict);
        });

        Ok(OutputStream::supervised(Box::new(reader), plan.container, rx))
    }
}

// ---------------------------------------------------------------------------
// Uploader, notifier, announcer, progress sink
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct RecordingUploader {
    pub uploads: Mutex<Vec<(UploadMeta, Vec<u8>)>>,
    /// When set, uploads wait for the gate to open before reading.
    pub gate: Option<watch::Receiver<bool>>,
}

impl RecordingUploader {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn gated(gate: watch::Receiver<bool>) -> Arc<Self> {
        Arc::new(Self {
            uploads: Mutex::new(Vec::new()),
            gate: Some(gate),
        })
    }
}

#[async_trait]
impl Uploader for RecordingUploader {
    async fn upload(&self, stream: &mut OutputStream, meta: &UploadMeta) -> Result<()> {
        if let Some(gate) = &self.gate {
            let mut gate = gate.clone();
            gate.wait_for(|open| *open)
                .await
                .map_err(|_| Error::Upload("gate dropped".into()))?;
        }
        let mut bytes = Vec::new();
        stream
            .read_to_end(&mut bytes)
            .await
            .map_err(|e| Error::Upload(e.to_string()))?;
        self.uploads.lock().push((meta.clone(), bytes));
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub notices: Mutex<Vec<Notice>>,
    /// When set, each report is held until the gate opens.
    pub gate: Option<watch::Receiver<bool>>,
}

impl RecordingNotifier {
    pub fn gated(gate: watch::Receiver<bool>) -> Arc<Self> {
        Arc::new(Self {
            notices: Mutex::new(Vec::new()),
            gate: Some(gate),
        })
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, notice: &Notice) {
        self.notices.lock().push(notice.clone());
        if let Some(gate) = &self.gate {
            let mut gate = gate.clone();
            let _ = gate.wait_for(|open| *open).await;
        }
    }
}

#[derive(Default)]
pub struct RecordingAnnouncer {
    pub announcements: Mutex<Vec<Announcement>>,
}

impl DecisionAnnouncer for RecordingAnnouncer {
    fn on_decision(&self, announcement: &Announcement) {
        self.announcements.lock().push(announcement.clone());
    }
}

#[derive(Default)]
pub struct RecordingProgress {
    pub events: Mutex<Vec<(JobId, Origin, ProgressEvent)>>,
}

impl ProgressSink for RecordingProgress {
    fn on_progress(&self, job_id: JobId, origin: &Origin, event: &ProgressEvent) {
        self.events.lock().push((job_id, origin.clone(), event.clone()));
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

pub struct Harness {
    pub queue: JobQueue,
    pub fetcher: Arc<FakeFetcher>,
    pub inspector: Arc<FakeInspector>,
    pub transformer: Arc<FakeTransformer>,
    pub uploader: Arc<RecordingUploader>,
    pub notifier: Arc<RecordingNotifier>,
    pub announcer: Arc<RecordingAnnouncer>,
    pub progress: Arc<RecordingProgress>,
}

impl Harness {
    pub fn new(
        fetcher: Arc<FakeFetcher>,
        inspector: Arc<FakeInspector>,
        transformer: Arc<FakeTransformer>,
        uploader: Arc<RecordingUploader>,
    ) -> Self {
        Self::with_settings(fetcher, inspector, transformer, uploader, settings())
    }

    pub fn with_settings(
        fetcher: Arc<FakeFetcher>,
        inspector: Arc<FakeInspector>,
        transformer: Arc<FakeTransformer>,
        uploader: Arc<RecordingUploader>,
        settings: QueueSettings,
    ) -> Self {
        Self::build(
            fetcher,
            inspector,
            transformer,
            uploader,
            Arc::new(RecordingNotifier::default()),
            settings,
        )
    }

    pub fn with_notifier(
        fetcher: Arc<FakeFetcher>,
        inspector: Arc<FakeInspector>,
        transformer: Arc<FakeTransformer>,
        uploader: Arc<RecordingUploader>,
        notifier: Arc<RecordingNotifier>,
    ) -> Self {
        Self::build(fetcher, inspector, transformer, uploader, notifier, settings())
    }

    fn build(
        fetcher: Arc<FakeFetcher>,
        inspector: Arc<FakeInspector>,
        transformer: Arc<FakeTransformer>,
        uploader: Arc<RecordingUploader>,
        notifier: Arc<RecordingNotifier>,
        settings: QueueSettings,
    ) -> Self {
        let announcer = Arc::new(RecordingAnnouncer::default());
        let progress = Arc::new(RecordingProgress::default());
        let services = JobServices::new(
            fetcher.clone(),
            inspector.clone(),
            transformer.clone(),
            uploader.clone(),
            notifier.clone(),
        )
        .with_announcer(announcer.clone())
        .with_progress(progress.clone());

        Self {
            queue: JobQueue::init(services, settings),
            fetcher,
            inspector,
            transformer,
            uploader,
            notifier,
            announcer,
            progress,
        }
    }
}

/// Default settings with a small probe size so the prefix is a real prefix.
pub fn settings() -> QueueSettings {
    QueueSettings {
        probe_size: 16,
        ..QueueSettings::default()
    }
}

pub const SOURCE: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz-source-bytes";
