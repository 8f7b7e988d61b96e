//! Shared test harness: in-memory tools behind a queue that writes to a
//! temporary directory.

#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use ts_core::{
    AudioCodec, Container, Error, FetchedMedia, Fetcher, InspectionTool, OutputStream, Result,
    StreamProfile, TransformRequest, TransformTool, VideoCodec,
};
use ts_pipeline::{JobQueue, JobServices, QueueSettings};
use tubeshift::sinks::{DirUploader, LogNotifier};

pub const PAYLOAD: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Serves the same bytes for every URL, titled after the URL's last path
/// segment.
pub struct StaticFetcher;

#[async_trait]
impl Fetcher for StaticFetcher {
    fn name(&self) -> &'static str {
        "static"
    }

    async fn fetch(&self, url: &str, _cancel: &CancellationToken) -> Result<FetchedMedia> {
        if url.contains("missing") {
            return Err(Error::fetch(url, "HTTP Error 404: Not Found"));
        }
        let title = url.rsplit('/').next().unwrap_or("untitled").to_string();
        Ok(FetchedMedia {
            stream: Box::new(std::io::Cursor::new(PAYLOAD.to_vec())),
            title,
            duration: None,
        })
    }
}

/// Reports the same profile for every prefix.
pub struct StaticInspector(pub StreamProfile);

#[async_trait]
impl InspectionTool for StaticInspector {
    fn name(&self) -> &'static str {
        "static"
    }

    async fn inspect(&self, _prefix: &[u8]) -> Result<StreamProfile> {
        Ok(self.0.clone())
    }
}

/// Upper-cases its input.
pub struct UpcaseTransformer;

impl TransformTool for UpcaseTransformer {
    fn name(&self) -> &'static str {
        "upcase"
    }

    fn launch(&self, request: TransformRequest) -> Result<OutputStream> {
        let (mut writer, reader) = tokio::io::duplex(64 * 1024);
        let (tx, rx) = oneshot::channel();
        let TransformRequest {
            mut input, plan, ..
        } = request;

        tokio::spawn(async move {
            let mut data = Vec::new();
            let verdict = match input.read_to_end(&mut data).await {
                Ok(_) => {
                    data.make_ascii_uppercase();
                    let _ = writer.write_all(&data).await;
                    Ok(())
                }
                Err(e) => Err(Error::transform("upcase", e.to_string())),
            };
            drop(writer);
            let _ = tx.send(verdict);
        });

        Ok(OutputStream::supervised(Box::new(reader), plan.container, rx))
    }
}

pub fn profile(video: VideoCodec, audio: AudioCodec, container: Container) -> StreamProfile {
    StreamProfile {
        video: Some(video),
        audio: Some(audio),
        container,
        duration_secs: None,
    }
}

/// A queue whose uploads land in a fresh temporary directory.
pub struct TestHarness {
    pub queue: JobQueue,
    pub dir: TempDir,
}

impl TestHarness {
    pub fn new(source: StreamProfile) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let services = JobServices::new(
            Arc::new(StaticFetcher),
            Arc::new(StaticInspector(source)),
            Arc::new(UpcaseTransformer),
            Arc::new(DirUploader::new(dir.path())),
            Arc::new(LogNotifier),
        );
        let settings = QueueSettings {
            probe_size: 8,
            ..QueueSettings::default()
        };
        Self {
            queue: JobQueue::init(services, settings),
            dir,
        }
    }

    /// Names of the files written so far, sorted.
    pub fn files(&self) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(self.dir.path())
            .expect("read_dir")
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    pub fn read(&self, name: &str) -> Vec<u8> {
        std::fs::read(self.dir.path().join(name)).expect("read output")
    }
}
