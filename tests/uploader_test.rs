//! Directory uploader against passthrough and supervised streams.

use assert_matches::assert_matches;
use tokio::sync::oneshot;
use ts_core::{Container, Error, JobId, Origin, OutputFormat, OutputStream};
use ts_pipeline::{UploadMeta, Uploader};
use tubeshift::sinks::DirUploader;

fn meta(title: &str, container: Container) -> UploadMeta {
    UploadMeta {
        job_id: JobId::new(),
        origin: Origin::from("chat-1"),
        title: title.to_string(),
        format: OutputFormat::Video,
        container,
    }
}

fn stream(bytes: &'static [u8], container: Container) -> OutputStream {
    OutputStream::passthrough(Box::new(bytes), container)
}

#[tokio::test]
async fn writes_stream_under_sanitized_title() {
    let dir = tempfile::tempdir().unwrap();
    let uploader = DirUploader::new(dir.path().join("nested"));

    let mut out = stream(b"media bytes", Container::Mkv);
    uploader
        .upload(&mut out, &meta("Live: part 1/2", Container::Mkv))
        .await
        .unwrap();

    let written = std::fs::read(dir.path().join("nested/Live_ part 1_2.mkv")).unwrap();
    assert_eq!(written, b"media bytes");
}

#[tokio::test]
async fn existing_file_is_not_overwritten() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("clip.mp4"), b"old").unwrap();
    let uploader = DirUploader::new(dir.path());
    let meta = meta("clip", Container::Mp4);

    let mut out = stream(b"new", Container::Mp4);
    uploader.upload(&mut out, &meta).await.unwrap();

    assert_eq!(std::fs::read(dir.path().join("clip.mp4")).unwrap(), b"old");
    let renamed = dir.path().join(format!("clip-{}.mp4", meta.job_id));
    assert_eq!(std::fs::read(renamed).unwrap(), b"new");
}

#[tokio::test]
async fn blank_title_falls_back_to_job_id() {
    let dir = tempfile::tempdir().unwrap();
    let uploader = DirUploader::new(dir.path());
    let meta = meta(" .. ", Container::Mp3);

    assert_eq!(
        uploader.target_path(&meta),
        dir.path().join(format!("{}.mp3", meta.job_id))
    );
}

#[tokio::test]
async fn unwritable_directory_is_upload_error() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("taken");
    std::fs::write(&blocker, b"not a directory").unwrap();
    let uploader = DirUploader::new(&blocker);

    let mut out = stream(b"bytes", Container::Mkv);
    let result = uploader.upload(&mut out, &meta("clip", Container::Mkv)).await;

    assert_matches!(result, Err(Error::Upload(_)));
}

#[tokio::test]
async fn failed_producer_leaves_no_file() {
    let dir = tempfile::tempdir().unwrap();
    let uploader = DirUploader::new(dir.path());

    let (tx, rx) = oneshot::channel();
    tx.send(Err(Error::transform("ffmpeg", "exit status 1")))
        .unwrap();
    let mut out = OutputStream::supervised(Box::new(&b"partial"[..]), Container::Mkv, rx);

    let result = uploader.upload(&mut out, &meta("clip", Container::Mkv)).await;

    assert_matches!(result, Err(Error::Transform { .. }));
    assert_matches!(out.take_failure(), Some(Error::Transform { .. }));
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}
