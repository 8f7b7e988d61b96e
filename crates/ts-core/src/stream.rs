//! Byte stream types shared between the fetcher, the transformer and the
//! uploader.

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::task::{ready, Context, Poll};

use tokio::io::{AsyncRead, ReadBuf};
use tokio::sync::oneshot;

use crate::error::{Error, Result};
use crate::media::Container;

/// A single-pass, forward-only byte source.
pub type ByteStream = Box<dyn AsyncRead + Send + Unpin>;

/// The final stream of a job, handed to exactly one consumer.
///
/// For remux and transcode jobs the bytes come from a running subprocess.
/// When the subprocess output ends, the stream waits for the supervisor's
/// verdict before reporting end-of-stream: a failed or cancelled transform
/// surfaces as a read error instead of a clean EOF, and the underlying
/// [`Error`] stays available through [`OutputStream::take_failure`].
pub struct OutputStream {
    inner: ByteStream,
    container: Container,
    completion: Option<oneshot::Receiver<Result<()>>>,
    failure: Option<Error>,
    /// Copy of the failure, re-reported by every later read.
    ended_with: Option<Error>,
}

impl OutputStream {
    /// A stream whose end-of-stream is final on its own.
    pub fn passthrough(inner: ByteStream, container: Container) -> Self {
        Self {
            inner,
            container,
            completion: None,
            failure: None,
            ended_with: None,
        }
    }

    /// A stream whose end-of-stream is confirmed by `completion`.
    pub fn supervised(
        inner: ByteStream,
        container: Container,
        completion: oneshot::Receiver<Result<()>>,
    ) -> Self {
        Self {
            inner,
            container,
            completion: Some(completion),
            failure: None,
            ended_with: None,
        }
    }

    /// Container of the bytes this stream yields.
    pub fn container(&self) -> &Container {
        &self.container
    }

    /// Take the error that ended the stream, if the producer failed.
    pub fn take_failure(&mut self) -> Option<Error> {
        self.failure.take()
    }

    /// Drain whatever the consumer left unread and wait for the producer's
    /// verdict.
    pub async fn finish(mut self) -> Result<()> {
        if let Some(err) = self.failure.take() {
            return Err(err);
        }
        match tokio::io::copy(&mut self, &mut tokio::io::sink()).await {
            Ok(_) => Ok(()),
            Err(io_err) => Err(self
                .failure
                .take()
                .or_else(|| Error::relayed(&io_err))
                .unwrap_or(Error::Io { source: io_err })),
        }
    }

    fn record_failure(&mut self, err: Error) -> io::Error {
        self.ended_with = Some(err.clone());
        self.failure = Some(err.clone());
        err.into_io()
    }
}

impl AsyncRead for OutputStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();

        if let Some(err) = &this.ended_with {
            return Poll::Ready(Err(err.clone().into_io()));
        }

        let before = buf.filled().len();
        ready!(Pin::new(&mut this.inner).poll_read(cx, buf))?;
        if buf.filled().len() > before {
            return Poll::Ready(Ok(()));
        }

        // Producer output is exhausted; confirm it actually succeeded.
        let Some(completion) = this.completion.as_mut() else {
            return Poll::Ready(Ok(()));
        };
        let verdict = ready!(Pin::new(completion).poll(cx));
        this.completion = None;
        match verdict {
            Ok(Ok(())) => Poll::Ready(Ok(())),
            Ok(Err(err)) => Poll::Ready(Err(this.record_failure(err))),
            Err(_) => Poll::Ready(Err(this.record_failure(Error::Internal(
                "transform supervisor went away".into(),
            )))),
        }
    }
}

impl std::fmt::Debug for OutputStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputStream")
            .field("container", &self.container)
            .field("supervised", &self.completion.is_some())
            .field("failed", &self.ended_with.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    fn bytes(data: &'static [u8]) -> ByteStream {
        Box::new(data)
    }

    #[tokio::test]
    async fn passthrough_reads_to_end() {
        let mut out = OutputStream::passthrough(bytes(b"hello"), Container::Mkv);
        let mut got = Vec::new();
        out.read_to_end(&mut got).await.unwrap();
        assert_eq!(got, b"hello");
        assert_eq!(out.container(), &Container::Mkv);
    }

    #[tokio::test]
    async fn supervised_success_ends_cleanly() {
        let (tx, rx) = oneshot::channel();
        let mut out = OutputStream::supervised(bytes(b"abc"), Container::Mp4, rx);
        tx.send(Ok(())).unwrap();

        let mut got = Vec::new();
        out.read_to_end(&mut got).await.unwrap();
        assert_eq!(got, b"abc");
        assert!(out.take_failure().is_none());
    }

    #[tokio::test]
    async fn supervised_failure_surfaces_at_end() {
        let (tx, rx) = oneshot::channel();
        let mut out = OutputStream::supervised(bytes(b"partial"), Container::Mkv, rx);
        tx.send(Err(Error::transform("ffmpeg", "moov atom not found")))
            .unwrap();

        let mut got = Vec::new();
        let err = out.read_to_end(&mut got).await.unwrap_err();
        assert!(err.to_string().contains("moov atom not found"));
        assert_eq!(got, b"partial");
        assert!(matches!(out.take_failure(), Some(Error::Transform { .. })));
    }

    #[tokio::test]
    async fn read_error_carries_the_producer_error() {
        let (tx, rx) = oneshot::channel();
        let mut out = OutputStream::supervised(bytes(b""), Container::Mkv, rx);
        tx.send(Err(Error::fetch("https://x/v", "Requested format is not available")))
            .unwrap();

        let err = out.read(&mut [0u8; 8]).await.unwrap_err();
        assert!(matches!(Error::relayed(&err), Some(Error::Fetch { .. })));

        // Later reads keep failing the same way.
        let again = out.read(&mut [0u8; 8]).await.unwrap_err();
        assert!(matches!(Error::relayed(&again), Some(Error::Fetch { .. })));
    }

    #[tokio::test]
    async fn finish_drains_and_reports() {
        let (tx, rx) = oneshot::channel();
        let out = OutputStream::supervised(bytes(b"unread bytes"), Container::Mkv, rx);
        tx.send(Err(Error::Cancelled)).unwrap();
        assert!(out.finish().await.unwrap_err().is_cancelled());
    }

    #[tokio::test]
    async fn dropped_supervisor_is_an_error() {
        let (tx, rx) = oneshot::channel::<Result<()>>();
        drop(tx);
        let out = OutputStream::supervised(bytes(b""), Container::Mkv, rx);
        assert!(matches!(out.finish().await, Err(Error::Internal(_))));
    }
}
