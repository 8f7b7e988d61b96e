//! Cancellation at the granularity of a single read.

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, ReadBuf};
use tokio_util::sync::{CancellationToken, WaitForCancellationFutureOwned};
use ts_core::Error;

/// Wraps a reader so that every read observes a [`CancellationToken`].
///
/// Once the token fires, the next read (or a read already waiting on the
/// inner source) fails with a relayed [`Error::Cancelled`] instead of
/// waiting for more data.
pub struct CancellableReader<R> {
    inner: R,
    cancelled: Pin<Box<WaitForCancellationFutureOwned>>,
}

impl<R> CancellableReader<R> {
    pub fn new(inner: R, token: &CancellationToken) -> Self {
        Self {
            inner,
            cancelled: Box::pin(token.clone().cancelled_owned()),
        }
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: AsyncRead + Unpin> AsyncRead for CancellableReader<R> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        if this.cancelled.as_mut().poll(cx).is_ready() {
            return Poll::Ready(Err(Error::Cancelled.into_io()));
        }
        Pin::new(&mut this.inner).poll_read(cx, buf)
    }
}
