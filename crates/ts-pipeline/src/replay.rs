//! Replay of a single-pass byte source.
//!
//! A [`ReplayableStream`] lets two readers consume the same forward-only
//! source one after the other. The first reader ([`PrefixReader`]) pulls
//! bytes from the source and every byte it sees is recorded. The second
//! reader ([`ReplayReader`]) starts again at offset zero: it replays the
//! recorded bytes and then continues with the live source, so it observes
//! the complete source sequence exactly once.
//!
//! The two readers are strictly sequential. Obtaining the replay reader
//! consumes the wrapper, which makes overlapping use impossible.

use std::io;
use std::pin::Pin;
use std::task::{ready, Context, Poll};

use tokio::io::{AsyncRead, ReadBuf};
use ts_core::ByteStream;

/// Buffering decorator over a single-pass source.
pub struct ReplayableStream {
    source: ByteStream,
    buffer: Vec<u8>,
}

impl ReplayableStream {
    pub fn new(source: ByteStream) -> Self {
        Self {
            source,
            buffer: Vec::new(),
        }
    }

    /// Reader for the inspection pass. Everything it yields is retained for
    /// the replay. It may stop anywhere, including before the first byte.
    pub fn prefix_reader(&mut self) -> PrefixReader<'_> {
        PrefixReader { stream: self }
    }

    /// Number of bytes pulled from the source so far.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Bytes pulled from the source so far.
    pub fn prefix(&self) -> &[u8] {
        &self.buffer
    }

    /// Hand the stream to its final reader, rewound to offset zero.
    pub fn into_replay(self) -> ReplayReader {
        ReplayReader {
            source: self.source,
            buffer: self.buffer,
            cursor: 0,
        }
    }
}

impl std::fmt::Debug for ReplayableStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplayableStream")
            .field("buffered", &self.buffer.len())
            .finish_non_exhaustive()
    }
}

/// First-pass reader; see [`ReplayableStream::prefix_reader`].
pub struct PrefixReader<'a> {
    stream: &'a mut ReplayableStream,
}

impl AsyncRead for PrefixReader<'_> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let stream = &mut *self.get_mut().stream;
        let before = buf.filled().len();
        ready!(Pin::new(&mut stream.source).poll_read(cx, buf))?;
        stream.buffer.extend_from_slice(&buf.filled()[before..]);
        Poll::Ready(Ok(()))
    }
}

/// Second-pass reader; see [`ReplayableStream::into_replay`].
///
/// Dropping it drops the source, closing it.
pub struct ReplayReader {
    source: ByteStream,
    buffer: Vec<u8>,
    cursor: usize,
}

impl ReplayReader {
    /// Bytes still waiting to be replayed from the buffer.
    pub fn pending_replay(&self) -> usize {
        self.buffer.len() - self.cursor
    }
}

impl AsyncRead for ReplayReader {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();

        if this.cursor < this.buffer.len() {
            let n = buf.remaining().min(this.buffer.len() - this.cursor);
            buf.put_slice(&this.buffer[this.cursor..this.cursor + n]);
            this.cursor += n;
            if this.cursor == this.buffer.len() {
                // Fully replayed; the memory is no longer needed.
                this.buffer = Vec::new();
                this.cursor = 0;
            }
            return Poll::Ready(Ok(()));
        }

        Pin::new(&mut this.source).poll_read(cx, buf)
    }
}

impl std::fmt::Debug for ReplayReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplayReader")
            .field("pending_replay", &self.pending_replay())
            .finish_non_exhaustive()
    }
}
