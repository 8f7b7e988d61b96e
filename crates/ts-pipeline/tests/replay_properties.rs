//! Property tests for stream replay.

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use proptest::prelude::*;
use tokio::io::{AsyncRead, AsyncReadExt, ReadBuf};
use ts_pipeline::ReplayableStream;

/// Hands out the source in reads of at most `chunk` bytes.
struct Trickle {
    data: Vec<u8>,
    pos: usize,
    chunk: usize,
}

impl AsyncRead for Trickle {
    fn poll_read(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        let n = this.chunk.min(buf.remaining()).min(this.data.len() - this.pos);
        buf.put_slice(&this.data[this.pos..this.pos + n]);
        this.pos += n;
        Poll::Ready(Ok(()))
    }
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap()
}

proptest! {
    /// Whatever prefix the first reader takes, the second sees the exact source.
    #[test]
    fn replay_yields_exact_source(
        data in proptest::collection::vec(any::<u8>(), 0..4096),
        prefix_fraction in 0.0f64..=1.0,
        chunk in 1usize..512,
    ) {
        let prefix_len = (data.len() as f64 * prefix_fraction) as usize;
        let (prefix, replayed) = runtime().block_on(async {
            let mut stream = ReplayableStream::new(Box::new(Trickle {
                data: data.clone(),
                pos: 0,
                chunk,
            }));
            let mut prefix = vec![0u8; prefix_len];
            stream.prefix_reader().read_exact(&mut prefix).await.unwrap();

            let mut replayed = Vec::new();
            stream.into_replay().read_to_end(&mut replayed).await.unwrap();
            (prefix, replayed)
        });

        prop_assert_eq!(&prefix[..], &data[..prefix_len]);
        prop_assert_eq!(replayed, data);
    }

    /// Reading the replay in small pieces changes nothing.
    #[test]
    fn replay_in_small_reads(
        data in proptest::collection::vec(any::<u8>(), 1..2048),
        prefix_len in 0usize..2048,
        read_size in 1usize..64,
    ) {
        let prefix_len = prefix_len.min(data.len());
        let replayed = runtime().block_on(async {
            let mut stream = ReplayableStream::new(Box::new(Trickle {
                data: data.clone(),
                pos: 0,
                chunk: 97,
            }));
            let mut prefix = vec![0u8; prefix_len];
            stream.prefix_reader().read_exact(&mut prefix).await.unwrap();

            let mut replay = stream.into_replay();
            let mut out = Vec::new();
            let mut piece = vec![0u8; read_size];
            loop {
                let n = replay.read(&mut piece).await.unwrap();
                if n == 0 {
                    break;
                }
                out.extend_from_slice(&piece[..n]);
            }
            out
        });

        prop_assert_eq!(replayed, data);
    }
}
