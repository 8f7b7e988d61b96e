//! Stream inspection from a bounded prefix.

use std::sync::Arc;

use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;
use ts_core::{Error, InspectionTool, Result, StreamProfile};

use crate::replay::ReplayableStream;

/// Reads the head of a [`ReplayableStream`] and asks an [`InspectionTool`]
/// what it contains.
///
/// At most `probe_size` bytes are pulled from the source. The stream is
/// left open and positioned after the prefix, so the same bytes can be
/// replayed to the transformer.
#[derive(Clone)]
pub struct MetadataInspector {
    tool: Arc<dyn InspectionTool>,
    probe_size: usize,
}

impl MetadataInspector {
    pub fn new(tool: Arc<dyn InspectionTool>, probe_size: usize) -> Self {
        Self {
            tool,
            probe_size: probe_size.max(1),
        }
    }

    /// Produce the [`StreamProfile`] of `stream`.
    ///
    /// # Errors
    ///
    /// - [`Error::Cancelled`] if `cancel` fires first.
    /// - The source's own error (such as [`Error::Fetch`]) if reading it
    ///   fails with one.
    /// - [`Error::Probe`] if the stream is empty, cannot be read, or the
    ///   tool cannot make sense of the prefix.
    pub async fn inspect(
        &self,
        stream: &mut ReplayableStream,
        cancel: &CancellationToken,
    ) -> Result<StreamProfile> {
        let limit = self.probe_size as u64;
        let read = async {
            let mut reader = stream.prefix_reader().take(limit);
            let mut sink = Vec::new();
            reader.read_to_end(&mut sink).await
        };
        let read = tokio::select! {
            read = read => read,
            _ = cancel.cancelled() => return Err(Error::Cancelled),
        };
        if let Err(e) = read {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            // A source that broke keeps its own error, e.g. a failed download.
            return Err(Error::relayed(&e)
                .unwrap_or_else(|| Error::Probe(format!("reading stream prefix: {e}"))));
        }

        let prefix = stream.prefix();
        if prefix.is_empty() {
            return Err(Error::Probe("stream is empty".into()));
        }
        tracing::debug!(bytes = prefix.len(), tool = self.tool.name(), "inspecting prefix");

        let profile = tokio::select! {
            profile = self.tool.inspect(prefix) => profile,
            _ = cancel.cancelled() => return Err(Error::Cancelled),
        };
        profile.map_err(|e| match e {
            Error::Probe(_) | Error::Cancelled => e,
            other => Error::Probe(other.to_string()),
        })
    }
}

impl std::fmt::Debug for MetadataInspector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetadataInspector")
            .field("tool", &self.tool.name())
            .field("probe_size", &self.probe_size)
            .finish()
    }
}
