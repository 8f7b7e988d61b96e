//! Executes a [`TransformPlan`] against a replayed stream.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use ts_core::{
    Error, OutputStream, ProgressSender, Result, StreamDirective, StreamProfile, TransformPlan,
    TransformRequest, TransformTool,
};

use crate::replay::ReplayableStream;

/// Produces the final stream of a job.
///
/// Passthrough hands back the replayed source untouched; remux and
/// transcode run the [`TransformTool`] over it. Either way the result has
/// exactly one consumer.
#[derive(Clone)]
pub struct StreamTransformer {
    tool: Arc<dyn TransformTool>,
}

impl StreamTransformer {
    pub fn new(tool: Arc<dyn TransformTool>) -> Self {
        Self { tool }
    }

    /// Start producing the output of `plan`.
    ///
    /// `duration` is used to turn tool progress into percentages. Progress
    /// is only reported when a tool runs.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transform`] if the plan cannot be carried out on
    /// this source or the tool fails to start. Failures of the running tool
    /// surface when the returned stream ends.
    pub fn transform(
        &self,
        stream: ReplayableStream,
        plan: &TransformPlan,
        profile: &StreamProfile,
        duration: Option<Duration>,
        progress: Arc<ProgressSender>,
        cancel: &CancellationToken,
    ) -> Result<OutputStream> {
        if !plan.needs_tool() {
            tracing::debug!(container = %profile.container, "passing source through");
            return Ok(OutputStream::passthrough(
                Box::new(stream.into_replay()),
                profile.container.clone(),
            ));
        }

        let extracts_audio =
            plan.video == StreamDirective::Drop && matches!(plan.audio, StreamDirective::Encode(_));
        if extracts_audio && profile.audio.is_none() {
            return Err(Error::transform(
                self.tool.name(),
                "source has no audio stream to extract",
            ));
        }

        let duration = duration.or_else(|| {
            profile
                .duration_secs
                .filter(|d| d.is_finite() && *d > 0.0)
                .map(Duration::from_secs_f64)
        });

        let request = TransformRequest {
            input: Box::new(stream.into_replay()),
            plan: plan.clone(),
            profile: profile.clone(),
            duration,
            progress,
            cancel: cancel.clone(),
        };
        self.tool.launch(request).map_err(Error::into_transform)
    }
}

impl std::fmt::Debug for StreamTransformer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamTransformer")
            .field("tool", &self.tool.name())
            .finish()
    }
}
