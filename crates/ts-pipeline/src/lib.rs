//! # ts-pipeline
//!
//! The fetch, inspect, decide, transform pipeline behind tubeshift.
//!
//! This crate provides:
//!
//! - **[`ReplayableStream`]** -- lets a single-pass download be read twice,
//!   once for inspection and once for the transform, without re-fetching.
//! - **[`MetadataInspector`]** -- profiles a stream from a bounded prefix.
//! - **[`decide`]** -- the pure decision between passthrough, remux and
//!   transcode.
//! - **[`StreamTransformer`]** -- carries out a decision, streaming output.
//! - **[`JobQueue`]** -- at most one active job per origin, with
//!   cancellation, a deadline, and handoff to the [`Uploader`] or
//!   [`Notifier`].

pub mod cancel;
pub mod context;
pub mod decision;
pub mod inspect;
pub mod job;
pub mod queue;
pub mod replay;
pub mod transformer;

// Re-export key types at the crate root.
pub use cancel::CancellableReader;
pub use context::{
    Announcement, DecisionAnnouncer, JobServices, Notice, NoticeKind, Notifier, ProgressSink,
    UploadMeta, Uploader,
};
pub use decision::decide;
pub use inspect::MetadataInspector;
pub use job::{JobPhase, JobSnapshot, JobTicket};
pub use queue::{JobQueue, QueueSettings};
pub use replay::{PrefixReader, ReplayReader, ReplayableStream};
pub use transformer::StreamTransformer;
