//! ts-core: shared types, IDs, errors, configuration, and tool seams.
//!
//! This crate is the foundational dependency for the other ts-* crates,
//! providing typed identifiers, a unified error type, media-domain types
//! (codecs, containers, stream profiles, transform plans), progress
//! plumbing, and the traits behind which external tools are hidden.

pub mod config;
pub mod error;
pub mod ids;
pub mod media;
pub mod progress;
pub mod stream;
pub mod tool;

// Re-export the most commonly used items at the crate root.
pub use error::{Error, Result};
pub use ids::*;
pub use media::*;
pub use progress::{ProgressEvent, ProgressSender};
pub use stream::{ByteStream, OutputStream};
pub use tool::{FetchedMedia, Fetcher, InspectionTool, TransformRequest, TransformTool};
