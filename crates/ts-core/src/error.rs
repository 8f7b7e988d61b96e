//! Unified error type for tubeshift.
//!
//! All crates funnel their failures into [`Error`]. The variants follow the
//! job failure taxonomy: fetch, probe, transform, upload, plus the two
//! non-failure outcomes a caller must tell apart ([`Error::AlreadyActive`]
//! and [`Error::Cancelled`]).

use std::time::Duration;

/// Unified error type covering all failure modes in tubeshift.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The remote source was unreachable or rejected the request.
    #[error("Fetch error [{url}]: {message}")]
    Fetch {
        /// The URL that was being fetched.
        url: String,
        /// Human-readable error description.
        message: String,
    },

    /// The stream prefix could not be parsed into a profile.
    #[error("Probe error: {0}")]
    Probe(String),

    /// The external processing step failed or could not be started.
    #[error("Transform error [{tool}]: {message}")]
    Transform {
        /// Name of the tool that failed.
        tool: String,
        /// Diagnostic output of the failed step.
        message: String,
    },

    /// An external tool invocation returned an error.
    #[error("Tool error [{tool}]: {message}")]
    Tool {
        /// Name of the tool that failed.
        tool: String,
        /// Human-readable error description.
        message: String,
    },

    /// The origin already has a non-terminal job.
    #[error("A job is already active for {origin}")]
    AlreadyActive {
        /// The origin that was rejected.
        origin: String,
    },

    /// The job was cancelled on request.
    #[error("Cancelled")]
    Cancelled,

    /// Handing the final stream to the uploader failed.
    #[error("Upload error: {0}")]
    Upload(String),

    /// The job exceeded its deadline.
    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    /// Input data failed validation.
    #[error("Validation error: {0}")]
    Validation(String),

    /// An I/O operation failed.
    #[error("IO error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Catch-all for unexpected internal errors.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Short, stable label for logs and reports.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Fetch { .. } => "fetch",
            Error::Probe(_) => "probe",
            Error::Transform { .. } => "transform",
            Error::Tool { .. } => "tool",
            Error::AlreadyActive { .. } => "already_active",
            Error::Cancelled => "cancelled",
            Error::Upload(_) => "upload",
            Error::Timeout(_) => "timeout",
            Error::Validation(_) => "validation",
            Error::Io { .. } => "io",
            Error::Internal(_) => "internal",
        }
    }

    /// Whether this error is a user-requested abort rather than a failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }

    /// Convenience constructor for [`Error::Fetch`].
    pub fn fetch(url: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Fetch {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Convenience constructor for [`Error::Transform`].
    pub fn transform(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Transform {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Convenience constructor for [`Error::Tool`].
    pub fn tool(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Tool {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Recover a job error that a reader relayed inside an I/O error.
    ///
    /// Streams such as [`crate::OutputStream`] report producer failures as
    /// read errors; this lets the reader's caller keep the original variant
    /// instead of relabelling it after its own phase.
    pub fn relayed(err: &std::io::Error) -> Option<Error> {
        err.get_ref()
            .and_then(|inner| inner.downcast_ref::<Error>())
            .cloned()
    }

    /// Wrap this error in an I/O error that [`Error::relayed`] can unwrap.
    pub fn into_io(self) -> std::io::Error {
        std::io::Error::other(self)
    }

    /// Re-label a tool failure as a transform failure, keeping its diagnostics.
    ///
    /// Other variants pass through unchanged.
    pub fn into_transform(self) -> Self {
        match self {
            Error::Tool { tool, message } => Error::Transform { tool, message },
            other => other,
        }
    }
}

impl Clone for Error {
    fn clone(&self) -> Self {
        match self {
            Error::Fetch { url, message } => Error::fetch(url.clone(), message.clone()),
            Error::Probe(m) => Error::Probe(m.clone()),
            Error::Transform { tool, message } => Error::transform(tool.clone(), message.clone()),
            Error::Tool { tool, message } => Error::tool(tool.clone(), message.clone()),
            Error::AlreadyActive { origin } => Error::AlreadyActive {
                origin: origin.clone(),
            },
            Error::Cancelled => Error::Cancelled,
            Error::Upload(m) => Error::Upload(m.clone()),
            Error::Timeout(d) => Error::Timeout(*d),
            Error::Validation(m) => Error::Validation(m.clone()),
            // io::Error is not Clone; kind and message survive.
            Error::Io { source } => Error::Io {
                source: std::io::Error::new(source.kind(), source.to_string()),
            },
            Error::Internal(m) => Error::Internal(m.clone()),
        }
    }
}

/// Result alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
