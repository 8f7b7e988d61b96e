//! Job records and their lifecycle.

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use ts_core::{JobId, Origin, OutputFormat};

/// Where a job is in its lifecycle.
///
/// ```text
/// Pending -> Fetching -> Inspecting -> Deciding -> Transforming -> Completed
/// ```
///
/// `Cancelled` is reachable from every non-terminal phase; `Failed` from
/// `Fetching`, `Inspecting` and `Transforming`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobPhase {
    Pending,
    Fetching,
    Inspecting,
    Deciding,
    Transforming,
    Completed,
    Failed,
    Cancelled,
}

impl JobPhase {
    /// Whether the job is over.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

impl std::fmt::Display for JobPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Fetching => write!(f, "fetching"),
            Self::Inspecting => write!(f, "inspecting"),
            Self::Deciding => write!(f, "deciding"),
            Self::Transforming => write!(f, "transforming"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// A submitted request, owned by the queue until it reaches a terminal
/// phase.
#[derive(Debug)]
pub struct Job {
    pub id: JobId,
    pub origin: Origin,
    pub url: String,
    pub format: OutputFormat,
    pub submitted_at: DateTime<Utc>,
    pub(crate) cancel: CancellationToken,
    phase: watch::Sender<JobPhase>,
}

impl Job {
    pub(crate) fn new(origin: Origin, url: String, format: OutputFormat) -> Self {
        let (phase, _) = watch::channel(JobPhase::Pending);
        Self {
            id: JobId::new(),
            origin,
            url,
            format,
            submitted_at: Utc::now(),
            cancel: CancellationToken::new(),
            phase,
        }
    }

    pub fn phase(&self) -> JobPhase {
        *self.phase.borrow()
    }

    /// Move to `next`. Terminal phases are final: later transitions are
    /// ignored.
    pub(crate) fn set_phase(&self, next: JobPhase) -> bool {
        self.phase.send_if_modified(|current| {
            if current.is_terminal() || *current == next {
                return false;
            }
            *current = next;
            true
        })
    }

    pub(crate) fn ticket(&self) -> JobTicket {
        JobTicket {
            id: self.id,
            origin: self.origin.clone(),
            phase: self.phase.subscribe(),
        }
    }

    pub(crate) fn snapshot(&self) -> JobSnapshot {
        JobSnapshot {
            id: self.id,
            origin: self.origin.clone(),
            url: self.url.clone(),
            format: self.format,
            submitted_at: self.submitted_at,
            phase: self.phase(),
        }
    }
}

/// Point-in-time view of an active job.
#[derive(Debug, Clone, PartialEq)]
pub struct JobSnapshot {
    pub id: JobId,
    pub origin: Origin,
    pub url: String,
    pub format: OutputFormat,
    pub submitted_at: DateTime<Utc>,
    pub phase: JobPhase,
}

/// Handle returned on submission for following a job to its end.
#[derive(Debug, Clone)]
pub struct JobTicket {
    pub id: JobId,
    pub origin: Origin,
    phase: watch::Receiver<JobPhase>,
}

impl JobTicket {
    /// Current phase.
    pub fn phase(&self) -> JobPhase {
        *self.phase.borrow()
    }

    /// Wait until the job reaches a terminal phase and return it.
    pub async fn wait(&mut self) -> JobPhase {
        let reached = self
            .phase
            .wait_for(JobPhase::is_terminal)
            .await
            .map(|phase| *phase);
        // If the job record is gone, the last value it published stands.
        reached.unwrap_or_else(|_| *self.phase.borrow())
    }
}
