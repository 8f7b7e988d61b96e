//! The job queue: at most one active job per origin, each driven through
//! fetch, inspection, decision, transform and handoff.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::Instrument;
use ts_core::config::Config;
use ts_core::{Error, FetchedMedia, Origin, OutputFormat, PlayableSet, ProgressSender, Result};

use crate::cancel::CancellableReader;
use crate::context::{Announcement, JobServices, Notice, NoticeKind, UploadMeta};
use crate::decision::decide;
use crate::inspect::MetadataInspector;
use crate::job::{Job, JobPhase, JobSnapshot, JobTicket};
use crate::replay::ReplayableStream;
use crate::transformer::StreamTransformer;

/// Queue-wide tunables.
#[derive(Debug, Clone)]
pub struct QueueSettings {
    /// What the target viewer plays without conversion.
    pub playable: PlayableSet,
    /// Upper bound of the prefix handed to the inspection tool.
    pub probe_size: usize,
    /// Deadline for a whole job, from fetch to handoff.
    pub job_timeout: Duration,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl QueueSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            playable: config.conversion.playable.clone(),
            probe_size: config.conversion.probe_size,
            job_timeout: config.queue.job_timeout(),
        }
    }
}

/// Serializes jobs per origin and runs each one on its own task.
///
/// Cloning is cheap; all clones share the same origin map.
#[derive(Clone)]
pub struct JobQueue {
    inner: Arc<Inner>,
}

struct Inner {
    services: JobServices,
    settings: QueueSettings,
    inspector: MetadataInspector,
    transformer: StreamTransformer,
    active: Mutex<HashMap<Origin, Arc<Job>>>,
}

impl JobQueue {
    /// Build a queue. Nothing runs until the first submission.
    pub fn init(services: JobServices, settings: QueueSettings) -> Self {
        let inspector = MetadataInspector::new(services.inspector.clone(), settings.probe_size);
        let transformer = StreamTransformer::new(services.transformer.clone());
        Self {
            inner: Arc::new(Inner {
                services,
                settings,
                inspector,
                transformer,
                active: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Start a job for `origin` and return without waiting for it.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// - [`Error::AlreadyActive`] if `origin` already has a job that has not
    ///   reached a terminal phase. The request is not queued.
    /// - [`Error::Validation`] if `url` is blank.
    pub fn submit(
        &self,
        origin: Origin,
        url: impl Into<String>,
        format: OutputFormat,
    ) -> Result<JobTicket> {
        let url = url.into();
        if url.trim().is_empty() {
            return Err(Error::Validation("url must not be empty".into()));
        }

        let job = {
            let mut active = self.inner.active.lock();
            if active.contains_key(&origin) {
                return Err(Error::AlreadyActive {
                    origin: origin.to_string(),
                });
            }
            let job = Arc::new(Job::new(origin.clone(), url, format));
            active.insert(origin, job.clone());
            job
        };

        tracing::info!(
            job_id = %job.id,
            origin = %job.origin,
            requested = %job.format,
            "job submitted: {}",
            job.url
        );
        let ticket = job.ticket();
        tokio::spawn(run(self.inner.clone(), job));
        Ok(ticket)
    }

    /// Cancel the active job of `origin`. Returns `false` (and does
    /// nothing) if there is none.
    pub fn cancel(&self, origin: &Origin) -> bool {
        let active = self.inner.active.lock();
        match active.get(origin) {
            Some(job) => {
                tracing::info!(job_id = %job.id, origin = %origin, phase = %job.phase(), "cancelling job");
                job.cancel.cancel();
                true
            }
            None => false,
        }
    }

    /// Cancel every active job. Returns how many were signalled.
    pub fn cancel_all(&self) -> usize {
        let active = self.inner.active.lock();
        for job in active.values() {
            job.cancel.cancel();
        }
        active.len()
    }

    /// Phase of the active job of `origin`, if any.
    pub fn phase(&self, origin: &Origin) -> Option<JobPhase> {
        self.inner.active.lock().get(origin).map(|job| job.phase())
    }

    /// Snapshots of all active jobs, oldest first.
    pub fn active(&self) -> Vec<JobSnapshot> {
        let mut jobs: Vec<JobSnapshot> = self
            .inner
            .active
            .lock()
            .values()
            .map(|job| job.snapshot())
            .collect();
        jobs.sort_by_key(|job| job.submitted_at);
        jobs
    }

    pub fn settings(&self) -> &QueueSettings {
        &self.inner.settings
    }
}

impl std::fmt::Debug for JobQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobQueue")
            .field("services", &self.inner.services)
            .field("settings", &self.inner.settings)
            .field("active", &self.inner.active.lock().len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Job execution
// ---------------------------------------------------------------------------

async fn run(inner: Arc<Inner>, job: Arc<Job>) {
    let span = tracing::info_span!("job", job_id = %job.id, origin = %job.origin);
    async move {
        let timeout = inner.settings.job_timeout;
        let outcome = match tokio::time::timeout(timeout, inner.process(&job)).await {
            Ok(outcome) => outcome,
            Err(_) => {
                // Release whatever the abandoned phase still holds.
                job.cancel.cancel();
                Err(Error::Timeout(timeout))
            }
        };
        inner.conclude(&job, outcome).await;
    }
    .instrument(span)
    .await
}

impl Inner {
    async fn process(&self, job: &Job) -> Result<()> {
        let cancel = &job.cancel;

        self.advance(job, JobPhase::Fetching)?;
        let fetched = tokio::select! {
            fetched = self.services.fetcher.fetch(&job.url, cancel) => fetched,
            _ = cancel.cancelled() => Err(Error::Cancelled),
        };
        let FetchedMedia {
            stream,
            title,
            duration,
        } = fetched.map_err(|e| match e {
            Error::Fetch { .. } | Error::Cancelled => e,
            other => Error::fetch(&job.url, other.to_string()),
        })?;
        tracing::info!(duration = ?duration, "fetching \"{title}\"");
        let mut stream = ReplayableStream::new(Box::new(CancellableReader::new(stream, cancel)));

        self.advance(job, JobPhase::Inspecting)?;
        let profile = self.inspector.inspect(&mut stream, cancel).await?;
        tracing::info!(
            video = %profile.video_label(),
            audio = %profile.audio_label(),
            container = %profile.container,
            "inspected source"
        );

        self.advance(job, JobPhase::Deciding)?;
        let plan = decide(&profile, job.format, &self.settings.playable);
        tracing::info!(action = %plan.action, container = %plan.container, "decided: {}", plan.rationale);
        if let Some(announcer) = &self.services.announcer {
            announcer.on_decision(&Announcement {
                job_id: job.id,
                origin: job.origin.clone(),
                video_codecs: profile.video_label(),
                audio_codecs: profile.audio_label(),
                action: plan.rationale.clone(),
            });
        }

        self.advance(job, JobPhase::Transforming)?;
        let progress = Arc::new(self.progress_sender(job));
        let mut output =
            self.transformer
                .transform(stream, &plan, &profile, duration, progress, cancel)?;

        let meta = UploadMeta {
            job_id: job.id,
            origin: job.origin.clone(),
            title,
            format: job.format,
            container: output.container().clone(),
        };
        let uploaded = tokio::select! {
            uploaded = self.services.uploader.upload(&mut output, &meta) => uploaded,
            _ = cancel.cancelled() => Err(Error::Cancelled),
        };

        match uploaded {
            Ok(()) => tokio::select! {
                finished = output.finish() => finished,
                _ = cancel.cancelled() => Err(Error::Cancelled),
            },
            Err(_) if cancel.is_cancelled() => Err(Error::Cancelled),
            // A broken transform explains a broken upload better than the
            // read error the uploader saw.
            Err(e) => Err(output.take_failure().unwrap_or(e)),
        }
    }

    /// Enter `next` unless the job has been cancelled meanwhile.
    fn advance(&self, job: &Job, next: JobPhase) -> Result<()> {
        if job.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        job.set_phase(next);
        tracing::info!(phase = %next, "job phase changed");
        Ok(())
    }

    fn progress_sender(&self, job: &Job) -> ProgressSender {
        let sink = self.services.progress.clone();
        let job_id = job.id;
        let origin = job.origin.clone();
        ProgressSender::new(move |event| {
            tracing::debug!(percent = event.percent, "{}", event.status);
            if let Some(sink) = &sink {
                sink.on_progress(job_id, &origin, event);
            }
        })
    }

    async fn conclude(&self, job: &Job, outcome: Result<()>) {
        let phase = match &outcome {
            Ok(()) => JobPhase::Completed,
            Err(e) if e.is_cancelled() => JobPhase::Cancelled,
            Err(_) => JobPhase::Failed,
        };

        let notice = match outcome {
            Ok(()) => {
                tracing::info!("job completed");
                None
            }
            Err(Error::Cancelled) => {
                tracing::info!("job cancelled");
                Some((NoticeKind::Cancelled, "cancelled on request".to_string()))
            }
            Err(e) => {
                tracing::error!(kind = e.kind(), "job failed: {e}");
                Some((NoticeKind::Failed, e.to_string()))
            }
        };

        if let Some((kind, reason)) = notice {
            self.services
                .notifier
                .notify(&Notice {
                    job_id: job.id,
                    origin: job.origin.clone(),
                    url: job.url.clone(),
                    kind,
                    reason,
                })
                .await;
        }

        // The job stays registered, and so keeps its origin busy, until it
        // is terminal. Both change under one lock so no submission sees a
        // free origin with a live job or a busy origin with a finished one.
        let mut active = self.active.lock();
        job.set_phase(phase);
        if active.get(&job.origin).is_some_and(|current| current.id == job.id) {
            active.remove(&job.origin);
        }
    }
}
