//! Progress reporting for conversion jobs.
//!
//! Inject an [`Arc<dyn JobProgressCallback>`] via
//! [`crate::config::ControllerConfigBuilder::progress_callback`] to receive
//! events as the controller works through a job.
//!
//! # Why callbacks and a stream?
//!
//! The callback is the least-invasive integration point: a terminal progress
//! bar, a log line or a UI binding can implement it directly. Hosts that
//! prefer to pull events can use [`channel`], which adapts the callback into
//! a [`futures::Stream`] of [`ProgressEvent`]s.
//!
//! Whatever the engine reports, the percentage a callback sees never goes
//! backwards: [`ProgressReporter`] enforces that before anything is emitted.

use crate::job::JobKind;
use futures::stream::BoxStream;
use futures::StreamExt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

/// Called by the controller as a job progresses.
///
/// All methods have default no-op implementations so callers only override
/// what they care about.
pub trait JobProgressCallback: Send + Sync {
    /// Called once after validation succeeds, before the first engine call.
    ///
    /// # Arguments
    /// * `kind`        — the kind of job starting
    /// * `total_units` — images or pages to process; 1 for media jobs
    fn on_job_start(&self, kind: JobKind, total_units: usize) {
        let _ = (kind, total_units);
    }

    /// Called before each work unit (1-indexed).
    fn on_unit_start(&self, unit: usize, total_units: usize) {
        let _ = (unit, total_units);
    }

    /// Called whenever the overall percentage increases.
    fn on_progress(&self, percent: u8) {
        let _ = percent;
    }

    /// Called when the job moves into a named phase (loading the engine,
    /// assembling output, ...).
    fn on_stage(&self, stage: &str) {
        let _ = stage;
    }

    /// Called once when the job succeeds.
    ///
    /// # Arguments
    /// * `artifacts`      — number of produced files
    /// * `produced_bytes` — their total size
    fn on_job_complete(&self, artifacts: usize, produced_bytes: u64) {
        let _ = (artifacts, produced_bytes);
    }

    /// Called once when the job fails, with the message shown to the user.
    fn on_job_error(&self, error: &str) {
        let _ = error;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl JobProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ControllerConfig`].
pub type ProgressCallback = Arc<dyn JobProgressCallback>;

// ── Event stream ─────────────────────────────────────────────────────────

/// One progress notification, as delivered through [`channel`].
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    JobStarted { kind: JobKind, total_units: usize },
    UnitStarted { unit: usize, total_units: usize },
    Progress(u8),
    Stage(String),
    Completed { artifacts: usize, produced_bytes: u64 },
    Failed(String),
}

/// Stream of events produced by a [`channel`] callback.
pub type ProgressStream = BoxStream<'static, ProgressEvent>;

struct ChannelCallback {
    tx: mpsc::UnboundedSender<ProgressEvent>,
}

impl ChannelCallback {
    fn send(&self, event: ProgressEvent) {
        // Receiver dropped: nobody is listening any more.
        let _ = self.tx.send(event);
    }
}

impl JobProgressCallback for ChannelCallback {
    fn on_job_start(&self, kind: JobKind, total_units: usize) {
        self.send(ProgressEvent::JobStarted { kind, total_units });
    }

    fn on_unit_start(&self, unit: usize, total_units: usize) {
        self.send(ProgressEvent::UnitStarted { unit, total_units });
    }

    fn on_progress(&self, percent: u8) {
        self.send(ProgressEvent::Progress(percent));
    }

    fn on_stage(&self, stage: &str) {
        self.send(ProgressEvent::Stage(stage.to_string()));
    }

    fn on_job_complete(&self, artifacts: usize, produced_bytes: u64) {
        self.send(ProgressEvent::Completed {
            artifacts,
            produced_bytes,
        });
    }

    fn on_job_error(&self, error: &str) {
        self.send(ProgressEvent::Failed(error.to_string()));
    }
}

/// Create a callback whose events are readable as a stream.
///
/// The stream ends once the callback (and every controller holding it) is
/// dropped.
pub fn channel() -> (ProgressCallback, ProgressStream) {
    let (tx, rx) = mpsc::unbounded_channel();
    let cb: ProgressCallback = Arc::new(ChannelCallback { tx });
    (cb, UnboundedReceiverStream::new(rx).boxed())
}

// ── Reporter ─────────────────────────────────────────────────────────────

/// Turns unit counts and engine ratios into a bounded, non-decreasing
/// percentage and forwards increases to the callback.
///
/// Clones share the same percentage, so the reporter can be moved into an
/// engine's progress closure.
#[derive(Clone)]
pub struct ProgressReporter {
    percent: Arc<AtomicU8>,
    callback: ProgressCallback,
}

impl ProgressReporter {
    pub fn new(callback: ProgressCallback) -> Self {
        Self {
            percent: Arc::new(AtomicU8::new(0)),
            callback,
        }
    }

    /// Current percentage, 0–100.
    pub fn percent(&self) -> u8 {
        self.percent.load(Ordering::SeqCst)
    }

    pub fn callback(&self) -> &ProgressCallback {
        &self.callback
    }

    /// Record that `done` of `total` units have completed.
    ///
    /// Reports `round(100 * done / total)`, held at 99 until the final unit
    /// completes.
    pub fn unit_completed(&self, done: usize, total: usize) {
        if total == 0 {
            return;
        }
        let done = done.min(total);
        let mut pct = ((100 * done) as f64 / total as f64).round() as u8;
        if done < total {
            pct = pct.min(99);
        }
        self.advance(pct);
    }

    /// Record an engine-reported completion ratio. Clamped to `[0, 1]`;
    /// non-finite ratios are ignored.
    pub fn engine_ratio(&self, ratio: f64) {
        if !ratio.is_finite() {
            return;
        }
        let pct = (ratio.clamp(0.0, 1.0) * 100.0).round() as u8;
        self.advance(pct);
    }

    /// Jump straight to 100.
    pub fn finish(&self) {
        self.advance(100);
    }

    fn advance(&self, pct: u8) {
        let pct = pct.min(100);
        let prev = self.percent.fetch_max(pct, Ordering::SeqCst);
        if pct > prev {
            self.callback.on_progress(pct);
        }
    }
}
