//! The conversion job controller.
//!
//! ## Why a controller instance?
//!
//! A controller owns the current selection, the one job that may be in
//! flight, and the collaborators it needs (engines, statistics store). There
//! is no global state: tests build as many controllers as they like, each
//! with its own mock engines.
//!
//! ## Lifecycle
//!
//! ```text
//!  select_files ─▶ Idle ─run─▶ Validating ─▶ Running ─┬─▶ Succeeded
//!                   ▲              │                  └─▶ Failed
//!                   │              └──────────────────────▶ Failed
//!                   └──── reset / select_files / remove_file / clear
//! ```
//!
//! While a job is `Validating` or `Running` the controller refuses new
//! submissions and selection changes with [`ConvertError::Busy`].

use crate::cancel::CancellationToken;
use crate::config::{ControllerConfig, JobOptions};
use crate::engine::Engines;
use crate::error::{ConvertError, ValidationError};
use crate::input::SelectedFile;
use crate::job::{ConversionJob, JobKind, JobResult, JobStatus};
use crate::package::DownloadOffer;
use crate::pipeline;
use crate::progress::{JobProgressCallback, NoopProgressCallback, ProgressCallback, ProgressReporter};
use crate::stats::{StatsStore, UsageStats};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

#[derive(Debug, Default)]
struct ControllerState {
    files: Vec<SelectedFile>,
    kind: Option<JobKind>,
    options: Option<JobOptions>,
    status: JobStatus,
    progress: u8,
    error: Option<String>,
}

impl ControllerState {
    fn back_to_idle(&mut self) {
        self.options = None;
        self.status = JobStatus::Idle;
        self.progress = 0;
        self.error = None;
    }
}

type SharedState = Arc<Mutex<ControllerState>>;

fn lock(state: &SharedState) -> MutexGuard<'_, ControllerState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Forwards events to the configured callback and mirrors the percentage
/// into the controller state so [`Controller::progress`] can be polled.
struct StateMirror {
    state: SharedState,
    inner: ProgressCallback,
}

impl JobProgressCallback for StateMirror {
    fn on_job_start(&self, kind: JobKind, total_units: usize) {
        self.inner.on_job_start(kind, total_units);
    }

    fn on_unit_start(&self, unit: usize, total_units: usize) {
        self.inner.on_unit_start(unit, total_units);
    }

    fn on_progress(&self, percent: u8) {
        lock(&self.state).progress = percent;
        self.inner.on_progress(percent);
    }

    fn on_stage(&self, stage: &str) {
        self.inner.on_stage(stage);
    }

    fn on_job_complete(&self, artifacts: usize, produced_bytes: u64) {
        self.inner.on_job_complete(artifacts, produced_bytes);
    }

    fn on_job_error(&self, error: &str) {
        self.inner.on_job_error(error);
    }
}

/// Drives conversion jobs over a file selection.
///
/// # Example
/// ```rust,no_run
/// use convertx::{
///     CancellationToken, Controller, ControllerConfig, Engines, ImagesToPdfOptions,
///     JobKind, JobOptions, JsonFileStats, SelectedFile,
/// };
/// use std::sync::Arc;
///
/// # async fn demo() -> Result<(), convertx::ConvertError> {
/// let controller = Controller::new(
///     Engines::default(),
///     Arc::new(JsonFileStats::default_location()),
///     ControllerConfig::default(),
/// );
/// controller.select_files(
///     JobKind::ImagesToPdf,
///     vec![SelectedFile::from_path("scan.png").await?],
/// )?;
/// let offer = controller
///     .run(
///         JobOptions::ImagesToPdf(ImagesToPdfOptions::default()),
///         &CancellationToken::new(),
///     )
///     .await?;
/// println!("{}: {}", offer.title(), offer.subtitle());
/// # Ok(())
/// # }
/// ```
pub struct Controller {
    engines: Engines,
    stats: Arc<dyn StatsStore>,
    config: ControllerConfig,
    state: SharedState,
}

impl std::fmt::Debug for Controller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Controller")
            .field("engines", &self.engines)
            .field("config", &self.config)
            .field("state", &*lock(&self.state))
            .finish()
    }
}

impl Controller {
    pub fn new(engines: Engines, stats: Arc<dyn StatsStore>, config: ControllerConfig) -> Self {
        Self {
            engines,
            stats,
            config,
            state: SharedState::default(),
        }
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn status(&self) -> JobStatus {
        lock(&self.state).status
    }

    /// Progress of the current (or last) job, 0–100.
    pub fn progress(&self) -> u8 {
        lock(&self.state).progress
    }

    /// The current selection.
    pub fn files(&self) -> Vec<SelectedFile> {
        lock(&self.state).files.clone()
    }

    /// Snapshot of the submitted job, if one has been submitted since the
    /// last reset.
    pub fn job(&self) -> Option<ConversionJob> {
        let state = lock(&self.state);
        let options = state.options.clone()?;
        Some(ConversionJob {
            source_files: state.files.clone(),
            kind: options.kind(),
            options,
            status: state.status,
            progress_percent: state.progress,
            error: state.error.clone(),
        })
    }

    /// Current usage totals.
    pub fn stats(&self) -> UsageStats {
        self.stats.load()
    }

    /// Select files for a job of `kind`.
    ///
    /// Images-to-PDF keeps only `image/*` files and appends to an existing
    /// image selection; every other kind replaces the selection with the
    /// first file. Returns how many files are now selected.
    pub fn select_files(
        &self,
        kind: JobKind,
        files: Vec<SelectedFile>,
    ) -> Result<usize, ConvertError> {
        let mut state = lock(&self.state);
        if state.status.is_busy() {
            return Err(ConvertError::Busy);
        }

        let offered = files.len();
        if kind.accepts_many() {
            let images = files.into_iter().filter(SelectedFile::is_image);
            if state.kind != Some(kind) {
                state.files.clear();
            }
            state.files.extend(images);
        } else {
            state.files = files.into_iter().take(1).collect();
        }
        state.kind = Some(kind);
        state.back_to_idle();

        debug!(
            "{}: {} file(s) offered, {} selected",
            kind,
            offered,
            state.files.len()
        );
        Ok(state.files.len())
    }

    /// Drop one file from the selection.
    pub fn remove_file(&self, index: usize) -> Result<SelectedFile, ConvertError> {
        let mut state = lock(&self.state);
        if state.status.is_busy() {
            return Err(ConvertError::Busy);
        }
        if index >= state.files.len() {
            return Err(ConvertError::Internal(format!(
                "no selected file at index {index}"
            )));
        }
        let removed = state.files.remove(index);
        state.back_to_idle();
        Ok(removed)
    }

    /// Drop the whole selection.
    pub fn clear(&self) -> Result<(), ConvertError> {
        let mut state = lock(&self.state);
        if state.status.is_busy() {
            return Err(ConvertError::Busy);
        }
        state.files.clear();
        state.kind = None;
        state.back_to_idle();
        Ok(())
    }

    /// Return a finished job to `Idle`, keeping the selection.
    pub fn reset(&self) -> Result<(), ConvertError> {
        let mut state = lock(&self.state);
        if state.status.is_busy() {
            return Err(ConvertError::Busy);
        }
        state.back_to_idle();
        Ok(())
    }

    /// Run one job over the current selection.
    ///
    /// Validation failures are returned before any work unit runs. Execution
    /// failures abort the remaining units and discard partial output. Either
    /// way the controller ends in `Failed` with the error message recorded.
    pub async fn run(
        &self,
        options: JobOptions,
        cancel: &CancellationToken,
    ) -> Result<DownloadOffer, ConvertError> {
        let kind = options.kind();
        let (selected, files) = {
            let mut state = lock(&self.state);
            if state.status.is_busy() {
                return Err(ConvertError::Busy);
            }
            state.status = JobStatus::Validating;
            state.options = Some(options.clone());
            state.progress = 0;
            state.error = None;
            (state.kind, state.files.clone())
        };

        let user_cb: ProgressCallback = self
            .config
            .progress_callback
            .clone()
            .unwrap_or_else(|| Arc::new(NoopProgressCallback));
        let callback: ProgressCallback = Arc::new(StateMirror {
            state: Arc::clone(&self.state),
            inner: user_cb,
        });
        let reporter = ProgressReporter::new(Arc::clone(&callback));

        info!("Starting {} job on {} file(s)", kind, files.len());
        let started = Instant::now();

        let outcome = self
            .race(self.drive(selected, &files, &options, &reporter), cancel)
            .await;

        match outcome {
            Ok(result) => {
                reporter.finish();
                lock(&self.state).status = JobStatus::Succeeded;
                callback.on_job_complete(result.artifacts.len(), result.produced_total_bytes);
                info!(
                    "{} job finished in {}ms",
                    kind,
                    started.elapsed().as_millis()
                );
                Ok(DownloadOffer::counted(
                    result,
                    Duration::from_millis(self.config.download_delay_ms),
                    Arc::clone(&self.stats),
                )
                .await)
            }
            Err(e) => {
                let message = e.to_string();
                {
                    let mut state = lock(&self.state);
                    state.status = JobStatus::Failed;
                    state.error = Some(message.clone());
                }
                callback.on_job_error(&message);
                if e.is_validation() {
                    info!("{} job rejected: {}", kind, message);
                } else {
                    warn!("{} job failed: {}", kind, message);
                }
                Err(e)
            }
        }
    }

    /// Validate, then execute. Flips the state to `Running` in between.
    ///
    /// `selected` is the kind the files were picked for; options of another
    /// kind are rejected.
    async fn drive(
        &self,
        selected: Option<JobKind>,
        files: &[SelectedFile],
        options: &JobOptions,
        reporter: &ProgressReporter,
    ) -> Result<JobResult, ConvertError> {
        if let Some(selected) = selected.filter(|k| *k != options.kind()) {
            return Err(ValidationError::KindMismatch {
                selected: selected.to_string(),
                requested: options.kind().to_string(),
            }
            .into());
        }
        let plan = pipeline::validate(files, options, &self.engines).await?;
        let total_units = plan.total_units();
        debug!("Plan ready: {} unit(s)", total_units);

        lock(&self.state).status = JobStatus::Running;
        reporter.callback().on_job_start(plan.kind(), total_units);

        pipeline::execute(plan, &self.engines, reporter).await
    }

    /// Race a job against cancellation and the configured timeout.
    async fn race<F>(&self, job: F, cancel: &CancellationToken) -> Result<JobResult, ConvertError>
    where
        F: std::future::Future<Output = Result<JobResult, ConvertError>>,
    {
        let deadline = async {
            match self.config.job_timeout {
                Some(limit) => tokio::time::sleep(limit).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ConvertError::Cancelled),
            _ = deadline => Err(ConvertError::TimedOut {
                secs: self.config.job_timeout.map(|t| t.as_secs()).unwrap_or_default(),
            }),
            res = job => res,
        }
    }
}
