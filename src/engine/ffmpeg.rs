//! Media transcoding through `ffmpeg` / `ffprobe` subprocesses.
//!
//! The engine owns a private scratch directory standing in for a virtual
//! filesystem: jobs write their input under a plain file name, run a command
//! line that refers to it, and read the output back by name. Names are
//! confined to that directory.
//!
//! One instance is meant to be shared process-wide ([`FfmpegEngine::shared`]).
//! It initialises lazily on first [`load`](MediaEngine::load). Jobs reuse the
//! same scratch file names, so each one holds the engine's
//! [`lease`](MediaEngine::lease) for its whole write, run, read and delete
//! sequence.

use super::{MediaEngine, MediaLease};
use crate::config::{ENV_FFMPEG_PATH, ENV_FFPROBE_PATH};
use crate::error::EngineError;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, info};

static RE_DURATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Duration: (\d+):(\d{2}):(\d{2}(?:\.\d+)?)").unwrap());

static RE_TIME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"time=\s*(\d+):(\d{2}):(\d{2}(?:\.\d+)?)").unwrap());

static SHARED: Lazy<Arc<FfmpegEngine>> = Lazy::new(|| Arc::new(FfmpegEngine::from_env()));

/// Lines of stderr kept for error reporting.
const STDERR_TAIL: usize = 8;

/// [`MediaEngine`] that shells out to ffmpeg.
#[derive(Debug)]
pub struct FfmpegEngine {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
    scratch: OnceCell<TempDir>,
    lease: Arc<Mutex<()>>,
}

impl FfmpegEngine {
    pub fn new(ffmpeg: impl Into<PathBuf>, ffprobe: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
            scratch: OnceCell::new(),
            lease: Arc::new(Mutex::new(())),
        }
    }

    /// Executables from `FFMPEG_PATH` / `FFPROBE_PATH`, else from `PATH`.
    pub fn from_env() -> Self {
        let ffmpeg = std::env::var(ENV_FFMPEG_PATH).unwrap_or_else(|_| "ffmpeg".into());
        let ffprobe = std::env::var(ENV_FFPROBE_PATH).unwrap_or_else(|_| "ffprobe".into());
        Self::new(ffmpeg, ffprobe)
    }

    /// The process-wide instance.
    pub fn shared() -> Arc<FfmpegEngine> {
        SHARED.clone()
    }

    fn scratch_dir(&self) -> Result<&Path, EngineError> {
        self.scratch
            .get()
            .map(TempDir::path)
            .ok_or_else(|| EngineError::Unavailable("media engine not loaded".into()))
    }

    /// Resolve a scratch file name to a path inside the scratch directory.
    fn scratch_path(&self, name: &str) -> Result<PathBuf, EngineError> {
        let dir = self.scratch_dir()?;
        let valid = !name.is_empty()
            && name != "."
            && name != ".."
            && !name.contains(['/', '\\']);
        if !valid {
            return Err(EngineError::failed(format!("Invalid scratch file name '{name}'")));
        }
        Ok(dir.join(name))
    }
}

#[async_trait]
impl MediaEngine for FfmpegEngine {
    async fn lease(&self) -> MediaLease {
        Arc::clone(&self.lease).lock_owned().await
    }

    async fn load(&self) -> Result<(), EngineError> {
        self.scratch
            .get_or_try_init(|| async {
                let status = Command::new(&self.ffmpeg)
                    .arg("-version")
                    .stdout(Stdio::null())
                    .stderr(Stdio::null())
                    .status()
                    .await
                    .map_err(|e| {
                        EngineError::Unavailable(format!(
                            "ffmpeg not found at '{}' (set {ENV_FFMPEG_PATH}): {e}",
                            self.ffmpeg.display()
                        ))
                    })?;
                if !status.success() {
                    return Err(EngineError::Unavailable(format!(
                        "'{} -version' exited with {status}",
                        self.ffmpeg.display()
                    )));
                }
                let dir = tempfile::Builder::new().prefix("convertx-media-").tempdir()?;
                info!("Media engine ready (scratch: {})", dir.path().display());
                Ok::<TempDir, EngineError>(dir)
            })
            .await?;
        Ok(())
    }

    async fn write_input_file(&self, name: &str, data: &[u8]) -> Result<(), EngineError> {
        let path = self.scratch_path(name)?;
        tokio::fs::write(&path, data).await?;
        debug!("Wrote {} ({} bytes)", name, data.len());
        Ok(())
    }

    async fn run(
        &self,
        args: &[String],
        on_ratio: &(dyn Fn(f64) + Send + Sync),
    ) -> Result<(), EngineError> {
        let dir = self.scratch_dir()?.to_path_buf();
        debug!("ffmpeg {}", args.join(" "));

        let mut child = Command::new(&self.ffmpeg)
            .args(["-hide_banner", "-nostdin"])
            .args(args)
            .current_dir(&dir)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| EngineError::Unavailable(format!("Failed to spawn ffmpeg: {e}")))?;

        let mut tracker = ProgressTracker::new(requested_duration(args));
        let mut tail = VecDeque::with_capacity(STDERR_TAIL);

        if let Some(stderr) = child.stderr.take() {
            // Progress lines end in '\r', everything else in '\n'.
            let mut segments = BufReader::new(stderr).split(b'\r');
            while let Some(segment) = segments.next_segment().await? {
                let text = String::from_utf8_lossy(&segment);
                for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
                    if let Some(ratio) = tracker.observe(line) {
                        on_ratio(ratio);
                    } else {
                        if tail.len() == STDERR_TAIL {
                            tail.pop_front();
                        }
                        tail.push_back(line.to_string());
                    }
                }
            }
        }

        let status = child.wait().await?;
        if !status.success() {
            let message = tail.into_iter().collect::<Vec<_>>().join("\n");
            return Err(EngineError::Failed(if message.is_empty() {
                format!("ffmpeg exited with {status}")
            } else {
                message
            }));
        }
        on_ratio(1.0);
        Ok(())
    }

    async fn read_output_file(&self, name: &str) -> Result<Vec<u8>, EngineError> {
        let path = self.scratch_path(name)?;
        Ok(tokio::fs::read(&path).await?)
    }

    async fn delete_file(&self, name: &str) -> Result<(), EngineError> {
        let path = self.scratch_path(name)?;
        tokio::fs::remove_file(&path).await?;
        Ok(())
    }

    async fn probe_duration(&self, name: &str) -> Result<f64, EngineError> {
        let path = self.scratch_path(name)?;
        let output = Command::new(&self.ffprobe)
            .args([
                "-v",
                "error",
                "-show_entries",
                "format=duration",
                "-of",
                "default=noprint_wrappers=1:nokey=1",
            ])
            .arg(&path)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| {
                EngineError::Unavailable(format!(
                    "ffprobe not found at '{}' (set {ENV_FFPROBE_PATH}): {e}",
                    self.ffprobe.display()
                ))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(EngineError::Failed(stderr.trim().to_string()));
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        stdout
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|d| d.is_finite() && *d >= 0.0)
            .ok_or_else(|| EngineError::failed(format!("Could not read duration of {name}")))
    }
}

// ── Progress parsing ─────────────────────────────────────────────────────

/// Derives a completion ratio from ffmpeg's stderr.
///
/// The denominator is the requested output length when the command line
/// limits it (`-t` or `-to`), otherwise the input duration ffmpeg prints.
#[derive(Debug, Default)]
struct ProgressTracker {
    total: Option<f64>,
    requested: bool,
}

impl ProgressTracker {
    fn new(requested: Option<f64>) -> Self {
        Self {
            total: requested.filter(|d| *d > 0.0),
            requested: requested.is_some(),
        }
    }

    /// Feed one stderr line; returns a ratio for progress lines.
    fn observe(&mut self, line: &str) -> Option<f64> {
        if let Some(c) = RE_DURATION.captures(line) {
            if !self.requested && self.total.is_none() {
                self.total = hms(&c[1], &c[2], &c[3]).filter(|d| *d > 0.0);
            }
            return None;
        }
        let c = RE_TIME.captures(line)?;
        let total = self.total?;
        let elapsed = hms(&c[1], &c[2], &c[3])?;
        Some((elapsed / total).clamp(0.0, 1.0))
    }
}

fn hms(h: &str, m: &str, s: &str) -> Option<f64> {
    Some(h.parse::<f64>().ok()? * 3600.0 + m.parse::<f64>().ok()? * 60.0 + s.parse::<f64>().ok()?)
}

/// Output length requested on the command line, if any.
fn requested_duration(args: &[String]) -> Option<f64> {
    let value_after = |flag: &str| {
        args.iter()
            .position(|a| a == flag)
            .and_then(|i| args.get(i + 1))
            .and_then(|v| v.parse::<f64>().ok())
    };
    value_after("-t").or_else(|| value_after("-to"))
}
