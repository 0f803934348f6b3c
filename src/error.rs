//! Error types for the convertx library.
//!
//! The taxonomy follows the three ways a job can go wrong:
//!
//! * [`ValidationError`] — bad or missing user input. Detected before any
//!   engine work unit runs; the job never starts.
//!
//! * [`EngineError`] — an external engine (pdfium, the PDF writer, ffmpeg)
//!   failed. The job aborts and the engine's message is surfaced verbatim.
//!
//! * [`PersistenceError`] — the usage-statistics store could not be read or
//!   written. Never returned to callers: the store logs it and degrades to
//!   zero state.
//!
//! [`ConvertError`] is what the controller returns at the job boundary; it
//! wraps the first two and adds the lifecycle failures (busy, cancelled,
//! timed out).

use std::path::PathBuf;
use thiserror::Error;

/// All errors returned by the job controller.
#[derive(Debug, Error)]
pub enum ConvertError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// User input was rejected before the engine was invoked.
    #[error("{0}")]
    Validation(#[from] ValidationError),

    // ── Engine errors ─────────────────────────────────────────────────────
    /// The external engine failed while processing a work unit.
    #[error("{0}")]
    Engine(#[from] EngineError),

    // ── Lifecycle errors ──────────────────────────────────────────────────
    /// A job is already validating or running on this controller.
    #[error("A job is already running; wait for it to finish before starting another")]
    Busy,

    /// The job was cancelled through its cancellation token.
    #[error("Job cancelled")]
    Cancelled,

    /// The job exceeded the configured timeout.
    #[error("Job timed out after {secs}s")]
    TimedOut { secs: u64 },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not read an input file from disk.
    #[error("Failed to read input file '{path}': {source}")]
    InputReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Could not write a delivered artifact.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ConvertError {
    /// True when the failure came from user input rather than processing.
    pub fn is_validation(&self) -> bool {
        matches!(self, ConvertError::Validation(_))
    }
}

/// Bad or missing user input, reported inline before any work starts.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("No input file selected")]
    NoInput,

    #[error("No image files selected")]
    NoImages,

    #[error("No valid pages selected")]
    NoValidPages,

    #[error("Enter a start or end time to trim")]
    MissingTrimPoints,

    #[error("Start time cannot be negative")]
    NegativeStart,

    #[error("End time cannot be negative")]
    NegativeEnd,

    #[error("Start time ({start}) is beyond the file length ({duration})")]
    StartBeyondDuration { start: String, duration: String },

    #[error("End time ({end}) is beyond the file length ({duration})")]
    EndBeyondDuration { end: String, duration: String },

    #[error("Start time must be before end time")]
    StartNotBeforeEnd,

    #[error("Media duration is unknown; cannot validate trim points")]
    UnknownDuration,

    #[error("Unsupported output format '{0}'")]
    UnknownFormat(String),

    #[error("Invalid resolution '{0}': expected 'original' or WIDTH:HEIGHT")]
    InvalidResolution(String),

    #[error("Invalid audio bitrate '{0}': expected e.g. 128k")]
    InvalidBitrate(String),

    #[error("Invalid page selection '{0}': expected all, first, or a range like 1-5,8")]
    InvalidPageSelection(String),

    #[error("Cannot read image '{name}' ({mime_type}); use PNG, JPEG, WebP, GIF or BMP")]
    UnsupportedImage { name: String, mime_type: String },

    #[error("The selected files are for {selected}, not {requested}; select files again")]
    KindMismatch { selected: String, requested: String },
}

/// A failure inside an external engine.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    /// The engine could not be loaded or bound.
    #[error("Conversion engine unavailable: {0}")]
    Unavailable(String),

    /// The engine raised an error while processing; message kept verbatim.
    #[error("{0}")]
    Failed(String),
}

impl EngineError {
    pub fn failed(msg: impl Into<String>) -> Self {
        EngineError::Failed(msg.into())
    }
}

impl From<std::io::Error> for EngineError {
    fn from(e: std::io::Error) -> Self {
        EngineError::Failed(e.to_string())
    }
}

impl From<image::ImageError> for EngineError {
    fn from(e: image::ImageError) -> Self {
        EngineError::Failed(e.to_string())
    }
}

/// Usage-statistics storage failure. Logged, never surfaced.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("Failed to read statistics from '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Statistics record at '{path}' is corrupt: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to write statistics to '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_message_is_verbatim() {
        let e = ConvertError::from(EngineError::failed("Invalid data found when processing input"));
        assert_eq!(e.to_string(), "Invalid data found when processing input");
        assert!(!e.is_validation());
    }

    #[test]
    fn validation_display() {
        let e = ConvertError::from(ValidationError::StartBeyondDuration {
            start: "2:00".into(),
            duration: "1:40".into(),
        });
        assert!(e.is_validation());
        let msg = e.to_string();
        assert!(msg.contains("2:00"), "got: {msg}");
        assert!(msg.contains("1:40"), "got: {msg}");
    }

    #[test]
    fn timed_out_display() {
        let e = ConvertError::TimedOut { secs: 30 };
        assert!(e.to_string().contains("30s"));
    }

    #[test]
    fn io_error_maps_to_failed() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "output.mp3 missing");
        let e = EngineError::from(io);
        assert!(matches!(e, EngineError::Failed(ref m) if m.contains("output.mp3")));
    }
}
