//! Job and result types shared by the controller, pipelines and packager.

use crate::config::JobOptions;
use crate::input::SelectedFile;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The five conversions the controller knows how to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobKind {
    ImagesToPdf,
    PdfToImages,
    PdfCompress,
    MediaConvert,
    MediaTrim,
}

impl JobKind {
    /// True for kinds that drive the media engine.
    pub fn is_media(self) -> bool {
        matches!(self, JobKind::MediaConvert | JobKind::MediaTrim)
    }

    /// True for kinds that take every selected file rather than the first.
    pub fn accepts_many(self) -> bool {
        matches!(self, JobKind::ImagesToPdf)
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobKind::ImagesToPdf => "images-to-pdf",
            JobKind::PdfToImages => "pdf-to-images",
            JobKind::PdfCompress => "pdf-compress",
            JobKind::MediaConvert => "media-convert",
            JobKind::MediaTrim => "media-trim",
        };
        f.write_str(s)
    }
}

/// Lifecycle of a job on a controller.
///
/// `Idle → Validating → Running → {Succeeded, Failed}`, and back to `Idle`
/// on reset or a new selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum JobStatus {
    #[default]
    Idle,
    Validating,
    Running,
    Succeeded,
    Failed,
}

impl JobStatus {
    /// True while a job occupies the controller.
    pub fn is_busy(self) -> bool {
        matches!(self, JobStatus::Validating | JobStatus::Running)
    }
}

/// Snapshot of the job a controller is working on.
#[derive(Debug, Clone)]
pub struct ConversionJob {
    pub source_files: Vec<SelectedFile>,
    pub kind: JobKind,
    pub options: JobOptions,
    pub status: JobStatus,
    pub progress_percent: u8,
    /// Message of the failure that ended the job, if any.
    pub error: Option<String>,
}

/// One produced output file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    pub name: String,
    #[serde(skip)]
    pub payload: Vec<u8>,
    pub mime_type: String,
}

impl Artifact {
    pub fn new(name: impl Into<String>, payload: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            payload,
            mime_type: mime_type.into(),
        }
    }

    pub fn size(&self) -> u64 {
        self.payload.len() as u64
    }
}

/// The outcome of a successful job. Immutable once built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobResult {
    pub kind: JobKind,
    pub artifacts: Vec<Artifact>,
    /// Size of the source the output is compared against. `None` for kinds
    /// where the output is not a re-encoding of one source (images → PDF,
    /// PDF → images).
    pub original_total_bytes: Option<u64>,
    pub produced_total_bytes: u64,
    /// Kind-specific one-line description of what was produced.
    pub subtitle: String,
}

impl JobResult {
    /// Build a result; the produced total is the sum of the payload sizes.
    pub fn new(
        kind: JobKind,
        artifacts: Vec<Artifact>,
        original_total_bytes: Option<u64>,
        subtitle: impl Into<String>,
    ) -> Self {
        let produced_total_bytes = artifacts.iter().map(Artifact::size).sum();
        Self {
            kind,
            artifacts,
            original_total_bytes,
            produced_total_bytes,
            subtitle: subtitle.into(),
        }
    }

    /// `round(100 * (1 - produced / original))`, when the original is known.
    ///
    /// Negative when the output grew.
    pub fn reduction_percent(&self) -> Option<i64> {
        let original = self.original_total_bytes.filter(|o| *o > 0)?;
        let ratio = self.produced_total_bytes as f64 / original as f64;
        Some((100.0 * (1.0 - ratio)).round() as i64)
    }
}
