//! Packaging a finished job for the user: the download offer.
//!
//! A [`DownloadOffer`] is built once per successful job. Building it is what
//! counts the job in the usage statistics, so a job is counted exactly once
//! however many times its download is triggered.
//!
//! Delivery goes through an [`ArtifactSink`]. A batch is delivered one file
//! at a time with a pause in between; hosts that treat rapid successive
//! saves as abuse tend to drop all but the first otherwise.

use crate::error::ConvertError;
use crate::format::format_file_size;
use crate::job::{Artifact, JobKind, JobResult};
use crate::stats::{StatsStore, UsageStats};
use async_trait::async_trait;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Destination for delivered artifacts.
#[async_trait]
pub trait ArtifactSink: Send + Sync {
    /// Deliver one artifact and return where it went.
    async fn deliver(&self, artifact: &Artifact) -> Result<String, ConvertError>;
}

/// Writes artifacts into a directory, each one atomically.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl ArtifactSink for DirectorySink {
    async fn deliver(&self, artifact: &Artifact) -> Result<String, ConvertError> {
        // Artifact names come from user file names; keep only the final
        // component so nothing lands outside the directory.
        let file_name = Path::new(&artifact.name)
            .file_name()
            .ok_or_else(|| ConvertError::Internal(format!("bad artifact name '{}'", artifact.name)))?;
        let path = self.dir.join(file_name);
        let write_err = |source| ConvertError::OutputWriteFailed {
            path: path.clone(),
            source,
        };

        tokio::fs::create_dir_all(&self.dir).await.map_err(write_err)?;

        // Atomic write: write to temp, then rename
        let mut tmp_name = file_name.to_os_string();
        tmp_name.push(".part");
        let tmp_path = self.dir.join(tmp_name);
        tokio::fs::write(&tmp_path, &artifact.payload)
            .await
            .map_err(write_err)?;
        tokio::fs::rename(&tmp_path, &path).await.map_err(write_err)?;

        debug!("Wrote {} ({} bytes)", path.display(), artifact.payload.len());
        Ok(path.display().to_string())
    }
}

/// Title line shown for a finished job of `kind`.
pub fn title_for(kind: JobKind) -> &'static str {
    match kind {
        JobKind::ImagesToPdf => "PDF created",
        JobKind::PdfToImages => "Conversion complete",
        JobKind::PdfCompress => "Compression complete",
        JobKind::MediaConvert => "Conversion complete",
        JobKind::MediaTrim => "Trim complete",
    }
}

fn counted_bytes(result: &JobResult) -> u64 {
    result
        .original_total_bytes
        .unwrap_or(result.produced_total_bytes)
}

/// A finished job, ready to download.
#[derive(Debug, Clone)]
pub struct DownloadOffer {
    result: JobResult,
    delay: Duration,
    stats: UsageStats,
}

impl DownloadOffer {
    /// Build the offer and count the job in `stats`.
    ///
    /// The job counts as one file, weighted by the original size when it is
    /// known and by the produced size otherwise.
    pub fn new(result: JobResult, delay: Duration, stats: &dyn StatsStore) -> Self {
        let totals = stats.record(counted_bytes(&result));
        Self::with_totals(result, delay, totals)
    }

    /// Like [`new`](Self::new), but the store is updated on the blocking
    /// pool. A store that panics leaves the totals at zero.
    pub async fn counted(result: JobResult, delay: Duration, stats: Arc<dyn StatsStore>) -> Self {
        let bytes = counted_bytes(&result);
        let totals = match tokio::task::spawn_blocking(move || stats.record(bytes)).await {
            Ok(totals) => totals,
            Err(e) => {
                warn!("Usage stats update failed: {e}");
                UsageStats::default()
            }
        };
        Self::with_totals(result, delay, totals)
    }

    fn with_totals(result: JobResult, delay: Duration, stats: UsageStats) -> Self {
        info!(
            "{} ready: {} file(s), {}",
            result.kind,
            result.artifacts.len(),
            format_file_size(result.produced_total_bytes)
        );
        Self {
            result,
            delay,
            stats,
        }
    }

    pub fn result(&self) -> &JobResult {
        &self.result
    }

    /// Usage totals after this job was counted.
    pub fn stats(&self) -> UsageStats {
        self.stats
    }

    pub fn title(&self) -> &'static str {
        title_for(self.result.kind)
    }

    pub fn subtitle(&self) -> &str {
        &self.result.subtitle
    }

    pub fn reduction_percent(&self) -> Option<i64> {
        self.result.reduction_percent()
    }

    /// Label/value pairs for the size panel.
    pub fn size_lines(&self) -> Vec<(&'static str, String)> {
        let produced = format_file_size(self.result.produced_total_bytes);
        match self.result.original_total_bytes {
            Some(original) => vec![
                ("Original size", format_file_size(original)),
                ("New size", produced),
            ],
            None => vec![("File size", produced)],
        }
    }

    /// Deliver every artifact, in order, pausing between files of a batch.
    pub async fn download(&self, sink: &dyn ArtifactSink) -> Result<Vec<String>, ConvertError> {
        let mut delivered = Vec::with_capacity(self.result.artifacts.len());
        for (i, artifact) in self.result.artifacts.iter().enumerate() {
            if i > 0 && !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            delivered.push(sink.deliver(artifact).await?);
        }
        info!("Delivered {} file(s)", delivered.len());
        Ok(delivered)
    }

    /// Serializable view for machine-readable output.
    pub fn summary(&self) -> OfferSummary {
        OfferSummary {
            title: self.title().to_string(),
            subtitle: self.result.subtitle.clone(),
            artifacts: self
                .result
                .artifacts
                .iter()
                .map(|a| ArtifactSummary {
                    name: a.name.clone(),
                    mime_type: a.mime_type.clone(),
                    size: a.size(),
                })
                .collect(),
            original_total_bytes: self.result.original_total_bytes,
            produced_total_bytes: self.result.produced_total_bytes,
            reduction_percent: self.reduction_percent(),
        }
    }
}

/// See [`DownloadOffer::summary`].
#[derive(Debug, Clone, Serialize)]
pub struct OfferSummary {
    pub title: String,
    pub subtitle: String,
    pub artifacts: Vec<ArtifactSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_total_bytes: Option<u64>,
    pub produced_total_bytes: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reduction_percent: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ArtifactSummary {
    pub name: String,
    pub mime_type: String,
    pub size: u64,
}
