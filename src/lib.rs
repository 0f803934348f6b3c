//! # convertx
//!
//! Local file conversions driven by a single job controller: images to PDF,
//! PDF pages to images, PDF compression, and audio/video conversion and
//! trimming.
//!
//! ## Why this crate?
//!
//! Each conversion is a thin layer over a heavy external engine (pdfium for
//! rasterising, lopdf for writing PDFs, ffmpeg for media). What the engines
//! don't give you is the part around them: validating user-typed ranges
//! before any work starts, one job at a time with honest progress, cleaning
//! up scratch files, counting usage, and handing back named artifacts. That
//! part lives here, with the engines behind traits so it can be tested
//! without any of them installed.
//!
//! ## Pipeline Overview
//!
//! ```text
//! files ─▶ DropZone / SelectedFile
//!            │
//!            ├─ 1. Select    Controller::select_files (filter by kind)
//!            ├─ 2. Validate  ranges, trim window, format/bitrate/resolution
//!            ├─ 3. Execute   one engine call per page/image, or one media run
//!            ├─ 4. Package   JobResult ─▶ DownloadOffer (stats counted once)
//!            └─ 5. Deliver   ArtifactSink (DirectorySink: atomic writes)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use convertx::{
//!     CancellationToken, Controller, ControllerConfig, DirectorySink, Engines, JobKind,
//!     JobOptions, JsonFileStats, MediaTrimOptions, SelectedFile,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let controller = Controller::new(
//!         Engines::default(),
//!         Arc::new(JsonFileStats::default_location()),
//!         ControllerConfig::default(),
//!     );
//!     controller.select_files(
//!         JobKind::MediaTrim,
//!         vec![SelectedFile::from_path("talk.mp4").await?],
//!     )?;
//!     let offer = controller
//!         .run(
//!             JobOptions::MediaTrim(MediaTrimOptions::new("1:30", "4:00")),
//!             &CancellationToken::new(),
//!         )
//!         .await?;
//!     offer.download(&DirectorySink::new("out")).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `convertx` binary (clap + indicatif + anyhow + tracing-subscriber) |
//!
//! ## External engines
//!
//! | Engine | Used for | Located via |
//! |--------|----------|-------------|
//! | pdfium | page count, page sizes, rasterising | `PDFIUM_LIB_PATH`, cache dir, system library |
//! | lopdf  | writing image-only PDFs | compiled in |
//! | ffmpeg / ffprobe | media conversion, trimming, duration | `FFMPEG_PATH` / `FFPROBE_PATH`, else `PATH` |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod cancel;
pub mod config;
pub mod controller;
pub mod engine;
pub mod error;
pub mod format;
pub mod input;
pub mod job;
pub mod layout;
pub mod package;
pub mod pipeline;
pub mod progress;
pub mod range;
pub mod stats;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use cancel::CancellationToken;
pub use config::{
    CompressionLevel, ControllerConfig, ControllerConfigBuilder, ImageFormat, ImagesToPdfOptions,
    JobOptions, MediaConvertOptions, MediaTrimOptions, PageSelection, PdfCompressOptions,
    PdfToImagesOptions,
};
pub use controller::Controller;
pub use engine::{
    DocumentInfo, EmbedMode, EmbeddedImage, Engines, FfmpegEngine, LopdfWriter, MediaEngine, MediaLease,
    PdfRenderer, PdfWriter, PdfiumRenderer, PlacedPage,
};
pub use error::{ConvertError, EngineError, PersistenceError, ValidationError};
pub use format::{format_file_size, format_time};
pub use input::{is_video_file, ClickTarget, DropZone, SelectedFile, ZoneAction, ZoneEvent};
pub use job::{Artifact, ConversionJob, JobKind, JobResult, JobStatus};
pub use layout::{PageSize, Placement, Rect};
pub use package::{ArtifactSink, DirectorySink, DownloadOffer, OfferSummary};
pub use pipeline::media::MediaFormat;
pub use progress::{
    JobProgressCallback, NoopProgressCallback, ProgressCallback, ProgressEvent, ProgressReporter,
    ProgressStream,
};
pub use range::{parse_page_range, parse_time_to_seconds, TrimWindow};
pub use stats::{JsonFileStats, MemoryStats, StatsStore, UsageStats};
