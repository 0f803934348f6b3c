//! Configuration types for conversion jobs.
//!
//! Controller-wide behaviour lives in [`ControllerConfig`], built via its
//! [`ControllerConfigBuilder`]. Per-job knobs live in one option struct per
//! [`JobKind`], wrapped in [`JobOptions`] when a job is submitted.
//!
//! Option structs keep user-typed values (format names, resolutions, page
//! ranges) as text; they are translated into engine parameters when the job
//! is validated, so a malformed value fails the job instead of the caller.

use crate::error::ConvertError;
use crate::job::JobKind;
use crate::layout::{PageSize, Placement};
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Controller-wide configuration.
///
/// # Example
/// ```rust
/// use convertx::ControllerConfig;
/// use std::time::Duration;
///
/// let config = ControllerConfig::builder()
///     .job_timeout(Duration::from_secs(300))
///     .download_delay_ms(250)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ControllerConfig {
    /// Abort a job that runs longer than this. Default: no limit.
    pub job_timeout: Option<Duration>,

    /// Pause between artifacts when a batch is delivered. Default: 500.
    ///
    /// Hosts that throttle rapid successive saves (browsers, some sync
    /// clients) drop files delivered back to back.
    pub download_delay_ms: u64,

    /// Receives typed progress events for every job.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            job_timeout: None,
            download_delay_ms: 500,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ControllerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControllerConfig")
            .field("job_timeout", &self.job_timeout)
            .field("download_delay_ms", &self.download_delay_ms)
            .field(
                "progress_callback",
                &self
                    .progress_callback
                    .as_ref()
                    .map(|_| "<dyn JobProgressCallback>"),
            )
            .finish()
    }
}

impl ControllerConfig {
    pub fn builder() -> ControllerConfigBuilder {
        ControllerConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ControllerConfig`].
#[derive(Debug)]
pub struct ControllerConfigBuilder {
    config: ControllerConfig,
}

impl ControllerConfigBuilder {
    pub fn job_timeout(mut self, timeout: Duration) -> Self {
        self.config.job_timeout = Some(timeout);
        self
    }

    pub fn download_delay_ms(mut self, ms: u64) -> Self {
        self.config.download_delay_ms = ms;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ControllerConfig, ConvertError> {
        let c = &self.config;
        if c.job_timeout.is_some_and(|t| t.is_zero()) {
            return Err(ConvertError::InvalidConfig(
                "Job timeout must be greater than zero".into(),
            ));
        }
        if c.download_delay_ms > 60_000 {
            return Err(ConvertError::InvalidConfig(format!(
                "Download delay must be at most 60000 ms, got {}",
                c.download_delay_ms
            )));
        }
        Ok(self.config)
    }
}

// ── Job options ──────────────────────────────────────────────────────────

/// Kind-specific options for one job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobOptions {
    ImagesToPdf(ImagesToPdfOptions),
    PdfToImages(PdfToImagesOptions),
    PdfCompress(PdfCompressOptions),
    MediaConvert(MediaConvertOptions),
    MediaTrim(MediaTrimOptions),
}

impl JobOptions {
    pub fn kind(&self) -> JobKind {
        match self {
            JobOptions::ImagesToPdf(_) => JobKind::ImagesToPdf,
            JobOptions::PdfToImages(_) => JobKind::PdfToImages,
            JobOptions::PdfCompress(_) => JobKind::PdfCompress,
            JobOptions::MediaConvert(_) => JobKind::MediaConvert,
            JobOptions::MediaTrim(_) => JobKind::MediaTrim,
        }
    }
}

/// Options for merging images into one PDF.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImagesToPdfOptions {
    pub page_size: PageSize,
    pub placement: Placement,
    /// JPEG quality for non-PNG images, 1–100. Default: 92.
    pub quality: u8,
}

impl Default for ImagesToPdfOptions {
    fn default() -> Self {
        Self {
            page_size: PageSize::default(),
            placement: Placement::default(),
            quality: 92,
        }
    }
}

impl ImagesToPdfOptions {
    pub fn page_size(mut self, size: PageSize) -> Self {
        self.page_size = size;
        self
    }

    pub fn placement(mut self, placement: Placement) -> Self {
        self.placement = placement;
        self
    }

    pub fn quality(mut self, q: u8) -> Self {
        self.quality = q.clamp(1, 100);
        self
    }
}

/// Raster format for rendered PDF pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    #[default]
    Png,
    Jpeg,
}

impl ImageFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Jpeg => "jpeg",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            ImageFormat::Png => "image/png",
            ImageFormat::Jpeg => "image/jpeg",
        }
    }
}

impl FromStr for ImageFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "png" => Ok(ImageFormat::Png),
            "jpeg" | "jpg" => Ok(ImageFormat::Jpeg),
            other => Err(format!("unknown image format '{other}'")),
        }
    }
}

/// Which pages of a PDF to render.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageSelection {
    /// Every page. (default)
    #[default]
    All,
    /// Only page 1.
    First,
    /// A user-typed range such as `"1-5, 8"`, parsed against the page count.
    Custom(String),
}

impl FromStr for PageSelection {
    type Err = std::convert::Infallible;

    /// `all` and `first` are keywords; anything else is a custom range.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_lowercase().as_str() {
            "all" | "" => PageSelection::All,
            "first" => PageSelection::First,
            _ => PageSelection::Custom(s.trim().to_string()),
        })
    }
}

/// Options for rendering PDF pages to images.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PdfToImagesOptions {
    pub format: ImageFormat,
    /// Render scale relative to the page's point size. Default: 2.0.
    pub scale: f32,
    pub pages: PageSelection,
}

impl Default for PdfToImagesOptions {
    fn default() -> Self {
        Self {
            format: ImageFormat::default(),
            scale: 2.0,
            pages: PageSelection::default(),
        }
    }
}

impl PdfToImagesOptions {
    /// JPEG quality used for page images.
    pub const JPEG_QUALITY: u8 = 92;

    pub fn format(mut self, format: ImageFormat) -> Self {
        self.format = format;
        self
    }

    pub fn scale(mut self, scale: f32) -> Self {
        self.scale = scale.clamp(0.1, 10.0);
        self
    }

    pub fn pages(mut self, pages: PageSelection) -> Self {
        self.pages = pages;
        self
    }
}

/// How hard to compress a PDF.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionLevel {
    Low,
    #[default]
    Medium,
    High,
}

impl CompressionLevel {
    /// Scale pages are re-rendered at. Lower keeps fewer pixels.
    pub fn render_scale(self) -> f32 {
        match self {
            CompressionLevel::Low => 1.5,
            CompressionLevel::Medium => 1.2,
            CompressionLevel::High => 0.8,
        }
    }
}

impl FromStr for CompressionLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(CompressionLevel::Low),
            "medium" => Ok(CompressionLevel::Medium),
            "high" => Ok(CompressionLevel::High),
            other => Err(format!("unknown compression level '{other}'")),
        }
    }
}

/// Options for re-rendering a PDF at lower fidelity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PdfCompressOptions {
    pub level: CompressionLevel,
    /// JPEG quality of the re-rendered pages, 1–100. Default: 70.
    pub image_quality: u8,
}

impl Default for PdfCompressOptions {
    fn default() -> Self {
        Self {
            level: CompressionLevel::default(),
            image_quality: 70,
        }
    }
}

impl PdfCompressOptions {
    pub fn level(mut self, level: CompressionLevel) -> Self {
        self.level = level;
        self
    }

    pub fn image_quality(mut self, q: u8) -> Self {
        self.image_quality = q.clamp(1, 100);
        self
    }
}

/// Options for transcoding audio or video.
///
/// Values are kept as typed text and checked when the job starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaConvertOptions {
    /// Target container: mp3, wav, ogg, m4a, mp4, webm or avi. Default: mp3.
    pub format: String,
    /// Audio bitrate such as `192k`. Default: 192k.
    pub audio_bitrate: String,
    /// `original` or `WIDTH:HEIGHT`. Default: original.
    pub resolution: String,
    /// Constant rate factor for video, 0–51. Default: 23.
    pub crf: u8,
}

impl Default for MediaConvertOptions {
    fn default() -> Self {
        Self {
            format: "mp3".into(),
            audio_bitrate: "192k".into(),
            resolution: "original".into(),
            crf: 23,
        }
    }
}

impl MediaConvertOptions {
    pub fn format(mut self, format: impl Into<String>) -> Self {
        self.format = format.into();
        self
    }

    pub fn audio_bitrate(mut self, bitrate: impl Into<String>) -> Self {
        self.audio_bitrate = bitrate.into();
        self
    }

    pub fn resolution(mut self, resolution: impl Into<String>) -> Self {
        self.resolution = resolution.into();
        self
    }

    pub fn crf(mut self, crf: u8) -> Self {
        self.crf = crf.min(51);
        self
    }
}

/// Options for cutting a segment out of audio or video.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaTrimOptions {
    /// Start time as typed (`S`, `M:S` or `H:M:S`); blank for the beginning.
    pub start: String,
    /// End time as typed; blank for the end of the file.
    pub end: String,
    /// Known duration in seconds. Probed from the engine when absent.
    pub duration: Option<f64>,
}

impl MediaTrimOptions {
    pub fn new(start: impl Into<String>, end: impl Into<String>) -> Self {
        Self {
            start: start.into(),
            end: end.into(),
            duration: None,
        }
    }

    pub fn duration(mut self, seconds: f64) -> Self {
        self.duration = Some(seconds);
        self
    }
}

// ── Environment ──────────────────────────────────────────────────────────

/// Path to a pdfium shared library.
pub const ENV_PDFIUM_LIB_PATH: &str = "PDFIUM_LIB_PATH";
/// Path to the ffmpeg executable.
pub const ENV_FFMPEG_PATH: &str = "FFMPEG_PATH";
/// Path to the ffprobe executable.
pub const ENV_FFPROBE_PATH: &str = "FFPROBE_PATH";
/// Path of the usage-statistics file.
pub const ENV_STATS_PATH: &str = "CONVERTX_STATS_PATH";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults() {
        let c = ControllerConfig::builder().build().unwrap();
        assert_eq!(c.download_delay_ms, 500);
        assert!(c.job_timeout.is_none());
        assert!(c.progress_callback.is_none());
    }

    #[test]
    fn jpeg_pages_use_the_full_extension() {
        assert_eq!(ImageFormat::Jpeg.extension(), "jpeg");
        assert_eq!("jpg".parse::<ImageFormat>().unwrap(), ImageFormat::Jpeg);
    }

    #[test]
    fn zero_timeout_rejected() {
        let err = ControllerConfig::builder()
            .job_timeout(Duration::ZERO)
            .build()
            .unwrap_err();
        assert!(matches!(err, ConvertError::InvalidConfig(_)));
    }

    #[test]
    fn setters_clamp() {
        assert_eq!(ImagesToPdfOptions::default().quality(0).quality, 1);
        assert_eq!(ImagesToPdfOptions::default().quality(250).quality, 100);
        assert_eq!(PdfToImagesOptions::default().scale(50.0).scale, 10.0);
        assert_eq!(PdfCompressOptions::default().image_quality(0).image_quality, 1);
        assert_eq!(MediaConvertOptions::default().crf(99).crf, 51);
    }

    #[test]
    fn page_selection_keywords() {
        assert_eq!("all".parse::<PageSelection>(), Ok(PageSelection::All));
        assert_eq!("First".parse::<PageSelection>(), Ok(PageSelection::First));
        assert_eq!(
            "1-3, 5".parse::<PageSelection>(),
            Ok(PageSelection::Custom("1-3, 5".into()))
        );
    }

    #[test]
    fn compression_scales() {
        assert_eq!(CompressionLevel::Low.render_scale(), 1.5);
        assert_eq!(CompressionLevel::Medium.render_scale(), 1.2);
        assert_eq!(CompressionLevel::High.render_scale(), 0.8);
    }

    #[test]
    fn options_serde_roundtrip_keeps_kind() {
        let opts = JobOptions::PdfCompress(PdfCompressOptions::default());
        let json = serde_json::to_string(&opts).unwrap();
        assert!(json.contains("pdf_compress"), "got: {json}");
        let back: JobOptions = serde_json::from_str(&json).unwrap();
        assert_eq!(back.kind(), JobKind::PdfCompress);
    }
}
