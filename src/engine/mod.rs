//! The external engines a job drives, behind traits.
//!
//! The controller only ever talks to these traits, so hosts can swap in
//! their own engines (or in-memory fakes in tests). The bundled
//! implementations are:
//!
//! | Trait            | Implementation        | Backend                    |
//! |------------------|-----------------------|----------------------------|
//! | [`PdfRenderer`]  | [`PdfiumRenderer`]    | pdfium via `pdfium-render` |
//! | [`PdfWriter`]    | [`LopdfWriter`]       | `lopdf` document assembly  |
//! | [`MediaEngine`]  | [`FfmpegEngine`]      | `ffmpeg` / `ffprobe`       |

pub mod encode;
mod ffmpeg;
mod lopdf_writer;
mod pdfium;

pub use ffmpeg::FfmpegEngine;
pub use lopdf_writer::LopdfWriter;
pub use pdfium::PdfiumRenderer;

use crate::error::EngineError;
use crate::layout::Rect;
use async_trait::async_trait;
use bytes::Bytes;
use image::DynamicImage;
use std::fmt;
use std::sync::Arc;
use tokio::sync::OwnedMutexGuard;

/// Page count and page sizes (points) of a PDF.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentInfo {
    pub page_count: usize,
    pub page_sizes: Vec<(f32, f32)>,
}

/// Rasterises PDF pages.
#[async_trait]
pub trait PdfRenderer: Send + Sync {
    /// Open the document and report its pages.
    async fn inspect(&self, pdf: Bytes) -> Result<DocumentInfo, EngineError>;

    /// Render one page (1-indexed) at `scale` × its point size.
    async fn render_page(
        &self,
        pdf: Bytes,
        page_num: usize,
        scale: f32,
    ) -> Result<DynamicImage, EngineError>;
}

/// How an image is stored inside the PDF.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbedMode {
    /// Decode and store the pixels losslessly (deflated RGB).
    Lossless,
    /// Decode and re-encode as JPEG at this quality (1–100).
    Jpeg { quality: u8 },
    /// The bytes are already a JPEG; store them untouched.
    JpegPassthrough,
}

/// Compression filter of an embedded image stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFilter {
    /// `DCTDecode`: the data is a complete JPEG file.
    Dct,
    /// `FlateDecode`: the data is raw 8-bit RGB, deflated when written.
    Flate,
}

/// An image prepared for placement on a PDF page.
#[derive(Debug, Clone)]
pub struct EmbeddedImage {
    pub width: u32,
    pub height: u32,
    pub filter: ImageFilter,
    pub data: Vec<u8>,
}

impl EmbeddedImage {
    /// Pixel size as points, one point per pixel.
    pub fn size_points(&self) -> (f32, f32) {
        (self.width as f32, self.height as f32)
    }
}

/// One output page: its size and the single image drawn on it.
#[derive(Debug, Clone)]
pub struct PlacedPage {
    pub width: f32,
    pub height: f32,
    pub image: EmbeddedImage,
    pub rect: Rect,
}

/// Assembles PDFs from images.
#[async_trait]
pub trait PdfWriter: Send + Sync {
    /// Prepare encoded image bytes (PNG, JPEG, ...) for embedding.
    async fn embed_image(&self, bytes: Bytes, mode: EmbedMode)
        -> Result<EmbeddedImage, EngineError>;

    /// Write the pages, in order, as one PDF file.
    async fn serialize(&self, pages: Vec<PlacedPage>) -> Result<Vec<u8>, EngineError>;
}

/// Exclusive use of a [`MediaEngine`]'s scratch space, released on drop.
pub type MediaLease = OwnedMutexGuard<()>;

/// A transcoding engine with a private scratch filesystem.
///
/// One instance is shared by every controller in the process and is not
/// safe for concurrent jobs: scratch names repeat from job to job. A job
/// holds the [`lease`](MediaEngine::lease) from writing its input until its
/// last scratch file is deleted.
#[async_trait]
pub trait MediaEngine: Send + Sync {
    /// Wait for exclusive use of the engine.
    async fn lease(&self) -> MediaLease;

    /// One-time initialisation. Idempotent.
    async fn load(&self) -> Result<(), EngineError>;

    async fn write_input_file(&self, name: &str, data: &[u8]) -> Result<(), EngineError>;

    /// Execute one command line. `on_ratio` receives completion ratios as
    /// the engine reports them.
    async fn run(
        &self,
        args: &[String],
        on_ratio: &(dyn Fn(f64) + Send + Sync),
    ) -> Result<(), EngineError>;

    async fn read_output_file(&self, name: &str) -> Result<Vec<u8>, EngineError>;

    async fn delete_file(&self, name: &str) -> Result<(), EngineError>;

    /// Duration in seconds of a file in the scratch filesystem.
    async fn probe_duration(&self, name: &str) -> Result<f64, EngineError>;
}

/// The engines a controller drives, shared behind `Arc`s.
#[derive(Clone)]
pub struct Engines {
    pub renderer: Arc<dyn PdfRenderer>,
    pub writer: Arc<dyn PdfWriter>,
    pub media: Arc<dyn MediaEngine>,
}

impl Engines {
    pub fn new(
        renderer: Arc<dyn PdfRenderer>,
        writer: Arc<dyn PdfWriter>,
        media: Arc<dyn MediaEngine>,
    ) -> Self {
        Self {
            renderer,
            writer,
            media,
        }
    }
}

impl Default for Engines {
    /// pdfium, lopdf and the process-wide ffmpeg engine.
    fn default() -> Self {
        Self::new(
            Arc::new(PdfiumRenderer::new()),
            Arc::new(LopdfWriter::new()),
            FfmpegEngine::shared(),
        )
    }
}

impl fmt::Debug for Engines {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engines").finish_non_exhaustive()
    }
}
