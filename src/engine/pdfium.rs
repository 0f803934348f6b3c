//! PDF rasterisation via pdfium.
//!
//! ## Why spawn_blocking?
//!
//! `pdfium-render` wraps the pdfium C++ library, which keeps thread-local
//! state and does CPU-heavy work. Every call runs on the blocking pool so the
//! Tokio workers never stall during a render.
//!
//! ## Locating the library
//!
//! In order: an explicit path given to [`PdfiumRenderer::with_library_path`],
//! then `PDFIUM_LIB_PATH`, then a copy in the per-user cache directory, then
//! whatever the system loader finds.

use super::{DocumentInfo, PdfRenderer};
use crate::config::ENV_PDFIUM_LIB_PATH;
use crate::error::EngineError;
use async_trait::async_trait;
use bytes::Bytes;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// [`PdfRenderer`] backed by pdfium.
#[derive(Debug, Clone, Default)]
pub struct PdfiumRenderer {
    lib_path: Option<PathBuf>,
}

impl PdfiumRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind to the pdfium shared library at `path`.
    pub fn with_library_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.lib_path = Some(path.into());
        self
    }

    /// The library file that will be bound, if one is known ahead of time.
    pub fn resolve_library_path(&self) -> Option<PathBuf> {
        if let Some(p) = &self.lib_path {
            return Some(p.clone());
        }
        if let Ok(p) = std::env::var(ENV_PDFIUM_LIB_PATH) {
            let p = PathBuf::from(p);
            if p.exists() {
                return Some(p);
            }
        }
        let cached = pdfium_cache_dir()?.join(Pdfium::pdfium_platform_library_name());
        cached.exists().then_some(cached)
    }

    fn bind(&self) -> Result<Pdfium, EngineError> {
        let bindings = match self.resolve_library_path() {
            Some(path) => bind_from_path(&path)?,
            None => Pdfium::bind_to_system_library().map_err(|e| {
                EngineError::Unavailable(format!(
                    "pdfium library not found (set {ENV_PDFIUM_LIB_PATH}): {e}"
                ))
            })?,
        };
        Ok(Pdfium::new(bindings))
    }

    async fn blocking<T, F>(&self, f: F) -> Result<T, EngineError>
    where
        T: Send + 'static,
        F: FnOnce(&Pdfium) -> Result<T, EngineError> + Send + 'static,
    {
        let this = self.clone();
        tokio::task::spawn_blocking(move || {
            let pdfium = this.bind()?;
            f(&pdfium)
        })
        .await
        .map_err(|e| EngineError::failed(format!("PDF render task panicked: {e}")))?
    }
}

fn bind_from_path(
    path: &Path,
) -> Result<Box<dyn PdfiumLibraryBindings>, EngineError> {
    Pdfium::bind_to_library(path).map_err(|e| {
        EngineError::Unavailable(format!(
            "failed to bind pdfium from '{}': {e}",
            path.display()
        ))
    })
}

/// Per-user directory a pdfium library may be cached in.
fn pdfium_cache_dir() -> Option<PathBuf> {
    dirs::cache_dir().map(|d| d.join("convertx").join("pdfium"))
}

fn load<'a>(pdfium: &'a Pdfium, pdf: &'a [u8]) -> Result<PdfDocument<'a>, EngineError> {
    pdfium
        .load_pdf_from_byte_slice(pdf, None)
        .map_err(|e| EngineError::failed(format!("Failed to open PDF: {e:?}")))
}

#[async_trait]
impl PdfRenderer for PdfiumRenderer {
    async fn inspect(&self, pdf: Bytes) -> Result<DocumentInfo, EngineError> {
        self.blocking(move |pdfium| {
            let document = load(pdfium, &pdf)?;
            let pages = document.pages();
            let page_sizes: Vec<(f32, f32)> = pages
                .iter()
                .map(|p| (p.width().value, p.height().value))
                .collect();
            info!("PDF loaded: {} pages", page_sizes.len());
            Ok(DocumentInfo {
                page_count: page_sizes.len(),
                page_sizes,
            })
        })
        .await
    }

    async fn render_page(
        &self,
        pdf: Bytes,
        page_num: usize,
        scale: f32,
    ) -> Result<DynamicImage, EngineError> {
        self.blocking(move |pdfium| {
            let document = load(pdfium, &pdf)?;
            let pages = document.pages();
            let total = pages.len() as usize;
            if page_num == 0 || page_num > total {
                return Err(EngineError::failed(format!(
                    "Page {page_num} out of range (document has {total} pages)"
                )));
            }

            let page = pages
                .get((page_num - 1) as u16)
                .map_err(|e| EngineError::failed(format!("Page {page_num}: {e:?}")))?;

            let render_config = PdfRenderConfig::new().scale_page_by_factor(scale);
            let bitmap = page
                .render_with_config(&render_config)
                .map_err(|e| EngineError::failed(format!("Page {page_num}: {e:?}")))?;

            let image = bitmap.as_image();
            debug!(
                "Rendered page {} → {}x{} px",
                page_num,
                image.width(),
                image.height()
            );
            Ok(image)
        })
        .await
    }
}
