//! PDF → smaller PDF, by re-rendering every page as a JPEG.
//!
//! Text and vector content become pixels; the output pages keep the
//! original page sizes.

use super::first_file;
use crate::config::PdfCompressOptions;
use crate::engine::encode::encode_jpeg;
use crate::engine::{EmbedMode, Engines, PlacedPage};
use crate::error::{ConvertError, EngineError, ValidationError};
use crate::input::SelectedFile;
use crate::job::{Artifact, JobKind, JobResult};
use crate::layout::Placement;
use crate::progress::ProgressReporter;
use bytes::Bytes;
use tracing::debug;

#[derive(Debug)]
pub(crate) struct Plan {
    pub(crate) file: SelectedFile,
    /// Point size of every page, in order.
    pub(crate) page_sizes: Vec<(f32, f32)>,
    pub(crate) options: PdfCompressOptions,
}

pub(crate) async fn validate(
    files: &[SelectedFile],
    options: &PdfCompressOptions,
    engines: &Engines,
) -> Result<Plan, ConvertError> {
    let file = first_file(files)?.clone();
    let info = engines.renderer.inspect(file.bytes.clone()).await?;
    if info.page_sizes.is_empty() {
        return Err(ValidationError::NoValidPages.into());
    }
    Ok(Plan {
        file,
        page_sizes: info.page_sizes,
        options: options.clone().image_quality(options.image_quality),
    })
}

/// Subtitle for a compression with the given size reduction.
pub fn compression_subtitle(reduction_percent: Option<i64>) -> String {
    match reduction_percent {
        Some(r) if r > 0 => format!("Saved {r}%"),
        _ => "File grew - try a higher compression level".to_string(),
    }
}

pub(crate) async fn execute(
    plan: Plan,
    engines: &Engines,
    progress: &ProgressReporter,
) -> Result<JobResult, ConvertError> {
    let total = plan.page_sizes.len();
    let scale = plan.options.level.render_scale();
    let quality = plan.options.image_quality;
    let mut pages = Vec::with_capacity(total);

    for (i, &(width, height)) in plan.page_sizes.iter().enumerate() {
        let page = i + 1;
        progress.callback().on_unit_start(page, total);

        let raster = engines
            .renderer
            .render_page(plan.file.bytes.clone(), page, scale)
            .await?;
        let jpeg = tokio::task::spawn_blocking(move || encode_jpeg(&raster, quality))
            .await
            .map_err(|e| ConvertError::Internal(format!("Encode task panicked: {e}")))?
            .map_err(EngineError::from)?;
        debug!("Page {} re-encoded → {} bytes", page, jpeg.len());

        let image = engines
            .writer
            .embed_image(Bytes::from(jpeg), EmbedMode::JpegPassthrough)
            .await?;
        let rect = Placement::Stretch.place(image.size_points(), (width, height));
        pages.push(PlacedPage {
            width,
            height,
            image,
            rect,
        });

        progress.unit_completed(page, total);
    }

    progress.callback().on_stage("Saving PDF");
    let pdf = engines.writer.serialize(pages).await?;

    let mut result = JobResult::new(
        JobKind::PdfCompress,
        vec![Artifact::new(
            format!("compressed_{}", plan.file.name),
            pdf,
            "application/pdf",
        )],
        Some(plan.file.size()),
        String::new(),
    );
    result.subtitle = compression_subtitle(result.reduction_percent());
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subtitle_reports_savings_or_growth() {
        assert_eq!(compression_subtitle(Some(42)), "Saved 42%");
        assert_eq!(
            compression_subtitle(Some(0)),
            "File grew - try a higher compression level"
        );
        assert_eq!(
            compression_subtitle(Some(-15)),
            "File grew - try a higher compression level"
        );
    }
}
