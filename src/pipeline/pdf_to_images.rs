//! PDF → one image per selected page.

use super::{count_noun, first_file};
use crate::config::{PageSelection, PdfToImagesOptions};
use crate::engine::encode::encode_image;
use crate::engine::Engines;
use crate::error::{ConvertError, EngineError, ValidationError};
use crate::input::SelectedFile;
use crate::job::{Artifact, JobKind, JobResult};
use crate::progress::ProgressReporter;
use crate::range::parse_page_range;
use tracing::debug;

#[derive(Debug)]
pub(crate) struct Plan {
    pub(crate) file: SelectedFile,
    /// 1-indexed, ascending.
    pub(crate) pages: Vec<usize>,
    pub(crate) options: PdfToImagesOptions,
}

/// Expand a selection against a document of `total` pages.
pub fn resolve_pages(selection: &PageSelection, total: usize) -> Vec<usize> {
    match selection {
        PageSelection::All => (1..=total).collect(),
        PageSelection::First => (1..=total.min(1)).collect(),
        PageSelection::Custom(text) => parse_page_range(text, total),
    }
}

/// `report.pdf` → `report_page_3.png`. Only a trailing `.pdf` is removed.
pub fn page_file_name(source: &str, page: usize, extension: &str) -> String {
    let cut = source.len().checked_sub(4);
    let stem = match cut.and_then(|i| source.get(i..)) {
        Some(ext) if ext.eq_ignore_ascii_case(".pdf") => &source[..source.len() - 4],
        _ => source,
    };
    format!("{stem}_page_{page}.{extension}")
}

pub(crate) async fn validate(
    files: &[SelectedFile],
    options: &PdfToImagesOptions,
    engines: &Engines,
) -> Result<Plan, ConvertError> {
    let file = first_file(files)?.clone();
    if let PageSelection::Custom(text) = &options.pages {
        // Nothing number-like at all: a typo, not an out-of-range request.
        if !text.chars().any(|c| c.is_ascii_digit()) {
            return Err(ValidationError::InvalidPageSelection(text.clone()).into());
        }
    }
    let info = engines.renderer.inspect(file.bytes.clone()).await?;
    let pages = resolve_pages(&options.pages, info.page_count);
    if pages.is_empty() {
        return Err(ValidationError::NoValidPages.into());
    }
    debug!("{}: {} of {} pages selected", file.name, pages.len(), info.page_count);
    Ok(Plan {
        file,
        pages,
        options: options.clone().scale(options.scale),
    })
}

pub(crate) async fn execute(
    plan: Plan,
    engines: &Engines,
    progress: &ProgressReporter,
) -> Result<JobResult, ConvertError> {
    let total = plan.pages.len();
    let format = plan.options.format;
    let mut artifacts = Vec::with_capacity(total);

    for (i, &page) in plan.pages.iter().enumerate() {
        progress.callback().on_unit_start(i + 1, total);

        let image = engines
            .renderer
            .render_page(plan.file.bytes.clone(), page, plan.options.scale)
            .await?;
        let encoded = tokio::task::spawn_blocking(move || {
            encode_image(&image, format, PdfToImagesOptions::JPEG_QUALITY)
        })
        .await
        .map_err(|e| ConvertError::Internal(format!("Encode task panicked: {e}")))?
        .map_err(EngineError::from)?;

        artifacts.push(Artifact::new(
            page_file_name(&plan.file.name, page, format.extension()),
            encoded,
            format.mime_type(),
        ));
        progress.unit_completed(i + 1, total);
    }

    let subtitle = format!("{} created", count_noun(total, "image", "images"));
    Ok(JobResult::new(JobKind::PdfToImages, artifacts, None, subtitle))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selection_expands() {
        assert_eq!(resolve_pages(&PageSelection::All, 3), vec![1, 2, 3]);
        assert_eq!(resolve_pages(&PageSelection::First, 3), vec![1]);
        assert_eq!(resolve_pages(&PageSelection::First, 0), Vec::<usize>::new());
        assert_eq!(
            resolve_pages(&PageSelection::Custom("2-9".into()), 4),
            vec![2, 3, 4]
        );
    }

    #[test]
    fn names_drop_pdf_suffix() {
        assert_eq!(page_file_name("report.PDF", 3, "png"), "report_page_3.png");
        assert_eq!(page_file_name("scan", 1, "jpeg"), "scan_page_1.jpeg");
        assert_eq!(page_file_name("a.pdf.pdf", 2, "png"), "a.pdf_page_2.png");
    }
}
