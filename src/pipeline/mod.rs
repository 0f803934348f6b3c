//! Per-kind job pipelines.
//!
//! Every job runs in two phases:
//!
//! 1. **validate** — check the input and translate the options into engine
//!    parameters, producing a [`Plan`]. May inspect the input (page count,
//!    media duration) but never runs a work unit. Any failure here is
//!    reported before the job is considered started.
//! 2. **execute** — run the plan's work units in order, reporting progress,
//!    and assemble a [`JobResult`].
//!
//! ```text
//!  ImagesToPdf  ─▶ embed image ×N ─▶ place on page ─▶ serialize ─▶ images.pdf
//!  PdfToImages  ─▶ render page ×N ─▶ encode PNG/JPEG ─────────▶ <stem>_page_<n>.<ext>
//!  PdfCompress  ─▶ render page ×N ─▶ JPEG ─▶ stretch ─▶ serialize ─▶ compressed_<name>
//!  MediaConvert ┐
//!  MediaTrim    ┴▶ write input ─▶ run engine ─▶ read output ─▶ clean up
//! ```

pub mod images_to_pdf;
pub mod media;
pub mod pdf_compress;
pub mod pdf_to_images;

use crate::config::JobOptions;
use crate::engine::Engines;
use crate::error::ConvertError;
use crate::input::SelectedFile;
use crate::job::{JobKind, JobResult};
use crate::progress::ProgressReporter;

/// A validated job, ready to execute.
#[derive(Debug)]
pub(crate) enum Plan {
    ImagesToPdf(images_to_pdf::Plan),
    PdfToImages(pdf_to_images::Plan),
    PdfCompress(pdf_compress::Plan),
    Media(media::Plan),
}

impl Plan {
    pub(crate) fn kind(&self) -> JobKind {
        match self {
            Plan::ImagesToPdf(_) => JobKind::ImagesToPdf,
            Plan::PdfToImages(_) => JobKind::PdfToImages,
            Plan::PdfCompress(_) => JobKind::PdfCompress,
            Plan::Media(p) => p.kind,
        }
    }

    /// Number of work units the job will run.
    pub(crate) fn total_units(&self) -> usize {
        match self {
            Plan::ImagesToPdf(p) => p.images.len(),
            Plan::PdfToImages(p) => p.pages.len(),
            Plan::PdfCompress(p) => p.page_sizes.len(),
            Plan::Media(_) => 1,
        }
    }
}

/// Check `files` against `options` and build a plan.
pub(crate) async fn validate(
    files: &[SelectedFile],
    options: &JobOptions,
    engines: &Engines,
) -> Result<Plan, ConvertError> {
    Ok(match options {
        JobOptions::ImagesToPdf(o) => Plan::ImagesToPdf(images_to_pdf::validate(files, o)?),
        JobOptions::PdfToImages(o) => {
            Plan::PdfToImages(pdf_to_images::validate(files, o, engines).await?)
        }
        JobOptions::PdfCompress(o) => {
            Plan::PdfCompress(pdf_compress::validate(files, o, engines).await?)
        }
        JobOptions::MediaConvert(o) => Plan::Media(media::validate_convert(files, o)?),
        JobOptions::MediaTrim(o) => Plan::Media(media::validate_trim(files, o, engines).await?),
    })
}

/// Run a validated plan to completion.
pub(crate) async fn execute(
    plan: Plan,
    engines: &Engines,
    progress: &ProgressReporter,
) -> Result<JobResult, ConvertError> {
    match plan {
        Plan::ImagesToPdf(p) => images_to_pdf::execute(p, engines, progress).await,
        Plan::PdfToImages(p) => pdf_to_images::execute(p, engines, progress).await,
        Plan::PdfCompress(p) => pdf_compress::execute(p, engines, progress).await,
        Plan::Media(p) => media::execute(p, engines, progress).await,
    }
}

/// The file single-input kinds operate on.
pub(crate) fn first_file(files: &[SelectedFile]) -> Result<&SelectedFile, ConvertError> {
    files
        .first()
        .ok_or_else(|| crate::error::ValidationError::NoInput.into())
}

/// `"1 page"` / `"3 pages"`.
pub(crate) fn count_noun(n: usize, singular: &str, plural: &str) -> String {
    if n == 1 {
        format!("1 {singular}")
    } else {
        format!("{n} {plural}")
    }
}
