//! Images → one PDF, one page per image, in selection order.

use super::count_noun;
use crate::config::ImagesToPdfOptions;
use crate::engine::{EmbedMode, Engines, PlacedPage};
use crate::error::{ConvertError, ValidationError};
use crate::input::SelectedFile;
use crate::job::{Artifact, JobKind, JobResult};
use crate::progress::ProgressReporter;
use tracing::debug;

pub const OUTPUT_NAME: &str = "images.pdf";

#[derive(Debug)]
pub(crate) struct Plan {
    pub(crate) images: Vec<SelectedFile>,
    pub(crate) options: ImagesToPdfOptions,
}

pub(crate) fn validate(
    files: &[SelectedFile],
    options: &ImagesToPdfOptions,
) -> Result<Plan, ConvertError> {
    let images: Vec<SelectedFile> = files.iter().filter(|f| f.is_image()).cloned().collect();
    if images.is_empty() {
        return Err(ValidationError::NoImages.into());
    }
    if let Some(f) = images.iter().find(|f| !decodable(f)) {
        return Err(ValidationError::UnsupportedImage {
            name: f.name.clone(),
            mime_type: f.mime_type.clone(),
        }
        .into());
    }
    Ok(Plan {
        images,
        options: options.clone().quality(options.quality),
    })
}

/// Whether the embedder has a decoder for this image type.
fn decodable(file: &SelectedFile) -> bool {
    image::ImageFormat::from_mime_type(&file.mime_type)
        .or_else(|| image::ImageFormat::from_extension(file.extension().trim_start_matches('.')))
        .is_some_and(|f| f.reading_enabled())
}

/// PNG keeps its pixels exactly; everything else goes in as JPEG.
fn embed_mode(file: &SelectedFile, quality: u8) -> EmbedMode {
    if file.mime_type == "image/png" {
        EmbedMode::Lossless
    } else {
        EmbedMode::Jpeg { quality }
    }
}

pub(crate) async fn execute(
    plan: Plan,
    engines: &Engines,
    progress: &ProgressReporter,
) -> Result<JobResult, ConvertError> {
    let total = plan.images.len();
    let opts = &plan.options;
    let mut pages = Vec::with_capacity(total);

    for (i, file) in plan.images.iter().enumerate() {
        progress.callback().on_unit_start(i + 1, total);

        let image = engines
            .writer
            .embed_image(file.bytes.clone(), embed_mode(file, opts.quality))
            .await?;
        let (width, height) = opts.page_size.dimensions(image.size_points());
        let rect = opts.placement.place(image.size_points(), (width, height));
        debug!(
            "{} → {}x{} px on {:.0}x{:.0} pt ({})",
            file.name, image.width, image.height, width, height, opts.placement
        );
        pages.push(PlacedPage {
            width,
            height,
            image,
            rect,
        });

        progress.unit_completed(i + 1, total);
    }

    progress.callback().on_stage("Saving PDF");
    let pdf = engines.writer.serialize(pages).await?;

    Ok(JobResult::new(
        JobKind::ImagesToPdf,
        vec![Artifact::new(OUTPUT_NAME, pdf, "application/pdf")],
        None,
        count_noun(total, "page", "pages"),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_images_are_dropped() {
        let files = vec![
            SelectedFile::new("a.png", None, vec![1]),
            SelectedFile::new("notes.txt", None, vec![2]),
            SelectedFile::new("b.jpg", None, vec![3]),
        ];
        let plan = validate(&files, &ImagesToPdfOptions::default()).unwrap();
        let names: Vec<_> = plan.images.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["a.png", "b.jpg"]);
    }

    #[test]
    fn no_images_is_rejected() {
        let files = vec![SelectedFile::new("notes.txt", None, vec![2])];
        let err = validate(&files, &ImagesToPdfOptions::default()).unwrap_err();
        assert!(matches!(err, ConvertError::Validation(ValidationError::NoImages)));
    }

    #[test]
    fn png_is_lossless() {
        let png = SelectedFile::new("a.png", None, vec![]);
        let webp = SelectedFile::new("a.webp", None, vec![]);
        assert_eq!(embed_mode(&png, 80), EmbedMode::Lossless);
        assert_eq!(embed_mode(&webp, 80), EmbedMode::Jpeg { quality: 80 });
    }

    #[test]
    fn common_web_formats_are_decodable() {
        for name in ["a.png", "b.jpeg", "c.webp", "d.gif", "e.bmp"] {
            assert!(decodable(&SelectedFile::new(name, None, vec![])), "{name}");
        }
    }

    #[test]
    fn images_without_a_decoder_are_rejected() {
        let files = vec![
            SelectedFile::new("a.png", None, vec![1]),
            SelectedFile::new("logo.svg", None, vec![2]),
        ];
        let err = validate(&files, &ImagesToPdfOptions::default()).unwrap_err();
        match err {
            ConvertError::Validation(ValidationError::UnsupportedImage { name, mime_type }) => {
                assert_eq!(name, "logo.svg");
                assert_eq!(mime_type, "image/svg+xml");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }
}
