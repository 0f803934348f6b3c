//! PDF assembly with `lopdf`: one image XObject per page.
//!
//! JPEG data is embedded as-is under `DCTDecode`, so a JPEG never goes
//! through a second lossy pass. Everything else is stored as deflated 8-bit
//! RGB.

use super::encode::{encode_jpeg, flatten_alpha};
use super::{EmbedMode, EmbeddedImage, ImageFilter, PdfWriter, PlacedPage};
use crate::error::EngineError;
use async_trait::async_trait;
use bytes::Bytes;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, Stream};
use tracing::debug;

/// [`PdfWriter`] backed by `lopdf`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LopdfWriter;

impl LopdfWriter {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PdfWriter for LopdfWriter {
    async fn embed_image(
        &self,
        bytes: Bytes,
        mode: EmbedMode,
    ) -> Result<EmbeddedImage, EngineError> {
        tokio::task::spawn_blocking(move || embed_blocking(&bytes, mode))
            .await
            .map_err(|e| EngineError::failed(format!("Image task panicked: {e}")))?
    }

    async fn serialize(&self, pages: Vec<PlacedPage>) -> Result<Vec<u8>, EngineError> {
        tokio::task::spawn_blocking(move || serialize_blocking(pages))
            .await
            .map_err(|e| EngineError::failed(format!("PDF assembly task panicked: {e}")))?
    }
}

fn embed_blocking(bytes: &[u8], mode: EmbedMode) -> Result<EmbeddedImage, EngineError> {
    match mode {
        EmbedMode::JpegPassthrough => {
            let (width, height) = image::ImageReader::new(std::io::Cursor::new(bytes))
                .with_guessed_format()?
                .into_dimensions()?;
            Ok(EmbeddedImage {
                width,
                height,
                filter: ImageFilter::Dct,
                data: bytes.to_vec(),
            })
        }
        EmbedMode::Jpeg { quality } => {
            let img = image::load_from_memory(bytes)?;
            Ok(EmbeddedImage {
                width: img.width(),
                height: img.height(),
                filter: ImageFilter::Dct,
                data: encode_jpeg(&img, quality)?,
            })
        }
        EmbedMode::Lossless => {
            let img = image::load_from_memory(bytes)?;
            let rgb = flatten_alpha(&img);
            Ok(EmbeddedImage {
                width: rgb.width(),
                height: rgb.height(),
                filter: ImageFilter::Flate,
                data: rgb.into_raw(),
            })
        }
    }
}

fn image_stream(image: EmbeddedImage) -> Result<Stream, EngineError> {
    let mut dict = Dictionary::new();
    dict.set("Type", Object::Name(b"XObject".to_vec()));
    dict.set("Subtype", Object::Name(b"Image".to_vec()));
    dict.set("Width", Object::Integer(image.width as i64));
    dict.set("Height", Object::Integer(image.height as i64));
    dict.set("ColorSpace", Object::Name(b"DeviceRGB".to_vec()));
    dict.set("BitsPerComponent", Object::Integer(8));

    match image.filter {
        ImageFilter::Dct => {
            dict.set("Filter", Object::Name(b"DCTDecode".to_vec()));
            Ok(Stream::new(dict, image.data))
        }
        ImageFilter::Flate => {
            let mut stream = Stream::new(dict, image.data);
            stream
                .compress()
                .map_err(|e| EngineError::failed(format!("Failed to deflate image: {e}")))?;
            Ok(stream)
        }
    }
}

fn serialize_blocking(pages: Vec<PlacedPage>) -> Result<Vec<u8>, EngineError> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let mut kids = Vec::with_capacity(pages.len());

    for (i, page) in pages.into_iter().enumerate() {
        let rect = page.rect;
        let image_id = doc.add_object(image_stream(page.image)?);

        let content = Content {
            operations: vec![
                Operation::new("q", vec![]),
                Operation::new(
                    "cm",
                    vec![
                        Object::Real(rect.width),
                        Object::Integer(0),
                        Object::Integer(0),
                        Object::Real(rect.height),
                        Object::Real(rect.x),
                        Object::Real(rect.y),
                    ],
                ),
                Operation::new("Do", vec![Object::Name(b"Im0".to_vec())]),
                Operation::new("Q", vec![]),
            ],
        };
        let encoded = content
            .encode()
            .map_err(|e| EngineError::failed(format!("Failed to encode page content: {e}")))?;
        let content_id = doc.add_object(Stream::new(dictionary! {}, encoded));

        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Real(page.width),
                Object::Real(page.height),
            ],
            "Resources" => dictionary! {
                "XObject" => dictionary! { "Im0" => image_id },
            },
            "Contents" => content_id,
        });
        debug!(
            "Page {} → {:.0}x{:.0} pt",
            i + 1,
            page.width,
            page.height
        );
        kids.push(Object::Reference(page_id));
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut out = Vec::new();
    doc.save_to(&mut out)
        .map_err(|e| EngineError::failed(format!("Failed to write PDF: {e}")))?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::encode::encode_png;
    use crate::layout::Rect;
    use image::{DynamicImage, Rgb, RgbImage};

    fn png(w: u32, h: u32) -> Bytes {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(w, h, Rgb([10, 200, 30])));
        Bytes::from(encode_png(&img).unwrap())
    }

    #[tokio::test]
    async fn lossless_keeps_dimensions() {
        let e = LopdfWriter
            .embed_image(png(7, 3), EmbedMode::Lossless)
            .await
            .unwrap();
        assert_eq!((e.width, e.height), (7, 3));
        assert_eq!(e.filter, ImageFilter::Flate);
        assert_eq!(e.data.len(), 7 * 3 * 3);
    }

    #[tokio::test]
    async fn jpeg_mode_reencodes() {
        let e = LopdfWriter
            .embed_image(png(4, 4), EmbedMode::Jpeg { quality: 50 })
            .await
            .unwrap();
        assert_eq!(e.filter, ImageFilter::Dct);
        assert_eq!(&e.data[..2], &[0xFF, 0xD8]);
    }

    #[tokio::test]
    async fn garbage_is_an_engine_error() {
        let err = LopdfWriter
            .embed_image(Bytes::from_static(b"not an image"), EmbedMode::Lossless)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Failed(_)));
    }

    #[tokio::test]
    async fn serialized_pdf_has_one_page_per_image() {
        let w = LopdfWriter;
        let mut pages = Vec::new();
        for _ in 0..2 {
            let image = w.embed_image(png(20, 10), EmbedMode::Lossless).await.unwrap();
            pages.push(PlacedPage {
                width: 20.0,
                height: 10.0,
                image,
                rect: Rect {
                    x: 0.0,
                    y: 0.0,
                    width: 20.0,
                    height: 10.0,
                },
            });
        }
        let bytes = w.serialize(pages).await.unwrap();
        assert!(bytes.starts_with(b"%PDF-1.5"));
        let doc = Document::load_mem(&bytes).unwrap();
        assert_eq!(doc.get_pages().len(), 2);
    }
}
