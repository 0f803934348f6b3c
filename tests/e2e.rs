//! End-to-end tests against the real engines.
//!
//! These need a pdfium shared library and ffmpeg/ffprobe binaries. They are
//! gated behind the `E2E_ENABLED` environment variable so they do not run in
//! CI unless explicitly requested.
//!
//! Run with:
//!   E2E_ENABLED=1 PDFIUM_LIB_PATH=/path/to/libpdfium.so cargo test --test e2e -- --nocapture
//!
//! To restrict to a specific test:
//!   E2E_ENABLED=1 cargo test --test e2e test_trim -- --nocapture

use convertx::{
    CancellationToken, Controller, ControllerConfig, DirectorySink, Engines, FfmpegEngine,
    ImageFormat, ImagesToPdfOptions, JobKind, JobOptions, MediaConvertOptions, MediaEngine,
    MediaTrimOptions, MemoryStats, PageSelection, PageSize, PdfRenderer, PdfToImagesOptions,
    PdfiumRenderer, Placement, SelectedFile,
};
use image::{DynamicImage, Rgb, RgbImage};
use std::io::Cursor;
use std::path::PathBuf;
use std::sync::Arc;

// ── Test helpers ─────────────────────────────────────────────────────────────

fn output_dir() -> PathBuf {
    let d = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("test_cases/output");
    std::fs::create_dir_all(&d).ok();
    d
}

/// Skip this test unless E2E_ENABLED is set.
macro_rules! e2e_skip_unless_enabled {
    () => {{
        if std::env::var("E2E_ENABLED").is_err() {
            println!("SKIP — set E2E_ENABLED=1 to run e2e tests");
            return;
        }
    }};
}

fn controller() -> Controller {
    let config = ControllerConfig::builder()
        .download_delay_ms(0)
        .build()
        .unwrap();
    Controller::new(Engines::default(), Arc::new(MemoryStats::new()), config)
}

fn png(name: &str, w: u32, h: u32, colour: [u8; 3]) -> SelectedFile {
    let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(w, h, Rgb(colour)));
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, image::ImageFormat::Png).unwrap();
    SelectedFile::new(name, None, buf.into_inner())
}

/// A 3-second 440 Hz tone, generated by ffmpeg itself.
async fn tone_wav() -> SelectedFile {
    let engine = FfmpegEngine::from_env();
    engine.load().await.expect("ffmpeg unavailable");
    let _lease = engine.lease().await;
    let args: Vec<String> = [
        "-f",
        "lavfi",
        "-i",
        "sine=frequency=440:duration=3",
        "-y",
        "tone.wav",
    ]
    .map(String::from)
    .to_vec();
    engine.run(&args, &|_: f64| {}).await.unwrap();
    let data = engine.read_output_file("tone.wav").await.unwrap();
    engine.delete_file("tone.wav").await.unwrap();
    SelectedFile::new("tone.wav", None, data)
}

// ── PDF ──────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_images_to_pdf_and_back() {
    e2e_skip_unless_enabled!();

    let c = controller();
    c.select_files(
        JobKind::ImagesToPdf,
        vec![
            png("red.png", 120, 80, [255, 0, 0]),
            png("green.png", 60, 90, [0, 255, 0]),
        ],
    )
    .unwrap();
    let offer = c
        .run(
            JobOptions::ImagesToPdf(
                ImagesToPdfOptions::default()
                    .page_size(PageSize::Fit)
                    .placement(Placement::Stretch),
            ),
            &CancellationToken::new(),
        )
        .await
        .expect("images → pdf failed");
    let pdf = offer.result().artifacts[0].payload.clone();

    let info = PdfiumRenderer::new()
        .inspect(pdf.clone().into())
        .await
        .expect("pdfium could not read the produced PDF");
    assert_eq!(info.page_count, 2);
    assert_eq!(info.page_sizes[0], (120.0, 80.0));
    assert_eq!(info.page_sizes[1], (60.0, 90.0));

    c.select_files(
        JobKind::PdfToImages,
        vec![SelectedFile::new("roundtrip.pdf", None, pdf)],
    )
    .unwrap();
    let offer = c
        .run(
            JobOptions::PdfToImages(
                PdfToImagesOptions::default()
                    .format(ImageFormat::Png)
                    .scale(1.0)
                    .pages(PageSelection::First),
            ),
            &CancellationToken::new(),
        )
        .await
        .expect("pdf → images failed");

    let artifact = &offer.result().artifacts[0];
    assert_eq!(artifact.name, "roundtrip_page_1.png");
    let page = image::load_from_memory(&artifact.payload).unwrap().to_rgb8();
    assert_eq!(page.dimensions(), (120, 80));
    let centre = page.get_pixel(60, 40);
    assert!(centre[0] > 200 && centre[1] < 50, "expected red, got {centre:?}");

    let written = offer
        .download(&DirectorySink::new(output_dir()))
        .await
        .unwrap();
    println!("wrote {written:?}");
}

// ── Media ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_convert_wav_to_mp3() {
    e2e_skip_unless_enabled!();

    let c = controller();
    c.select_files(JobKind::MediaConvert, vec![tone_wav().await])
        .unwrap();
    let offer = c
        .run(
            JobOptions::MediaConvert(
                MediaConvertOptions::default()
                    .format("mp3")
                    .audio_bitrate("64k"),
            ),
            &CancellationToken::new(),
        )
        .await
        .expect("conversion failed");

    let artifact = &offer.result().artifacts[0];
    assert_eq!(artifact.name, "tone.mp3");
    assert!(offer.reduction_percent().unwrap() > 0);
    assert_eq!(c.progress(), 100);
}

#[tokio::test]
async fn test_trim_probes_duration() {
    e2e_skip_unless_enabled!();

    let c = controller();
    c.select_files(JobKind::MediaTrim, vec![tone_wav().await])
        .unwrap();
    let offer = c
        .run(
            JobOptions::MediaTrim(MediaTrimOptions::new("1", "")),
            &CancellationToken::new(),
        )
        .await
        .expect("trim failed");
    assert_eq!(offer.subtitle(), "0:01 - 0:03 (0:02)");
    assert_eq!(offer.result().artifacts[0].name, "tone_trimmed.wav");

    let err = c
        .run(
            JobOptions::MediaTrim(MediaTrimOptions::new("0", "9")),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();
    assert!(err.is_validation(), "unexpected error: {err}");
}
