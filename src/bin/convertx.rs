//! CLI binary for convertx.
//!
//! A thin shim over the library crate: maps subcommands to `JobOptions`,
//! runs one job on a `Controller`, and writes the artifacts into the output
//! directory.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use convertx::{
    format_file_size, format_time, CancellationToken, CompressionLevel, Controller,
    ControllerConfig, DirectorySink, Engines, FfmpegEngine, ImageFormat, ImagesToPdfOptions,
    JobKind, JobOptions, JobProgressCallback, JsonFileStats, MediaConvertOptions, MediaEngine,
    MediaTrimOptions, PageSelection, PageSize, PdfCompressOptions, PdfRenderer, PdfToImagesOptions,
    PdfiumRenderer, Placement, ProgressCallback, SelectedFile, StatsStore,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

/// Terminal progress: a spinner while the job validates, then a percentage
/// bar once the controller reports the job as started.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(100);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);
        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Checking input…");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }
}

impl JobProgressCallback for CliProgressCallback {
    fn on_job_start(&self, kind: JobKind, total_units: usize) {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  [{bar:42.green/238}] {pos:>3}%  \
             {msg}  ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);
        self.bar.set_style(style);
        self.bar.set_prefix(kind.to_string());
        if total_units > 1 {
            self.bar.set_message(format!("0/{total_units}"));
        }
        self.bar.reset_eta();
    }

    fn on_unit_start(&self, unit: usize, total_units: usize) {
        if total_units > 1 {
            self.bar.set_message(format!("{unit}/{total_units}"));
        }
    }

    fn on_progress(&self, percent: u8) {
        self.bar.set_position(u64::from(percent));
    }

    fn on_stage(&self, stage: &str) {
        self.bar.set_message(stage.to_string());
    }

    fn on_job_complete(&self, _artifacts: usize, _produced_bytes: u64) {
        self.bar.finish_and_clear();
    }

    fn on_job_error(&self, _error: &str) {
        self.bar.abandon();
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Merge scans into one PDF, one page per image
  convertx images-to-pdf page1.jpg page2.png --page-size a4 --position fit

  # Every page of a PDF as PNG, at twice the natural size
  convertx pdf-to-images report.pdf --pages all --scale 2

  # Pages 1, 3 and 5 to 7 as JPEG
  convertx pdf-to-images report.pdf --format jpeg --pages 1,3,5-7

  # Shrink a scanned PDF
  convertx compress scan.pdf --level high --image-quality 60

  # Extract audio
  convertx convert talk.mp4 --format mp3 --audio-bitrate 128k

  # Cut 1:30 to 4:00 out of a recording
  convertx trim talk.mp4 --start 1:30 --end 4:00

  # Usage totals
  convertx stats

ENVIRONMENT VARIABLES:
  PDFIUM_LIB_PATH      Path to an existing libpdfium
  FFMPEG_PATH          ffmpeg binary (default: ffmpeg on PATH)
  FFPROBE_PATH         ffprobe binary (default: ffprobe on PATH)
  CONVERTX_STATS_PATH  Usage statistics file
  RUST_LOG             Log filter, overrides -v / -q
"#;

/// Convert images, PDFs, audio and video on the command line.
#[derive(Parser, Debug)]
#[command(
    name = "convertx",
    version,
    about = "Convert images, PDFs, audio and video locally",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Directory to write results into.
    #[arg(short, long, global = true, env = "CONVERTX_OUTPUT_DIR", default_value = ".")]
    output_dir: PathBuf,

    /// Abort a job that runs longer than this many seconds.
    #[arg(long, global = true, env = "CONVERTX_TIMEOUT")]
    timeout: Option<u64>,

    /// Pause between files of a multi-file result, in milliseconds.
    #[arg(long, global = true, env = "CONVERTX_DOWNLOAD_DELAY", default_value_t = 500)]
    download_delay: u64,

    /// Disable progress bar.
    #[arg(long, global = true, env = "CONVERTX_NO_PROGRESS")]
    no_progress: bool,

    /// Print the result summary as JSON on stdout.
    #[arg(long, global = true, env = "CONVERTX_JSON")]
    json: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "CONVERTX_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "CONVERTX_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Combine images into one PDF, one page per image.
    ImagesToPdf {
        #[arg(required = true)]
        images: Vec<PathBuf>,

        /// a4, letter, or fit (page takes the image's size).
        #[arg(long, default_value = "a4")]
        page_size: PageSize,

        /// stretch, fit, or center.
        #[arg(long, default_value = "center")]
        position: Placement,

        /// JPEG quality for non-PNG images (1–100).
        #[arg(long, default_value_t = 92,
              value_parser = clap::value_parser!(u8).range(1..=100))]
        quality: u8,
    },

    /// Render PDF pages as images.
    PdfToImages {
        pdf: PathBuf,

        /// png or jpeg.
        #[arg(long, default_value = "png")]
        format: ImageFormat,

        /// Render scale factor (1.0 = 72 dpi).
        #[arg(long, default_value_t = 2.0)]
        scale: f32,

        /// all, first, or a range such as 1,3,5-7.
        #[arg(long, default_value = "all")]
        pages: PageSelection,
    },

    /// Shrink a PDF by re-rendering every page as a JPEG.
    Compress {
        pdf: PathBuf,

        /// low, medium, or high.
        #[arg(long, default_value = "medium")]
        level: CompressionLevel,

        /// JPEG quality of the re-rendered pages (1–100).
        #[arg(long, default_value_t = 70,
              value_parser = clap::value_parser!(u8).range(1..=100))]
        image_quality: u8,
    },

    /// Convert audio or video to another format.
    Convert {
        media: PathBuf,

        /// mp3, wav, ogg, m4a, mp4, webm, or avi.
        #[arg(long)]
        format: String,

        #[arg(long, default_value = "192k")]
        audio_bitrate: String,

        /// original, or W:H such as 1280:720.
        #[arg(long, default_value = "original")]
        resolution: String,

        /// Video quality, 0 (best) to 51.
        #[arg(long, default_value_t = 23,
              value_parser = clap::value_parser!(u8).range(0..=51))]
        crf: u8,
    },

    /// Cut a segment out of audio or video without re-encoding.
    Trim {
        media: PathBuf,

        /// Start time: S, M:S or H:M:S. Blank for the beginning.
        #[arg(long, default_value = "")]
        start: String,

        /// End time. Blank for the end of the file.
        #[arg(long, default_value = "")]
        end: String,

        /// Total duration in seconds, if known; probed otherwise.
        #[arg(long)]
        duration: Option<f64>,
    },

    /// Show or reset usage statistics.
    Stats {
        #[arg(long)]
        reset: bool,

        /// Do not ask for confirmation.
        #[arg(long, short = 'y')]
        yes: bool,
    },

    /// Print name, size and page count or duration of a file.
    Inspect { file: PathBuf },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the progress bar is active;
    // the bar provides all the feedback that matters to the user.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let stats = Arc::new(JsonFileStats::default_location());

    let (kind, options, inputs) = match &cli.command {
        Command::Stats { reset, yes } => return run_stats(&cli, stats.as_ref(), *reset, *yes),
        Command::Inspect { file } => return run_inspect(&cli, file).await,
        other => job_from_command(other).context("Not a conversion command")?,
    };

    // ── Load input ───────────────────────────────────────────────────────
    let mut files = Vec::with_capacity(inputs.len());
    for path in &inputs {
        files.push(
            SelectedFile::from_path(path)
                .await
                .with_context(|| format!("Failed to load {}", path.display()))?,
        );
    }

    // ── Build controller ─────────────────────────────────────────────────
    let mut builder = ControllerConfig::builder().download_delay_ms(cli.download_delay);
    if let Some(secs) = cli.timeout {
        builder = builder.job_timeout(Duration::from_secs(secs));
    }
    if show_progress {
        let cb: ProgressCallback = CliProgressCallback::new();
        builder = builder.progress_callback(cb);
    }
    let config = builder.build().context("Invalid configuration")?;

    let controller = Controller::new(Engines::default(), stats, config);
    let selected = controller
        .select_files(kind, files)
        .context("Failed to select input")?;
    if selected == 0 {
        anyhow::bail!("None of the given files can be used for {kind}");
    }

    // ── Cancellation on Ctrl-C ───────────────────────────────────────────
    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_signal.cancel();
        }
    });

    // ── Run job ──────────────────────────────────────────────────────────
    let offer = controller
        .run(options, &cancel)
        .await
        .context("Conversion failed")?;

    let sink = DirectorySink::new(&cli.output_dir);
    let written = offer
        .download(&sink)
        .await
        .context("Failed to write results")?;

    if cli.json {
        let json = serde_json::to_string_pretty(&offer.summary())
            .context("Failed to serialise summary")?;
        println!("{json}");
    } else if !cli.quiet {
        eprintln!("{} {}  {}", green("✔"), bold(offer.title()), offer.subtitle());
        for (label, value) in offer.size_lines() {
            eprintln!("   {:<14} {}", dim(label), value);
        }
        for path in &written {
            eprintln!("   → {}", bold(path));
        }
    }

    Ok(())
}

/// Map a job subcommand to its kind, options and input paths.
fn job_from_command(command: &Command) -> Option<(JobKind, JobOptions, Vec<PathBuf>)> {
    let job = match command {
        Command::ImagesToPdf {
            images,
            page_size,
            position,
            quality,
        } => (
            JobKind::ImagesToPdf,
            JobOptions::ImagesToPdf(
                ImagesToPdfOptions::default()
                    .page_size(*page_size)
                    .placement(*position)
                    .quality(*quality),
            ),
            images.clone(),
        ),
        Command::PdfToImages {
            pdf,
            format,
            scale,
            pages,
        } => (
            JobKind::PdfToImages,
            JobOptions::PdfToImages(
                PdfToImagesOptions::default()
                    .format(*format)
                    .scale(*scale)
                    .pages(pages.clone()),
            ),
            vec![pdf.clone()],
        ),
        Command::Compress {
            pdf,
            level,
            image_quality,
        } => (
            JobKind::PdfCompress,
            JobOptions::PdfCompress(
                PdfCompressOptions::default()
                    .level(*level)
                    .image_quality(*image_quality),
            ),
            vec![pdf.clone()],
        ),
        Command::Convert {
            media,
            format,
            audio_bitrate,
            resolution,
            crf,
        } => (
            JobKind::MediaConvert,
            JobOptions::MediaConvert(
                MediaConvertOptions::default()
                    .format(format.as_str())
                    .audio_bitrate(audio_bitrate.as_str())
                    .resolution(resolution.as_str())
                    .crf(*crf),
            ),
            vec![media.clone()],
        ),
        Command::Trim {
            media,
            start,
            end,
            duration,
        } => {
            let mut opts = MediaTrimOptions::new(start.as_str(), end.as_str());
            if let Some(d) = duration {
                opts = opts.duration(*d);
            }
            (
                JobKind::MediaTrim,
                JobOptions::MediaTrim(opts),
                vec![media.clone()],
            )
        }
        Command::Stats { .. } | Command::Inspect { .. } => return None,
    };
    Some(job)
}

fn run_stats(cli: &Cli, stats: &JsonFileStats, reset: bool, yes: bool) -> Result<()> {
    if reset {
        if !yes && !confirm("Reset usage statistics?")? {
            eprintln!("Aborted.");
            return Ok(());
        }
        stats.reset();
        if !cli.quiet {
            eprintln!("{} Statistics reset", green("✔"));
        }
        return Ok(());
    }

    let totals = stats.load();
    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&totals).context("Failed to serialise stats")?
        );
    } else {
        println!("Files processed:  {}", totals.files_processed);
        println!("Data processed:   {}", format_file_size(totals.bytes_processed));
        println!("Stored in:        {}", stats.path().display());
    }
    Ok(())
}

fn confirm(question: &str) -> Result<bool> {
    eprint!("{question} [y/N] ");
    io::stderr().flush().ok();
    let mut answer = String::new();
    io::stdin()
        .lock()
        .read_line(&mut answer)
        .context("Failed to read confirmation")?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}

async fn run_inspect(cli: &Cli, path: &Path) -> Result<()> {
    let file = SelectedFile::from_path(path)
        .await
        .with_context(|| format!("Failed to load {}", path.display()))?;

    let mut report = serde_json::json!({
        "name": file.name,
        "mime_type": file.mime_type,
        "size": file.size(),
    });

    if file.is_pdf() {
        let info = PdfiumRenderer::new()
            .inspect(file.bytes.clone())
            .await
            .context("Failed to inspect PDF")?;
        report["pages"] = info.page_count.into();
    } else if file.mime_type.starts_with("audio/") || file.is_video() {
        let engine = FfmpegEngine::from_env();
        let scratch = format!("input{}", file.extension());
        engine.load().await.context("Media engine unavailable")?;
        let _lease = engine.lease().await;
        engine
            .write_input_file(&scratch, &file.bytes)
            .await
            .context("Failed to stage media file")?;
        let probed = engine.probe_duration(&scratch).await;
        engine.delete_file(&scratch).await.ok();
        report["duration"] = probed.context("Failed to read duration")?.into();
    }

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("Failed to serialise report")?
        );
        return Ok(());
    }

    println!("File:         {}", file.name);
    println!("Type:         {}", file.mime_type);
    println!("Size:         {}", format_file_size(file.size()));
    if let Some(pages) = report.get("pages") {
        println!("Pages:        {}", pages);
    }
    if let Some(secs) = report.get("duration").and_then(|d| d.as_f64()) {
        println!("Duration:     {}", format_time(secs));
    }
    if !file.is_pdf() && report.get("duration").is_none() && !file.is_image() {
        eprintln!("{}", red("Not a PDF or media file; nothing more to report."));
    }
    Ok(())
}
