//! Audio/video jobs: format conversion and trimming.
//!
//! Both kinds are a single engine invocation. The input is copied into the
//! engine's scratch space as `input<ext>`, the command line writes
//! `output.<format>` (conversion) or `output<ext>` (trim), and both scratch
//! files are removed afterwards whether or not the run succeeded. The engine
//! lease is held from the input write until that cleanup, so jobs from
//! different controllers sharing one engine never see each other's files.

use super::first_file;
use crate::config::{MediaConvertOptions, MediaTrimOptions};
use crate::engine::Engines;
use crate::error::{ConvertError, ValidationError};
use crate::format::format_time;
use crate::input::SelectedFile;
use crate::job::{Artifact, JobKind, JobResult};
use crate::progress::ProgressReporter;
use crate::range::{parse_time_to_seconds, TrimWindow};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info, warn};

static RE_BITRATE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+(?:\.\d+)?[kKmM]?$").unwrap());

static RE_RESOLUTION: Lazy<Regex> = Lazy::new(|| Regex::new(r"^-?\d+:-?\d+$").unwrap());

/// Output containers a media conversion can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaFormat {
    Mp3,
    Wav,
    Ogg,
    M4a,
    Mp4,
    Webm,
    Avi,
}

impl MediaFormat {
    pub const ALL: [MediaFormat; 7] = [
        MediaFormat::Mp3,
        MediaFormat::Wav,
        MediaFormat::Ogg,
        MediaFormat::M4a,
        MediaFormat::Mp4,
        MediaFormat::Webm,
        MediaFormat::Avi,
    ];

    pub fn extension(self) -> &'static str {
        match self {
            MediaFormat::Mp3 => "mp3",
            MediaFormat::Wav => "wav",
            MediaFormat::Ogg => "ogg",
            MediaFormat::M4a => "m4a",
            MediaFormat::Mp4 => "mp4",
            MediaFormat::Webm => "webm",
            MediaFormat::Avi => "avi",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            MediaFormat::Mp3 => "audio/mpeg",
            MediaFormat::Wav => "audio/wav",
            MediaFormat::Ogg => "audio/ogg",
            MediaFormat::M4a => "audio/mp4",
            MediaFormat::Mp4 => "video/mp4",
            MediaFormat::Webm => "video/webm",
            MediaFormat::Avi => "video/x-msvideo",
        }
    }

    /// Audio-only containers take no video settings.
    pub fn is_audio(self) -> bool {
        matches!(
            self,
            MediaFormat::Mp3 | MediaFormat::Wav | MediaFormat::Ogg | MediaFormat::M4a
        )
    }
}

impl FromStr for MediaFormat {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().trim_start_matches('.').to_lowercase();
        MediaFormat::ALL
            .into_iter()
            .find(|f| f.extension() == lower)
            .ok_or_else(|| ValidationError::UnknownFormat(s.to_string()))
    }
}

impl fmt::Display for MediaFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Conversion options translated into engine terms.
#[derive(Debug, Clone, PartialEq)]
pub struct ConvertParams {
    pub format: MediaFormat,
    pub audio_bitrate: String,
    /// `W:H` for the scale filter; `None` keeps the source resolution.
    pub scale: Option<String>,
    pub crf: u8,
}

impl ConvertParams {
    /// Check the typed options. Resolution is only looked at for video
    /// targets.
    pub fn translate(opts: &MediaConvertOptions) -> Result<Self, ValidationError> {
        let format: MediaFormat = opts.format.parse()?;

        let audio_bitrate = opts.audio_bitrate.trim();
        if !RE_BITRATE.is_match(audio_bitrate) {
            return Err(ValidationError::InvalidBitrate(opts.audio_bitrate.clone()));
        }

        let resolution = opts.resolution.trim();
        let scale = if format.is_audio() || resolution.eq_ignore_ascii_case("original") {
            None
        } else if RE_RESOLUTION.is_match(resolution) {
            Some(resolution.to_string())
        } else {
            return Err(ValidationError::InvalidResolution(opts.resolution.clone()));
        };

        Ok(Self {
            format,
            audio_bitrate: audio_bitrate.to_string(),
            scale,
            crf: opts.crf.min(51),
        })
    }

    /// Engine command line converting `input` into `output`.
    pub fn to_args(&self, input: &str, output: &str) -> Vec<String> {
        let mut args: Vec<String> = vec!["-i".into(), input.into()];
        args.push("-b:a".into());
        args.push(self.audio_bitrate.clone());

        if self.format.is_audio() {
            if self.format == MediaFormat::Mp3 {
                args.extend(["-codec:a", "libmp3lame"].map(String::from));
            }
        } else {
            args.push("-crf".into());
            args.push(self.crf.to_string());
            if let Some(scale) = &self.scale {
                args.push("-vf".into());
                args.push(format!("scale={scale}"));
            }
            match self.format {
                MediaFormat::Webm => {
                    args.extend(["-c:v", "libvpx", "-c:a", "libvorbis"].map(String::from))
                }
                MediaFormat::Mp4 => args.extend(["-c:v", "libx264", "-c:a", "aac"].map(String::from)),
                _ => {}
            }
        }

        args.push("-y".into());
        args.push(output.into());
        args
    }
}

#[derive(Debug)]
pub(crate) struct Plan {
    pub(crate) kind: JobKind,
    pub(crate) file: SelectedFile,
    pub(crate) input_name: String,
    pub(crate) output_name: String,
    pub(crate) download_name: String,
    pub(crate) mime_type: String,
    pub(crate) args: Vec<String>,
    pub(crate) subtitle: String,
}

fn input_name(file: &SelectedFile) -> String {
    format!("input{}", file.extension())
}

pub(crate) fn validate_convert(
    files: &[SelectedFile],
    opts: &MediaConvertOptions,
) -> Result<Plan, ConvertError> {
    let file = first_file(files)?.clone();
    let params = ConvertParams::translate(opts)?;
    let input = input_name(&file);
    let output = format!("output.{}", params.format);
    let download_name = format!("{}.{}", file.stem(), params.format);

    Ok(Plan {
        kind: JobKind::MediaConvert,
        args: params.to_args(&input, &output),
        input_name: input,
        output_name: output,
        mime_type: params.format.mime_type().to_string(),
        subtitle: download_name.clone(),
        download_name,
        file,
    })
}

pub(crate) async fn validate_trim(
    files: &[SelectedFile],
    opts: &MediaTrimOptions,
    engines: &Engines,
) -> Result<Plan, ConvertError> {
    let file = first_file(files)?.clone();
    let input = input_name(&file);

    let start = parse_time_to_seconds(&opts.start);
    let end = parse_time_to_seconds(&opts.end);
    TrimWindow::check_points(start, end)?;

    let duration = match opts.duration {
        Some(d) => d,
        None => {
            // Reject what needs no duration before probing.
            if let (Some(s), Some(e)) = (start, end) {
                if s >= e {
                    return Err(ValidationError::StartNotBeforeEnd.into());
                }
            }
            probe_duration(&file, &input, engines).await?
        }
    };
    if !duration.is_finite() || duration <= 0.0 {
        return Err(ValidationError::UnknownDuration.into());
    }

    let window = TrimWindow::validate(start, end, duration)?;
    let ext = file.extension();
    let output = format!("output{ext}");
    let download_name = format!("{}_trimmed{ext}", file.stem());
    let subtitle = format!(
        "{} - {} ({})",
        format_time(window.effective_start()),
        format_time(window.effective_end()),
        format_time(window.length())
    );

    Ok(Plan {
        kind: JobKind::MediaTrim,
        args: window.to_args(&input, &output),
        input_name: input,
        output_name: output,
        download_name,
        mime_type: file.mime_type.clone(),
        subtitle,
        file,
    })
}

async fn probe_duration(
    file: &SelectedFile,
    input: &str,
    engines: &Engines,
) -> Result<f64, ConvertError> {
    let media = &engines.media;
    media.load().await?;
    let _lease = media.lease().await;
    media.write_input_file(input, &file.bytes).await?;
    let probed = media.probe_duration(input).await;
    remove_scratch(engines, input).await;
    let duration = probed?;
    debug!("{}: duration {:.2}s", file.name, duration);
    Ok(duration)
}

async fn remove_scratch(engines: &Engines, name: &str) {
    if let Err(e) = engines.media.delete_file(name).await {
        warn!("Could not remove scratch file {}: {}", name, e);
    }
}

pub(crate) async fn execute(
    plan: Plan,
    engines: &Engines,
    progress: &ProgressReporter,
) -> Result<JobResult, ConvertError> {
    let media = &engines.media;

    progress.callback().on_stage("Loading media engine");
    media.load().await?;

    let lease = media.lease().await;
    progress.callback().on_unit_start(1, 1);
    let reporter = progress.clone();
    let on_ratio = move |ratio: f64| reporter.engine_ratio(ratio);

    let outcome = async {
        media.write_input_file(&plan.input_name, &plan.file.bytes).await?;
        progress.callback().on_stage(match plan.kind {
            JobKind::MediaTrim => "Trimming",
            _ => "Converting",
        });
        media.run(&plan.args, &on_ratio).await?;
        media.read_output_file(&plan.output_name).await
    }
    .await;

    remove_scratch(engines, &plan.input_name).await;
    if outcome.is_ok() {
        remove_scratch(engines, &plan.output_name).await;
    } else if let Err(e) = media.delete_file(&plan.output_name).await {
        // A failed run usually leaves no output behind.
        debug!("No output to remove: {}", e);
    }
    drop(lease);

    let data = outcome?;
    info!("{} → {} ({} bytes)", plan.file.name, plan.download_name, data.len());
    progress.unit_completed(1, 1);

    Ok(JobResult::new(
        plan.kind,
        vec![Artifact::new(plan.download_name, data, plan.mime_type)],
        Some(plan.file.size()),
        plan.subtitle,
    ))
}
