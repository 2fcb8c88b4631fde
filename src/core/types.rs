//! Core types for per-tool settings and job results.

use std::fmt;
use std::path::PathBuf;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use crate::utils::{ErrorKind, ImageFormat, ValidationError};

fn default_true() -> bool {
    true
}

/// Resampling filter used by the resize tool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResampleFilter {
    Nearest,
    #[serde(alias = "triangle")]
    Bilinear,
    #[serde(alias = "catmullrom")]
    Bicubic,
    #[default]
    Lanczos,
}

impl ResampleFilter {
    pub fn filter_type(&self) -> image::imageops::FilterType {
        use image::imageops::FilterType;
        match self {
            Self::Nearest => FilterType::Nearest,
            Self::Bilinear => FilterType::Triangle,
            Self::Bicubic => FilterType::CatmullRom,
            Self::Lanczos => FilterType::Lanczos3,
        }
    }
}

/// Resize settings for image dimensions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ResizeSettings {
    /// Target width in pixels
    pub width: Option<u32>,
    /// Target height in pixels
    pub height: Option<u32>,
    /// Whether to maintain aspect ratio when resizing
    #[serde(default = "default_true")]
    pub maintain_aspect: bool,
    #[serde(default)]
    pub filter: ResampleFilter,
}

impl ResizeSettings {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.width == Some(0) {
            return Err(ValidationError::settings("Width cannot be 0"));
        }
        if self.height == Some(0) {
            return Err(ValidationError::settings("Height cannot be 0"));
        }
        match (self.width, self.height, self.maintain_aspect) {
            (None, None, _) => Err(ValidationError::settings(
                "Resize needs a target width or height",
            )),
            (Some(_), Some(_), _) | (_, _, true) => Ok(()),
            _ => Err(ValidationError::settings(
                "Both width and height are required when aspect ratio is not locked",
            )),
        }
    }
}

/// Quality settings for lossy re-encoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CompressSettings {
    /// Quality level (1-100) for formats with a quality axis
    #[serde(default = "CompressSettings::default_quality")]
    pub quality: u8,
    /// Growth over the original (in percent) tolerated before flagging the result
    #[serde(default = "CompressSettings::default_tolerance")]
    pub size_tolerance_percent: f64,
}

impl CompressSettings {
    fn default_quality() -> u8 {
        85
    }

    fn default_tolerance() -> f64 {
        1.0
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_quality(self.quality)?;
        if !self.size_tolerance_percent.is_finite() || self.size_tolerance_percent < 0.0 {
            return Err(ValidationError::settings(format!(
                "Invalid size tolerance: {}. Must be a non-negative percentage",
                self.size_tolerance_percent
            )));
        }
        Ok(())
    }
}

impl Default for CompressSettings {
    fn default() -> Self {
        Self {
            quality: Self::default_quality(),
            size_tolerance_percent: Self::default_tolerance(),
        }
    }
}

/// Target format for the convert tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ConvertSettings {
    pub target_format: ImageFormat,
    /// Quality for lossy targets, format default when absent
    #[serde(default)]
    pub quality: Option<u8>,
}

impl ConvertSettings {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(q) = self.quality {
            validate_quality(q)?;
        }
        Ok(())
    }

    pub fn effective_quality(&self) -> u8 {
        self.quality.unwrap_or_else(|| self.target_format.default_quality())
    }
}

/// Background removal output options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct BackgroundSettings {
    #[serde(default = "BackgroundSettings::default_format")]
    pub output_format: ImageFormat,
    /// RGB fill used when the output format has no alpha channel
    #[serde(default = "BackgroundSettings::default_fill")]
    pub fill_color: [u8; 3],
}

impl BackgroundSettings {
    fn default_format() -> ImageFormat {
        ImageFormat::PNG
    }

    fn default_fill() -> [u8; 3] {
        [255, 255, 255]
    }
}

impl Default for BackgroundSettings {
    fn default() -> Self {
        Self {
            output_format: Self::default_format(),
            fill_color: Self::default_fill(),
        }
    }
}

/// Output container for compressed video.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoContainer {
    #[default]
    Mp4,
    Mkv,
    Webm,
    Mov,
}

impl VideoContainer {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Mp4 => "mp4",
            Self::Mkv => "mkv",
            Self::Webm => "webm",
            Self::Mov => "mov",
        }
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "mp4" | "m4v" => Some(Self::Mp4),
            "mkv" => Some(Self::Mkv),
            "webm" => Some(Self::Webm),
            "mov" => Some(Self::Mov),
            _ => None,
        }
    }
}

const X264_PRESETS: &[&str] = &[
    "ultrafast", "superfast", "veryfast", "faster", "fast",
    "medium", "slow", "slower", "veryslow",
];

/// Simple 1-5 quality scale mapped onto x264 CRF values (lower CRF = better).
const QUALITY_TO_CRF: [u8; 5] = [30, 28, 25, 23, 20];
const DEFAULT_CRF: u8 = 25;
const MAX_CRF: u8 = 51;

/// Video compression settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct VideoSettings {
    /// Constant rate factor (0-51)
    #[serde(default)]
    pub crf: Option<u8>,
    /// Coarse quality level (1-5), mutually exclusive with `crf`
    #[serde(default)]
    pub quality_level: Option<u8>,
    /// Target video bitrate such as "2500k" or "4M"
    #[serde(default)]
    pub video_bitrate: Option<String>,
    #[serde(default)]
    pub container: VideoContainer,
    #[serde(default = "VideoSettings::default_preset")]
    pub preset: String,
    #[serde(default = "VideoSettings::default_audio_bitrate")]
    pub audio_bitrate: String,
}

impl VideoSettings {
    fn default_preset() -> String {
        "medium".to_string()
    }

    fn default_audio_bitrate() -> String {
        "128k".to_string()
    }

    pub fn effective_crf(&self) -> u8 {
        match (self.crf, self.quality_level) {
            (Some(crf), _) => crf,
            (None, Some(level)) => QUALITY_TO_CRF
                .get(usize::from(level.saturating_sub(1)))
                .copied()
                .unwrap_or(DEFAULT_CRF),
            (None, None) => DEFAULT_CRF,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.crf.is_some() && self.quality_level.is_some() {
            return Err(ValidationError::settings(
                "Specify either crf or qualityLevel, not both",
            ));
        }
        if let Some(crf) = self.crf {
            if crf > MAX_CRF {
                return Err(ValidationError::settings(format!(
                    "Invalid CRF value: {crf}. Must be between 0 and {MAX_CRF}"
                )));
            }
        }
        if let Some(level) = self.quality_level {
            if !(1..=5).contains(&level) {
                return Err(ValidationError::settings(format!(
                    "Invalid quality level: {level}. Must be between 1 and 5"
                )));
            }
        }
        if let Some(rate) = &self.video_bitrate {
            validate_bitrate(rate)?;
        }
        validate_bitrate(&self.audio_bitrate)?;
        if !X264_PRESETS.contains(&self.preset.as_str()) {
            return Err(ValidationError::settings(format!(
                "Unknown encoder preset: {}", self.preset
            )));
        }
        Ok(())
    }
}

impl Default for VideoSettings {
    fn default() -> Self {
        Self {
            crf: None,
            quality_level: None,
            video_bitrate: None,
            container: VideoContainer::default(),
            preset: Self::default_preset(),
            audio_bitrate: Self::default_audio_bitrate(),
        }
    }
}

fn validate_quality(quality: u8) -> Result<(), ValidationError> {
    if quality == 0 || quality > 100 {
        return Err(ValidationError::settings(format!(
            "Invalid quality value: {}. Must be between 1 and 100", quality
        )));
    }
    Ok(())
}

/// Accepts "<digits>" with an optional k/K/m/M suffix
fn validate_bitrate(rate: &str) -> Result<(), ValidationError> {
    let digits = rate.trim_end_matches(['k', 'K', 'm', 'M']);
    let suffix_len = rate.len() - digits.len();
    if digits.is_empty()
        || suffix_len > 1
        || !digits.bytes().all(|b| b.is_ascii_digit())
        || digits.bytes().all(|b| b == b'0')
    {
        return Err(ValidationError::settings(format!("Invalid bitrate: {rate}")));
    }
    Ok(())
}

/// Unique identifier of one submitted job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Short form is enough to tell jobs apart in logs
        write!(f, "{}", &self.0.simple().to_string()[..8])
    }
}

/// Original and output sizes of a finished job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SizeReport {
    /// Original file size in bytes
    pub original_size: u64,
    /// Output file size in bytes
    pub output_size: u64,
    /// Bytes saved (can be negative if file grew)
    pub saved_bytes: i64,
    /// Compression ratio as a percentage
    pub compression_ratio: f64,
    /// Output exceeds the original by more than the tolerance;
    /// the caller decides whether to keep the original instead
    pub larger_than_original: bool,
}

impl SizeReport {
    pub fn new(original_size: u64, output_size: u64, tolerance_percent: f64) -> Self {
        let saved_bytes = original_size as i64 - output_size as i64;
        let compression_ratio = if original_size > 0 {
            saved_bytes as f64 / original_size as f64 * 100.0
        } else {
            0.0
        };
        let allowed = original_size as f64 * (1.0 + tolerance_percent / 100.0);
        Self {
            original_size,
            output_size,
            saved_bytes,
            compression_ratio,
            larger_than_original: output_size as f64 > allowed,
        }
    }
}

/// Terminal status of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum JobStatus {
    Success,
    Failed,
    Cancelled,
}

/// Result of one job; created once, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobResult {
    pub job_id: JobId,
    pub status: JobStatus,
    /// Present only on success
    pub output_path: Option<PathBuf>,
    /// Present only on failure
    pub error_kind: Option<ErrorKind>,
    /// Human-readable cause, present only on failure
    pub error_detail: Option<String>,
    pub size_report: Option<SizeReport>,
}

impl JobResult {
    pub fn success(job_id: JobId, output_path: PathBuf, size_report: Option<SizeReport>) -> Self {
        Self {
            job_id,
            status: JobStatus::Success,
            output_path: Some(output_path),
            error_kind: None,
            error_detail: None,
            size_report,
        }
    }

    pub fn failed(job_id: JobId, kind: ErrorKind, detail: impl Into<String>) -> Self {
        Self {
            job_id,
            status: JobStatus::Failed,
            output_path: None,
            error_kind: Some(kind),
            error_detail: Some(detail.into()),
            size_report: None,
        }
    }

    pub fn cancelled(job_id: JobId) -> Self {
        Self {
            job_id,
            status: JobStatus::Cancelled,
            output_path: None,
            error_kind: None,
            error_detail: None,
            size_report: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == JobStatus::Success
    }
}
