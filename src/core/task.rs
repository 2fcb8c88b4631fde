//! Job descriptor definition.

use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};
use crate::core::types::{
    BackgroundSettings, CompressSettings, ConvertSettings, ResizeSettings, VideoSettings,
};
use crate::utils::{ImageFormat, ValidationError, derive_output_path, format_from_extension};

/// The fixed set of tools, each carrying its own option schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "options", rename_all = "camelCase")]
pub enum ToolKind {
    BackgroundRemove(BackgroundSettings),
    Convert(ConvertSettings),
    Compress(CompressSettings),
    Resize(ResizeSettings),
    VideoCompress(VideoSettings),
}

impl ToolKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::BackgroundRemove(_) => "background-remove",
            Self::Convert(_) => "convert",
            Self::Compress(_) => "compress",
            Self::Resize(_) => "resize",
            Self::VideoCompress(_) => "video-compress",
        }
    }

    pub fn is_video(&self) -> bool {
        matches!(self, Self::VideoCompress(_))
    }

    /// File name suffix used when only an output directory is given
    fn output_suffix(&self) -> &'static str {
        match self {
            Self::BackgroundRemove(_) => "_nobg",
            Self::Convert(_) => "",
            Self::Compress(_) | Self::VideoCompress(_) => "_compressed",
            Self::Resize(_) => "_resized",
        }
    }

    /// Image format written for `input`, `None` for video.
    pub fn output_format(&self, input: &Path) -> Result<Option<ImageFormat>, ValidationError> {
        match self {
            Self::BackgroundRemove(s) => Ok(Some(s.output_format)),
            Self::Convert(s) => Ok(Some(s.target_format)),
            Self::Compress(_) | Self::Resize(_) => format_from_extension(input).map(Some),
            Self::VideoCompress(_) => Ok(None),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        match self {
            Self::BackgroundRemove(_) => Ok(()),
            Self::Convert(s) => s.validate(),
            Self::Compress(s) => s.validate(),
            Self::Resize(s) => s.validate(),
            Self::VideoCompress(s) => s.validate(),
        }
    }
}

/// Where results are written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OutputTarget {
    /// Exact output file; only valid for a single input
    File(PathBuf),
    /// Output directory; names are derived from each input
    Directory(PathBuf),
}

/// One requested transformation of one or more input files.
///
/// Owned by the caller and moved into the runner on submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaJob {
    pub tool: ToolKind,
    /// Source files, processed independently in order
    pub inputs: Vec<PathBuf>,
    pub output: OutputTarget,
}

impl MediaJob {
    pub fn single(tool: ToolKind, input: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            tool,
            inputs: vec![input.into()],
            output: OutputTarget::File(output.into()),
        }
    }

    pub fn batch(tool: ToolKind, inputs: Vec<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            tool,
            inputs,
            output: OutputTarget::Directory(output_dir.into()),
        }
    }

    /// Resolves the output file for one of this job's inputs.
    pub fn output_for(&self, input: &Path) -> Result<PathBuf, ValidationError> {
        match &self.output {
            OutputTarget::File(path) => Ok(path.clone()),
            OutputTarget::Directory(dir) => {
                let ext = match &self.tool {
                    ToolKind::VideoCompress(s) => s.container.extension(),
                    tool => tool
                        .output_format(input)?
                        .map(|format| format.primary_extension())
                        .unwrap_or_default(),
                };
                Ok(derive_output_path(input, dir, self.tool.output_suffix(), ext))
            }
        }
    }
}
