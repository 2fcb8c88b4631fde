// src/processing/image/executor.rs

//! In-process image operations.
//!
//! Everything here is synchronous and runs inside `tokio::task::spawn_blocking`,
//! so the async runtime is never blocked. Each operation reads one input, writes
//! one staged output and commits it only after the last cancellation checkpoint.

use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Arc;
use image::{DynamicImage, ImageDecoder, ImageReader};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::core::{CompressSettings, ProgressReporter, SizeReport, ToolKind};
use crate::processing::Completed;
use crate::utils::{
    ImageFormat, TaskError, TaskResult, commit, extract_filename, file_size,
    format_from_extension, staging_file,
};

use super::background::{Segmenter, remove_background};
use super::formats::save_image_as;
use super::resize::apply_resize;

const DECODED: f64 = 30.0;
const TRANSFORMED: f64 = 60.0;
const ENCODED: f64 = 90.0;

/// JPEG quality for resized output, high enough that a resize is not also a compression
const RESIZE_JPEG_QUALITY: u8 = 95;

/// Executor for the still-image tools.
#[derive(Clone)]
pub struct ImageExecutor {
    segmenter: Arc<dyn Segmenter>,
}

impl ImageExecutor {
    pub fn new(segmenter: Arc<dyn Segmenter>) -> Self {
        Self { segmenter }
    }

    /// Runs `tool` on `input`, committing the result to `output`.
    pub fn execute(
        &self,
        tool: &ToolKind,
        input: &Path,
        output: &Path,
        reporter: &ProgressReporter,
        cancel: &CancellationToken,
    ) -> TaskResult<Completed> {
        let original_size = file_size(input).map_err(|e| TaskError::invalid_input(e.to_string()))?;
        let input_format = format_from_extension(input)?;

        // Same-format conversion copies the bytes untouched
        if let ToolKind::Convert(settings) = tool {
            if settings.target_format == input_format {
                return copy_unchanged(input, output, original_size, reporter, cancel);
            }
        }

        let image = load_oriented(input)?;
        checkpoint(cancel)?;
        reporter.report(DECODED);

        let (image, format, quality) = match tool {
            ToolKind::BackgroundRemove(settings) => (
                remove_background(&image, self.segmenter.as_ref(), settings)?,
                settings.output_format,
                settings.output_format.default_quality(),
            ),
            ToolKind::Convert(settings) => {
                (image, settings.target_format, settings.effective_quality())
            }
            ToolKind::Compress(settings) => (image, input_format, compress_quality(settings, input_format)),
            ToolKind::Resize(settings) => (
                apply_resize(image, settings)?,
                input_format,
                resize_quality(input_format),
            ),
            ToolKind::VideoCompress(_) => {
                return Err(TaskError::internal("Video job routed to the image executor"));
            }
        };
        checkpoint(cancel)?;
        reporter.report(TRANSFORMED);

        let mut staged = staging_file(output)?;
        {
            let mut writer = BufWriter::new(staged.as_file_mut());
            save_image_as(&image, &mut writer, format, quality)?;
            writer.flush()?;
        }
        checkpoint(cancel)?;
        reporter.report(ENCODED);

        let output_size = file_size(staged.path())?;
        if output_size == 0 {
            return Err(TaskError::internal(format!(
                "Encoder wrote an empty {:?} file", format
            )));
        }
        commit(staged, output)?;

        let tolerance = match tool {
            ToolKind::Compress(settings) => settings.size_tolerance_percent,
            _ => 0.0,
        };
        let report = SizeReport::new(original_size, output_size, tolerance);
        debug!(
            "'{}' → {} bytes saved ({:.1}%)",
            extract_filename(input),
            report.saved_bytes,
            report.compression_ratio
        );

        Ok(Completed {
            output_path: output.to_path_buf(),
            size_report: Some(report),
        })
    }
}

fn checkpoint(cancel: &CancellationToken) -> TaskResult<()> {
    if cancel.is_cancelled() {
        Err(TaskError::Cancelled)
    } else {
        Ok(())
    }
}

/// Quality passed to the encoder: the requested value where the format
/// has a quality axis, otherwise the lossless default.
fn compress_quality(settings: &CompressSettings, format: ImageFormat) -> u8 {
    if format.has_quality_axis() {
        return settings.quality;
    }
    if format == ImageFormat::WebP {
        debug!(
            "WebP is written losslessly, quality {} ignored; output may grow",
            settings.quality
        );
    }
    format.default_quality()
}

fn resize_quality(format: ImageFormat) -> u8 {
    match format {
        ImageFormat::JPEG => RESIZE_JPEG_QUALITY,
        other => other.default_quality(),
    }
}

/// Decodes `path` and bakes its EXIF orientation into the pixels.
pub fn load_oriented(path: &Path) -> TaskResult<DynamicImage> {
    let reader = ImageReader::open(path)
        .map_err(|e| TaskError::invalid_input(format!("Cannot read '{}': {e}", path.display())))?
        .with_guessed_format()
        .map_err(|e| TaskError::invalid_input(format!("Cannot read '{}': {e}", path.display())))?;
    let mut decoder = reader
        .into_decoder()
        .map_err(|e| TaskError::from_decode(path, e))?;
    let orientation = decoder
        .orientation()
        .map_err(|e| TaskError::from_decode(path, e))?;
    let mut image = DynamicImage::from_decoder(decoder).map_err(|e| TaskError::from_decode(path, e))?;
    image.apply_orientation(orientation);

    debug!("Loaded '{}': {}×{}", extract_filename(path), image.width(), image.height());
    Ok(image)
}

fn copy_unchanged(
    input: &Path,
    output: &Path,
    original_size: u64,
    reporter: &ProgressReporter,
    cancel: &CancellationToken,
) -> TaskResult<Completed> {
    let mut staged = staging_file(output)?;
    let mut source = std::fs::File::open(input)
        .map_err(|e| TaskError::invalid_input(format!("Cannot read '{}': {e}", input.display())))?;
    std::io::copy(&mut source, staged.as_file_mut())?;
    checkpoint(cancel)?;
    reporter.report(ENCODED);
    commit(staged, output)?;

    debug!("'{}' already in target format, copied", extract_filename(input));
    Ok(Completed {
        output_path: output.to_path_buf(),
        size_report: Some(SizeReport::new(original_size, original_size, 0.0)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resize_keeps_jpeg_quality_high() {
        assert_eq!(resize_quality(ImageFormat::JPEG), 95);
        assert!(resize_quality(ImageFormat::JPEG) > ImageFormat::JPEG.default_quality());
        assert_eq!(resize_quality(ImageFormat::PNG), 100);
    }

    #[test]
    fn compress_quality_only_applies_to_lossy_formats() {
        let settings = CompressSettings { quality: 40, ..CompressSettings::default() };
        assert_eq!(compress_quality(&settings, ImageFormat::JPEG), 40);
        assert_eq!(compress_quality(&settings, ImageFormat::WebP), 100);
        assert_eq!(compress_quality(&settings, ImageFormat::PNG), 100);
    }
}
