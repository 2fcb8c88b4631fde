// src/processing/image/background.rs

//! Background removal: a segmentation collaborator produces the foreground
//! mask, this module composites it for the requested output format.

use std::process::{Command, Stdio};
use image::{DynamicImage, RgbaImage};
use tracing::debug;
use crate::core::BackgroundSettings;
use crate::processing::video::BinaryLocator;
use crate::utils::{TaskError, TaskResult};
use super::formats::flatten_onto;

/// Produces an RGBA image whose alpha channel is the foreground mask.
pub trait Segmenter: Send + Sync {
    fn segment(&self, image: &DynamicImage) -> TaskResult<RgbaImage>;
}

/// Runs an external segmentation command as `<cmd> i <in.png> <out.png>`.
///
/// The command is resolved through the [`BinaryLocator`] on every call, so a
/// missing tool surfaces as `EncoderNotFound` on the job that needed it.
#[derive(Debug, Clone)]
pub struct CommandSegmenter {
    locator: BinaryLocator,
    command: String,
}

impl CommandSegmenter {
    pub fn new(locator: BinaryLocator, command: impl Into<String>) -> Self {
        Self { locator, command: command.into() }
    }
}

impl Segmenter for CommandSegmenter {
    fn segment(&self, image: &DynamicImage) -> TaskResult<RgbaImage> {
        let program = self.locator.locate(&self.command)?;
        let scratch = tempfile::tempdir()
            .map_err(|e| TaskError::io(format!("Cannot create scratch directory: {e}")))?;
        let input = scratch.path().join("input.png");
        let output = scratch.path().join("mask.png");
        image.save_with_format(&input, image::ImageFormat::Png)?;

        debug!("Segmenting with {}", program.display());
        let result = Command::new(&program)
            .arg("i")
            .arg(&input)
            .arg(&output)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| TaskError::encoder(format!("Failed to start {}: {e}", program.display())))?;

        if !result.status.success() {
            return Err(TaskError::encoder(format!(
                "{} exited with {}: {}",
                self.command,
                result.status,
                String::from_utf8_lossy(&result.stderr).trim()
            )));
        }

        let mask = image::open(&output)
            .map_err(|e| TaskError::encoder(format!("Segmenter wrote no usable mask: {e}")))?;
        Ok(mask.to_rgba8())
    }
}

/// Cuts the background out of `image` for `settings.output_format`.
///
/// Alpha-capable formats keep transparency; the rest are flattened onto
/// `settings.fill_color`.
pub fn remove_background(
    image: &DynamicImage,
    segmenter: &dyn Segmenter,
    settings: &BackgroundSettings,
) -> TaskResult<DynamicImage> {
    let mask = segmenter.segment(image)?;
    if mask.dimensions() != (image.width(), image.height()) {
        return Err(TaskError::encoder(format!(
            "Segmentation mask is {}×{}, expected {}×{}",
            mask.width(),
            mask.height(),
            image.width(),
            image.height()
        )));
    }

    // Colour comes from the source, only alpha from the mask
    let mut cutout = image.to_rgba8();
    for (px, mask_px) in cutout.pixels_mut().zip(mask.pixels()) {
        px[3] = mask_px[3];
    }
    let cutout = DynamicImage::ImageRgba8(cutout);

    if settings.output_format.supports_alpha() {
        Ok(cutout)
    } else {
        Ok(DynamicImage::ImageRgb8(flatten_onto(&cutout, settings.fill_color)))
    }
}
