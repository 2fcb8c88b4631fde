// src/processing/image/resize.rs

//! Resize logic mapping `ResizeSettings` onto `image::imageops`.

use image::DynamicImage;
use tracing::debug;
use crate::core::ResizeSettings;
use crate::utils::{TaskError, TaskResult};

/// Computes the output dimensions for an `in_w`×`in_h` source.
///
/// With aspect lock a single scale factor drives both axes: the requested
/// axis when only one is given, the tighter of the two when both are.
pub fn target_dimensions(in_w: u32, in_h: u32, settings: &ResizeSettings) -> TaskResult<(u32, u32)> {
    if in_w == 0 || in_h == 0 {
        return Err(TaskError::invalid_input("Source image has no pixels"));
    }

    if !settings.maintain_aspect {
        return match (settings.width, settings.height) {
            (Some(w), Some(h)) if w > 0 && h > 0 => Ok((w, h)),
            _ => Err(TaskError::settings(
                "Both width and height are required when aspect ratio is not locked",
            )),
        };
    }

    let scale_w = settings.width.map(|w| f64::from(w) / f64::from(in_w));
    let scale_h = settings.height.map(|h| f64::from(h) / f64::from(in_h));
    let scale = match (scale_w, scale_h) {
        (Some(sw), Some(sh)) => sw.min(sh),
        (Some(s), None) | (None, Some(s)) => s,
        (None, None) => return Err(TaskError::settings("Resize needs a target width or height")),
    };
    if scale <= 0.0 {
        return Err(TaskError::settings("Target dimensions must be positive"));
    }

    Ok((scale_axis(in_w, scale), scale_axis(in_h, scale)))
}

fn scale_axis(len: u32, scale: f64) -> u32 {
    let scaled = (f64::from(len) * scale).round();
    // Clamp before the cast; u32::MAX pixels is already far past any codec limit
    scaled.clamp(1.0, f64::from(u32::MAX)) as u32
}

/// Applies the resize specified in `settings` to `image`.
pub fn apply_resize(image: DynamicImage, settings: &ResizeSettings) -> TaskResult<DynamicImage> {
    let (w, h) = target_dimensions(image.width(), image.height(), settings)?;
    if (w, h) == (image.width(), image.height()) {
        return Ok(image);
    }

    debug!("Resizing {}×{} → {}×{} ({:?})", image.width(), image.height(), w, h, settings.filter);
    Ok(image.resize_exact(w, h, settings.filter.filter_type()))
}
