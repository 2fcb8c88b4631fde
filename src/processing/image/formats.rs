// src/processing/image/formats.rs

//! Maps an [`ImageFormat`] and quality value onto the `image` crate encoders.

use std::io::{Seek, Write};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::codecs::webp::WebPEncoder;
use image::{ColorType, DynamicImage, ImageEncoder, Rgb, RgbImage};
use crate::utils::{ImageFormat, TaskResult};

/// Background used when alpha has to go (JPEG, BMP)
pub const WHITE: [u8; 3] = [255, 255, 255];

// ── Pixel preparation ────────────────────────────────────────────────────────────────

/// Composites `image` over a solid `fill` colour, dropping alpha.
pub fn flatten_onto(image: &DynamicImage, fill: [u8; 3]) -> RgbImage {
    if !image.color().has_alpha() {
        return image.to_rgb8();
    }

    let rgba = image.to_rgba8();
    let mut out = RgbImage::new(rgba.width(), rgba.height());
    for (src, dst) in rgba.pixels().zip(out.pixels_mut()) {
        let alpha = u16::from(src[3]);
        let blend = |fg: u8, bg: u8| {
            ((u16::from(fg) * alpha + u16::from(bg) * (255 - alpha) + 127) / 255) as u8
        };
        *dst = Rgb([blend(src[0], fill[0]), blend(src[1], fill[1]), blend(src[2], fill[2])]);
    }
    out
}

/// Converts `image` into a pixel layout the target encoder accepts.
fn prepare_for(image: &DynamicImage, format: ImageFormat) -> DynamicImage {
    let has_alpha = image.color().has_alpha();
    match format {
        ImageFormat::JPEG | ImageFormat::BMP => DynamicImage::ImageRgb8(flatten_onto(image, WHITE)),
        ImageFormat::GIF => DynamicImage::ImageRgba8(image.to_rgba8()),
        ImageFormat::WebP if has_alpha => DynamicImage::ImageRgba8(image.to_rgba8()),
        ImageFormat::WebP => DynamicImage::ImageRgb8(image.to_rgb8()),
        ImageFormat::PNG => match image.color() {
            ColorType::Rgb32F => DynamicImage::ImageRgb16(image.to_rgb16()),
            ColorType::Rgba32F => DynamicImage::ImageRgba16(image.to_rgba16()),
            _ => image.clone(),
        },
        // The TIFF encoder has no grey+alpha layout
        ImageFormat::TIFF => match image.color() {
            ColorType::La8 => DynamicImage::ImageRgba8(image.to_rgba8()),
            ColorType::La16 | ColorType::Rgba32F => DynamicImage::ImageRgba16(image.to_rgba16()),
            ColorType::Rgb32F => DynamicImage::ImageRgb16(image.to_rgb16()),
            _ => image.clone(),
        },
    }
}

// ── Format save functions ────────────────────────────────────────────────────────────

/// Saves `image` as baseline JPEG at `quality` (1-100).
pub fn save_jpeg<W: Write>(image: &DynamicImage, writer: W, quality: u8) -> TaskResult<()> {
    let rgb = image.to_rgb8();
    JpegEncoder::new_with_quality(writer, quality).write_image(
        rgb.as_raw(),
        rgb.width(),
        rgb.height(),
        ColorType::Rgb8.into(),
    )?;
    Ok(())
}

/// Saves `image` as PNG with maximum deflate effort and adaptive filtering.
pub fn save_png<W: Write>(image: &DynamicImage, writer: W) -> TaskResult<()> {
    PngEncoder::new_with_quality(writer, CompressionType::Best, FilterType::Adaptive).write_image(
        image.as_bytes(),
        image.width(),
        image.height(),
        image.color().into(),
    )?;
    Ok(())
}

/// Saves `image` as lossless WebP; the pure-Rust encoder has no lossy mode.
pub fn save_webp<W: Write>(image: &DynamicImage, writer: W) -> TaskResult<()> {
    WebPEncoder::new_lossless(writer).write_image(
        image.as_bytes(),
        image.width(),
        image.height(),
        image.color().into(),
    )?;
    Ok(())
}

/// Encodes `image` as `format` into `writer`.
///
/// `quality` only matters for formats with a quality axis (see
/// [`ImageFormat::has_quality_axis`]).
pub fn save_image_as<W: Write + Seek>(
    image: &DynamicImage,
    mut writer: W,
    format: ImageFormat,
    quality: u8,
) -> TaskResult<()> {
    let prepared = prepare_for(image, format);
    match format {
        ImageFormat::JPEG => save_jpeg(&prepared, writer, quality),
        ImageFormat::PNG => save_png(&prepared, writer),
        ImageFormat::WebP => save_webp(&prepared, writer),
        ImageFormat::GIF | ImageFormat::BMP | ImageFormat::TIFF => {
            prepared.write_to(&mut writer, format.codec())?;
            Ok(())
        }
    }
}
