// src/processing/image/mod.rs

//! Still-image tools backed by the `image` crate.
//!
//! # Architecture
//!
//! - [`ImageExecutor`]: Decodes, transforms, encodes and commits one image.
//! - [`resize`]: Maps `ResizeSettings` onto `resize_exact` with the requested filter.
//! - [`formats`]: Maps an output format and quality onto the matching encoder.
//! - [`background`]: The [`Segmenter`] seam and mask compositing.

mod background;
mod executor;
pub mod formats;
pub mod resize;

pub use background::{CommandSegmenter, Segmenter, remove_background};
pub use executor::{ImageExecutor, load_oriented};
