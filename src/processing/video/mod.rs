// src/processing/video/mod.rs

//! Video compression through an external encoder process.
//!
//! # Architecture
//!
//! - [`BinaryLocator`]: Finds bundled or system copies of `ffmpeg`/`ffprobe`.
//! - [`command`]: Builds encoder and probe argument vectors.
//! - [`progress`]: Parses the encoder's `-progress` stream.
//! - [`VideoEncoder`]: Spawns, supervises and cancels the encoder.

pub mod command;
mod locator;
mod probe;
pub mod progress;
mod session;

pub use locator::{BinaryLocator, locate};
pub use probe::probe_duration;
pub use session::{VideoEncoder, VideoState, terminate};
