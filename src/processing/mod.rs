pub mod image;
pub mod video;

use std::path::PathBuf;
use crate::core::SizeReport;

pub use self::image::{CommandSegmenter, ImageExecutor, Segmenter};
pub use self::video::{BinaryLocator, VideoEncoder, VideoState, locate};

/// What a successful operation hands back to the runner
#[derive(Debug, Clone, PartialEq)]
pub struct Completed {
    pub output_path: PathBuf,
    pub size_report: Option<SizeReport>,
}
