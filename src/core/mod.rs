//! Core engine types.
//!
//! This module contains the fundamental types used throughout the engine:
//! - [`MediaJob`]: Describes one requested transformation
//! - [`ToolKind`]: The closed set of tools with their option schemas
//! - [`JobResult`]: Terminal outcome of a job
//! - [`JobEvent`]: Messages on a job's progress channel
//! - [`EngineConfig`]: Engine-wide settings

mod config;
mod progress;
mod task;
mod types;

pub use config::{EngineConfig, MAX_JOBS_ENV};
pub use progress::{EventPayload, JobEvent, ProgressReporter};
pub use task::{MediaJob, OutputTarget, ToolKind};
pub use types::{
    BackgroundSettings, CompressSettings, ConvertSettings, JobId, JobResult, JobStatus,
    ResampleFilter, ResizeSettings, SizeReport, VideoContainer, VideoSettings,
};
