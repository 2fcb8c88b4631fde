// Module declarations in dependency order
pub mod core;
pub mod utils;
pub mod processing;
pub mod worker;

// Public exports for external consumers
pub use core::{
    EngineConfig, EventPayload, JobEvent, JobId, JobResult, JobStatus, MediaJob, OutputTarget,
    SizeReport, ToolKind,
};
pub use processing::{BinaryLocator, Segmenter, locate};
pub use utils::{ErrorKind, TaskError, TaskResult};
pub use worker::{JobHandle, TaskRunner};

// This library file is the public API of the engine.
// The command-line entry point in main.rs is a thin driver over it.
