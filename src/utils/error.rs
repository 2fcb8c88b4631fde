//! Error types for the media-task engine.
//!
//! Provides a hierarchy of error types using `thiserror` for ergonomic error handling.
//! Every error maps onto a stable [`ErrorKind`] so the presentation layer can
//! categorise failures without parsing the message text.

use std::fmt;
use std::io;
use std::path::PathBuf;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Stable failure category surfaced to the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    /// Source file is missing, unreadable or corrupt
    InvalidInput,
    /// Requested output format cannot be produced
    UnsupportedFormat,
    /// Job options failed schema validation
    InvalidOptions,
    /// Destination not writable, disk full, etc.
    IoError,
    /// No bundled or system copy of an external binary
    EncoderNotFound,
    /// External encoder exited abnormally or produced no output
    EncoderError,
    /// User-initiated cancellation
    Cancelled,
    /// Unexpected fault inside a worker
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidInput => "invalidInput",
            Self::UnsupportedFormat => "unsupportedFormat",
            Self::InvalidOptions => "invalidOptions",
            Self::IoError => "ioError",
            Self::EncoderNotFound => "encoderNotFound",
            Self::EncoderError => "encoderError",
            Self::Cancelled => "cancelled",
            Self::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validation errors for jobs and their options.
#[derive(Error, Debug, Serialize)]
pub enum ValidationError {
    /// Path-related validation error
    #[error("Path error: {0}")]
    Path(#[from] PathError),
    /// Input or output format not handled by the tool
    #[error("Format error: {0}")]
    Format(String),
    /// Invalid settings error
    #[error("Settings error: {0}")]
    Settings(String),
}

/// File path errors.
#[derive(Error, Debug, Serialize)]
pub enum PathError {
    /// File does not exist
    #[error("File not found: {0}")]
    NotFound(PathBuf),
    /// Path exists but is not a file
    #[error("Not a file: {0}")]
    NotFile(PathBuf),
    /// Output would overwrite one of the inputs
    #[error("Output path is the same as input: {0}")]
    SameAsInput(PathBuf),
    /// IO error accessing the path
    #[error("IO error: {0}")]
    IO(String),
}

/// External binary lookup failure.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
pub enum LocateError {
    #[error("{name} not found (neither bundled nor in system PATH)")]
    NotFound { name: String },
}

/// Main error type for job execution.
///
/// Validation errors are returned synchronously from submission; everything
/// else ends up in a terminal `Failed` event.
#[derive(Error, Debug, Serialize)]
pub enum TaskError {
    /// Job or option validation failed
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Source could not be read or decoded
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Unsupported or invalid output format
    #[error("Format error: {0}")]
    Format(String),

    /// File IO error
    #[error("IO error: {0}")]
    IO(String),

    /// External binary is missing
    #[error("Encoder not found: {0}")]
    NotFound(#[from] LocateError),

    /// External encoder failed
    #[error("Encoder error: {0}")]
    Encoder(String),

    /// Job was cancelled by the caller
    #[error("Cancelled")]
    Cancelled,

    /// Worker crashed or the runtime went away
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Convenience result type for engine operations.
pub type TaskResult<T> = Result<T, TaskError>;

impl TaskError {
    pub fn invalid_input<T: Into<String>>(msg: T) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn format<T: Into<String>>(msg: T) -> Self {
        Self::Format(msg.into())
    }

    pub fn io<T: Into<String>>(msg: T) -> Self {
        Self::IO(msg.into())
    }

    pub fn encoder<T: Into<String>>(msg: T) -> Self {
        Self::Encoder(msg.into())
    }

    pub fn internal<T: Into<String>>(msg: T) -> Self {
        Self::Internal(msg.into())
    }

    pub fn settings<T: Into<String>>(msg: T) -> Self {
        Self::Validation(ValidationError::settings(msg))
    }

    /// Stable category for this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(e) => e.kind(),
            Self::InvalidInput(_) => ErrorKind::InvalidInput,
            Self::Format(_) => ErrorKind::UnsupportedFormat,
            Self::IO(_) => ErrorKind::IoError,
            Self::NotFound(_) => ErrorKind::EncoderNotFound,
            Self::Encoder(_) => ErrorKind::EncoderError,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Maps a decode failure of `path` onto the taxonomy.
    pub fn from_decode(path: &std::path::Path, err: image::ImageError) -> Self {
        match err {
            image::ImageError::Unsupported(e) => {
                Self::format(format!("Cannot decode '{}': {e}", path.display()))
            }
            image::ImageError::IoError(e) if e.kind() == io::ErrorKind::PermissionDenied => {
                Self::invalid_input(format!("Cannot read '{}': {e}", path.display()))
            }
            other => Self::invalid_input(format!("Failed to load '{}': {other}", path.display())),
        }
    }
}

impl ValidationError {
    pub fn path_not_found(path: impl Into<PathBuf>) -> Self {
        Self::Path(PathError::NotFound(path.into()))
    }

    pub fn not_a_file(path: impl Into<PathBuf>) -> Self {
        Self::Path(PathError::NotFile(path.into()))
    }

    pub fn same_as_input(path: impl Into<PathBuf>) -> Self {
        Self::Path(PathError::SameAsInput(path.into()))
    }

    pub fn format(msg: impl Into<String>) -> Self {
        Self::Format(msg.into())
    }

    pub fn settings(msg: impl Into<String>) -> Self {
        Self::Settings(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Path(PathError::NotFound(_) | PathError::NotFile(_) | PathError::IO(_)) => {
                ErrorKind::InvalidInput
            }
            Self::Path(PathError::SameAsInput(_)) => ErrorKind::InvalidOptions,
            Self::Format(_) => ErrorKind::UnsupportedFormat,
            Self::Settings(_) => ErrorKind::InvalidOptions,
        }
    }
}

// Convert std::io::Error to TaskError
impl From<io::Error> for TaskError {
    fn from(err: io::Error) -> Self {
        Self::IO(err.to_string())
    }
}

// Encoding errors; decoding goes through `TaskError::from_decode`
impl From<image::ImageError> for TaskError {
    fn from(err: image::ImageError) -> Self {
        match err {
            image::ImageError::IoError(e) => Self::IO(e.to_string()),
            image::ImageError::Unsupported(e) => Self::Format(e.to_string()),
            other => Self::Format(format!("Encoding failed: {other}")),
        }
    }
}

// Convert io::Error to PathError
impl From<io::Error> for PathError {
    fn from(err: io::Error) -> Self {
        Self::IO(err.to_string())
    }
}

// Convert PathError to TaskError
impl From<PathError> for TaskError {
    fn from(err: PathError) -> Self {
        Self::Validation(ValidationError::Path(err))
    }
}

impl From<tokio::task::JoinError> for TaskError {
    fn from(err: tokio::task::JoinError) -> Self {
        if err.is_panic() {
            Self::Internal(format!("Worker panicked: {err}"))
        } else {
            Self::Internal(format!("Worker aborted: {err}"))
        }
    }
}
