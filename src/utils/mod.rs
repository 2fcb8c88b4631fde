pub mod error;
pub mod validation;
pub mod formats;
pub mod fs;

pub use error::{ErrorKind, LocateError, PathError, TaskError, TaskResult, ValidationError};
pub use validation::validate_job;
pub use formats::{ImageFormat, format_from_extension};
pub use fs::{
    commit,
    commit_path,
    derive_output_path,
    ensure_parent_dir,
    extract_filename,
    file_size,
    same_file,
    staging_file,
    staging_path,
};
