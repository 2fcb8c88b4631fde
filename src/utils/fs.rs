//! Filesystem helpers: staged outputs, output naming and size bookkeeping.
//!
//! Every output is first written to a uniquely named sibling of the final
//! path and only renamed into place once the operation has succeeded, so a
//! failed or cancelled job never leaves a file at the requested location.

use std::path::{Path, PathBuf};
use tempfile::{NamedTempFile, TempPath};
use crate::utils::{TaskError, TaskResult};

/// Get file size in bytes
pub fn file_size(path: impl AsRef<Path>) -> TaskResult<u64> {
    std::fs::metadata(path.as_ref())
        .map(|m| m.len())
        .map_err(|e| TaskError::io(format!(
            "Failed to get file size of '{}': {}", path.as_ref().display(), e
        )))
}

/// Creates the parent directory of `path` if it does not exist yet
pub fn ensure_parent_dir(path: &Path) -> TaskResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| TaskError::io(format!(
            "Cannot create output directory '{}': {}", parent.display(), e
        )))?;
    }
    Ok(())
}

fn staging_builder(final_path: &Path) -> (PathBuf, String, String) {
    let dir = final_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let stem = final_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output");
    // Keep the real extension last: encoders pick the container from it
    let suffix = final_path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{e}"))
        .unwrap_or_default();
    (dir, format!(".{stem}."), format!(".part{suffix}"))
}

/// Opens a staging file next to `final_path`.
///
/// The file is deleted when dropped unless [`commit`] persists it.
pub fn staging_file(final_path: &Path) -> TaskResult<NamedTempFile> {
    ensure_parent_dir(final_path)?;
    let (dir, prefix, suffix) = staging_builder(final_path);
    tempfile::Builder::new()
        .prefix(&prefix)
        .suffix(&suffix)
        .tempfile_in(&dir)
        .map_err(|e| TaskError::io(format!(
            "Cannot write to '{}': {}", dir.display(), e
        )))
}

/// Reserves a staging path for an external writer (the video encoder).
pub fn staging_path(final_path: &Path) -> TaskResult<TempPath> {
    staging_file(final_path).map(NamedTempFile::into_temp_path)
}

/// Atomically moves a finished staging file to its final location
pub fn commit(staged: NamedTempFile, final_path: &Path) -> TaskResult<()> {
    staged
        .persist(final_path)
        .map(|_| ())
        .map_err(|e| TaskError::io(format!(
            "Cannot move output to '{}': {}", final_path.display(), e.error
        )))
}

/// Same as [`commit`] for a bare staging path
pub fn commit_path(staged: TempPath, final_path: &Path) -> TaskResult<()> {
    staged
        .persist(final_path)
        .map_err(|e| TaskError::io(format!(
            "Cannot move output to '{}': {}", final_path.display(), e.error
        )))
}

/// Builds `<dir>/<input stem><suffix>.<ext>`, avoiding the input itself.
pub fn derive_output_path(input: &Path, dir: &Path, suffix: &str, ext: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output");
    let candidate = dir.join(format!("{stem}{suffix}.{ext}"));
    if same_file(&candidate, input) {
        dir.join(format!("{stem}{suffix}_1.{ext}"))
    } else {
        candidate
    }
}

/// True when both paths refer to the same file.
pub fn same_file(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (std::fs::canonicalize(a), std::fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Extracts the file name for log messages
pub fn extract_filename(path: &Path) -> &str {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unknown")
}
