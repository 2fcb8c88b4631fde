// src/processing/video/locator.rs

//! Resolves external executables, bundled copy first, then the system `PATH`.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use lazy_static::lazy_static;
use tracing::debug;
use crate::utils::LocateError;

lazy_static! {
    /// Directory of the running executable, computed once per process
    static ref INSTALL_DIR: Option<PathBuf> = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf));
}

const DEFAULT_BUNDLE_SUBDIR: &str = "bin";

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|m| m.is_file() && (m.permissions().mode() & 0o111 != 0))
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    std::fs::metadata(path)
        .map(|m| m.is_file())
        .unwrap_or(false)
}

fn executable_name(name: &str) -> String {
    let suffix = std::env::consts::EXE_SUFFIX;
    if suffix.is_empty() || name.ends_with(suffix) {
        name.to_string()
    } else {
        format!("{name}{suffix}")
    }
}

/// Search order for external tools.
///
/// Bundled roots are checked in order, then every entry of the search path.
/// The locator does not check that a match is actually the requested tool.
#[derive(Debug, Clone)]
pub struct BinaryLocator {
    bundled_roots: Vec<PathBuf>,
    search_path: Option<OsString>,
}

impl Default for BinaryLocator {
    fn default() -> Self {
        Self::new(DEFAULT_BUNDLE_SUBDIR)
    }
}

impl BinaryLocator {
    /// Looks in `<exe dir>/<bundle_subdir>`, then `<exe dir>`, then the inherited `PATH`.
    pub fn new(bundle_subdir: &str) -> Self {
        let bundled_roots = INSTALL_DIR
            .as_ref()
            .map(|dir| vec![dir.join(bundle_subdir), dir.clone()])
            .unwrap_or_default();
        Self {
            bundled_roots,
            search_path: std::env::var_os("PATH"),
        }
    }

    /// Explicit roots and search path, used to isolate lookups in tests.
    pub fn with_roots(bundled_roots: Vec<PathBuf>, search_path: Option<OsString>) -> Self {
        Self { bundled_roots, search_path }
    }

    /// Returns the first executable match for `name`.
    pub fn locate(&self, name: &str) -> Result<PathBuf, LocateError> {
        let not_found = || LocateError::NotFound { name: name.to_string() };
        if name.trim().is_empty() {
            return Err(not_found());
        }

        // Explicit paths bypass the search entirely
        let direct = Path::new(name);
        if direct.components().count() > 1 {
            return if is_executable(direct) {
                Ok(direct.to_path_buf())
            } else {
                Err(not_found())
            };
        }

        let file_name = executable_name(name);
        let system_dirs = self
            .search_path
            .as_ref()
            .map(|p| std::env::split_paths(p).collect::<Vec<_>>())
            .unwrap_or_default();

        for (dir, bundled) in self
            .bundled_roots
            .iter()
            .map(|d| (d, true))
            .chain(system_dirs.iter().map(|d| (d, false)))
        {
            if dir.as_os_str().is_empty() {
                continue;
            }
            let candidate = dir.join(&file_name);
            if is_executable(&candidate) {
                debug!(
                    "Resolved {} → {} ({})",
                    name,
                    candidate.display(),
                    if bundled { "bundled" } else { "system" }
                );
                return Ok(candidate);
            }
        }

        Err(not_found())
    }
}

/// Resolves `name` with the default bundle layout and the process `PATH`.
pub fn locate(name: &str) -> Result<PathBuf, LocateError> {
    BinaryLocator::default().locate(name)
}
