use std::path::Path;
use std::time::Duration;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use crate::utils::{TaskError, TaskResult};

/// Environment override for the concurrency cap
pub const MAX_JOBS_ENV: &str = "MEDIA_TASKS_MAX_JOBS";

/// Engine-wide settings shared by every job.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    /// Upper bound on simultaneously executing jobs
    pub max_concurrent_jobs: usize,
    /// Folder next to the executable holding bundled binaries
    pub bundle_subdir: String,
    pub encoder_name: String,
    pub probe_name: String,
    /// Segmentation command used for background removal
    pub segmenter_command: String,
    /// Time between the polite termination signal and the forced kill
    pub kill_grace_period_ms: u64,
    /// Minimum spacing between progress events of one job
    pub progress_interval_ms: u64,
    /// Encoder stderr lines kept for failure diagnostics
    pub stderr_tail_lines: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(2),
            bundle_subdir: "bin".to_string(),
            encoder_name: "ffmpeg".to_string(),
            probe_name: "ffprobe".to_string(),
            segmenter_command: "rembg".to_string(),
            kill_grace_period_ms: 2000,
            progress_interval_ms: 250,
            stderr_tail_lines: 20,
        }
    }
}

impl EngineConfig {
    /// Loads a JSON config file; missing keys fall back to defaults.
    pub fn from_file(path: impl AsRef<Path>) -> TaskResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            TaskError::io(format!("Cannot read config '{}': {}", path.display(), e))
        })?;
        let config: Self = serde_json::from_str(&raw).map_err(|e| {
            TaskError::settings(format!("Invalid config '{}': {}", path.display(), e))
        })?;
        debug!("Loaded engine config from {}", path.display());
        Ok(config.normalized())
    }

    /// Applies `MEDIA_TASKS_MAX_JOBS` when set to a positive integer.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(raw) = std::env::var(MAX_JOBS_ENV) {
            match raw.trim().parse::<usize>() {
                Ok(n) if n > 0 => self.max_concurrent_jobs = n,
                _ => warn!("Ignoring invalid {}={}", MAX_JOBS_ENV, raw),
            }
        }
        self.normalized()
    }

    fn normalized(mut self) -> Self {
        self.max_concurrent_jobs = self.max_concurrent_jobs.max(1);
        self.stderr_tail_lines = self.stderr_tail_lines.max(1);
        self
    }

    pub fn kill_grace_period(&self) -> Duration {
        Duration::from_millis(self.kill_grace_period_ms)
    }

    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms)
    }
}
