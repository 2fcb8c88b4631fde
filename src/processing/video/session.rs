// src/processing/video/session.rs

//! Supervises one encoder process from spawn to exit.
//!
//! The child is spawned with `kill_on_drop`, so dropping the supervising
//! future on any path (runner shutdown, panic unwinding) still kills it. The
//! encoder writes into a staging path that is deleted on drop unless it is
//! committed after a clean exit.

use std::collections::VecDeque;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::core::{EngineConfig, JobId, ProgressReporter, SizeReport, VideoSettings};
use crate::processing::Completed;
use crate::utils::{
    ErrorKind, TaskError, TaskResult, commit_path, extract_filename, file_size, staging_path,
};

use super::command::encoder_args;
use super::locator::BinaryLocator;
use super::probe::probe_duration;
use super::progress::{ProgressLine, parse_progress_line, percent_of};

/// How long leftover pipe output is drained after the encoder exits
const DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

// ── State machine ────────────────────────────────────────────────────────────────────

/// Lifecycle of one video job. Terminal states are absorbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoState {
    Pending,
    Running,
    Succeeded,
    Failed(ErrorKind),
    Cancelled,
}

impl VideoState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed(_) | Self::Cancelled)
    }

    /// Moves to `next` if the transition is legal; returns whether it happened.
    pub fn advance(&mut self, next: VideoState) -> bool {
        let legal = match (*self, next) {
            (Self::Pending, Self::Running | Self::Failed(_) | Self::Cancelled) => true,
            (Self::Running, Self::Succeeded | Self::Failed(_) | Self::Cancelled) => true,
            _ => false,
        };
        if legal {
            *self = next;
        }
        legal
    }
}

/// Tracks the state of one job and logs each transition.
struct Session {
    job_id: JobId,
    state: VideoState,
}

impl Session {
    fn new(job_id: JobId) -> Self {
        Self { job_id, state: VideoState::Pending }
    }

    fn advance(&mut self, next: VideoState) {
        let from = self.state;
        if self.state.advance(next) {
            debug!("[{}] Video job {:?} → {:?}", self.job_id, from, next);
        } else {
            warn!("[{}] Ignoring video transition {:?} → {:?}", self.job_id, from, next);
        }
    }

    /// Records the failure and hands the error back for propagation
    fn fail(&mut self, err: TaskError) -> TaskError {
        let next = match err {
            TaskError::Cancelled => VideoState::Cancelled,
            ref other => VideoState::Failed(other.kind()),
        };
        self.advance(next);
        err
    }
}

enum Exit {
    Cancelled,
    Status(std::io::Result<ExitStatus>),
}

// ── Encoder ──────────────────────────────────────────────────────────────────────────

/// Runs the external encoder for video compression jobs.
#[derive(Debug, Clone)]
pub struct VideoEncoder {
    locator: BinaryLocator,
    encoder_name: String,
    probe_name: String,
    grace_period: Duration,
    stderr_tail_lines: usize,
}

impl VideoEncoder {
    pub fn new(config: &EngineConfig, locator: BinaryLocator) -> Self {
        Self {
            locator,
            encoder_name: config.encoder_name.clone(),
            probe_name: config.probe_name.clone(),
            grace_period: config.kill_grace_period(),
            stderr_tail_lines: config.stderr_tail_lines.max(1),
        }
    }

    /// Compresses `input` into `output`.
    ///
    /// Returns `TaskError::Cancelled` when `cancel` fires; the process has
    /// exited and the partial output is gone by the time this returns.
    pub async fn compress(
        &self,
        input: &Path,
        output: &Path,
        settings: &VideoSettings,
        reporter: &ProgressReporter,
        cancel: &CancellationToken,
    ) -> TaskResult<Completed> {
        let mut session = Session::new(reporter.job_id());
        if cancel.is_cancelled() {
            return Err(session.fail(TaskError::Cancelled));
        }

        // Pending → Running needs the encoder; fail before anything is spawned
        let encoder = self
            .locator
            .locate(&self.encoder_name)
            .map_err(|e| session.fail(e.into()))?;

        let duration = match self.locator.locate(&self.probe_name) {
            Ok(probe) => tokio::select! {
                _ = cancel.cancelled() => return Err(session.fail(TaskError::Cancelled)),
                duration = probe_duration(&probe, input) => duration,
            },
            Err(e) => {
                warn!("[{}] {}; encoding without progress", reporter.job_id(), e);
                None
            }
        };

        let original_size = file_size(input).map_err(|e| session.fail(e))?;
        let staged = staging_path(output).map_err(|e| session.fail(e))?;

        let mut child = Command::new(&encoder)
            .args(encoder_args(input, &staged, settings))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                session.fail(TaskError::encoder(format!(
                    "Failed to start {}: {}", encoder.display(), e
                )))
            })?;
        session.advance(VideoState::Running);
        info!(
            "[{}] Encoding '{}' with {} (pid {:?})",
            reporter.job_id(),
            extract_filename(input),
            encoder.display(),
            child.id()
        );

        let stdout = child.stdout.take();
        let stderr_tail = child
            .stderr
            .take()
            .map(|stderr| tokio::spawn(collect_tail(stderr, self.stderr_tail_lines)));

        let Some(stdout) = stdout else {
            terminate(&mut child, self.grace_period).await;
            return Err(session.fail(TaskError::internal("Encoder stdout was not captured")));
        };
        let mut lines = BufReader::new(stdout).lines();
        let mut stdout_open = true;
        let on_line = |line: &str| match (parse_progress_line(line), duration) {
            (Some(ProgressLine::OutTime(at)), Some(total)) => reporter.report(percent_of(at, total)),
            (Some(ProgressLine::End), Some(_)) => reporter.report(100.0),
            _ => {}
        };

        let exit = loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break Exit::Cancelled,
                status = child.wait() => break Exit::Status(status),
                line = lines.next_line(), if stdout_open => match line {
                    Ok(Some(line)) => on_line(&line),
                    Ok(None) => stdout_open = false,
                    Err(e) => {
                        debug!("[{}] Progress stream closed: {}", reporter.job_id(), e);
                        stdout_open = false;
                    }
                },
            }
        };

        let status = match exit {
            Exit::Cancelled => {
                terminate(&mut child, self.grace_period).await;
                if let Some(task) = stderr_tail {
                    task.abort();
                }
                drop(staged);
                info!("[{}] Encoding cancelled", reporter.job_id());
                return Err(session.fail(TaskError::Cancelled));
            }
            Exit::Status(Err(e)) => {
                terminate(&mut child, self.grace_period).await;
                return Err(session.fail(TaskError::encoder(format!(
                    "Lost track of encoder process: {e}"
                ))));
            }
            Exit::Status(Ok(status)) => status,
        };

        if stdout_open {
            let _ = tokio::time::timeout(DRAIN_TIMEOUT, async {
                while let Ok(Some(line)) = lines.next_line().await {
                    on_line(&line);
                }
            })
            .await;
        }
        let tail = match stderr_tail {
            Some(task) => join_tail(task).await,
            None => String::new(),
        };

        if !status.success() {
            return Err(session.fail(TaskError::encoder(format!(
                "{} exited with {}: {}", self.encoder_name, status, tail
            ))));
        }
        let output_size = file_size(&staged).unwrap_or(0);
        if output_size == 0 {
            return Err(session.fail(TaskError::encoder(format!(
                "{} produced no output: {}", self.encoder_name, tail
            ))));
        }
        if cancel.is_cancelled() {
            return Err(session.fail(TaskError::Cancelled));
        }

        commit_path(staged, output).map_err(|e| session.fail(e))?;
        session.advance(VideoState::Succeeded);
        let report = SizeReport::new(original_size, output_size, 0.0);
        info!(
            "[{}] '{}' → {} bytes saved ({:.1}%)",
            reporter.job_id(),
            extract_filename(output),
            report.saved_bytes,
            report.compression_ratio
        );

        Ok(Completed {
            output_path: output.to_path_buf(),
            size_report: Some(report),
        })
    }
}

// ── Process helpers ──────────────────────────────────────────────────────────────────

/// Keeps the last `limit` non-empty lines of `reader`.
async fn collect_tail<R: AsyncRead + Unpin>(reader: R, limit: usize) -> VecDeque<String> {
    let mut tail = VecDeque::with_capacity(limit);
    let mut lines = BufReader::new(reader).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if line.trim().is_empty() {
            continue;
        }
        if tail.len() == limit {
            tail.pop_front();
        }
        tail.push_back(line);
    }
    tail
}

async fn join_tail(task: JoinHandle<VecDeque<String>>) -> String {
    let abort = task.abort_handle();
    match tokio::time::timeout(DRAIN_TIMEOUT, task).await {
        Ok(Ok(tail)) => Vec::from(tail).join("\n"),
        Ok(Err(e)) => format!("<stderr unavailable: {e}>"),
        Err(_) => {
            abort.abort();
            "<stderr still open after exit>".to_string()
        }
    }
}

/// Asks the process to stop, then kills it once `grace` has passed.
///
/// Always waits for the process to be reaped before returning.
pub async fn terminate(child: &mut Child, grace: Duration) {
    #[cfg(unix)]
    {
        use nix::sys::signal::{Signal, kill};
        use nix::unistd::Pid;

        if let Some(pid) = child.id() {
            match kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
                Ok(()) => match tokio::time::timeout(grace, child.wait()).await {
                    Ok(Ok(status)) => {
                        debug!("Encoder (pid {}) stopped after SIGTERM: {}", pid, status);
                        return;
                    }
                    Ok(Err(e)) => warn!("Waiting for encoder (pid {}) failed: {}", pid, e),
                    Err(_) => warn!("Encoder (pid {}) ignored SIGTERM for {:?}, killing", pid, grace),
                },
                Err(e) => warn!("Failed to signal encoder (pid {}): {}", pid, e),
            }
        }
    }
    #[cfg(not(unix))]
    let _ = grace;

    // `kill` also waits, so the child is reaped on every path
    if let Err(e) = child.kill().await {
        warn!("Failed to kill encoder: {}", e);
    }
}
