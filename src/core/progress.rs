use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, warn};
use crate::core::types::{JobId, JobResult, JobStatus, SizeReport};
use crate::utils::ErrorKind;

/// Event payload delivered to the presentation layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum EventPayload {
    /// Progress percentage (0-100), never decreasing within a job
    Progress { percent: u8 },
    #[serde(rename_all = "camelCase")]
    Finished {
        output_path: PathBuf,
        #[serde(default)]
        size_report: Option<SizeReport>,
    },
    Failed { kind: ErrorKind, detail: String },
    Cancelled,
}

/// One message on a job's progress channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobEvent {
    pub job_id: JobId,
    #[serde(flatten)]
    pub payload: EventPayload,
}

impl JobEvent {
    pub fn is_terminal(&self) -> bool {
        !matches!(self.payload, EventPayload::Progress { .. })
    }

    /// Rebuilds the [`JobResult`] carried by a terminal event
    pub fn to_result(&self) -> Option<JobResult> {
        match &self.payload {
            EventPayload::Progress { .. } => None,
            EventPayload::Finished { output_path, size_report } => Some(JobResult::success(
                self.job_id,
                output_path.clone(),
                size_report.clone(),
            )),
            EventPayload::Failed { kind, detail } => {
                Some(JobResult::failed(self.job_id, *kind, detail.clone()))
            }
            EventPayload::Cancelled => Some(JobResult::cancelled(self.job_id)),
        }
    }
}

impl From<&JobResult> for EventPayload {
    fn from(result: &JobResult) -> Self {
        match result.status {
            JobStatus::Success => Self::Finished {
                output_path: result.output_path.clone().unwrap_or_default(),
                size_report: result.size_report.clone(),
            },
            JobStatus::Failed => Self::Failed {
                kind: result.error_kind.unwrap_or(ErrorKind::Internal),
                detail: result.error_detail.clone().unwrap_or_default(),
            },
            JobStatus::Cancelled => Self::Cancelled,
        }
    }
}

#[derive(Debug, Default)]
struct ReporterState {
    last_percent: Option<u8>,
    last_emit: Option<Instant>,
    finished: bool,
}

struct ReporterInner {
    job_id: JobId,
    sender: UnboundedSender<JobEvent>,
    min_interval: Duration,
    state: Mutex<ReporterState>,
}

/// Sending side of one job's progress channel.
///
/// Clamps regressions, throttles emission to `min_interval` and closes the
/// stream after exactly one terminal event. Clones share the same state, so
/// the worker reporting progress and the runner emitting the result agree on
/// what has already been sent.
#[derive(Clone)]
pub struct ProgressReporter {
    inner: Arc<ReporterInner>,
}

impl ProgressReporter {
    pub fn new(job_id: JobId, sender: UnboundedSender<JobEvent>, min_interval: Duration) -> Self {
        Self {
            inner: Arc::new(ReporterInner {
                job_id,
                sender,
                min_interval,
                state: Mutex::new(ReporterState::default()),
            }),
        }
    }

    pub fn job_id(&self) -> JobId {
        self.inner.job_id
    }

    /// Reports progress; values outside 0-100 or below the last value are clamped.
    pub fn report(&self, percent: f64) {
        let Ok(mut state) = self.inner.state.lock() else {
            return;
        };
        if state.finished || percent.is_nan() {
            return;
        }

        let percent = percent.clamp(0.0, 100.0).floor() as u8;
        if state.last_percent.is_some_and(|last| percent <= last) {
            return;
        }

        let now = Instant::now();
        let throttled = state
            .last_emit
            .is_some_and(|at| now.duration_since(at) < self.inner.min_interval);
        if throttled && percent < 100 {
            return;
        }

        state.last_percent = Some(percent);
        state.last_emit = Some(now);
        // Receiver gone means nobody is listening; the job still runs to completion
        let _ = self.inner.sender.send(JobEvent {
            job_id: self.inner.job_id,
            payload: EventPayload::Progress { percent },
        });
    }

    /// Emits the terminal event. Only the first call has any effect.
    pub fn finish(&self, result: &JobResult) -> bool {
        let Ok(mut state) = self.inner.state.lock() else {
            warn!("[{}] Progress state poisoned, dropping result", self.inner.job_id);
            return false;
        };
        if state.finished {
            debug!("[{}] Terminal event already sent", self.inner.job_id);
            return false;
        }
        state.finished = true;
        let _ = self.inner.sender.send(JobEvent {
            job_id: self.inner.job_id,
            payload: EventPayload::from(result),
        });
        true
    }

    pub fn is_finished(&self) -> bool {
        self.inner.state.lock().map(|s| s.finished).unwrap_or(true)
    }
}
