use std::path::{Path, PathBuf};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use crate::core::{JobEvent, JobId, JobResult};
use crate::utils::ErrorKind;

/// Caller's side of one submitted job.
///
/// Delivers the job's events in order and ends after the single terminal
/// event. Dropping the handle does not cancel the job.
#[derive(Debug)]
pub struct JobHandle {
    id: JobId,
    input: PathBuf,
    output: PathBuf,
    events: UnboundedReceiver<JobEvent>,
    cancel: CancellationToken,
    result: Option<JobResult>,
}

impl JobHandle {
    pub(crate) fn new(
        id: JobId,
        input: PathBuf,
        output: PathBuf,
        events: UnboundedReceiver<JobEvent>,
        cancel: CancellationToken,
    ) -> Self {
        Self { id, input, output, events, cancel, result: None }
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn input(&self) -> &Path {
        &self.input
    }

    /// Where the output will land on success
    pub fn output(&self) -> &Path {
        &self.output
    }

    /// Requests cancellation. Idempotent; a no-op once the job has finished.
    pub fn cancel(&self) {
        if self.result.is_none() && !self.cancel.is_cancelled() {
            debug!("[{}] Cancellation requested", self.id);
        }
        self.cancel.cancel();
    }

    /// Token that cancels this job, for callers cancelling from elsewhere
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Next event, or `None` once the terminal event has been delivered.
    pub async fn recv(&mut self) -> Option<JobEvent> {
        if self.result.is_some() {
            return None;
        }
        let event = self.events.recv().await?;
        if event.is_terminal() {
            self.result = event.to_result();
        }
        Some(event)
    }

    /// Terminal result seen so far, if any
    pub fn result(&self) -> Option<&JobResult> {
        self.result.as_ref()
    }

    /// Drains the remaining events and returns the terminal result.
    pub async fn wait(mut self) -> JobResult {
        while self.recv().await.is_some() {}
        self.result.unwrap_or_else(|| {
            JobResult::failed(self.id, ErrorKind::Internal, "Job ended without a result")
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{EventPayload, JobStatus};
    use tokio::sync::mpsc;

    fn handle() -> (JobHandle, mpsc::UnboundedSender<JobEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = JobHandle::new(
            JobId::new(),
            PathBuf::from("in.png"),
            PathBuf::from("out.png"),
            rx,
            CancellationToken::new(),
        );
        (handle, tx)
    }

    #[tokio::test]
    async fn stream_stops_after_terminal_event() {
        let (mut handle, tx) = handle();
        let id = handle.id();
        tx.send(JobEvent { job_id: id, payload: EventPayload::Progress { percent: 5 } }).unwrap();
        tx.send(JobEvent { job_id: id, payload: EventPayload::Cancelled }).unwrap();
        tx.send(JobEvent { job_id: id, payload: EventPayload::Progress { percent: 9 } }).unwrap();

        assert!(handle.recv().await.is_some());
        assert!(handle.recv().await.unwrap().is_terminal());
        assert!(handle.recv().await.is_none());
        assert_eq!(handle.result().map(|r| r.status), Some(JobStatus::Cancelled));
    }

    #[tokio::test]
    async fn closed_channel_without_result_is_internal() {
        let (handle, tx) = handle();
        drop(tx);
        let result = handle.wait().await;
        assert_eq!(result.error_kind, Some(ErrorKind::Internal));
    }
}
