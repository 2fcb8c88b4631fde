use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::core::{EngineConfig, JobId, JobResult, MediaJob, ProgressReporter, ToolKind};
use crate::processing::{
    BinaryLocator, CommandSegmenter, Completed, ImageExecutor, Segmenter, VideoEncoder,
};
use crate::utils::{ErrorKind, TaskError, TaskResult, extract_filename, validate_job};
use super::limiter::ConcurrencyLimiter;
use super::task::JobHandle;

/// Counts a job as active for as long as it is alive
struct ActiveGuard(Arc<AtomicUsize>);

impl ActiveGuard {
    fn new(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter.clone())
    }
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Accepts jobs and runs them off the caller's thread.
///
/// Image work runs on tokio's blocking pool, video jobs get one supervising
/// task each. A [`ConcurrencyLimiter`] owned by the runner caps how many jobs
/// execute at once; the rest wait in submission order.
#[derive(Clone)]
pub struct TaskRunner {
    config: EngineConfig,
    handle: Handle,
    limiter: Arc<ConcurrencyLimiter>,
    locator: BinaryLocator,
    images: ImageExecutor,
    video: VideoEncoder,
    custom_segmenter: bool,
    active_jobs: Arc<AtomicUsize>,
}

impl TaskRunner {
    /// Creates a runner on the current tokio runtime.
    pub fn new(config: EngineConfig) -> TaskResult<Self> {
        let handle = Handle::try_current()
            .map_err(|e| TaskError::internal(format!("No tokio runtime available: {e}")))?;
        Ok(Self::with_handle(config, handle))
    }

    pub fn with_handle(config: EngineConfig, handle: Handle) -> Self {
        let locator = BinaryLocator::new(&config.bundle_subdir);
        let limiter = Arc::new(ConcurrencyLimiter::new(config.max_concurrent_jobs, &handle));
        let images = ImageExecutor::new(Arc::new(CommandSegmenter::new(
            locator.clone(),
            config.segmenter_command.clone(),
        )));
        let video = VideoEncoder::new(&config, locator.clone());
        info!("Task runner ready with {} job slots", limiter.capacity());

        Self {
            config,
            handle,
            limiter,
            locator,
            images,
            video,
            custom_segmenter: false,
            active_jobs: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Replaces the search order used for the encoder, probe and segmenter.
    pub fn with_locator(mut self, locator: BinaryLocator) -> Self {
        self.video = VideoEncoder::new(&self.config, locator.clone());
        if !self.custom_segmenter {
            self.images = ImageExecutor::new(Arc::new(CommandSegmenter::new(
                locator.clone(),
                self.config.segmenter_command.clone(),
            )));
        }
        self.locator = locator;
        self
    }

    /// Replaces the background segmentation collaborator.
    pub fn with_segmenter(mut self, segmenter: Arc<dyn Segmenter>) -> Self {
        self.images = ImageExecutor::new(segmenter);
        self.custom_segmenter = true;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn locator(&self) -> &BinaryLocator {
        &self.locator
    }

    /// Jobs currently holding an execution slot
    pub fn active_jobs(&self) -> usize {
        self.active_jobs.load(Ordering::SeqCst)
    }

    /// Validates and starts a single-input job without blocking.
    pub fn submit(&self, job: MediaJob) -> TaskResult<JobHandle> {
        if job.inputs.len() != 1 {
            return Err(TaskError::settings(format!(
                "submit expects exactly one input, got {}; use submit_batch",
                job.inputs.len()
            )));
        }
        self.submit_batch(job)?
            .pop()
            .ok_or_else(|| TaskError::internal("Validated job produced no work"))
    }

    /// Validates every input up front, then starts one independent job per input.
    pub fn submit_batch(&self, job: MediaJob) -> TaskResult<Vec<JobHandle>> {
        let planned = validate_job(&job)?;
        debug!("Submitting {} {} job(s)", planned.len(), job.tool.name());

        Ok(planned
            .into_iter()
            .map(|(input, output)| self.spawn_job(job.tool.clone(), input, output))
            .collect())
    }

    fn spawn_job(&self, tool: ToolKind, input: PathBuf, output: PathBuf) -> JobHandle {
        let id = JobId::new();
        let (sender, events) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let reporter = ProgressReporter::new(id, sender, self.config.progress_interval());
        // Queue position is fixed here, at submission time
        let ticket = self.limiter.enqueue();

        info!("[{}] Queued {} for '{}'", id, tool.name(), extract_filename(&input));

        let job = PendingJob {
            tool,
            input: input.clone(),
            output: output.clone(),
            reporter,
            cancel: cancel.clone(),
            images: self.images.clone(),
            video: self.video.clone(),
            active_jobs: self.active_jobs.clone(),
        };
        self.handle.spawn(async move {
            let reporter = job.reporter.clone();
            let cancel = job.cancel.clone();
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!("[{}] Cancelled while queued", id);
                    JobResult::cancelled(id)
                }
                permit = ticket => match permit {
                    Ok(permit) => {
                        let result = job.run().await;
                        drop(permit);
                        result
                    }
                    Err(_) => JobResult::failed(id, ErrorKind::Internal, "Concurrency limiter shut down"),
                },
            };
            reporter.finish(&result);
        });

        JobHandle::new(id, input, output, events, cancel)
    }
}

/// Everything one job needs once it has a slot
struct PendingJob {
    tool: ToolKind,
    input: PathBuf,
    output: PathBuf,
    reporter: ProgressReporter,
    cancel: CancellationToken,
    images: ImageExecutor,
    video: VideoEncoder,
    active_jobs: Arc<AtomicUsize>,
}

impl PendingJob {
    async fn run(self) -> JobResult {
        let id = self.reporter.job_id();
        let _active = ActiveGuard::new(&self.active_jobs);
        let cancel = self.cancel.clone();
        if cancel.is_cancelled() {
            return JobResult::cancelled(id);
        }
        debug!("[{}] Started {}", id, self.tool.name());

        let outcome = match self.tool {
            ToolKind::VideoCompress(settings) => {
                let Self { input, output, reporter, cancel, video, .. } = self;
                // Separate task so a panic in the supervisor is contained
                tokio::spawn(async move {
                    video.compress(&input, &output, &settings, &reporter, &cancel).await
                })
                .await
                .map_err(TaskError::from)
                .and_then(|outcome| outcome)
            }
            tool => {
                let Self { input, output, reporter, cancel, images, .. } = self;
                tokio::task::spawn_blocking(move || {
                    images.execute(&tool, &input, &output, &reporter, &cancel)
                })
                .await
                .map_err(TaskError::from)
                .and_then(|outcome| outcome)
            }
        };

        into_result(id, outcome, &cancel)
    }
}

fn into_result(id: JobId, outcome: TaskResult<Completed>, cancel: &CancellationToken) -> JobResult {
    match outcome {
        Ok(Completed { output_path, size_report }) => {
            info!("[{}] Finished → {}", id, output_path.display());
            JobResult::success(id, output_path, size_report)
        }
        Err(TaskError::Cancelled) => {
            info!("[{}] Cancelled", id);
            JobResult::cancelled(id)
        }
        Err(e) => {
            if cancel.is_cancelled() {
                debug!("[{}] Failed after cancellation was requested", id);
            }
            warn!("[{}] Failed ({}): {}", id, e.kind(), e);
            JobResult::failed(id, e.kind(), e.to_string())
        }
    }
}
