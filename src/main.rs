// Command-line driver for the media-task engine.
// Reads a job description, runs it and streams every event to stdout as JSON lines,
// standing in for the desktop front end.

use std::path::PathBuf;
use anyhow::{Context, Result, bail};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;
use media_tasks_lib::{EngineConfig, JobStatus, MediaJob, TaskRunner};

fn usage() -> &'static str {
    "usage: media-tasks <job.json> [config.json]"
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_file(false)         // Remove file path
        .with_line_number(false)  // Remove line numbers
        .with_thread_ids(false)   // Remove thread IDs
        .with_thread_names(false) // Remove thread names
        .with_target(false)       // Remove module path
        .with_writer(std::io::stderr) // stdout carries the event stream
        .compact()
        .init();

    let mut args = std::env::args_os().skip(1);
    let Some(job_path) = args.next().map(PathBuf::from) else {
        bail!(usage());
    };
    let config = match args.next() {
        Some(path) => EngineConfig::from_file(PathBuf::from(path))?,
        None => EngineConfig::default(),
    }
    .with_env_overrides();

    let raw = std::fs::read_to_string(&job_path)
        .with_context(|| format!("Cannot read job file {}", job_path.display()))?;
    let job: MediaJob = serde_json::from_str(&raw)
        .with_context(|| format!("Invalid job file {}", job_path.display()))?;

    info!("=== media-tasks starting ===");
    let runner = TaskRunner::new(config)?;
    let handles = runner.submit_batch(job)?;

    let tokens: Vec<_> = handles.iter().map(|h| h.cancel_token()).collect();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling {} job(s)", tokens.len());
            tokens.iter().for_each(|t| t.cancel());
        }
    });

    let mut workers = Vec::with_capacity(handles.len());
    for mut handle in handles {
        workers.push(tokio::spawn(async move {
            while let Some(event) = handle.recv().await {
                match serde_json::to_string(&event) {
                    Ok(line) => println!("{line}"),
                    Err(e) => warn!("Cannot serialize event: {}", e),
                }
            }
            handle.wait().await
        }));
    }

    let mut failed = 0usize;
    let mut cancelled = 0usize;
    let total = workers.len();
    for worker in workers {
        let result = worker.await.context("Event forwarder crashed")?;
        debug!("[{}] {:?}", result.job_id, result.status);
        match result.status {
            JobStatus::Success => {}
            JobStatus::Failed => failed += 1,
            JobStatus::Cancelled => cancelled += 1,
        }
    }

    info!(
        "Done: {} succeeded, {} failed, {} cancelled",
        total - failed - cancelled,
        failed,
        cancelled
    );
    if failed > 0 || cancelled > 0 {
        bail!("{} of {} job(s) did not succeed", failed + cancelled, total);
    }
    Ok(())
}
