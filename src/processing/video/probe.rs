use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};
use super::command::probe_args;
use super::progress::parse_duration_seconds;

const PROBE_TIMEOUT: Duration = Duration::from_secs(15);

/// Asks the probe binary for the container duration of `input`.
///
/// Any failure yields `None`; the encode then runs without progress events.
pub async fn probe_duration(probe: &Path, input: &Path) -> Option<Duration> {
    let output = Command::new(probe)
        .args(probe_args(input))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output();

    let output = match tokio::time::timeout(PROBE_TIMEOUT, output).await {
        Ok(Ok(output)) => output,
        Ok(Err(e)) => {
            warn!("Duration probe failed to start: {}", e);
            return None;
        }
        Err(_) => {
            warn!("Duration probe timed out after {:?}", PROBE_TIMEOUT);
            return None;
        }
    };

    if !output.status.success() {
        warn!(
            "Duration probe exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        );
        return None;
    }

    let duration = parse_duration_seconds(&String::from_utf8_lossy(&output.stdout));
    debug!("Probed duration of {}: {:?}", input.display(), duration);
    duration
}
