//! Parser for the `-progress` key/value stream.

use std::time::Duration;

/// One meaningful line of encoder progress output
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProgressLine {
    /// Encoded output timestamp
    OutTime(Duration),
    /// `progress=end`: the encoder finished writing
    End,
}

/// Parses a single `key=value` line; everything unparseable is `None`.
pub fn parse_progress_line(line: &str) -> Option<ProgressLine> {
    let (key, value) = line.trim().split_once('=')?;
    let value = value.trim();
    match key.trim() {
        // Both keys are microseconds despite the name of the second one
        "out_time_us" | "out_time_ms" => value
            .parse::<u64>()
            .ok()
            .map(|us| ProgressLine::OutTime(Duration::from_micros(us))),
        "out_time" => parse_clock(value).map(ProgressLine::OutTime),
        "progress" if value == "end" => Some(ProgressLine::End),
        _ => None,
    }
}

/// Parses `HH:MM:SS[.fraction]`
pub fn parse_clock(value: &str) -> Option<Duration> {
    let mut parts = value.split(':');
    let hours: u64 = parts.next()?.parse().ok()?;
    let minutes: u64 = parts.next()?.parse().ok()?;
    let seconds: f64 = parts.next()?.parse().ok()?;
    if parts.next().is_some() || minutes >= 60 || !(0.0..60.0).contains(&seconds) {
        return None;
    }
    Some(Duration::from_secs(hours * 3600 + minutes * 60) + Duration::from_secs_f64(seconds))
}

/// Parses the probe's single-line duration in seconds
pub fn parse_duration_seconds(text: &str) -> Option<Duration> {
    let secs: f64 = text.lines().next()?.trim().parse().ok()?;
    (secs.is_finite() && secs > 0.0).then(|| Duration::from_secs_f64(secs))
}

/// Percent of `total` covered by `position`, capped at 100.
pub fn percent_of(position: Duration, total: Duration) -> f64 {
    if total.is_zero() {
        return 0.0;
    }
    (position.as_secs_f64() / total.as_secs_f64() * 100.0).min(100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamps_in_every_spelling() {
        assert_eq!(
            parse_progress_line("out_time_us=1500000"),
            Some(ProgressLine::OutTime(Duration::from_millis(1500)))
        );
        assert_eq!(
            parse_progress_line("out_time_ms=2000000"),
            Some(ProgressLine::OutTime(Duration::from_secs(2)))
        );
        assert_eq!(
            parse_progress_line("out_time=00:01:02.500000"),
            Some(ProgressLine::OutTime(Duration::from_millis(62_500)))
        );
        assert_eq!(parse_progress_line("progress=end"), Some(ProgressLine::End));
    }

    #[test]
    fn noise_is_ignored() {
        for line in [
            "out_time_us=N/A",
            "out_time_ms=-9223372036854775807",
            "out_time=N/A",
            "out_time=-00:00:00.011000",
            "progress=continue",
            "frame=42",
            "bitrate=1234.5kbits/s",
            "garbage",
            "",
        ] {
            assert_eq!(parse_progress_line(line), None, "{line}");
        }
    }

    #[test]
    fn probe_output_and_percent() {
        assert_eq!(parse_duration_seconds("12.500000\n"), Some(Duration::from_millis(12_500)));
        assert_eq!(parse_duration_seconds("N/A\n"), None);
        assert_eq!(parse_duration_seconds("0.000000"), None);
        assert_eq!(percent_of(Duration::from_secs(5), Duration::from_secs(10)), 50.0);
        assert_eq!(percent_of(Duration::from_secs(11), Duration::from_secs(10)), 100.0);
        assert_eq!(percent_of(Duration::from_secs(1), Duration::ZERO), 0.0);
    }
}
