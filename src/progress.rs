//! Progress parsing for fetcher and transcoder output
//!
//! Tool output formats are an external, unversioned contract. Everything that
//! scrapes them lives here so the pipeline only ever sees percentages.

use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;
use std::time::Duration;

/// Share of overall progress budgeted for the download step
pub const DOWNLOAD_SHARE: f32 = 80.0;

/// Overall progress shown once the transcoder reports activity
pub const CONVERT_MARKER: f32 = 90.0;

/// Overall progress of a finished run
pub const COMPLETE: f32 = 100.0;

/// Highest overall progress reachable before a conversion has exited
const CONVERT_CEILING: f32 = 99.0;

/// Transcoder field carrying elapsed output time (microseconds despite the name)
const OUT_TIME_MS: &str = "out_time_ms";

// constant pattern, covered by tests
#[allow(clippy::expect_used)]
static FETCH_PROGRESS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[download\]\s+(\d{1,3}\.\d+)%").expect("fetch progress pattern is valid")
});

/// Extract the percentage from a fetcher progress line
///
/// Matches lines like `[download]  42.7% of 10.00MiB at 1.00MiB/s ETA 00:05`.
/// Values outside `0..=100` are treated as non-matches.
///
/// # Examples
///
/// ```
/// use vidpipe::progress::parse_fetch_progress;
///
/// assert_eq!(parse_fetch_progress("[download]  42.5% of 3.00MiB"), Some(42.5));
/// assert_eq!(parse_fetch_progress("[info] Downloading webpage"), None);
/// ```
#[must_use]
pub fn parse_fetch_progress(line: &str) -> Option<f32> {
    let caps = FETCH_PROGRESS.captures(line)?;
    let value: f32 = caps.get(1)?.as_str().parse().ok()?;
    (0.0..=100.0).contains(&value).then_some(value)
}

/// Fetcher post-processor tags that run the transcoder without printing progress
const SILENT_POST_PROCESSORS: &[&str] = &[
    "[ExtractAudio]",
    "[Merger]",
    "[VideoConvertor]",
    "[VideoRemuxer]",
    "[Fixup",
];

/// Whether a fetcher line announces a post-processing step
///
/// These steps can run for minutes without output.
///
/// # Examples
///
/// ```
/// use vidpipe::progress::is_post_processing;
///
/// assert!(is_post_processing("[ExtractAudio] Destination: /v/Clip.mp3"));
/// assert!(!is_post_processing("[download]  42.5% of 3.00MiB"));
/// ```
#[must_use]
pub fn is_post_processing(line: &str) -> bool {
    let line = line.trim_start();
    SILENT_POST_PROCESSORS.iter().any(|tag| line.starts_with(tag))
}

/// Parse a chunk of transcoder `-progress` output into key/value pairs
///
/// Lines without a key or a value are skipped. Later keys overwrite earlier ones.
#[must_use]
pub fn parse_transcode_progress(chunk: &str) -> HashMap<String, String> {
    let mut fields = HashMap::new();
    for line in chunk.lines() {
        if let Some((key, value)) = line.split_once('=') {
            let (key, value) = (key.trim(), value.trim());
            if !key.is_empty() && !value.is_empty() {
                fields.insert(key.to_string(), value.to_string());
            }
        }
    }
    fields
}

/// Accumulates transcoder progress fields across lines
#[derive(Debug, Default, Clone)]
pub struct TranscodeProgress {
    fields: HashMap<String, String>,
}

impl TranscodeProgress {
    /// Create an empty accumulator
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge one line (or chunk) of progress output
    pub fn feed(&mut self, line: &str) {
        self.fields.extend(parse_transcode_progress(line));
    }

    /// Look up a raw field
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    /// Whether the transcoder has reported elapsed output time
    pub fn has_activity(&self) -> bool {
        self.fields.contains_key(OUT_TIME_MS)
    }

    /// Elapsed output time, if reported and well-formed
    pub fn out_time(&self) -> Option<Duration> {
        let micros: i64 = self.get(OUT_TIME_MS)?.parse().ok()?;
        u64::try_from(micros).ok().map(Duration::from_micros)
    }

    /// Whether the transcoder reported `progress=end`
    pub fn is_finished(&self) -> bool {
        self.get("progress") == Some("end")
    }
}

/// Map the fetcher's own percentage onto overall progress
#[must_use]
pub fn download_overall(raw_percent: f32) -> f32 {
    raw_percent.clamp(0.0, 100.0) * (DOWNLOAD_SHARE / 100.0)
}

/// Map conversion progress onto overall progress
///
/// Without a known total duration this is the fixed [`CONVERT_MARKER`].
/// With one, it interpolates between [`DOWNLOAD_SHARE`] and 99; 100 is only
/// reached when the transcoder exits successfully.
#[must_use]
pub fn convert_overall(out_time: Option<Duration>, total: Option<Duration>) -> f32 {
    match (out_time, total) {
        (Some(done), Some(total)) if !total.is_zero() => {
            let fraction = (done.as_secs_f64() / total.as_secs_f64()).clamp(0.0, 1.0) as f32;
            DOWNLOAD_SHARE + fraction * (CONVERT_CEILING - DOWNLOAD_SHARE)
        }
        _ => CONVERT_MARKER,
    }
}

/// Parse ffprobe's bare `format=duration` output (seconds, e.g. `"213.456000"`)
#[must_use]
pub fn parse_probe_duration(output: &str) -> Option<Duration> {
    let secs: f64 = output.lines().next()?.trim().parse().ok()?;
    (secs.is_finite() && secs > 0.0).then(|| Duration::from_secs_f64(secs))
}
