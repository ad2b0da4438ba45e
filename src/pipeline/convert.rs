//! Container conversion and intermediate-file cleanup.

use crate::error::{Error, Result};
use crate::progress::{TranscodeProgress, convert_overall, parse_probe_duration};
use crate::types::{Event, PipelineState, ProgressEvent, Tool};
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::{Pipeline, RunId};

/// Transcoder arguments for repackaging `input` into `output`
///
/// Video is copied untouched and audio re-encoded to AAC at `audio_bitrate`.
/// Machine-readable progress goes to stdout.
///
/// # Examples
///
/// ```
/// use vidpipe::pipeline::convert_args;
/// use std::path::Path;
///
/// let args = convert_args(Path::new("/v/Clip.mkv"), Path::new("/v/Clip.converting.mp4"), "192k");
/// assert_eq!(args[..4], ["-nostdin", "-y", "-i", "/v/Clip.mkv"]);
/// assert_eq!(args.last().map(String::as_str), Some("/v/Clip.converting.mp4"));
/// ```
pub fn convert_args(input: &Path, output: &Path, audio_bitrate: &str) -> Vec<String> {
    vec![
        "-nostdin".to_string(),
        "-y".to_string(),
        "-i".to_string(),
        input.to_string_lossy().into_owned(),
        "-c:v".to_string(),
        "copy".to_string(),
        "-c:a".to_string(),
        "aac".to_string(),
        "-b:a".to_string(),
        audio_bitrate.to_string(),
        "-progress".to_string(),
        "pipe:1".to_string(),
        output.to_string_lossy().into_owned(),
    ]
}

/// Prober arguments printing a file's duration in seconds
pub(crate) fn probe_args(input: &Path) -> Vec<String> {
    vec![
        "-v".to_string(),
        "error".to_string(),
        "-show_entries".to_string(),
        "format=duration".to_string(),
        "-of".to_string(),
        "default=noprint_wrappers=1:nokey=1".to_string(),
        input.to_string_lossy().into_owned(),
    ]
}

impl Pipeline {
    /// Repackage a downloaded file into the target container
    ///
    /// The transcoder writes `<name>.converting.<container>`, which is renamed
    /// to `<name>.<container>` on success before the original is deleted. A
    /// failed deletion is reported as [`Event::CleanupFailed`] and does not fail
    /// the run. On failure or cancellation the partial output is removed and
    /// the original kept.
    pub(crate) async fn convert(
        &self,
        run: RunId,
        input: &Path,
        destination: &Path,
        name: &str,
    ) -> Result<PathBuf> {
        self.transition(run, PipelineState::Converting).await?;

        let container = &self.config.pipeline.video_container;
        let output = destination.join(format!("{}.{}", name, container));
        let partial = destination.join(format!("{}.converting.{}", name, container));
        tracing::info!(run_id = run.0, ?input, ?output, "Converting");

        let total = if self.config.pipeline.probe_duration {
            self.probe_duration(run, input).await?
        } else {
            None
        };

        let status = format!("Converting to {}...", container.to_uppercase());
        let mut progress = TranscodeProgress::new();
        let mut last = None;
        let args = convert_args(input, &partial, &self.config.pipeline.audio_bitrate);
        let result = self
            .run_step(run, Tool::Ffmpeg, args, |line| {
                progress.feed(line);
                if !progress.has_activity() {
                    return None;
                }
                let percent = convert_overall(progress.out_time(), total);
                if last == Some(percent) {
                    return None;
                }
                last = Some(percent);
                Some(ProgressEvent::new(percent, status.clone()))
            })
            .await;

        if let Err(e) = result {
            remove_partial(&partial).await;
            tracing::info!(run_id = run.0, ?input, "Conversion did not finish, original kept");
            return Err(e);
        }

        self.commit_conversion(run, input, &partial, output).await
    }

    /// Swap the finished conversion in for the original
    ///
    /// Holds the run lock across the rename, so a concurrent `cancel()` either
    /// lands first (the partial output is discarded and the original kept) or
    /// finds the run committed and leaves it alone.
    pub(crate) async fn commit_conversion(
        &self,
        run: RunId,
        input: &Path,
        partial: &Path,
        output: PathBuf,
    ) -> Result<PathBuf> {
        let mut slot = self.slot.lock().await;
        if !slot.owns(run) || !slot.state.is_active() {
            drop(slot);
            remove_partial(partial).await;
            tracing::info!(run_id = run.0, ?input, "Cancelled after conversion, original kept");
            return Err(Error::Cancelled);
        }

        if let Err(e) = tokio::fs::rename(partial, &output).await {
            drop(slot);
            remove_partial(partial).await;
            return Err(Error::Io(e));
        }
        slot.committed = true;
        slot.process = None;
        drop(slot);

        if let Err(e) = tokio::fs::remove_file(input).await {
            tracing::warn!(
                run_id = run.0,
                path = ?input,
                error = %e,
                "Failed to remove original after conversion"
            );
            self.emit(Event::CleanupFailed {
                path: input.to_path_buf(),
                error: e.to_string(),
            });
        }

        Ok(output)
    }

    /// Probe the input's duration for proportional conversion progress
    ///
    /// Probe failures are logged and yield `None`; only cancellation is an error.
    async fn probe_duration(&self, run: RunId, input: &Path) -> Result<Option<Duration>> {
        match self
            .capture_stdout(run, Tool::Ffprobe, probe_args(input))
            .await
        {
            Ok(stdout) => {
                let duration = parse_probe_duration(&stdout);
                if duration.is_none() {
                    tracing::warn!(run_id = run.0, ?input, "Could not parse probed duration");
                }
                Ok(duration)
            }
            Err(Error::Cancelled) => Err(Error::Cancelled),
            Err(e) => {
                tracing::warn!(run_id = run.0, ?input, error = %e, "Duration probe failed");
                Ok(None)
            }
        }
    }
}

async fn remove_partial(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => tracing::debug!(?path, "Removed partial conversion output"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(?path, error = %e, "Failed to remove partial conversion output"),
    }
}
