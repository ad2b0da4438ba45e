//! Title resolution, download and output lookup.

use crate::config::PipelineConfig;
use crate::error::{Error, Result};
use crate::format::format_selector;
use crate::output::{derive_filename, extension_of, locate};
use crate::progress::{COMPLETE, download_overall, parse_fetch_progress};
use crate::types::{DownloadRequest, Event, PipelineState, ProgressEvent, Tool};
use crate::validation::{ensure_valid_url, validate_destination};
use std::path::{Path, PathBuf};

use super::{Pipeline, RunId};

/// Fetcher arguments for printing a video's title
pub(crate) fn title_args(url: &str) -> Vec<String> {
    vec![
        "--get-title".to_string(),
        "--no-playlist".to_string(),
        url.to_string(),
    ]
}

/// Fetcher arguments for the download step
///
/// Video requests select a format by quality and merge into the configured
/// container; audio-only requests extract audio in the configured format at
/// top quality. Both disable playlists, force newline progress and point the
/// fetcher at the transcoder it should merge with.
///
/// # Examples
///
/// ```
/// use vidpipe::config::PipelineConfig;
/// use vidpipe::pipeline::download_args;
/// use vidpipe::DownloadRequest;
/// use std::path::Path;
///
/// let request = DownloadRequest::new("https://youtu.be/dQw4w9WgXcQ", "/videos").audio_only();
/// let args = download_args(
///     &PipelineConfig::default(),
///     &request,
///     Path::new("/videos"),
///     "Clip",
///     Path::new("/usr/bin/ffmpeg"),
/// );
/// assert!(args.contains(&"--extract-audio".to_string()));
/// assert!(args.contains(&"/videos/Clip.mp3".to_string()));
/// ```
pub fn download_args(
    config: &PipelineConfig,
    request: &DownloadRequest,
    destination: &Path,
    name: &str,
    ffmpeg: &Path,
) -> Vec<String> {
    let mut args = Vec::with_capacity(12);
    if request.audio_only {
        let output = destination.join(format!("{}.{}", name, config.audio_format));
        args.extend([
            "--extract-audio".to_string(),
            "--audio-format".to_string(),
            config.audio_format.clone(),
            "--audio-quality".to_string(),
            "0".to_string(),
            "-o".to_string(),
            output.to_string_lossy().into_owned(),
        ]);
    } else {
        let output = destination.join(format!("{}.%(ext)s", name));
        args.extend([
            "-f".to_string(),
            format_selector(request.quality, &config.video_container),
            "--merge-output-format".to_string(),
            config.video_container.clone(),
            "-o".to_string(),
            output.to_string_lossy().into_owned(),
        ]);
    }
    args.extend([
        "--no-playlist".to_string(),
        "--newline".to_string(),
        "--ffmpeg-location".to_string(),
        ffmpeg.to_string_lossy().into_owned(),
        request.url.clone(),
    ]);
    args
}

impl Pipeline {
    /// Download a video (or its audio) into the request's destination
    ///
    /// Resolves the title, derives the output name, downloads, locates the
    /// produced file and repackages it when its container is listed in
    /// `convert_containers`. Progress is reported through
    /// [`Event::Progress`]: 0-80% while downloading, 80-99% while
    /// converting and 100% once finished.
    ///
    /// The URL and destination are validated before any process starts.
    ///
    /// # Errors
    ///
    /// - [`Error::Busy`] if another run is active (the request is rejected, not queued)
    /// - [`Error::InvalidInput`] for a bad URL or an unsafe destination
    /// - [`Error::LaunchFailure`], [`Error::ToolExit`] or [`Error::Stalled`] when a tool fails
    /// - [`Error::OutputNotFound`] if no produced file matches the derived name
    /// - [`Error::Cancelled`] if cancelled
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use vidpipe::{Config, DownloadRequest, Pipeline, Quality};
    ///
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let pipeline = Pipeline::new(Config::default())?;
    /// let request = DownloadRequest::new("https://youtu.be/dQw4w9WgXcQ", "/home/me/Videos")
    ///     .with_quality(Quality::MaxHeight(720));
    /// let path = pipeline.start_download(request).await?;
    /// println!("saved to {}", path.display());
    /// # Ok(())
    /// # }
    /// ```
    pub async fn start_download(&self, request: DownloadRequest) -> Result<PathBuf> {
        let run = self.begin(PipelineState::Downloading).await?;
        tracing::info!(
            run_id = run.0,
            url = %request.url,
            destination = ?request.destination,
            audio_only = request.audio_only,
            quality = %request.quality,
            "Starting download"
        );

        let result = self.download_inner(run, &request).await;

        let mut slot = self.slot.lock().await;
        match result {
            Ok(path) if slot.owns(run) && slot.state.is_active() => {
                slot.last_percent = COMPLETE;
                self.emit(Event::Progress(ProgressEvent::new(
                    COMPLETE,
                    "Download complete",
                )));
                tracing::info!(run_id = run.0, ?path, "Download complete");
                self.set_state(&mut slot, PipelineState::Completed { path: path.clone() });
                self.emit(Event::Completed { path: path.clone() });
                Ok(path)
            }
            Ok(_) => Err(Error::Cancelled),
            Err(e) => Err(self.settle_failure(&mut slot, run, e)),
        }
    }

    async fn download_inner(&self, run: RunId, request: &DownloadRequest) -> Result<PathBuf> {
        ensure_valid_url(&request.url)?;
        let requested = request.destination.clone();
        let destination = blocking(move || validate_destination(&requested)).await?;

        self.progress(run, ProgressEvent::new(0.0, "Resolving title"))
            .await;
        let title = self.resolve_title(run, &request.url).await?;
        let name = derive_filename(&title, &self.config.pipeline.fallback_filename);
        tracing::debug!(run_id = run.0, %title, %name, "Derived output name");

        let ffmpeg = self.tools.resolve(Tool::Ffmpeg);
        let args = download_args(&self.config.pipeline, request, &destination, &name, &ffmpeg);
        self.run_step(run, Tool::YtDlp, args, |line| {
            parse_fetch_progress(line).map(|raw| {
                ProgressEvent::new(download_overall(raw), format!("Downloading: {:.1}%", raw))
            })
        })
        .await?;

        let (folder, wanted) = (destination.clone(), name.clone());
        let found = blocking(move || Ok(locate(&folder, &wanted)?))
            .await?
            .ok_or_else(|| Error::OutputNotFound {
                folder: destination.clone(),
                name: name.clone(),
            })?;
        tracing::info!(run_id = run.0, path = ?found, "Download finished");

        if request.audio_only {
            return Ok(found);
        }
        match extension_of(&found) {
            Some(ext) if self.config.pipeline.needs_conversion(&ext) => {
                self.convert(run, &found, &destination, &name).await
            }
            _ => Ok(found),
        }
    }

    /// Ask the fetcher for the video's title
    ///
    /// An empty answer yields an empty title, which falls back to the
    /// configured filename.
    async fn resolve_title(&self, run: RunId, url: &str) -> Result<String> {
        let stdout = self.capture_stdout(run, Tool::YtDlp, title_args(url)).await?;
        Ok(stdout
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .unwrap_or_default()
            .to_string())
    }
}

/// Run a filesystem check off the async runtime
async fn blocking<T, F>(check: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(check)
        .await
        .map_err(|e| Error::Io(std::io::Error::other(format!("filesystem task failed: {}", e))))?
}
