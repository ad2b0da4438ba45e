//! Metadata fetch.

use crate::error::{Error, Result};
use crate::format::parse_metadata;
use crate::types::{PipelineState, Tool, VideoMetadata};
use crate::validation::ensure_valid_url;

use super::{Pipeline, RunId};

/// Fetcher arguments for dumping a video's metadata as JSON
pub(crate) fn metadata_args(url: &str) -> Vec<String> {
    vec![
        "--dump-json".to_string(),
        "--no-playlist".to_string(),
        url.to_string(),
    ]
}

impl Pipeline {
    /// Fetch title, thumbnail and available qualities for a URL
    ///
    /// Moves the pipeline `Idle -> FetchingMetadata -> Idle` on success, or to
    /// `Failed` when the fetcher fails or prints malformed JSON. A
    /// [`cancel`](Self::cancel) during the fetch ends it in `Cancelled`.
    ///
    /// # Errors
    ///
    /// - [`Error::Busy`] if another run is active
    /// - [`Error::InvalidInput`] for a URL of the wrong shape
    /// - [`Error::LaunchFailure`] or
    ///   [`Error::ToolExit`] when the fetcher fails
    /// - [`Error::Parse`] for malformed output
    /// - [`Error::Cancelled`] if cancelled
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use vidpipe::{Config, Pipeline};
    /// # async fn example(pipeline: Pipeline) -> vidpipe::Result<()> {
    /// let meta = pipeline
    ///     .fetch_metadata("https://www.youtube.com/watch?v=dQw4w9WgXcQ")
    ///     .await?;
    /// for option in &meta.qualities {
    ///     println!("{} ({})", option.label, option.value);
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub async fn fetch_metadata(&self, url: &str) -> Result<VideoMetadata> {
        let run = self.begin(PipelineState::FetchingMetadata).await?;
        tracing::info!(run_id = run.0, url, "Fetching metadata");

        let result = self.fetch_metadata_inner(run, url).await;

        let mut slot = self.slot.lock().await;
        match result {
            Ok(metadata) if slot.owns(run) && slot.state == PipelineState::FetchingMetadata => {
                tracing::info!(
                    run_id = run.0,
                    title = %metadata.title,
                    qualities = metadata.qualities.len(),
                    "Metadata fetched"
                );
                self.set_state(&mut slot, PipelineState::Idle);
                Ok(metadata)
            }
            Ok(_) => Err(Error::Cancelled),
            Err(e) => Err(self.settle_failure(&mut slot, run, e)),
        }
    }

    async fn fetch_metadata_inner(&self, run: RunId, url: &str) -> Result<VideoMetadata> {
        ensure_valid_url(url)?;
        let json = self
            .capture_stdout(run, Tool::YtDlp, metadata_args(url))
            .await?;
        parse_metadata(json.as_bytes())
    }
}
