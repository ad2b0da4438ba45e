//! Cancellation and shutdown.

use crate::types::Event;

use super::Pipeline;

impl Pipeline {
    /// Cancel the active run
    ///
    /// Terminates the tracked process (SIGTERM on Unix), clears it and moves
    /// the pipeline to `Cancelled`. Once this returns, no further progress is
    /// emitted for the cancelled run, and the call awaiting
    /// [`start_download`](Self::start_download) or
    /// [`fetch_metadata`](Self::fetch_metadata) returns
    /// [`Error::Cancelled`](crate::Error::Cancelled).
    ///
    /// Partial files written by the fetcher are left in place.
    ///
    /// Returns `true` if an active run was cancelled, `false` if the pipeline
    /// was idle or already finished. A run whose converted file has already
    /// replaced the original is past the point of cancelling and also yields
    /// `false`.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use vidpipe::Pipeline;
    /// # async fn example(pipeline: Pipeline) {
    /// if pipeline.cancel().await {
    ///     println!("download cancelled");
    /// }
    /// # }
    /// ```
    pub async fn cancel(&self) -> bool {
        let mut slot = self.slot.lock().await;
        if !slot.state.is_active() {
            tracing::debug!(state = slot.state.name(), "Nothing to cancel");
            return false;
        }
        if slot.committed {
            tracing::debug!(
                run_id = slot.run,
                "Run already committed its output, nothing to cancel"
            );
            return false;
        }
        tracing::info!(run_id = slot.run, state = slot.state.name(), "Cancelling run");
        self.enter_cancelled(&mut slot);
        true
    }

    /// Shut down the pipeline
    ///
    /// Cancels any active run and emits [`Event::Shutdown`].
    pub async fn shutdown(&self) {
        tracing::info!("Initiating shutdown");
        if self.cancel().await {
            tracing::info!("Cancelled active run");
        }
        self.emit(Event::Shutdown);
        tracing::info!("Shutdown complete");
    }
}
