//! Pipeline controller split into focused submodules.
//!
//! The `Pipeline` struct and its methods are organized by domain:
//! - [`metadata`] - Metadata fetch (title, thumbnail, quality options)
//! - [`download`] - Title resolution, download and output lookup
//! - [`convert`] - Container conversion and intermediate-file cleanup
//! - [`control`] - Cancellation and shutdown
//! - [`step`] - Driving a single external process with stall detection

mod control;
mod convert;
mod download;
mod metadata;
mod step;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

pub use convert::convert_args;
pub use download::download_args;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::process::{ProcessRunner, TokioProcessRunner};
use crate::tools::ToolLocator;
use crate::types::{Event, PipelineState, ProgressEvent};
use std::sync::Arc;
use tokio::sync::{Mutex, broadcast};
use tokio_util::sync::CancellationToken;

/// Identifies one run (metadata fetch or download) of a pipeline
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct RunId(pub(crate) u64);

/// State shared by every clone of a [`Pipeline`]
///
/// Progress emission and cancellation both hold this lock, so once
/// `cancel()` has released it no stale progress can be emitted.
#[derive(Debug, Default)]
pub(crate) struct RunSlot {
    /// Current pipeline state
    pub(crate) state: PipelineState,
    /// Run currently owning the state
    pub(crate) run: u64,
    /// Canceller of the process being tracked, if any
    pub(crate) process: Option<CancellationToken>,
    /// Highest overall percent emitted in the current run
    pub(crate) last_percent: f32,
    /// The run has replaced files on disk and can no longer be cancelled
    pub(crate) committed: bool,
}

impl RunSlot {
    fn owns(&self, run: RunId) -> bool {
        self.run == run.0
    }
}

/// Download-and-convert pipeline (cloneable - all fields are Arc-wrapped)
///
/// One logical run at a time: a metadata fetch or download started while
/// another is active is rejected with [`Error::Busy`]. Clones share state,
/// so one task can call [`cancel`](Self::cancel) while another awaits
/// [`start_download`](Self::start_download).
#[derive(Clone)]
pub struct Pipeline {
    /// Configuration (wrapped in Arc for sharing across tasks)
    pub(crate) config: Arc<Config>,
    /// Process runner (trait object so tests can script tool output)
    pub(crate) runner: Arc<dyn ProcessRunner>,
    /// Executable lookup for the fetcher and transcoder
    pub(crate) tools: Arc<ToolLocator>,
    /// Event broadcast channel sender (multiple subscribers supported)
    pub(crate) event_tx: broadcast::Sender<Event>,
    /// State, tracked process and progress of the current run
    pub(crate) slot: Arc<Mutex<RunSlot>>,
}

impl Pipeline {
    /// Create a pipeline that runs the real fetcher and transcoder
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the configuration is invalid.
    pub fn new(config: Config) -> Result<Self> {
        let runner = Arc::new(TokioProcessRunner::new(config.pipeline.terminate_grace));
        Self::with_runner(config, runner)
    }

    /// Create a pipeline with a custom process runner
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the configuration is invalid.
    pub fn with_runner(config: Config, runner: Arc<dyn ProcessRunner>) -> Result<Self> {
        config.validate()?;

        let (event_tx, _rx) = broadcast::channel(config.pipeline.event_buffer);
        let tools = ToolLocator::new(config.tools.clone());

        tracing::info!(runner = runner.name(), "Pipeline initialized");

        Ok(Self {
            config: Arc::new(config),
            runner,
            tools: Arc::new(tools),
            event_tx,
            slot: Arc::new(Mutex::new(RunSlot::default())),
        })
    }

    /// Subscribe to pipeline events
    ///
    /// Multiple subscribers are supported. Each subscriber receives all events
    /// sent after it subscribed. A subscriber that falls behind by more than
    /// `event_buffer` events receives `RecvError::Lagged`.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use vidpipe::{Config, Event, Pipeline};
    ///
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let pipeline = Pipeline::new(Config::default())?;
    /// let mut events = pipeline.subscribe();
    ///
    /// tokio::spawn(async move {
    ///     while let Ok(event) = events.recv().await {
    ///         if let Event::Progress(progress) = event {
    ///             println!("{:.0}% {}", progress.overall_percent, progress.status_text);
    ///         }
    ///     }
    /// });
    /// # Ok(())
    /// # }
    /// ```
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Current pipeline state
    pub async fn state(&self) -> PipelineState {
        self.slot.lock().await.state.clone()
    }

    /// Send an event, ignoring the no-subscriber case
    pub(crate) fn emit(&self, event: Event) {
        let _ = self.event_tx.send(event);
    }

    fn set_state(&self, slot: &mut RunSlot, state: PipelineState) {
        tracing::debug!(
            run_id = slot.run,
            from = slot.state.name(),
            to = state.name(),
            "State change"
        );
        slot.state = state.clone();
        self.emit(Event::StateChanged { state });
    }

    /// Claim the pipeline for a new run entering `state`
    ///
    /// Resets progress and any terminal state left by the previous run.
    pub(crate) async fn begin(&self, state: PipelineState) -> Result<RunId> {
        let mut slot = self.slot.lock().await;
        if slot.state.is_active() {
            tracing::debug!(current = slot.state.name(), "Rejecting request, pipeline busy");
            return Err(Error::Busy);
        }
        slot.run += 1;
        slot.process = None;
        slot.last_percent = 0.0;
        slot.committed = false;
        self.set_state(&mut slot, state);
        Ok(RunId(slot.run))
    }

    /// Move an active run to another active state
    ///
    /// Fails with [`Error::Cancelled`] if the run was cancelled meanwhile.
    pub(crate) async fn transition(&self, run: RunId, state: PipelineState) -> Result<()> {
        let mut slot = self.slot.lock().await;
        if !slot.owns(run) || !slot.state.is_active() {
            return Err(Error::Cancelled);
        }
        self.set_state(&mut slot, state);
        Ok(())
    }

    /// Register the canceller of the process a run is about to drive
    ///
    /// If the run was cancelled before the process started, the process is
    /// cancelled immediately and [`Error::Cancelled`] is returned.
    pub(crate) async fn track(&self, run: RunId, canceller: CancellationToken) -> Result<()> {
        let mut slot = self.slot.lock().await;
        if !slot.owns(run) || !slot.state.is_active() {
            canceller.cancel();
            return Err(Error::Cancelled);
        }
        slot.process = Some(canceller);
        Ok(())
    }

    /// Forget the tracked process of a run
    pub(crate) async fn untrack(&self, run: RunId) {
        let mut slot = self.slot.lock().await;
        if slot.owns(run) {
            slot.process = None;
        }
    }

    /// Emit progress for a run
    ///
    /// Dropped unless the run is downloading or converting. The emitted percent
    /// never decreases within a run.
    pub(crate) async fn progress(&self, run: RunId, event: ProgressEvent) {
        let mut slot = self.slot.lock().await;
        if !slot.owns(run)
            || !matches!(
                slot.state,
                PipelineState::Downloading | PipelineState::Converting
            )
        {
            return;
        }
        let percent = event.overall_percent.clamp(0.0, 100.0).max(slot.last_percent);
        slot.last_percent = percent;
        self.emit(Event::Progress(ProgressEvent::new(percent, event.status_text)));
    }

    /// Settle a failed run and return the error to hand back to the caller
    ///
    /// A run that was cancelled reports [`Error::Cancelled`] whatever the step
    /// failed with, since its process was terminated on purpose.
    pub(crate) fn settle_failure(
        &self,
        slot: &mut RunSlot,
        run: RunId,
        error: Error,
    ) -> Error {
        if !slot.owns(run) || slot.state == PipelineState::Cancelled {
            return Error::Cancelled;
        }
        if error.is_cancelled() {
            self.enter_cancelled(slot);
            return Error::Cancelled;
        }

        tracing::error!(run_id = run.0, kind = ?error.kind(), error = %error, "Run failed");
        let kind = error.kind();
        let detail = error.to_string();
        self.set_state(
            slot,
            PipelineState::Failed {
                kind,
                detail: detail.clone(),
            },
        );
        self.emit(Event::Failed { kind, detail });
        error
    }

    /// Terminate the tracked process and enter `Cancelled`
    pub(crate) fn enter_cancelled(&self, slot: &mut RunSlot) {
        if let Some(process) = slot.process.take() {
            process.cancel();
        }
        self.set_state(slot, PipelineState::Cancelled);
        self.emit(Event::Cancelled);
    }
}
