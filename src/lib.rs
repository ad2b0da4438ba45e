//! # vidpipe
//!
//! Download-and-convert pipeline controller driving `yt-dlp` and `ffmpeg`.
//!
//! ## Design Philosophy
//!
//! vidpipe is designed to be:
//! - **Library-first** - No UI, a controller a desktop or CLI front-end embeds
//! - **Event-driven** - Consumers subscribe to state and progress events
//! - **One run at a time** - Overlapping requests are rejected, never queued
//! - **Sensible defaults** - Works out of the box with zero configuration
//!
//! A download runs as a sequence of external processes (title lookup,
//! download, optional container conversion) mapped onto a single 0-100%
//! progress scale, and can be cancelled at any point.
//!
//! ## Quick Start
//!
//! ```no_run
//! use vidpipe::{Config, DownloadRequest, Event, Pipeline};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let pipeline = Pipeline::new(Config::default())?;
//!
//!     // Subscribe to events
//!     let mut events = pipeline.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let request = DownloadRequest::new(
//!         "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
//!         "/home/me/Videos",
//!     );
//!     let path = pipeline.start_download(request).await?;
//!     println!("Saved to {}", path.display());
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// Metadata parsing and format selection
pub mod format;
/// Output naming and file lookup
pub mod output;
/// Pipeline controller (decomposed into focused submodules)
pub mod pipeline;
/// External process execution
pub mod process;
/// Progress parsing and overall-progress mapping
pub mod progress;
/// Tool executable lookup
pub mod tools;
/// Core types and events
pub mod types;
/// URL and destination validation
pub mod validation;

// Re-export commonly used types
pub use config::{Config, PipelineConfig, ToolsConfig};
pub use error::{Error, FailureKind, Result};
pub use pipeline::Pipeline;
pub use process::{ExitOutcome, OutputLine, ProcessHandle, ProcessRunner, TokioProcessRunner};
pub use tools::ToolLocator;
pub use types::{
    DownloadRequest, Event, PipelineState, ProgressEvent, Quality, QualityOption, Tool,
    VideoMetadata,
};
pub use validation::{validate_destination, validate_folder, validate_url};

/// Helper function to run the pipeline with graceful signal handling.
///
/// Waits for a termination signal and then calls the pipeline's `shutdown()` method,
/// which cancels any active run and terminates its tool process.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use vidpipe::{Config, Pipeline, run_with_shutdown};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let pipeline = Pipeline::new(Config::default())?;
///
///     // Cancel the active run on SIGTERM/SIGINT
///     run_with_shutdown(pipeline).await;
///
///     Ok(())
/// }
/// ```
pub async fn run_with_shutdown(pipeline: Pipeline) {
    wait_for_signal().await;
    pipeline.shutdown().await;
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Set up signal handlers - these may fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), _) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            if let Ok(mut sigint) = signal(SignalKind::interrupt()) {
                sigint.recv().await;
                tracing::info!("Received SIGINT signal (Ctrl+C)");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
        (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
                tracing::info!("Received SIGTERM signal");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
