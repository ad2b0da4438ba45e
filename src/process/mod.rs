//! External process execution
//!
//! The pipeline drives the fetcher and transcoder through the
//! [`ProcessRunner`] trait:
//!
//! - [`TokioProcessRunner`]: spawns real executables via `tokio::process`
//! - Any custom runner built on [`ProcessHandle::new`], e.g. scripted output in tests
//!
//! A [`ProcessHandle`] multiplexes stdout and stderr into one stream of
//! [`OutputLine`]s, reports an [`ExitOutcome`] once output ends, and can be
//! cancelled from any task through its [`canceller`](ProcessHandle::canceller).

mod lines;
mod tokio_runner;
mod traits;

pub use lines::LineSplitter;
pub use tokio_runner::TokioProcessRunner;
pub use traits::{ExitOutcome, OutputLine, ProcessHandle, ProcessRunner};
