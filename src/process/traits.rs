//! Traits and types for running external processes

use std::path::Path;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

/// One line of process output, tagged with the stream it came from
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OutputLine {
    /// Line read from stdout
    Stdout(String),
    /// Line read from stderr
    Stderr(String),
}

impl OutputLine {
    /// The line text regardless of stream
    pub fn text(&self) -> &str {
        match self {
            OutputLine::Stdout(line) | OutputLine::Stderr(line) => line,
        }
    }
}

/// How a process ended
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExitOutcome {
    /// The process ran and exited (None when terminated by a signal)
    Exited(Option<i32>),
    /// The process could not be started
    LaunchFailed(String),
}

impl ExitOutcome {
    /// Whether the process exited with code 0
    pub fn success(&self) -> bool {
        matches!(self, ExitOutcome::Exited(Some(0)))
    }
}

/// Owned handle to a running (or failed-to-launch) process
///
/// Output is consumed once through [`next_line`](Self::next_line); the exit
/// outcome is available through [`wait`](Self::wait) after the output ends.
/// Cancelling the handle, or any token from [`canceller`](Self::canceller),
/// terminates the process and makes `next_line` return `None` from then on,
/// even if output is still buffered.
#[derive(Debug)]
pub struct ProcessHandle {
    program: String,
    lines: mpsc::Receiver<OutputLine>,
    exit: oneshot::Receiver<ExitOutcome>,
    cancel: CancellationToken,
}

impl ProcessHandle {
    /// Assemble a handle from its channels
    ///
    /// The runner owns the sending halves: it must close `lines` once output
    /// ends, send the outcome on `exit`, and terminate the process when
    /// `cancel` fires.
    pub fn new(
        program: impl Into<String>,
        lines: mpsc::Receiver<OutputLine>,
        exit: oneshot::Receiver<ExitOutcome>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            program: program.into(),
            lines,
            exit,
            cancel,
        }
    }

    /// A handle for a process that never started
    ///
    /// Yields no output and resolves [`wait`](Self::wait) to
    /// [`ExitOutcome::LaunchFailed`].
    pub fn launch_failed(program: impl Into<String>, reason: impl Into<String>) -> Self {
        let (_, lines) = mpsc::channel(1);
        let (exit_tx, exit) = oneshot::channel();
        let _ = exit_tx.send(ExitOutcome::LaunchFailed(reason.into()));
        Self::new(program, lines, exit, CancellationToken::new())
    }

    /// Name of the program this handle runs
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Next line of output, or `None` once output ended or the handle was cancelled
    pub async fn next_line(&mut self) -> Option<OutputLine> {
        if self.cancel.is_cancelled() {
            return None;
        }
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            line = self.lines.recv() => line,
        }
    }

    /// Wait for the process to end
    ///
    /// A runner that vanished without reporting is treated as a signal exit.
    pub async fn wait(self) -> ExitOutcome {
        self.exit.await.unwrap_or(ExitOutcome::Exited(None))
    }

    /// Token that cancels this process when triggered
    pub fn canceller(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Terminate the process
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Whether the process was cancelled
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// Trait for spawning external processes
///
/// The pipeline talks to the fetcher and transcoder only through this trait,
/// so tests can substitute scripted output for real executables.
///
/// Spawning never fails synchronously: a program that cannot be started
/// yields a handle from [`ProcessHandle::launch_failed`].
pub trait ProcessRunner: Send + Sync {
    /// Start `program` with `args`
    ///
    /// Must be called from within a tokio runtime.
    fn run(&self, program: &Path, args: &[String]) -> ProcessHandle;

    /// Name of this runner implementation
    fn name(&self) -> &'static str;
}
