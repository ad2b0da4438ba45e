//! Process runner backed by `tokio::process`

use super::lines::LineSplitter;
use super::traits::{ExitOutcome, OutputLine, ProcessHandle, ProcessRunner};
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Lines buffered between the reader tasks and the consumer
const LINE_BUFFER: usize = 1024;

/// Bytes read from a pipe per call
const READ_CHUNK: usize = 8 * 1024;

/// Runs real executables with piped output
///
/// Cancellation sends SIGTERM on Unix and waits up to `terminate_grace` for
/// the process to exit before killing it. Elsewhere the process is killed
/// immediately.
///
/// # Examples
///
/// ```no_run
/// use vidpipe::process::{ProcessRunner, TokioProcessRunner};
/// use std::path::Path;
/// use std::time::Duration;
///
/// # #[tokio::main]
/// # async fn main() {
/// let runner = TokioProcessRunner::new(Duration::from_secs(5));
/// let mut handle = runner.run(Path::new("yt-dlp"), &["--version".to_string()]);
/// while let Some(line) = handle.next_line().await {
///     println!("{}", line.text());
/// }
/// println!("{:?}", handle.wait().await);
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct TokioProcessRunner {
    terminate_grace: Duration,
}

impl TokioProcessRunner {
    /// Create a runner with the given SIGTERM grace period
    pub fn new(terminate_grace: Duration) -> Self {
        Self { terminate_grace }
    }
}

impl Default for TokioProcessRunner {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}

impl ProcessRunner for TokioProcessRunner {
    fn run(&self, program: &Path, args: &[String]) -> ProcessHandle {
        let name = program.display().to_string();
        tracing::debug!(program = %name, ?args, "spawning process");

        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                tracing::debug!(program = %name, error = %e, "process failed to start");
                return ProcessHandle::launch_failed(name, e.to_string());
            }
        };

        let (line_tx, line_rx) = mpsc::channel(LINE_BUFFER);
        let (exit_tx, exit_rx) = oneshot::channel();
        let cancel = CancellationToken::new();

        let mut readers = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            readers.push(tokio::spawn(forward_lines(
                stdout,
                line_tx.clone(),
                OutputLine::Stdout,
            )));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(tokio::spawn(forward_lines(
                stderr,
                line_tx.clone(),
                OutputLine::Stderr,
            )));
        }
        drop(line_tx);

        tokio::spawn(supervise(
            child,
            readers,
            exit_tx,
            cancel.clone(),
            self.terminate_grace,
            name.clone(),
        ));

        ProcessHandle::new(name, line_rx, exit_rx, cancel)
    }

    fn name(&self) -> &'static str {
        "tokio"
    }
}

async fn forward_lines<R>(
    mut reader: R,
    tx: mpsc::Sender<OutputLine>,
    wrap: fn(String) -> OutputLine,
) where
    R: AsyncRead + Unpin,
{
    let mut splitter = LineSplitter::new();
    let mut buf = vec![0u8; READ_CHUNK];
    loop {
        let n = match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                tracing::debug!(error = %e, "pipe read failed");
                break;
            }
        };
        for line in splitter.push(&buf[..n]) {
            if tx.send(wrap(line)).await.is_err() {
                // consumer gone
                return;
            }
        }
    }
    if let Some(line) = splitter.finish() {
        let _ = tx.send(wrap(line)).await;
    }
}

async fn supervise(
    mut child: Child,
    mut readers: Vec<JoinHandle<()>>,
    exit_tx: oneshot::Sender<ExitOutcome>,
    cancel: CancellationToken,
    grace: Duration,
    program: String,
) {
    let waited = tokio::select! {
        status = child.wait() => Some(status),
        _ = cancel.cancelled() => None,
    };

    let outcome = match waited {
        Some(status) => exit_outcome(status, &program),
        None => terminate(&mut child, grace, &program).await,
    };

    // Grandchildren can hold the pipes open after the child exits
    let drain = async {
        for reader in readers.iter_mut() {
            let _ = reader.await;
        }
    };
    tokio::select! {
        _ = drain => {}
        _ = cancel.cancelled() => {}
    }
    for reader in &readers {
        reader.abort();
    }

    tracing::debug!(program = %program, ?outcome, "process ended");
    let _ = exit_tx.send(outcome);
}

async fn terminate(child: &mut Child, grace: Duration, program: &str) -> ExitOutcome {
    tracing::debug!(program, "terminating process");
    if !send_terminate(child) {
        // already exited
        return exit_outcome(child.wait().await, program);
    }

    match tokio::time::timeout(grace, child.wait()).await {
        Ok(status) => exit_outcome(status, program),
        Err(_) => {
            tracing::warn!(program, ?grace, "process ignored termination request, killing");
            if let Err(e) = child.start_kill() {
                tracing::warn!(program, error = %e, "failed to kill process");
            }
            exit_outcome(child.wait().await, program)
        }
    }
}

#[cfg(unix)]
fn send_terminate(child: &mut Child) -> bool {
    let Some(pid) = child.id() else {
        return false;
    };
    let Ok(pid) = libc::pid_t::try_from(pid) else {
        return false;
    };
    // SAFETY: pid names a child we spawned and have not reaped yet (id()
    // returns None after reaping), so the signal cannot reach a recycled pid.
    unsafe { libc::kill(pid, libc::SIGTERM) == 0 }
}

#[cfg(not(unix))]
fn send_terminate(child: &mut Child) -> bool {
    child.start_kill().is_ok()
}

fn exit_outcome(status: std::io::Result<std::process::ExitStatus>, program: &str) -> ExitOutcome {
    match status {
        Ok(status) => ExitOutcome::Exited(status.code()),
        Err(e) => {
            tracing::warn!(program, error = %e, "failed to wait for process");
            ExitOutcome::Exited(None)
        }
    }
}
