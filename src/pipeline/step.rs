//! Driving a single external process.

use crate::error::{Error, Result};
use crate::process::{ExitOutcome, OutputLine};
use crate::progress::is_post_processing;
use crate::types::{ProgressEvent, Tool};
use std::collections::VecDeque;

use super::{Pipeline, RunId};

/// Number of trailing stderr lines kept for error reports
pub(crate) const STDERR_TAIL: usize = 20;

impl Pipeline {
    /// Run one tool to completion on behalf of a run
    ///
    /// Every stdout line is handed to `on_stdout`; a returned event is emitted
    /// as progress. Stderr lines are logged and the last [`STDERR_TAIL`] of
    /// them are attached to a non-zero exit error. A tool silent for longer
    /// than the stall timeout is cancelled and reported as [`Error::Stalled`],
    /// unless the fetcher has moved on to post-processing.
    pub(crate) async fn run_step<F>(
        &self,
        run: RunId,
        tool: Tool,
        args: Vec<String>,
        mut on_stdout: F,
    ) -> Result<()>
    where
        F: FnMut(&str) -> Option<ProgressEvent>,
    {
        let program = self.tools.resolve(tool);
        tracing::debug!(run_id = run.0, %tool, ?program, ?args, "Running tool");

        let mut handle = self.runner.run(&program, &args);
        self.track(run, handle.canceller()).await?;

        let mut stall_timeout = self.config.pipeline.stall_timeout;
        let mut stderr_tail = VecDeque::with_capacity(STDERR_TAIL);

        loop {
            let next = match stall_timeout {
                Some(limit) => match tokio::time::timeout(limit, handle.next_line()).await {
                    Ok(line) => line,
                    Err(_) => {
                        tracing::warn!(
                            run_id = run.0,
                            %tool,
                            timeout = ?limit,
                            "Tool stalled, terminating"
                        );
                        handle.cancel();
                        self.untrack(run).await;
                        let _ = handle.wait().await;
                        return Err(Error::Stalled {
                            tool,
                            timeout: limit,
                        });
                    }
                },
                None => handle.next_line().await,
            };

            let Some(line) = next else {
                break;
            };

            match line {
                OutputLine::Stdout(text) => {
                    if tool == Tool::YtDlp
                        && stall_timeout.is_some()
                        && is_post_processing(&text)
                    {
                        tracing::debug!(
                            run_id = run.0,
                            %tool,
                            line = %text,
                            "Post-processing, stall timer off"
                        );
                        stall_timeout = None;
                    }
                    if let Some(event) = on_stdout(&text) {
                        self.progress(run, event).await;
                    }
                }
                OutputLine::Stderr(text) => {
                    tracing::debug!(run_id = run.0, %tool, line = %text, "stderr");
                    if stderr_tail.len() == STDERR_TAIL {
                        stderr_tail.pop_front();
                    }
                    stderr_tail.push_back(text);
                }
            }
        }

        let cancelled = handle.is_cancelled();
        let outcome = handle.wait().await;
        self.untrack(run).await;

        if cancelled {
            tracing::debug!(run_id = run.0, %tool, "Tool cancelled");
            return Err(Error::Cancelled);
        }

        match outcome {
            ExitOutcome::Exited(Some(0)) => Ok(()),
            ExitOutcome::Exited(code) => Err(Error::ToolExit {
                tool,
                code,
                stderr: Vec::from(stderr_tail).join("\n"),
            }),
            ExitOutcome::LaunchFailed(reason) => Err(Error::LaunchFailure { tool, reason }),
        }
    }

    /// Run a tool and collect its stdout
    pub(crate) async fn capture_stdout(
        &self,
        run: RunId,
        tool: Tool,
        args: Vec<String>,
    ) -> Result<String> {
        let mut stdout = String::new();
        self.run_step(run, tool, args, |line| {
            stdout.push_str(line);
            stdout.push('\n');
            None
        })
        .await?;
        Ok(stdout)
    }
}
