//! Shared test helpers: a scripted process runner and pipeline fixtures.

use crate::config::{Config, ToolsConfig};
use crate::pipeline::Pipeline;
use crate::process::{ExitOutcome, OutputLine, ProcessHandle, ProcessRunner};
use crate::types::{Event, PipelineState, Tool};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio_util::sync::CancellationToken;

pub(crate) const VIDEO_URL: &str = "https://www.youtube.com/watch?v=dQw4w9WgXcQ";

pub(crate) const SAMPLE_INFO_JSON: &str = r#"{"title": "Sample Clip", "thumbnail": "https://i.ytimg.com/vi/dQw4w9WgXcQ/hq.jpg", "formats": [{"vcodec": "none", "height": null}, {"vcodec": "avc1", "height": 1080}, {"vcodec": "avc1", "height": 720}, {"vcodec": "vp9", "height": 480}]}"#;

/// What one scripted tool invocation does
#[derive(Clone, Debug)]
pub(crate) struct Script {
    pub(crate) lines: Vec<OutputLine>,
    pub(crate) exit: ExitOutcome,
    pub(crate) creates: Vec<PathBuf>,
    pub(crate) removes: Vec<PathBuf>,
    pub(crate) line_delay: Option<Duration>,
    pub(crate) exit_delay: Option<Duration>,
    pub(crate) hold_open: bool,
}

impl Script {
    /// Exits 0 without output
    pub(crate) fn ok() -> Self {
        Self {
            lines: Vec::new(),
            exit: ExitOutcome::Exited(Some(0)),
            creates: Vec::new(),
            removes: Vec::new(),
            line_delay: None,
            exit_delay: None,
            hold_open: false,
        }
    }

    /// Never starts
    pub(crate) fn launch_failure(reason: &str) -> Self {
        Self {
            exit: ExitOutcome::LaunchFailed(reason.to_string()),
            ..Self::ok()
        }
    }

    pub(crate) fn stdout(mut self, line: &str) -> Self {
        self.lines.push(OutputLine::Stdout(line.to_string()));
        self
    }

    pub(crate) fn stderr(mut self, line: &str) -> Self {
        self.lines.push(OutputLine::Stderr(line.to_string()));
        self
    }

    pub(crate) fn exit_code(mut self, code: i32) -> Self {
        self.exit = ExitOutcome::Exited(Some(code));
        self
    }

    /// Write an empty file when the process starts
    pub(crate) fn creates(mut self, path: impl Into<PathBuf>) -> Self {
        self.creates.push(path.into());
        self
    }

    /// Delete a file when the process starts
    pub(crate) fn removes(mut self, path: impl Into<PathBuf>) -> Self {
        self.removes.push(path.into());
        self
    }

    pub(crate) fn line_delay(mut self, delay: Duration) -> Self {
        self.line_delay = Some(delay);
        self
    }

    /// Stay silent for `delay` after the last line before exiting
    pub(crate) fn exit_delay(mut self, delay: Duration) -> Self {
        self.exit_delay = Some(delay);
        self
    }

    /// Keep running after the last line until cancelled
    pub(crate) fn hold_open(mut self) -> Self {
        self.hold_open = true;
        self
    }
}

/// A recorded invocation
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Call {
    pub(crate) program: PathBuf,
    pub(crate) args: Vec<String>,
}

/// Process runner replaying [`Script`]s in invocation order
///
/// An invocation with no script left fails to launch.
#[derive(Debug, Default)]
pub(crate) struct ScriptedRunner {
    scripts: Mutex<VecDeque<Script>>,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedRunner {
    pub(crate) fn new(scripts: impl IntoIterator<Item = Script>) -> Arc<Self> {
        Arc::new(Self {
            scripts: Mutex::new(scripts.into_iter().collect()),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Wait until at least `count` invocations happened
    pub(crate) async fn wait_for_calls(&self, count: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.calls.lock().unwrap().len() < count {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("timed out waiting for tool invocations");
    }
}

impl ProcessRunner for ScriptedRunner {
    fn run(&self, program: &Path, args: &[String]) -> ProcessHandle {
        self.calls.lock().unwrap().push(Call {
            program: program.to_path_buf(),
            args: args.to_vec(),
        });

        let name = program.display().to_string();
        let Some(script) = self.scripts.lock().unwrap().pop_front() else {
            return ProcessHandle::launch_failed(name, "no script left");
        };
        if let ExitOutcome::LaunchFailed(reason) = &script.exit {
            return ProcessHandle::launch_failed(name, reason.clone());
        }

        let (line_tx, line_rx) = mpsc::channel(64);
        let (exit_tx, exit_rx) = oneshot::channel();
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        tokio::spawn(async move {
            for path in &script.creates {
                std::fs::write(path, b"").unwrap();
            }
            for path in &script.removes {
                let _ = std::fs::remove_file(path);
            }

            for line in script.lines {
                if token.is_cancelled() || line_tx.send(line).await.is_err() {
                    break;
                }
                if let Some(delay) = script.line_delay {
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = token.cancelled() => break,
                    }
                }
            }

            if let Some(delay) = script.exit_delay {
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = token.cancelled() => {}
                }
            }
            if script.hold_open {
                token.cancelled().await;
            }
            drop(line_tx);

            let outcome = if token.is_cancelled() {
                ExitOutcome::Exited(None)
            } else {
                script.exit
            };
            let _ = exit_tx.send(outcome);
        });

        ProcessHandle::new(name, line_rx, exit_rx, cancel)
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

/// Fixed tool paths so tests never touch the real PATH
pub(crate) fn tool_path(tool: Tool) -> PathBuf {
    PathBuf::from("/opt/vidpipe-test").join(tool.program_name())
}

pub(crate) fn test_config() -> Config {
    Config {
        tools: ToolsConfig {
            yt_dlp_path: Some(tool_path(Tool::YtDlp)),
            ffmpeg_path: Some(tool_path(Tool::Ffmpeg)),
            ffprobe_path: Some(tool_path(Tool::Ffprobe)),
            search_path: false,
            ..Default::default()
        },
        ..Default::default()
    }
}

/// Create a pipeline over scripted tools plus a destination directory.
/// The tempdir must be kept alive for the duration of the test.
pub(crate) fn create_test_pipeline(
    scripts: impl IntoIterator<Item = Script>,
) -> (Pipeline, Arc<ScriptedRunner>, TempDir) {
    create_test_pipeline_with(test_config(), scripts)
}

pub(crate) fn create_test_pipeline_with(
    config: Config,
    scripts: impl IntoIterator<Item = Script>,
) -> (Pipeline, Arc<ScriptedRunner>, TempDir) {
    let runner = ScriptedRunner::new(scripts);
    let pipeline = Pipeline::with_runner(config, runner.clone()).unwrap();
    let temp_dir = TempDir::new().unwrap();
    (pipeline, runner, temp_dir)
}

/// Every event already sent to `rx`
pub(crate) fn drain_events(rx: &mut broadcast::Receiver<Event>) -> Vec<Event> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// Overall percentages of the progress events in `events`
pub(crate) fn progress_percents(events: &[Event]) -> Vec<f32> {
    events
        .iter()
        .filter_map(|e| match e {
            Event::Progress(p) => Some(p.overall_percent),
            _ => None,
        })
        .collect()
}

/// States announced through `StateChanged` events, in order
pub(crate) fn state_names(events: &[Event]) -> Vec<&'static str> {
    events
        .iter()
        .filter_map(|e| match e {
            Event::StateChanged { state } => Some(state.name()),
            _ => None,
        })
        .collect()
}

/// Wait until the pipeline reaches `state`
pub(crate) async fn wait_for_state(pipeline: &Pipeline, state: PipelineState) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while pipeline.state().await != state {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("timed out waiting for pipeline state");
}

/// A fetcher progress line as printed with `--newline`
pub(crate) fn fetch_line(percent: f32) -> String {
    format!("[download] {:5.1}% of 10.00MiB at 1.00MiB/s ETA 00:05", percent)
}
