//! Error types for vidpipe
//!
//! This module provides the error handling for the library:
//! - One [`Error`] enum covering launch, exit, parse, filesystem and control failures
//! - A serializable [`FailureKind`] carried by terminal pipeline states and events
//! - Context about which external tool was involved

use crate::types::Tool;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for vidpipe operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for vidpipe
#[derive(Debug, Error)]
pub enum Error {
    /// External executable could not be located or started
    #[error("failed to launch {tool}: {reason}")]
    LaunchFailure {
        /// The tool that failed to start
        tool: Tool,
        /// OS-level reason (e.g. "No such file or directory")
        reason: String,
    },

    /// External tool ran but exited unsuccessfully
    #[error("{tool} exited with {}: {stderr}", describe_code(.code))]
    ToolExit {
        /// The tool that failed
        tool: Tool,
        /// Exit code (None when terminated by a signal)
        code: Option<i32>,
        /// Tail of the captured stderr output
        stderr: String,
    },

    /// Tool output could not be parsed (malformed JSON, missing fields)
    #[error("parse error: {0}")]
    Parse(String),

    /// The downloaded file could not be found in the destination folder
    #[error("output not found: no file containing \"{name}\" in {}", .folder.display())]
    OutputNotFound {
        /// Folder that was searched
        folder: PathBuf,
        /// Derived filename that was searched for
        name: String,
    },

    /// The run was cancelled by the user
    #[error("cancelled")]
    Cancelled,

    /// Caller-supplied input was rejected (bad URL shape, unsafe destination)
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// External tool produced no output for longer than the stall timeout
    #[error("{tool} stalled: no output for {timeout:?}")]
    Stalled {
        /// The tool that stalled
        tool: Tool,
        /// The configured stall timeout
        timeout: Duration,
    },

    /// Another pipeline run is already active
    #[error("a download is already in progress")]
    Busy,

    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "audio_bitrate")
        key: Option<String>,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

fn describe_code(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("code {}", code),
        None => "signal".to_string(),
    }
}

/// Machine-readable failure category
///
/// Carried by [`PipelineState::Failed`](crate::types::PipelineState::Failed)
/// and [`Event::Failed`](crate::types::Event::Failed) so front-ends can pick
/// a message without matching on error strings.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Executable missing or unstartable
    LaunchFailure,
    /// Non-zero exit
    ToolExitFailure,
    /// Malformed tool output
    ParseFailure,
    /// Post-download file-location miss
    OutputNotFound,
    /// User-initiated, not a true failure
    Cancelled,
    /// Rejected caller input
    InvalidInput,
    /// No output within the stall timeout
    Stalled,
    /// Filesystem or other internal error
    Internal,
}

impl Error {
    /// Failure category of this error
    pub fn kind(&self) -> FailureKind {
        match self {
            Error::LaunchFailure { .. } => FailureKind::LaunchFailure,
            Error::ToolExit { .. } => FailureKind::ToolExitFailure,
            Error::Parse(_) | Error::Serialization(_) => FailureKind::ParseFailure,
            Error::OutputNotFound { .. } => FailureKind::OutputNotFound,
            Error::Cancelled => FailureKind::Cancelled,
            Error::InvalidInput(_) | Error::Busy | Error::Config { .. } => {
                FailureKind::InvalidInput
            }
            Error::Stalled { .. } => FailureKind::Stalled,
            Error::Io(_) => FailureKind::Internal,
        }
    }

    /// Whether this error is a user cancellation rather than a failure
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }
}
