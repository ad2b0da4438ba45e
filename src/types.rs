//! Core types for vidpipe

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{Error, FailureKind};

/// External tools driven by the pipeline
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Tool {
    /// Video fetcher
    YtDlp,
    /// Transcoder
    Ffmpeg,
    /// Media prober shipped alongside the transcoder
    Ffprobe,
}

impl Tool {
    /// Program name without platform suffix
    pub fn program_name(&self) -> &'static str {
        match self {
            Tool::YtDlp => "yt-dlp",
            Tool::Ffmpeg => "ffmpeg",
            Tool::Ffprobe => "ffprobe",
        }
    }

    /// Executable file name for the current platform
    pub fn executable_name(&self) -> String {
        format!("{}{}", self.program_name(), std::env::consts::EXE_SUFFIX)
    }
}

impl std::fmt::Display for Tool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.program_name())
    }
}

/// Requested download quality
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Quality {
    /// Best available quality
    #[default]
    Best,
    /// Highest quality whose height does not exceed the given pixel count
    MaxHeight(u32),
}

impl std::str::FromStr for Quality {
    type Err = Error;

    /// Parses the caller strings `"best"`, `"720"` or `"720p"`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("best") {
            return Ok(Quality::Best);
        }
        let digits = s.strip_suffix(['p', 'P']).unwrap_or(s);
        match digits.parse::<u32>() {
            Ok(height) if height > 0 => Ok(Quality::MaxHeight(height)),
            _ => Err(Error::InvalidInput(format!(
                "quality must be \"best\" or a height in pixels, got \"{}\"",
                s
            ))),
        }
    }
}

impl std::fmt::Display for Quality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Quality::Best => f.write_str("best"),
            Quality::MaxHeight(h) => write!(f, "{}", h),
        }
    }
}

/// A request to download one URL into a destination folder
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadRequest {
    /// Video URL (must pass [`validate_url`](crate::validation::validate_url))
    pub url: String,
    /// Absolute, existing, writable destination folder
    pub destination: PathBuf,
    /// Extract audio only
    #[serde(default)]
    pub audio_only: bool,
    /// Quality selector
    #[serde(default)]
    pub quality: Quality,
}

impl DownloadRequest {
    /// Create a video download request at best quality
    pub fn new(url: impl Into<String>, destination: impl Into<PathBuf>) -> Self {
        Self {
            url: url.into(),
            destination: destination.into(),
            audio_only: false,
            quality: Quality::Best,
        }
    }

    /// Switch to audio-only extraction
    pub fn audio_only(mut self) -> Self {
        self.audio_only = true;
        self
    }

    /// Set the quality selector
    pub fn with_quality(mut self, quality: Quality) -> Self {
        self.quality = quality;
        self
    }
}

/// One selectable quality entry for a video
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityOption {
    /// Display label ("Best quality", "1080p")
    pub label: String,
    /// Value to feed back as the quality selector ("best", "1080")
    pub value: String,
    /// Height in pixels (None for the "best" entry)
    pub height: Option<u32>,
}

impl QualityOption {
    /// The quality this option selects
    pub fn quality(&self) -> Quality {
        match self.height {
            Some(h) => Quality::MaxHeight(h),
            None => Quality::Best,
        }
    }
}

/// Metadata fetched for a single URL
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoMetadata {
    /// Video title
    pub title: String,
    /// Thumbnail URL (empty if unknown)
    pub thumbnail_url: String,
    /// Quality options, "best" first, then heights descending
    pub qualities: Vec<QualityOption>,
}

/// Pipeline state
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PipelineState {
    /// No run active
    #[default]
    Idle,
    /// Fetching metadata for a URL
    FetchingMetadata,
    /// Resolving the title or downloading
    Downloading,
    /// Repackaging the downloaded container
    Converting,
    /// Run finished successfully
    Completed {
        /// Final output file
        path: PathBuf,
    },
    /// Run cancelled by the user
    Cancelled,
    /// Run failed
    Failed {
        /// Failure category
        kind: FailureKind,
        /// Human-readable detail
        detail: String,
    },
}

impl PipelineState {
    /// Whether a run currently owns the pipeline
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            PipelineState::FetchingMetadata | PipelineState::Downloading | PipelineState::Converting
        )
    }

    /// Whether this is a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PipelineState::Completed { .. } | PipelineState::Cancelled | PipelineState::Failed { .. }
        )
    }

    /// Short lowercase name for logging
    pub fn name(&self) -> &'static str {
        match self {
            PipelineState::Idle => "idle",
            PipelineState::FetchingMetadata => "fetching_metadata",
            PipelineState::Downloading => "downloading",
            PipelineState::Converting => "converting",
            PipelineState::Completed { .. } => "completed",
            PipelineState::Cancelled => "cancelled",
            PipelineState::Failed { .. } => "failed",
        }
    }
}

/// Overall progress of a run
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    /// Overall completion (0.0 to 100.0)
    pub overall_percent: f32,
    /// Human-readable status line
    pub status_text: String,
}

impl ProgressEvent {
    /// Create a progress event
    pub fn new(overall_percent: f32, status_text: impl Into<String>) -> Self {
        Self {
            overall_percent,
            status_text: status_text.into(),
        }
    }
}

/// Events emitted by the pipeline
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// The pipeline moved to a new state
    StateChanged {
        /// New state
        state: PipelineState,
    },

    /// Progress update
    Progress(ProgressEvent),

    /// Run finished successfully
    Completed {
        /// Final output file
        path: PathBuf,
    },

    /// Run failed
    Failed {
        /// Failure category
        kind: FailureKind,
        /// Human-readable detail
        detail: String,
    },

    /// Run cancelled by the user
    Cancelled,

    /// The intermediate file could not be removed after a successful conversion
    CleanupFailed {
        /// File that was left behind
        path: PathBuf,
        /// Error message
        error: String,
    },

    /// Pipeline shut down
    Shutdown,
}
