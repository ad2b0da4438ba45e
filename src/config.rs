//! Configuration types for vidpipe

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

/// External tool locations
///
/// Groups settings for the fetcher and transcoder binaries.
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Path to yt-dlp executable (auto-detected if None)
    #[serde(default)]
    pub yt_dlp_path: Option<PathBuf>,

    /// Path to ffmpeg executable (auto-detected if None)
    #[serde(default)]
    pub ffmpeg_path: Option<PathBuf>,

    /// Path to ffprobe executable (auto-detected if None)
    #[serde(default)]
    pub ffprobe_path: Option<PathBuf>,

    /// Directory holding bundled binaries (default: directory of the running executable)
    #[serde(default)]
    pub bundle_dir: Option<PathBuf>,

    /// Development-mode binary directory (default: "./assets")
    #[serde(default = "default_dev_dir")]
    pub dev_dir: PathBuf,

    /// Whether to search PATH for binaries if no other location has them (default: true)
    #[serde(default = "default_true")]
    pub search_path: bool,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            yt_dlp_path: None,
            ffmpeg_path: None,
            ffprobe_path: None,
            bundle_dir: None,
            dev_dir: default_dev_dir(),
            search_path: true,
        }
    }
}

/// Pipeline behavior configuration (timeouts, output formats, conversion)
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Fail a step when its tool prints nothing for this long (default: 120s, None = never)
    ///
    /// Only the active transfer is watched. Once the fetcher announces a
    /// post-processing step (`[ExtractAudio]`, `[Merger]`, `[Fixup...]`) the
    /// timer is off for the rest of that process, since those steps print
    /// nothing while the transcoder runs.
    #[serde(
        default = "default_stall_timeout",
        with = "optional_duration_serde"
    )]
    pub stall_timeout: Option<Duration>,

    /// How long a cancelled tool gets to exit after SIGTERM before it is killed (default: 5s)
    #[serde(default = "default_terminate_grace", with = "duration_serde")]
    pub terminate_grace: Duration,

    /// Audio bitrate used when re-encoding audio during conversion (default: "192k")
    #[serde(default = "default_audio_bitrate")]
    pub audio_bitrate: String,

    /// Audio format for audio-only downloads (default: "mp3")
    #[serde(default = "default_audio_format")]
    pub audio_format: String,

    /// Target video container (default: "mp4")
    #[serde(default = "default_video_container")]
    pub video_container: String,

    /// Container extensions that get converted to the target container (default: ["mkv"])
    #[serde(default = "default_convert_containers")]
    pub convert_containers: Vec<String>,

    /// Probe the input duration before converting for linear conversion progress (default: false)
    #[serde(default)]
    pub probe_duration: bool,

    /// Filename used when a title sanitizes to nothing (default: "download")
    #[serde(default = "default_fallback_filename")]
    pub fallback_filename: String,

    /// Event broadcast buffer size (default: 256)
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            stall_timeout: default_stall_timeout(),
            terminate_grace: default_terminate_grace(),
            audio_bitrate: default_audio_bitrate(),
            audio_format: default_audio_format(),
            video_container: default_video_container(),
            convert_containers: default_convert_containers(),
            probe_duration: false,
            fallback_filename: default_fallback_filename(),
            event_buffer: default_event_buffer(),
        }
    }
}

impl PipelineConfig {
    /// Whether a file with this extension must be converted to the target container
    pub fn needs_conversion(&self, extension: &str) -> bool {
        !extension.eq_ignore_ascii_case(&self.video_container)
            && self
                .convert_containers
                .iter()
                .any(|c| c.eq_ignore_ascii_case(extension))
    }
}

/// Main configuration for [`Pipeline`](crate::Pipeline)
///
/// Sub-config fields are flattened, so the JSON form has no nesting.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// External tool locations
    #[serde(flatten)]
    pub tools: ToolsConfig,

    /// Pipeline behavior
    #[serde(flatten)]
    pub pipeline: PipelineConfig,
}

impl Config {
    /// Load configuration from a JSON file
    pub fn from_json_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check settings that serde defaults cannot guard
    pub fn validate(&self) -> Result<()> {
        let non_empty = [
            ("audio_bitrate", &self.pipeline.audio_bitrate),
            ("audio_format", &self.pipeline.audio_format),
            ("video_container", &self.pipeline.video_container),
            ("fallback_filename", &self.pipeline.fallback_filename),
        ];
        for (key, value) in non_empty {
            if value.trim().is_empty() {
                return Err(Error::Config {
                    message: format!("{} must not be empty", key),
                    key: Some(key.to_string()),
                });
            }
        }

        if self.pipeline.event_buffer == 0 {
            return Err(Error::Config {
                message: "event_buffer must be greater than zero".to_string(),
                key: Some("event_buffer".to_string()),
            });
        }

        if self.pipeline.stall_timeout == Some(Duration::ZERO) {
            return Err(Error::Config {
                message: "stall_timeout must be positive or null".to_string(),
                key: Some("stall_timeout".to_string()),
            });
        }

        Ok(())
    }
}

fn default_dev_dir() -> PathBuf {
    PathBuf::from("./assets")
}

fn default_true() -> bool {
    true
}

fn default_stall_timeout() -> Option<Duration> {
    Some(Duration::from_secs(120))
}

fn default_terminate_grace() -> Duration {
    Duration::from_secs(5)
}

fn default_audio_bitrate() -> String {
    "192k".to_string()
}

fn default_audio_format() -> String {
    "mp3".to_string()
}

fn default_video_container() -> String {
    "mp4".to_string()
}

fn default_convert_containers() -> Vec<String> {
    vec!["mkv".to_string()]
}

fn default_fallback_filename() -> String {
    "download".to_string()
}

fn default_event_buffer() -> usize {
    256
}

// Duration serialization helper (serialize as seconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

// Optional Duration serialization helper
mod optional_duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match duration {
            Some(d) => serializer.serialize_some(&d.as_secs()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = Option::<u64>::deserialize(deserializer)?;
        Ok(secs.map(Duration::from_secs))
    }
}
