//! Metadata parsing and quality/format selection

use crate::error::{Error, Result};
use crate::types::{Quality, QualityOption, VideoMetadata};
use serde::Deserialize;
use std::collections::BTreeSet;

/// Title used when the fetcher reports none
pub const UNKNOWN_TITLE: &str = "Unknown title";

/// Label of the synthetic "best" quality entry
pub const BEST_LABEL: &str = "Best quality";

/// Subset of the fetcher's `--dump-json` document the pipeline relies on
#[derive(Debug, Deserialize)]
struct InfoJson {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    thumbnail: Option<String>,
    formats: Vec<FormatJson>,
}

#[derive(Debug, Deserialize)]
struct FormatJson {
    #[serde(default)]
    vcodec: Option<String>,
    #[serde(default)]
    height: Option<u32>,
}

impl FormatJson {
    fn has_video(&self) -> bool {
        matches!(self.vcodec.as_deref(), Some(codec) if !codec.is_empty() && codec != "none")
    }
}

/// Build [`VideoMetadata`] from the fetcher's JSON dump
///
/// Quality options are the synthetic "best" entry followed by every distinct
/// height of a format carrying video, highest first.
///
/// # Errors
///
/// Returns [`Error::Parse`] when the document is not JSON or lacks `formats`.
pub fn parse_metadata(json: &[u8]) -> Result<VideoMetadata> {
    let info: InfoJson = serde_json::from_slice(json)
        .map_err(|e| Error::Parse(format!("invalid metadata JSON: {}", e)))?;

    let heights: BTreeSet<u32> = info
        .formats
        .iter()
        .filter(|f| f.has_video())
        .filter_map(|f| f.height)
        .filter(|h| *h > 0)
        .collect();

    let mut qualities = Vec::with_capacity(heights.len() + 1);
    qualities.push(QualityOption {
        label: BEST_LABEL.to_string(),
        value: "best".to_string(),
        height: None,
    });
    qualities.extend(heights.into_iter().rev().map(|h| QualityOption {
        label: format!("{}p", h),
        value: h.to_string(),
        height: Some(h),
    }));

    Ok(VideoMetadata {
        title: info
            .title
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| UNKNOWN_TITLE.to_string()),
        thumbnail_url: info.thumbnail.unwrap_or_default(),
        qualities,
    })
}

/// Pick the highest available height not exceeding `max_height`
///
/// # Examples
///
/// ```
/// use vidpipe::format::select_height;
///
/// assert_eq!(select_height([1080, 720, 480], 720), Some(720));
/// assert_eq!(select_height([1080, 720, 480], 700), Some(480));
/// assert_eq!(select_height([1080, 720, 480], 240), None);
/// ```
#[must_use]
pub fn select_height(available: impl IntoIterator<Item = u32>, max_height: u32) -> Option<u32> {
    available.into_iter().filter(|h| *h <= max_height).max()
}

/// Pick the quality option a request resolves to
///
/// `Quality::Best` resolves to the "best" entry; a height bound resolves to
/// the highest option not exceeding it.
#[must_use]
pub fn select_quality(options: &[QualityOption], quality: Quality) -> Option<&QualityOption> {
    match quality {
        Quality::Best => options.iter().find(|o| o.height.is_none()),
        Quality::MaxHeight(max) => {
            let height = select_height(options.iter().filter_map(|o| o.height), max)?;
            options.iter().find(|o| o.height == Some(height))
        }
    }
}

/// Build the fetcher's format-selection expression
///
/// Height-bound selection prefers separate video+audio streams in the target
/// container, then a muxed stream in it, then any container, then the overall
/// best. Each alternative keeps the fetcher's own "highest not exceeding" rule.
#[must_use]
pub fn format_selector(quality: Quality, container: &str) -> String {
    let audio = audio_companion(container);
    match quality {
        Quality::Best => format!(
            "bestvideo[ext={c}]+bestaudio[ext={a}]/best[ext={c}]/best",
            c = container,
            a = audio
        ),
        Quality::MaxHeight(h) => format!(
            "bestvideo[height<={h}][ext={c}]+bestaudio[ext={a}]/best[height<={h}][ext={c}]/best[height<={h}]/best",
            h = h,
            c = container,
            a = audio
        ),
    }
}

/// Audio stream extension that muxes cleanly into a given video container
fn audio_companion(container: &str) -> &'static str {
    if container.eq_ignore_ascii_case("webm") {
        "webm"
    } else {
        "m4a"
    }
}
