//! Input validation: URL shapes and the destination path boundary
//!
//! Destination checks are the only authorization boundary in the crate and
//! run before any path is opened, listed or written.

use crate::error::{Error, Result};
use regex::Regex;
use std::path::{Component, Path, PathBuf};
use std::sync::LazyLock;

/// Longest URL accepted by [`validate_url`]
pub const MAX_URL_LENGTH: usize = 2048;

// constant pattern, covered by tests
#[allow(clippy::expect_used)]
static VIDEO_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(https?://)?(www\.)?(youtube\.com/watch\?v=|youtu\.be/|youtube\.com/embed/|youtube\.com/v/)[a-zA-Z0-9_-]{11}(\S*)?$",
    )
    .expect("video URL pattern is valid")
});

/// Check whether a string looks like a supported video URL
///
/// Accepts watch, short, embed and `/v/` URL shapes with an 11-character
/// video id. Strings longer than [`MAX_URL_LENGTH`] are rejected.
///
/// # Examples
///
/// ```
/// use vidpipe::validation::validate_url;
///
/// assert!(validate_url("https://www.youtube.com/watch?v=dQw4w9WgXcQ"));
/// assert!(validate_url("youtu.be/dQw4w9WgXcQ"));
/// assert!(!validate_url("https://example.com/watch?v=dQw4w9WgXcQ"));
/// ```
#[must_use]
pub fn validate_url(url: &str) -> bool {
    !url.is_empty() && url.len() <= MAX_URL_LENGTH && VIDEO_URL.is_match(url)
}

/// Like [`validate_url`] but returns an [`Error::InvalidInput`]
pub fn ensure_valid_url(url: &str) -> Result<()> {
    if validate_url(url) {
        Ok(())
    } else {
        Err(Error::InvalidInput(format!(
            "not a recognized video URL: {}",
            truncate_for_display(url)
        )))
    }
}

/// Lexical checks shared by every path entering the crate
fn check_path_shape(path: &Path) -> Result<()> {
    if path.as_os_str().is_empty() {
        return Err(Error::InvalidInput("path is empty".to_string()));
    }
    if !path.is_absolute() {
        return Err(Error::InvalidInput(format!(
            "path must be absolute: {}",
            path.display()
        )));
    }
    if path.components().any(|c| matches!(c, Component::ParentDir)) {
        return Err(Error::InvalidInput(format!(
            "path must not contain parent-directory segments: {}",
            path.display()
        )));
    }
    Ok(())
}

/// Validate a download destination
///
/// The path must be absolute, free of `..` segments, an existing directory
/// and writable by the current user. Returns the path as given (no canonicalization, so symlinked
/// download folders keep their user-visible name).
pub fn validate_destination(path: &Path) -> Result<PathBuf> {
    check_path_shape(path)?;

    let metadata = std::fs::metadata(path).map_err(|e| {
        Error::InvalidInput(format!(
            "destination {} is not accessible: {}",
            path.display(),
            e
        ))
    })?;

    if !metadata.is_dir() {
        return Err(Error::InvalidInput(format!(
            "destination is not a directory: {}",
            path.display()
        )));
    }

    if !is_writable(path, &metadata) {
        return Err(Error::InvalidInput(format!(
            "destination is not writable: {}",
            path.display()
        )));
    }

    Ok(path.to_path_buf())
}

/// Whether the current user may create files in `path`
///
/// Mode bits alone ignore ownership, so on Unix the kernel is asked as well.
fn is_writable(path: &Path, metadata: &std::fs::Metadata) -> bool {
    if metadata.permissions().readonly() {
        return false;
    }
    #[cfg(unix)]
    {
        access_writable(path)
    }
    #[cfg(not(unix))]
    {
        let _ = path;
        true
    }
}

#[cfg(unix)]
fn access_writable(path: &Path) -> bool {
    use std::ffi::CString;
    use std::os::unix::ffi::OsStrExt;

    let Ok(c_path) = CString::new(path.as_os_str().as_bytes()) else {
        return false;
    };
    // SAFETY: c_path is a NUL-terminated string that outlives the call, and
    // access() only reads it.
    unsafe { libc::access(c_path.as_ptr(), libc::W_OK) == 0 }
}

/// Validate a folder a front-end wants to reveal in the system file manager
///
/// Same lexical rules as [`validate_destination`]; the folder only has to exist.
pub fn validate_folder(path: &Path) -> Result<PathBuf> {
    check_path_shape(path)?;
    if !path.exists() {
        return Err(Error::InvalidInput(format!(
            "folder does not exist: {}",
            path.display()
        )));
    }
    Ok(path.to_path_buf())
}

fn truncate_for_display(s: &str) -> String {
    const MAX: usize = 80;
    if s.chars().count() <= MAX {
        s.to_string()
    } else {
        let head: String = s.chars().take(MAX).collect();
        format!("{}...", head)
    }
}
