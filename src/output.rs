//! Output naming and post-download file lookup

use std::path::{Path, PathBuf};

/// Characters that are illegal in filenames on at least one supported platform
pub const ILLEGAL_FILENAME_CHARS: &[char] = &['\\', '/', ':', '*', '?', '"', '<', '>', '|'];

/// Derive a filename from a video title
///
/// Removes `\ / : * ? " < > |` and nothing else, so surrounding spaces are
/// kept exactly as they were.
///
/// # Examples
///
/// ```
/// use vidpipe::output::sanitize_filename;
///
/// assert_eq!(sanitize_filename("My: Video / Test"), "My Video  Test");
/// ```
#[must_use]
pub fn sanitize_filename(title: &str) -> String {
    title
        .chars()
        .filter(|c| !ILLEGAL_FILENAME_CHARS.contains(c))
        .collect()
}

/// Derive a filename, falling back when the title sanitizes to nothing usable
pub(crate) fn derive_filename(title: &str, fallback: &str) -> String {
    let name = sanitize_filename(title.trim());
    if name.trim().is_empty() || name == "." || name == ".." {
        sanitize_filename(fallback)
    } else {
        name
    }
}

/// Locate the file a download produced
///
/// Lists `folder`, keeps regular files, sorts them by name and returns the
/// first one whose name contains `derived_name`. Substring matching tolerates
/// the extension and suffix changes the fetcher makes; two titles where one
/// contains the other can collide.
///
/// # Errors
///
/// Returns an error if the directory cannot be read.
pub fn locate(folder: &Path, derived_name: &str) -> std::io::Result<Option<PathBuf>> {
    let mut names = Vec::new();
    for entry in std::fs::read_dir(folder)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        names.push(entry.file_name());
    }
    names.sort();

    Ok(names
        .into_iter()
        .find(|name| name.to_string_lossy().contains(derived_name))
        .map(|name| folder.join(name)))
}

/// Lowercased extension of a path, if any
pub(crate) fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
}
