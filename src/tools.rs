//! Locating the external fetcher and transcoder binaries
//!
//! Lookup order for each tool:
//! 1. Explicit path from [`ToolsConfig`]
//! 2. Bundled location (next to the running executable, or its `resources/` dir)
//! 3. Development location (`./assets` by default)
//! 4. The system PATH via the `which` crate
//! 5. The bare program name, leaving the search to the OS at spawn time
//!
//! Resolution never fails: a tool missing everywhere surfaces later as a
//! launch failure from the process runner.

use crate::config::ToolsConfig;
use crate::types::Tool;
use std::path::{Path, PathBuf};

/// Resolves executable paths for [`Tool`]s
#[derive(Clone, Debug)]
pub struct ToolLocator {
    config: ToolsConfig,
    bundle_dirs: Vec<PathBuf>,
}

impl ToolLocator {
    /// Create a locator from tool configuration
    pub fn new(config: ToolsConfig) -> Self {
        let base = config.bundle_dir.clone().or_else(current_exe_dir);
        let bundle_dirs = base
            .map(|dir| vec![dir.join("resources"), dir])
            .unwrap_or_default();
        Self {
            config,
            bundle_dirs,
        }
    }

    /// Resolve the executable for a tool
    pub fn resolve(&self, tool: Tool) -> PathBuf {
        if let Some(path) = self.explicit(tool) {
            tracing::debug!(%tool, ?path, "using configured tool path");
            return path.clone();
        }

        let file_name = tool.executable_name();

        for dir in &self.bundle_dirs {
            let candidate = dir.join(&file_name);
            if is_executable_file(&candidate) {
                tracing::debug!(%tool, path = ?candidate, "using bundled tool");
                return candidate;
            }
        }

        let candidate = self.config.dev_dir.join(&file_name);
        if is_executable_file(&candidate) {
            tracing::debug!(%tool, path = ?candidate, "using development tool");
            return candidate;
        }

        if self.config.search_path
            && let Ok(path) = which::which(tool.program_name())
        {
            tracing::debug!(%tool, ?path, "found tool in PATH");
            return path;
        }

        tracing::debug!(%tool, "tool not found, deferring to OS search");
        PathBuf::from(file_name)
    }

    fn explicit(&self, tool: Tool) -> Option<&PathBuf> {
        match tool {
            Tool::YtDlp => self.config.yt_dlp_path.as_ref(),
            Tool::Ffmpeg => self.config.ffmpeg_path.as_ref(),
            Tool::Ffprobe => self.config.ffprobe_path.as_ref(),
        }
    }
}

fn current_exe_dir() -> Option<PathBuf> {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
}

fn is_executable_file(path: &Path) -> bool {
    let Ok(metadata) = std::fs::metadata(path) else {
        return false;
    };
    if !metadata.is_file() {
        return false;
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        metadata.permissions().mode() & 0o111 != 0
    }
    #[cfg(not(unix))]
    {
        true
    }
}
