//! Naming convention linking active logs, rotated archives, workspace copies,
//! and cache artifacts.
//!
//! The canonical log directory holds the active log (`proxyd.log`) and its
//! rotated archives (`proxyd.log.0.gz`, `proxyd.log.1.gz`, ...). The engine
//! never scans those in place: it works on per-module workspace copies with
//! the compression suffix stripped. Resolving a workspace copy back to its
//! original therefore appends `.gz` exactly when the basename differs from
//! the active log's basename.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

/// Resolves between the three locations a log file can live in.
#[derive(Debug, Clone)]
pub struct LogNaming {
    active_log: PathBuf,
    workspace_dir: PathBuf,
}

impl LogNaming {
    /// Create a naming scheme for one module's active log.
    #[must_use]
    pub fn new(active_log: impl Into<PathBuf>, workspace_dir: impl Into<PathBuf>) -> Self {
        Self {
            active_log: active_log.into(),
            workspace_dir: workspace_dir.into(),
        }
    }

    /// The module's active log file in the canonical directory.
    #[must_use]
    pub fn active_log(&self) -> &Path {
        &self.active_log
    }

    /// Directory holding this module's workspace copies.
    #[must_use]
    pub fn workspace_dir(&self) -> &Path {
        &self.workspace_dir
    }

    /// Whether a path names a finalized compressed archive.
    #[must_use]
    pub fn is_compressed(path: &Path) -> bool {
        path.extension() == Some(OsStr::new("gz"))
    }

    /// Resolve any log path (workspace copy, archive, or the active log) to
    /// its original in the canonical directory.
    ///
    /// A basename matching the active log's is the active log itself; any
    /// other basename is a rotated archive, stored compressed unless the name
    /// already carries the suffix.
    #[must_use]
    pub fn original_path(&self, file: &Path) -> PathBuf {
        let name = basename(file);
        let active_name = basename(&self.active_log);

        let original_name = if name == active_name || name.ends_with(".gz") {
            name
        } else {
            format!("{name}.gz")
        };

        self.active_log
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(original_name)
    }

    /// The workspace copy a given log path maps to (compression suffix
    /// stripped, basename only).
    #[must_use]
    pub fn workspace_path(&self, file: &Path) -> PathBuf {
        let name = basename(file);
        let name = name.strip_suffix(".gz").unwrap_or(&name);
        self.workspace_dir.join(name)
    }

    /// Basename under which this file's cache artifact is stored, shared by
    /// every alias of the same original.
    #[must_use]
    pub fn cache_artifact_name(&self, file: &Path) -> String {
        basename(&self.original_path(file))
    }
}

fn basename(path: &Path) -> String {
    path.file_name()
        .map_or_else(String::new, |n| n.to_string_lossy().into_owned())
}
