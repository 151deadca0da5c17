//! Workspace copies of canonical log files.
//!
//! The engine never scans a live log in place: it refreshes a per-module
//! workspace copy first, decompressing rotated `.gz` archives as it goes.
//! Everything downstream (line counting, tail reads) operates on the copy.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;

use crate::core::errors::{LshError, Result};
use crate::core::paths::LogNaming;

/// Maintains one module's workspace directory of log copies.
#[derive(Debug, Clone)]
pub struct LogWorkspace {
    naming: LogNaming,
}

impl LogWorkspace {
    /// Create a workspace over one module's naming scheme.
    #[must_use]
    pub fn new(naming: LogNaming) -> Self {
        Self { naming }
    }

    /// Bring the workspace copy of `file` up to date with its original.
    ///
    /// Plain files are copied; compressed archives are decompressed, with a
    /// stale uncompressed predecessor removed first. Returns the workspace
    /// path the caller should scan.
    pub fn refresh(&self, file: &Path) -> Result<PathBuf> {
        let original = self.naming.original_path(file);
        let dest = self.naming.workspace_path(file);

        fs::create_dir_all(self.naming.workspace_dir())
            .map_err(|source| LshError::io(self.naming.workspace_dir(), source))?;

        if LogNaming::is_compressed(&original) {
            if dest.exists() {
                fs::remove_file(&dest).map_err(|source| LshError::io(&dest, source))?;
            }
            let archive = File::open(&original)
                .map_err(|error| LshError::source_read(&original, error.to_string()))?;
            let mut decoder = GzDecoder::new(archive);
            let mut out =
                File::create(&dest).map_err(|source| LshError::io(&dest, source))?;
            io::copy(&mut decoder, &mut out)
                .map_err(|error| LshError::source_read(&original, error.to_string()))?;
        } else {
            fs::copy(&original, &dest)
                .map_err(|error| LshError::source_read(&original, error.to_string()))?;
        }

        Ok(dest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::io::Write;

    fn write_gz(path: &Path, content: &str) {
        let mut encoder =
            GzEncoder::new(File::create(path).unwrap(), Compression::default());
        encoder.write_all(content.as_bytes()).unwrap();
        encoder.finish().unwrap();
    }

    #[test]
    fn plain_file_is_copied_into_the_workspace() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("proxyd.log");
        fs::write(&log, "line one\nline two\n").unwrap();

        let workspace = LogWorkspace::new(LogNaming::new(&log, dir.path().join("work")));
        let copy = workspace.refresh(&log).unwrap();

        assert_eq!(copy, dir.path().join("work").join("proxyd.log"));
        assert_eq!(fs::read_to_string(&copy).unwrap(), "line one\nline two\n");
    }

    #[test]
    fn compressed_archive_is_decompressed() {
        let dir = tempfile::tempdir().unwrap();
        let active = dir.path().join("proxyd.log");
        fs::write(&active, "current\n").unwrap();
        let archive = dir.path().join("proxyd.log.0.gz");
        write_gz(&archive, "archived line\n");

        let workspace = LogWorkspace::new(LogNaming::new(&active, dir.path().join("work")));
        let copy = workspace.refresh(&archive).unwrap();

        assert_eq!(copy, dir.path().join("work").join("proxyd.log.0"));
        assert_eq!(fs::read_to_string(&copy).unwrap(), "archived line\n");
    }

    #[test]
    fn stale_uncompressed_predecessor_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let active = dir.path().join("proxyd.log");
        fs::write(&active, "current\n").unwrap();
        let archive = dir.path().join("proxyd.log.0.gz");
        write_gz(&archive, "fresh content\n");

        let work = dir.path().join("work");
        fs::create_dir_all(&work).unwrap();
        fs::write(work.join("proxyd.log.0"), "stale content\n").unwrap();

        let workspace = LogWorkspace::new(LogNaming::new(&active, &work));
        let copy = workspace.refresh(&archive).unwrap();
        assert_eq!(fs::read_to_string(&copy).unwrap(), "fresh content\n");
    }

    #[test]
    fn refreshing_a_workspace_alias_rereads_the_original() {
        let dir = tempfile::tempdir().unwrap();
        let active = dir.path().join("proxyd.log");
        fs::write(&active, "from original\n").unwrap();

        let workspace = LogWorkspace::new(LogNaming::new(&active, dir.path().join("work")));
        let copy = workspace.refresh(&active).unwrap();
        fs::write(&active, "from original\nappended\n").unwrap();

        // Refreshing via the copy's own path resolves back to the original.
        let again = workspace.refresh(&copy).unwrap();
        assert_eq!(again, copy);
        assert_eq!(
            fs::read_to_string(&again).unwrap(),
            "from original\nappended\n"
        );
    }

    #[test]
    fn missing_original_is_a_source_read_failure() {
        let dir = tempfile::tempdir().unwrap();
        let active = dir.path().join("proxyd.log");
        let workspace = LogWorkspace::new(LogNaming::new(&active, dir.path().join("work")));
        let err = workspace.refresh(&active).unwrap_err();
        assert_eq!(err.code(), "LSH-2001");
    }
}
