//! Enumeration of a module's log archives with their start dates.
//!
//! Rotated archives shift numbers on every rotation (`proxyd.log.0.gz`
//! becomes `proxyd.log.1.gz`), so a workspace copy of an archive is only
//! trusted for date extraction when the staleness check confirms it still
//! matches its original.

use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use crate::cache::staleness::StalenessOracle;
use crate::cache::store::CacheStore;
use crate::core::errors::{LshError, Result};
use crate::core::paths::LogNaming;
use crate::parser::LogParser;

/// Start marker of one archive file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartDate {
    /// `Date Time` of the file's first line.
    Timestamp(String),
    /// Compressed archive with no fresh workspace copy to read.
    Compressed,
    /// First line unreadable or unparsable.
    Unknown,
}

/// One catalog row: the archive path and its start marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    pub file: PathBuf,
    pub start: StartDate,
}

/// Lists a module's log files, newest rotation conventions included.
pub struct LogCatalog<'a> {
    naming: &'a LogNaming,
    parser: &'a dyn LogParser,
    store: &'a CacheStore,
}

impl<'a> LogCatalog<'a> {
    /// Create a catalog over one module's naming, parser, and cache store.
    #[must_use]
    pub fn new(
        naming: &'a LogNaming,
        parser: &'a dyn LogParser,
        store: &'a CacheStore,
    ) -> Self {
        Self {
            naming,
            parser,
            store,
        }
    }

    /// All files in the canonical directory sharing the active log's name
    /// prefix, ordered by name, each with its start marker.
    pub fn list(&self) -> Result<Vec<CatalogEntry>> {
        let active = self.naming.active_log();
        let dir = active.parent().unwrap_or_else(|| Path::new("."));
        let prefix = active
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let entries = fs::read_dir(dir)
            .map_err(|error| LshError::source_read(dir, error.to_string()))?;

        let mut files: Vec<PathBuf> = entries
            .filter_map(std::result::Result::ok)
            .map(|entry| entry.path())
            .filter(|path| {
                path.file_name()
                    .is_some_and(|name| name.to_string_lossy().starts_with(&prefix))
            })
            .collect();
        files.sort();

        Ok(files
            .into_iter()
            .map(|file| {
                let start = self.start_date(&file);
                CatalogEntry { file, start }
            })
            .collect())
    }

    /// Start marker of one log file.
    ///
    /// Compressed archives are only read through a workspace copy that the
    /// staleness check still vouches for; otherwise they report
    /// [`StartDate::Compressed`] rather than paying a decompression.
    #[must_use]
    pub fn start_date(&self, file: &Path) -> StartDate {
        let readable = if LogNaming::is_compressed(file) {
            let copy = self.naming.workspace_path(file);
            let oracle = StalenessOracle::new(self.store, self.naming);
            if copy.exists() && !oracle.is_modified(&copy) {
                copy
            } else {
                return StartDate::Compressed;
            }
        } else {
            file.to_path_buf()
        };

        let Ok(line) = first_line(&readable) else {
            return StartDate::Unknown;
        };
        let Some(mut record) = self.parser.parse_line(&line) else {
            return StartDate::Unknown;
        };
        self.parser.post_process(&mut record);

        match (record.get("Date"), record.get("Time")) {
            (Some(date), Some(time)) => StartDate::Timestamp(format!("{date} {time}")),
            _ => StartDate::Unknown,
        }
    }
}

/// First line of a file, newline stripped.
pub fn first_line(path: &Path) -> Result<String> {
    let file = File::open(path).map_err(|error| LshError::source_read(path, error.to_string()))?;
    let mut line = String::new();
    BufReader::new(file)
        .read_line(&mut line)
        .map_err(|error| LshError::source_read(path, error.to_string()))?;
    Ok(line.trim_end_matches('\n').to_string())
}
