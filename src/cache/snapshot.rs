//! File-metadata snapshots used for staleness detection.
//!
//! A snapshot records everything `stat` reports about the canonical log file
//! EXCEPT the last-access time: computing a line diff reads the source file,
//! which updates atime, and carrying it would make every staleness check
//! report "modified".

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::errors::{LshError, Result};

/// Stat fields of a log file at snapshot time, access time excluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMetadata {
    pub dev: u64,
    pub ino: u64,
    pub mode: u32,
    pub nlink: u64,
    pub uid: u32,
    pub gid: u32,
    pub size: u64,
    pub mtime: i64,
    pub mtime_nsec: i64,
    pub ctime: i64,
    pub ctime_nsec: i64,
}

impl FileMetadata {
    /// Stat the given file.
    #[cfg(unix)]
    pub fn capture(path: &Path) -> Result<Self> {
        use std::os::unix::fs::MetadataExt;

        let meta = fs::metadata(path).map_err(|source| LshError::io(path, source))?;
        Ok(Self {
            dev: meta.dev(),
            ino: meta.ino(),
            mode: meta.mode(),
            nlink: meta.nlink(),
            uid: meta.uid(),
            gid: meta.gid(),
            size: meta.size(),
            mtime: meta.mtime(),
            mtime_nsec: meta.mtime_nsec(),
            ctime: meta.ctime(),
            ctime_nsec: meta.ctime_nsec(),
        })
    }

    /// Stat the given file (portable subset).
    #[cfg(not(unix))]
    pub fn capture(path: &Path) -> Result<Self> {
        let meta = fs::metadata(path).map_err(|source| LshError::io(path, source))?;
        let mtime = meta
            .modified()
            .ok()
            .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
            .map_or(0, |d| i64::try_from(d.as_secs()).unwrap_or(0));
        Ok(Self {
            dev: 0,
            ino: 0,
            mode: 0,
            nlink: 0,
            uid: 0,
            gid: 0,
            size: meta.len(),
            mtime,
            mtime_nsec: 0,
            ctime: 0,
            ctime_nsec: 0,
        })
    }
}

/// The staleness header persisted with every cache artifact.
///
/// `line_count` is the number of lines scanned strictly before the
/// aggregation pass that produced the artifact began — captured before, not
/// after, scanning, so lines appended mid-scan are never silently dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheSnapshot {
    pub line_count: u64,
    pub metadata: FileMetadata,
}
