//! Persistence of aggregated statistics, one artifact per original log file.
//!
//! Artifact layout: line 1 is a single self-delimited `<filestat>` tag
//! wrapping the JSON [`CacheSnapshot`]; the rest of the file is the JSON
//! payload `{ "stats": tree, "briefstats": brief }`. Readers strip the tag
//! line before deserializing the payload, and every failure to locate or
//! parse either part degrades to "no cache" — a rebuild, never an error.

use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::cache::snapshot::{CacheSnapshot, FileMetadata};
use crate::core::errors::{LshError, Result};
use crate::core::paths::LogNaming;
use crate::stats::tree::{BriefStats, StatsTree};

const HEADER_OPEN: &str = "<filestat>";
const HEADER_CLOSE: &str = "</filestat>";

/// Everything persisted for one (module, log file) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheRecord {
    pub snapshot: CacheSnapshot,
    pub tree: StatsTree,
    pub brief: BriefStats,
}

#[derive(Debug, Serialize, Deserialize)]
struct CachePayload {
    stats: StatsTree,
    briefstats: BriefStats,
}

/// Loads and saves cache artifacts under one module's cache directory.
#[derive(Debug, Clone)]
pub struct CacheStore {
    cache_dir: PathBuf,
    naming: LogNaming,
}

impl CacheStore {
    /// Create a store rooted at the module's cache directory.
    #[must_use]
    pub fn new(cache_dir: impl Into<PathBuf>, naming: LogNaming) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            naming,
        }
    }

    /// Path of the artifact for any alias of a log file.
    #[must_use]
    pub fn artifact_path(&self, logfile: &Path) -> PathBuf {
        self.cache_dir.join(self.naming.cache_artifact_name(logfile))
    }

    /// Load the full record, or `None` for missing/corrupt artifacts.
    #[must_use]
    pub fn load(&self, logfile: &Path) -> Option<CacheRecord> {
        let raw = fs::read_to_string(self.artifact_path(logfile)).ok()?;
        let (header_line, payload) = raw.split_once('\n')?;
        let snapshot = decode_header(header_line)?;
        let payload: CachePayload = serde_json::from_str(payload).ok()?;
        Some(CacheRecord {
            snapshot,
            tree: payload.stats,
            brief: payload.briefstats,
        })
    }

    /// Load only the staleness header, without touching the payload.
    #[must_use]
    pub fn load_snapshot(&self, logfile: &Path) -> Option<CacheSnapshot> {
        let file = File::open(self.artifact_path(logfile)).ok()?;
        let mut line = String::new();
        BufReader::new(file).read_line(&mut line).ok()?;
        decode_header(line.trim_end_matches('\n'))
    }

    /// Persist tree + brief under a fresh snapshot.
    ///
    /// `line_count` must be the count captured before the aggregation pass
    /// that produced this payload; the file metadata is re-stat'd from the
    /// canonical original here, at save time.
    pub fn save(
        &self,
        logfile: &Path,
        tree: &StatsTree,
        brief: &BriefStats,
        line_count: u64,
    ) -> Result<()> {
        let original = self.naming.original_path(logfile);
        let snapshot = CacheSnapshot {
            line_count,
            metadata: FileMetadata::capture(&original)?,
        };

        let payload = CachePayload {
            stats: tree.clone(),
            briefstats: brief.clone(),
        };
        let artifact = format!(
            "{HEADER_OPEN}{}{HEADER_CLOSE}\n{}",
            serde_json::to_string(&snapshot)?,
            serde_json::to_string(&payload)?,
        );

        fs::create_dir_all(&self.cache_dir)
            .map_err(|source| LshError::io(&self.cache_dir, source))?;
        let path = self.artifact_path(logfile);
        fs::write(&path, artifact).map_err(|source| LshError::io(&path, source))?;
        Ok(())
    }
}

fn decode_header(line: &str) -> Option<CacheSnapshot> {
    let inner = line.strip_prefix(HEADER_OPEN)?.strip_suffix(HEADER_CLOSE)?;
    serde_json::from_str(inner).ok()
}
