//! Decides whether cached statistics still reflect the source log file.

use std::path::Path;

use crate::cache::snapshot::FileMetadata;
use crate::cache::store::CacheStore;
use crate::core::paths::LogNaming;

/// Compares the saved metadata snapshot against the current original file.
///
/// Pure comparison — no copying happens here; callers decide whether to
/// refresh workspace copies afterwards.
#[derive(Debug)]
pub struct StalenessOracle<'a> {
    store: &'a CacheStore,
    naming: &'a LogNaming,
}

impl<'a> StalenessOracle<'a> {
    /// Create an oracle over one module's store and naming scheme.
    #[must_use]
    pub fn new(store: &'a CacheStore, naming: &'a LogNaming) -> Self {
        Self { store, naming }
    }

    /// Whether the log file behind `workfile` changed since the last save.
    ///
    /// Missing cache metadata and unreadable originals both report modified:
    /// the failure mode is an unnecessary rescan, never stale results.
    #[must_use]
    pub fn is_modified(&self, workfile: &Path) -> bool {
        let Some(saved) = self.store.load_snapshot(workfile) else {
            return true;
        };
        let original = self.naming.original_path(workfile);
        match FileMetadata::capture(&original) {
            Ok(fresh) => fresh != saved.metadata,
            Err(_) => true,
        }
    }
}
