//! Line-count bookkeeping: how many lines were appended since the last
//! aggregation, or whether the file rotated out from under the cache.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use memchr::memchr_iter;

use crate::core::errors::{LshError, Result};

/// Outcome of comparing the cached line count with the current file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineDiff {
    /// Lines appended since the cached count. Zero when rotated.
    pub new_lines: u64,
    /// The cache cannot be merged onto; a full rebuild is required.
    pub rotated: bool,
}

/// Classify the growth of a log file against its cached line count.
///
/// Shrinkage means the file was replaced or truncated. Compressed archives
/// are finalized logs aggregated once in full; merging onto an existing
/// record would double-count them. Both cases report rotation — the count
/// never goes negative.
#[must_use]
pub fn compute(cached: u64, current: u64, original_is_compressed: bool) -> LineDiff {
    if current >= cached && !original_is_compressed {
        LineDiff {
            new_lines: current - cached,
            rotated: false,
        }
    } else {
        LineDiff {
            new_lines: 0,
            rotated: true,
        }
    }
}

/// Count the lines of a file by scanning for newline bytes in chunks.
/// A non-empty final line without a trailing newline counts as a line.
pub fn count_lines(path: &Path) -> Result<u64> {
    let mut file = File::open(path).map_err(|source| LshError::io(path, source))?;
    let mut buffer = [0_u8; 64 * 1024];
    let mut count: u64 = 0;
    let mut last_byte: Option<u8> = None;

    loop {
        let read = file
            .read(&mut buffer)
            .map_err(|source| LshError::io(path, source))?;
        if read == 0 {
            break;
        }
        count += memchr_iter(b'\n', &buffer[..read]).count() as u64;
        last_byte = Some(buffer[read - 1]);
    }

    if last_byte.is_some_and(|byte| byte != b'\n') {
        count += 1;
    }
    Ok(count)
}
