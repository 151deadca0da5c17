//! Convenience re-exports for library consumers.
//!
//! ```rust,no_run
//! use log_stats_helper::prelude::*;
//! ```

// Core
pub use crate::core::config::Config;
pub use crate::core::errors::{LshError, Result};
pub use crate::core::paths::LogNaming;

// Stats
pub use crate::stats::aggregator::Aggregator;
pub use crate::stats::definition::StatsCatalog;
pub use crate::stats::filter::DateSelector;
pub use crate::stats::service::StatsService;
pub use crate::stats::tree::{BriefStats, DayStats, HourStats, MinuteStats, StatsNode, StatsTree};

// Cache
pub use crate::cache::snapshot::{CacheSnapshot, FileMetadata};
pub use crate::cache::staleness::StalenessOracle;
pub use crate::cache::store::{CacheRecord, CacheStore};

// Parsing
pub use crate::parser::{LogParser, LogRecord, RegexLineParser};

// Supervision
pub use crate::supervisor::control::{ProcessSupervisor, ServiceState};
pub use crate::supervisor::process_table::{ProcessRow, ProcessTable};
#[cfg(unix)]
pub use crate::supervisor::process_table::PsProcessTable;
