#![forbid(unsafe_code)]

//! Log Stats Helper (lsh) — incremental statistics over rotated daemon logs.
//!
//! The engine keeps a hierarchical day/hour/minute summary per log file,
//! updated by folding only newly appended lines onto a persisted tree, so a
//! dashboard never rescans whole log histories:
//!
//! 1. **Staleness detection** — saved stat snapshots (access time excluded)
//!    decide whether anything changed at all.
//! 2. **Incremental aggregation** — line diffs pick merge vs full rebuild;
//!    configurable counters, keyword matchers, and brief tallies fold in.
//! 3. **Bounded-retry supervision** — daemons are started/stopped with a
//!    fixed poll budget over an OS process-table capability.
//!
//! # Library usage
//!
//! Use the [`prelude`] for convenient access to the most common types:
//!
//! ```rust,no_run
//! use log_stats_helper::prelude::*;
//! ```
//!
//! Individual modules can also be imported directly:
//!
//! ```rust,no_run
//! use log_stats_helper::core::config::Config;
//! use log_stats_helper::stats::service::StatsService;
//! ```

pub mod prelude;

pub mod cache;
pub mod core;
pub mod logfile;
pub mod logger;
pub mod parser;
pub mod stats;
pub mod supervisor;
