//! Folds raw log lines into the day/hour/minute tree and the brief tallies.
//!
//! All aggregates are monotonically increasing sums, so folding a batch of
//! appended lines onto an existing tree is exactly equivalent to rebuilding
//! from the concatenated line stream — the property the incremental cache
//! path relies on.

use std::collections::BTreeMap;

use crate::parser::{LogParser, LogRecord, numeric_prefix};
use crate::stats::definition::StatsCatalog;
use crate::stats::tree::{BriefStats, StatsNode, StatsTree};

/// What happened to a single raw line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineOutcome {
    /// Parsed and folded into the tree.
    Folded,
    /// Parsed, but the `Time` field was unusable; bucketed under 12:00.
    FoldedDefaultTime,
    /// Did not parse; contributes nothing to the tree. Still counts toward
    /// line bookkeeping at the caller.
    SkippedParse,
}

/// Tallies over one fold pass, for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FoldReport {
    /// Lines folded into the tree.
    pub folded: u64,
    /// Lines skipped because they did not parse.
    pub skipped_parse: u64,
    /// Folded lines whose `Time` was unusable.
    pub defaulted_time: u64,
}

/// Folds parsed lines into a [`StatsTree`] according to a compiled catalog.
pub struct Aggregator<'a> {
    catalog: &'a StatsCatalog,
    parser: &'a dyn LogParser,
}

impl<'a> Aggregator<'a> {
    /// Create an aggregator over a compiled catalog and a per-log-type parser.
    #[must_use]
    pub fn new(catalog: &'a StatsCatalog, parser: &'a dyn LogParser) -> Self {
        Self { catalog, parser }
    }

    /// Fold a stream of raw lines, accumulating a report for diagnostics.
    pub fn fold_lines<I, S>(
        &self,
        tree: &mut StatsTree,
        brief: &mut BriefStats,
        lines: I,
    ) -> FoldReport
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut report = FoldReport::default();
        for line in lines {
            match self.fold_line(tree, brief, line.as_ref()) {
                LineOutcome::Folded => report.folded += 1,
                LineOutcome::FoldedDefaultTime => {
                    report.folded += 1;
                    report.defaulted_time += 1;
                }
                LineOutcome::SkippedParse => report.skipped_parse += 1,
            }
        }
        report
    }

    /// Fold one raw line into the tree and brief tallies.
    pub fn fold_line(
        &self,
        tree: &mut StatsTree,
        brief: &mut BriefStats,
        raw: &str,
    ) -> LineOutcome {
        let Some(mut record) = self.parser.parse_line(raw) else {
            return LineOutcome::SkippedParse;
        };
        self.parser.post_process(&mut record);

        let Some(date) = record.get("Date").cloned() else {
            return LineOutcome::SkippedParse;
        };

        let (hour, minute, time_defaulted) = record.get("Time").map_or_else(
            || ("12".to_string(), "00".to_string(), true),
            |time| match split_time(time) {
                Some((hour, minute)) => (hour, minute, false),
                None => ("12".to_string(), "00".to_string(), true),
            },
        );

        let day = tree.day_mut(&date);
        fold_level(&mut day.node, &mut day.stats, self.catalog, &record, raw);

        let hour_stats = day.hour_mut(&hour);
        fold_level(
            &mut hour_stats.node,
            &mut hour_stats.stats,
            self.catalog,
            &record,
            raw,
        );

        // Minute granularity is sums only: counter values and match counts,
        // never per-value breakdowns.
        let minute_stats = hour_stats.minute_mut(&minute);
        minute_stats.bump(1);
        for counter in &self.catalog.counters {
            if let Some(value) = record.get(&counter.source_field) {
                minute_stats.bump_stat(&counter.id, numeric_prefix(value));
            }
        }
        for matcher in &self.catalog.matchers {
            if matcher.pattern.is_match(raw) {
                minute_stats.bump_stat(&matcher.id, 1);
            }
        }

        for field in &self.catalog.brief_fields {
            if let Some(value) = record.get(field) {
                let tally = brief
                    .entry(field.clone())
                    .or_default()
                    .entry(value.clone())
                    .or_default();
                *tally = tally.saturating_add(1);
            }
        }

        if time_defaulted {
            LineOutcome::FoldedDefaultTime
        } else {
            LineOutcome::Folded
        }
    }
}

/// Apply one record to a day- or hour-level node and its named sub-stats.
fn fold_level(
    node: &mut StatsNode,
    stats: &mut BTreeMap<String, StatsNode>,
    catalog: &StatsCatalog,
    record: &LogRecord,
    raw: &str,
) {
    node.bump(1);

    for counter in &catalog.counters {
        let Some(value) = record.get(&counter.source_field) else {
            continue;
        };
        let amount = numeric_prefix(value);
        let stat = stats.entry(counter.id.clone()).or_default();
        stat.bump(amount);
        for dimension in &counter.breakdowns {
            if let Some(dim_value) = record.get(dimension) {
                stat.bump_breakdown(dimension, dim_value, amount);
            }
        }
    }

    for matcher in &catalog.matchers {
        if !matcher.pattern.is_match(raw) {
            continue;
        }
        let stat = stats.entry(matcher.id.clone()).or_default();
        stat.bump(1);
        for dimension in &matcher.breakdowns {
            if let Some(dim_value) = record.get(dimension) {
                stat.bump_breakdown(dimension, dim_value, 1);
            }
        }
    }
}

/// Split an `HH:MM:SS` time into zero-padded hour and minute keys.
fn split_time(time: &str) -> Option<(String, String)> {
    let mut parts = time.split(':');
    let hour = parts.next()?;
    let minute = parts.next()?;
    let seconds = parts.next()?;
    if parts.next().is_some() {
        return None;
    }
    for part in [hour, minute, seconds] {
        if part.is_empty() || part.len() > 2 || !part.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
    }
    Some((format!("{hour:0>2}"), format!("{minute:0>2}")))
}
