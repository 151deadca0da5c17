//! Request-level orchestration of the statistics engine.
//!
//! A statistics request runs: staleness check → (stale) workspace refresh →
//! line diff → incremental merge or full rebuild → save → date-range filter.
//! Caching anomalies all degrade to "recompute from scratch"; only an
//! unreadable source log fails the request.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::cache::diff;
use crate::cache::staleness::StalenessOracle;
use crate::cache::store::CacheStore;
use crate::core::config::Config;
use crate::core::errors::{LshError, Result};
use crate::core::paths::LogNaming;
use crate::logfile::catalog::{CatalogEntry, LogCatalog};
use crate::logfile::workspace::LogWorkspace;
use crate::logger::jsonl::{DiagEvent, DiagnosticsLog, EventType, Severity};
use crate::parser::{LogParser, RegexLineParser};
use crate::stats::aggregator::{Aggregator, FoldReport, LineOutcome};
use crate::stats::definition::StatsCatalog;
use crate::stats::filter::{self, DateSelector};
use crate::stats::tree::{BriefStats, StatsTree};

/// One scalar stat computed outside the per-line scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScalarCount {
    /// Stat id from the configuration.
    pub id: String,
    /// Display label.
    pub title: String,
    /// Number of qualifying lines.
    pub count: u64,
}

/// Statistics engine for one module's log files.
pub struct StatsService {
    module: String,
    naming: LogNaming,
    parser: Box<dyn LogParser>,
    catalog: StatsCatalog,
    store: CacheStore,
    workspace: LogWorkspace,
    diag: DiagnosticsLog,
}

impl StatsService {
    /// Build the service for one configured module.
    pub fn from_config(config: &Config, module: &str) -> Result<Self> {
        let module_config = config.module(module)?;
        let naming = LogNaming::new(
            &module_config.log_file,
            config.module_workspace_dir(module),
        );
        let parser = RegexLineParser::new(&module_config.line_pattern)?;
        let catalog = StatsCatalog::compile(&module_config.stats)?;
        let store = CacheStore::new(config.module_cache_dir(module), naming.clone());
        let workspace = LogWorkspace::new(naming.clone());

        Ok(Self {
            module: module.to_string(),
            naming,
            parser: Box::new(parser),
            catalog,
            store,
            workspace,
            diag: DiagnosticsLog::open(config.diagnostics.clone()),
        })
    }

    /// Replace the diagnostics sink (tests, embedded callers).
    pub fn set_diagnostics(&mut self, diag: DiagnosticsLog) {
        self.diag = diag;
    }

    /// The module's active log file.
    #[must_use]
    pub fn default_log_file(&self) -> &Path {
        self.naming.active_log()
    }

    /// Statistics pruned to a date selection, hours included only when
    /// `collect_hours` is set.
    pub fn get_stats(
        &mut self,
        logfile: Option<&Path>,
        selector: &DateSelector,
        collect_hours: bool,
    ) -> Result<StatsTree> {
        let (tree, _) = self.fresh_record(logfile)?;
        Ok(filter::filter(&tree, selector, collect_hours))
    }

    /// The full tree (hours included) together with the brief tallies.
    pub fn get_all_stats(&mut self, logfile: Option<&Path>) -> Result<(StatsTree, BriefStats)> {
        self.fresh_record(logfile)
    }

    /// All of this module's log files with their start markers.
    pub fn log_files(&self) -> Result<Vec<CatalogEntry>> {
        LogCatalog::new(&self.naming, self.parser.as_ref(), &self.store).list()
    }

    /// Ensure a fresh, readable workspace copy of the requested log and
    /// return its path; falls back to the original path when the copy cannot
    /// be refreshed.
    pub fn select_log_file(&mut self, logfile: Option<&Path>) -> PathBuf {
        let requested = self.requested_path(logfile);
        let workfile = self.naming.workspace_path(&requested);

        let modified = StalenessOracle::new(&self.store, &self.naming).is_modified(&workfile);
        if modified || !workfile.exists() {
            match self.workspace.refresh(&requested) {
                Ok(_) => {
                    // Persist the fresh stat header alongside the stats.
                    if let Err(error) = self.update_stats(&workfile) {
                        self.diag.record(
                            &DiagEvent::new(EventType::Error, Severity::Warning)
                                .module(&self.module)
                                .file(&workfile)
                                .details(error.to_string()),
                        );
                    }
                }
                Err(error) => {
                    self.diag.record(
                        &DiagEvent::new(EventType::Error, Severity::Warning)
                            .module(&self.module)
                            .file(&requested)
                            .details(format!("workspace refresh failed: {error}")),
                    );
                    return self.naming.original_path(&requested);
                }
            }
        }
        workfile
    }

    /// Evaluate the `cmd`/`needle` scalar stats against the original file.
    pub fn command_counts(&mut self, logfile: Option<&Path>) -> Result<Vec<ScalarCount>> {
        let target = self.requested_path(logfile);
        let mut results = Vec::with_capacity(self.catalog.commands.len());

        for rule in &self.catalog.commands {
            let count = if let Some(command) = &rule.command {
                let command = command.replace("<LF>", &target.display().to_string());
                let output = Command::new("/bin/sh")
                    .args(["-c", &command])
                    .output()
                    .map_err(|error| LshError::Runtime {
                        details: format!("command {command:?}: {error}"),
                    })?;
                let stdout = String::from_utf8_lossy(&output.stdout);
                count_matching(stdout.lines(), rule.pattern.as_ref())
            } else {
                let file = File::open(&target)
                    .map_err(|error| LshError::source_read(&target, error.to_string()))?;
                let mut count = 0_u64;
                for line in BufReader::new(file).lines() {
                    let line = line
                        .map_err(|error| LshError::source_read(&target, error.to_string()))?;
                    if rule.pattern.as_ref().is_none_or(|p| p.is_match(&line)) {
                        count += 1;
                    }
                }
                count
            };

            results.push(ScalarCount {
                id: rule.id.clone(),
                title: rule.title.clone(),
                count,
            });
        }

        self.diag.record(
            &DiagEvent::new(EventType::CommandCount, Severity::Info)
                .module(&self.module)
                .file(&target),
        );
        Ok(results)
    }

    // ──────────────────────── refresh pipeline ────────────────────────

    fn requested_path(&self, logfile: Option<&Path>) -> PathBuf {
        logfile.map_or_else(|| self.naming.active_log().to_path_buf(), Path::to_path_buf)
    }

    /// Bring the record for a log file up to date and return it.
    fn fresh_record(&mut self, logfile: Option<&Path>) -> Result<(StatsTree, BriefStats)> {
        let requested = self.requested_path(logfile);
        let workfile = self.naming.workspace_path(&requested);

        let modified = StalenessOracle::new(&self.store, &self.naming).is_modified(&workfile);
        if modified || !workfile.exists() {
            self.workspace.refresh(&requested)?;
            self.diag.record(
                &DiagEvent::new(EventType::WorkspaceRefresh, Severity::Info)
                    .module(&self.module)
                    .file(&workfile),
            );
        } else if let Some(record) = self.store.load(&workfile) {
            return Ok((record.tree, record.brief));
        }

        self.update_stats(&workfile)
    }

    /// One aggregation pass: diff, merge or rebuild, fold, save.
    fn update_stats(&mut self, workfile: &Path) -> Result<(StatsTree, BriefStats)> {
        // The count is captured before the fold so lines appended mid-pass
        // are left for the next diff instead of being silently dropped.
        let line_count = diff::count_lines(workfile)
            .map_err(|error| LshError::source_read(workfile, error.to_string()))?;

        let original = self.naming.original_path(workfile);
        let compressed = LogNaming::is_compressed(&original);

        let (mut tree, mut brief, base_count) = match self.store.load_snapshot(workfile) {
            Some(snapshot) => {
                let diff = diff::compute(snapshot.line_count, line_count, compressed);
                if diff.rotated {
                    self.diag.record(
                        &DiagEvent::new(EventType::RotationDetected, Severity::Info)
                            .module(&self.module)
                            .file(workfile)
                            .details(format!(
                                "cached {} lines, current {line_count}",
                                snapshot.line_count
                            )),
                    );
                    (StatsTree::default(), BriefStats::default(), 0)
                } else if let Some(record) = self.store.load(workfile) {
                    (record.tree, record.brief, snapshot.line_count)
                } else {
                    self.record_cache_miss(workfile, "payload unreadable");
                    (StatsTree::default(), BriefStats::default(), 0)
                }
            }
            None => {
                self.record_cache_miss(workfile, "no cache artifact");
                (StatsTree::default(), BriefStats::default(), 0)
            }
        };

        let report = self.fold_file(workfile, &mut tree, &mut brief, base_count, line_count)?;

        if report.skipped_parse > 0 {
            let mut event = DiagEvent::new(EventType::LinesSkipped, Severity::Warning)
                .module(&self.module)
                .file(workfile);
            event.skipped = Some(report.skipped_parse);
            self.diag.record(&event);
        }
        if report.defaulted_time > 0 {
            let mut event = DiagEvent::new(EventType::TimeDefaulted, Severity::Warning)
                .module(&self.module)
                .file(workfile);
            event.skipped = Some(report.defaulted_time);
            self.diag.record(&event);
        }

        match self.store.save(workfile, &tree, &brief, line_count) {
            Ok(()) => {
                let mut event = DiagEvent::new(EventType::StatsSaved, Severity::Info)
                    .module(&self.module)
                    .file(workfile);
                event.line_count = Some(line_count);
                event.new_lines = Some(line_count.saturating_sub(base_count));
                self.diag.record(&event);
            }
            Err(error) => {
                // The caller still gets the in-memory result.
                let mut event = DiagEvent::new(EventType::PersistFailure, Severity::Warning)
                    .module(&self.module)
                    .file(workfile)
                    .details(error.to_string());
                event.error_code = Some(error.code().to_string());
                self.diag.record(&event);
            }
        }

        Ok((tree, brief))
    }

    /// Fold lines `[base_count, line_count)` of the workspace copy.
    fn fold_file(
        &self,
        workfile: &Path,
        tree: &mut StatsTree,
        brief: &mut BriefStats,
        base_count: u64,
        line_count: u64,
    ) -> Result<FoldReport> {
        let file = File::open(workfile)
            .map_err(|error| LshError::source_read(workfile, error.to_string()))?;
        let reader = BufReader::new(file);

        let aggregator = Aggregator::new(&self.catalog, self.parser.as_ref());
        let mut report = FoldReport::default();
        let budget = usize::try_from(line_count.saturating_sub(base_count)).unwrap_or(usize::MAX);

        for line in reader
            .lines()
            .skip(usize::try_from(base_count).unwrap_or(usize::MAX))
            .take(budget)
        {
            let line =
                line.map_err(|error| LshError::source_read(workfile, error.to_string()))?;
            match aggregator.fold_line(tree, brief, &line) {
                LineOutcome::Folded => report.folded += 1,
                LineOutcome::FoldedDefaultTime => {
                    report.folded += 1;
                    report.defaulted_time += 1;
                }
                LineOutcome::SkippedParse => report.skipped_parse += 1,
            }
        }
        Ok(report)
    }

    fn record_cache_miss(&mut self, workfile: &Path, details: &str) {
        self.diag.record(
            &DiagEvent::new(EventType::CacheMiss, Severity::Info)
                .module(&self.module)
                .file(workfile)
                .details(details),
        );
    }
}

fn count_matching<'a>(lines: impl Iterator<Item = &'a str>, pattern: Option<&regex::Regex>) -> u64 {
    match pattern {
        Some(pattern) => lines.filter(|line| pattern.is_match(line)).count() as u64,
        None => lines.count() as u64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const PATTERN: &str = r"^(?P<Date>\d{4}-\d{2}-\d{2}) (?P<Time>\d{2}:\d{2}:\d{2}) (?P<Host>\S+) size=(?P<Size>\d+)(?P<Rest>.*)$";

    fn config_toml(root: &Path) -> String {
        format!(
            r#"
            [paths]
            workspace_dir = "{root}/work"
            cache_dir = "{root}/stats"

            [diagnostics]
            jsonl_log = "{root}/diag.jsonl"
            fallback_log = "{root}/diag-fallback.jsonl"

            [modules.webproxy]
            log_file = "{root}/log/proxyd.log"
            process = "proxyd"
            user = "_proxy"
            start_cmd = "/usr/sbin/proxyd"
            line_pattern = '{PATTERN}'

            [modules.webproxy.stats.Total]
            title = "All requests"
            brief_stats = [{{ field = "Host", title = "Requests by host" }}]

            [modules.webproxy.stats.Total.counters.Bytes]
            field = "Size"
            title = "Bytes transferred"
            nvps = [{{ field = "Host", title = "Bytes by host" }}]

            [modules.webproxy.stats.Denied]
            needle = "DENIED"
            title = "Denied requests"
            nvps = [{{ field = "Host", title = "Denied by host" }}]
            "#,
            root = root.display(),
        )
    }

    struct Fixture {
        _dir: tempfile::TempDir,
        log: PathBuf,
        service: StatsService,
    }

    fn fixture(initial_log: &str) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("log")).unwrap();
        let log = root.join("log").join("proxyd.log");
        fs::write(&log, initial_log).unwrap();

        let config = Config::from_toml_str(&config_toml(root)).unwrap();
        let service = StatsService::from_config(&config, "webproxy").unwrap();
        Fixture {
            _dir: dir,
            log,
            service,
        }
    }

    const THREE_LINES: &str = "\
2024-05-01 10:05:00 a.example size=100
2024-05-01 10:07:30 a.example size=200
2024-05-01 14:00:00 b.example size=50
";

    #[test]
    fn first_request_builds_and_persists_the_tree() {
        let mut fx = fixture(THREE_LINES);
        let tree = fx
            .service
            .get_stats(None, &DateSelector::all(), true)
            .unwrap();

        let day = &tree.date["2024-05-01"];
        assert_eq!(day.node.sum, 3);
        assert_eq!(day.stats["Bytes"].sum, 350);
        assert_eq!(day.hours["10"].node.sum, 2);
        assert_eq!(day.hours["10"].stats["Bytes"].sum, 300);
        assert_eq!(day.hours["14"].stats["Bytes"].sum, 50);
        assert_eq!(day.hours["10"].mins["05"].stats["Bytes"], 100);
        assert_eq!(day.hours["10"].mins["07"].stats["Bytes"], 200);
    }

    #[test]
    fn hours_are_stripped_unless_requested() {
        let mut fx = fixture(THREE_LINES);
        let tree = fx
            .service
            .get_stats(None, &DateSelector::all(), false)
            .unwrap();
        assert!(tree.date["2024-05-01"].hours.is_empty());
        assert_eq!(tree.date["2024-05-01"].node.sum, 3);
    }

    #[test]
    fn appended_lines_merge_incrementally() {
        let mut fx = fixture(THREE_LINES);
        let _ = fx
            .service
            .get_stats(None, &DateSelector::all(), true)
            .unwrap();

        let mut appended = THREE_LINES.to_string();
        appended.push_str("2024-05-01 14:30:00 b.example size=25\n");
        fs::write(&fx.log, appended).unwrap();

        let tree = fx
            .service
            .get_stats(None, &DateSelector::all(), true)
            .unwrap();
        let day = &tree.date["2024-05-01"];
        assert_eq!(day.node.sum, 4);
        assert_eq!(day.stats["Bytes"].sum, 375);
        assert_eq!(day.hours["14"].node.sum, 2);
        assert_eq!(day.hours["14"].mins["30"].stats["Bytes"], 25);
    }

    #[test]
    fn incremental_merge_equals_full_rebuild() {
        let mut fx = fixture(THREE_LINES);
        let _ = fx
            .service
            .get_stats(None, &DateSelector::all(), true)
            .unwrap();

        let mut appended = THREE_LINES.to_string();
        appended.push_str("2024-05-02 09:00:00 c.example size=10 DENIED\n");
        appended.push_str("2024-05-02 09:01:00 c.example size=20\n");
        fs::write(&fx.log, appended.clone()).unwrap();
        let merged = fx
            .service
            .get_stats(None, &DateSelector::all(), true)
            .unwrap();

        // A second service with no cache rebuilds from scratch.
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("log")).unwrap();
        fs::write(dir.path().join("log").join("proxyd.log"), appended).unwrap();
        let config = Config::from_toml_str(&config_toml(dir.path())).unwrap();
        let mut rebuilt_service = StatsService::from_config(&config, "webproxy").unwrap();
        let rebuilt = rebuilt_service
            .get_stats(None, &DateSelector::all(), true)
            .unwrap();

        assert_eq!(merged, rebuilt);
    }

    #[test]
    fn shrunken_file_triggers_full_rebuild() {
        let mut fx = fixture(THREE_LINES);
        let _ = fx
            .service
            .get_stats(None, &DateSelector::all(), true)
            .unwrap();

        // Replaced with a shorter file, as after rotation.
        fs::write(&fx.log, "2024-05-03 00:00:01 fresh.example size=1\n").unwrap();
        let tree = fx
            .service
            .get_stats(None, &DateSelector::all(), true)
            .unwrap();

        assert!(!tree.date.contains_key("2024-05-01"));
        assert_eq!(tree.date["2024-05-03"].node.sum, 1);
    }

    #[test]
    fn unchanged_file_is_served_from_cache() {
        let mut fx = fixture(THREE_LINES);
        let first = fx
            .service
            .get_stats(None, &DateSelector::all(), true)
            .unwrap();

        // Corrupting the workspace copy proves the second request never
        // rescans it: the answer comes from the persisted record.
        let workfile = fx.service.select_log_file(None);
        fs::write(&workfile, "garbage\n").unwrap();
        // Restore the copy's role as cache key by not touching the original.

        let second = fx
            .service
            .get_stats(None, &DateSelector::all(), true)
            .unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn missing_source_fails_the_request() {
        let mut fx = fixture(THREE_LINES);
        fs::remove_file(&fx.log).unwrap();
        let err = fx
            .service
            .get_stats(None, &DateSelector::all(), true)
            .expect_err("missing source should fail");
        assert_eq!(err.code(), "LSH-2001");
    }

    #[test]
    fn date_selection_prunes_days() {
        let mut fx = fixture(
            "2024-04-30 23:59:59 a.example size=1\n\
             2024-05-01 10:00:00 a.example size=2\n",
        );
        let tree = fx
            .service
            .get_stats(None, &DateSelector::day("05", "01"), true)
            .unwrap();
        assert_eq!(tree.date.len(), 1);
        assert!(tree.date.contains_key("2024-05-01"));
    }

    #[test]
    fn all_stats_returns_tree_and_brief() {
        let mut fx = fixture(THREE_LINES);
        let (tree, brief) = fx.service.get_all_stats(None).unwrap();
        assert_eq!(tree.date["2024-05-01"].node.sum, 3);
        assert_eq!(brief["Date"]["2024-05-01"], 3);
        assert_eq!(brief["Host"]["a.example"], 2);
        assert_eq!(brief["Host"]["b.example"], 1);
    }

    #[test]
    fn scalar_counts_run_against_the_original() {
        let mut fx = fixture(
            "2024-05-01 10:05:00 a.example size=10 DENIED\n\
             2024-05-01 10:06:00 a.example size=20\n\
             2024-05-01 10:07:00 b.example size=30 DENIED\n",
        );
        let counts = fx.service.command_counts(None).unwrap();
        let denied = counts
            .iter()
            .find(|c| c.id == "Denied")
            .expect("Denied scalar");
        assert_eq!(denied.count, 2);
        assert_eq!(denied.title, "Denied requests");
    }

    #[test]
    fn select_log_file_returns_a_fresh_workspace_copy() {
        let mut fx = fixture(THREE_LINES);
        let selected = fx.service.select_log_file(None);
        assert!(selected.exists());
        assert_eq!(fs::read_to_string(&selected).unwrap(), THREE_LINES);
        assert_ne!(selected, fx.log);
    }

    #[test]
    fn select_log_file_falls_back_to_the_original_path() {
        let mut fx = fixture(THREE_LINES);
        fs::remove_file(&fx.log).unwrap();
        let selected = fx.service.select_log_file(None);
        assert_eq!(selected, fx.log);
    }
}
