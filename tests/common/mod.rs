//! Shared fixtures for the integration suites.

#![allow(dead_code)]

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use flate2::Compression;
use flate2::write::GzEncoder;

use log_stats_helper::core::config::Config;
use log_stats_helper::stats::service::StatsService;

/// Access-log style line pattern shared by the integration scenarios.
pub const LINE_PATTERN: &str = r"^(?P<Date>\d{4}-\d{2}-\d{2}) (?P<Time>\d{2}:\d{2}:\d{2}) (?P<Host>\S+) size=(?P<Size>\d+)(?P<Rest>.*)$";

/// A module rooted in a temp directory: canonical log dir, workspace,
/// cache, and diagnostics all under one root.
pub struct TestEnv {
    pub dir: tempfile::TempDir,
    pub log: PathBuf,
    pub config: Config,
}

impl TestEnv {
    /// Build the environment with the given initial active-log content.
    pub fn new(initial_log: &str) -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        let root = dir.path();
        fs::create_dir_all(root.join("log")).expect("create log dir");
        let log = root.join("log").join("proxyd.log");
        fs::write(&log, initial_log).expect("write initial log");

        let config = Config::from_toml_str(&config_toml(root)).expect("parse test config");
        Self { dir, log, config }
    }

    /// A fresh service over the environment's module.
    pub fn service(&self) -> StatsService {
        StatsService::from_config(&self.config, "webproxy").expect("build service")
    }

    /// Append raw content to the active log.
    pub fn append(&self, content: &str) {
        let mut file = fs::OpenOptions::new()
            .append(true)
            .open(&self.log)
            .expect("open log for append");
        file.write_all(content.as_bytes()).expect("append to log");
    }

    /// Replace the active log wholesale, as a rotation would.
    pub fn replace(&self, content: &str) {
        fs::write(&self.log, content).expect("replace log");
    }

    /// Write a compressed archive next to the active log.
    pub fn write_archive(&self, name: &str, content: &str) -> PathBuf {
        let path = self.log.parent().unwrap().join(name);
        write_gz(&path, content);
        path
    }
}

/// Render the test configuration for a given root directory.
pub fn config_toml(root: &Path) -> String {
    format!(
        r#"
        [supervisor]
        max_iterations = 5
        poll_interval_ms = 1

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
        line_pattern = '{LINE_PATTERN}'

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

/// Gzip `content` into `path`.
pub fn write_gz(path: &Path, content: &str) {
    let mut encoder = GzEncoder::new(
        File::create(path).expect("create archive"),
        Compression::default(),
    );
    encoder
        .write_all(content.as_bytes())
        .expect("write archive");
    encoder.finish().expect("finish archive");
}
