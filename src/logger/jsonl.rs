//! Diagnostic event log: append-only line-delimited JSON.
//!
//! Statistics requests must degrade gracefully, never fail, because of
//! logging. Each event is serialized to a single line in memory and written
//! with one `write_all`, and the sink steps down a four-level chain when
//! writes stop working:
//! 1. Primary file path
//! 2. Fallback path (e.g. a RAM-backed location)
//! 3. stderr with an `[LSH-DIAG]` prefix
//! 4. Silent discard

#![allow(missing_docs)]

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};

use crate::core::config::DiagnosticsConfig;

/// Severity level for diagnostic events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

/// Engine event types recorded in the diagnostic log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    CacheMiss,
    RotationDetected,
    WorkspaceRefresh,
    StatsSaved,
    PersistFailure,
    LinesSkipped,
    TimeDefaulted,
    SupervisorAction,
    SupervisorTimeout,
    CommandCount,
    Error,
}

/// One diagnostic event — everything beyond `ts`/`event`/`severity` is
/// optional and omitted from the JSON when unset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagEvent {
    /// ISO 8601 UTC timestamp.
    pub ts: String,
    pub event: EventType,
    pub severity: Severity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub module: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    /// Total line count at the time of the event.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_count: Option<u64>,
    /// Newly appended lines folded by this pass.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_lines: Option<u64>,
    /// Lines skipped or defaulted during a fold pass.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skipped: Option<u64>,
    /// Supervised process name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub process: Option<String>,
    /// Whether the recorded action succeeded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ok: Option<bool>,
    /// LSH error code when the event records a failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl DiagEvent {
    /// Create a new event stamped with the current UTC time.
    pub fn new(event: EventType, severity: Severity) -> Self {
        Self {
            ts: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            event,
            severity,
            module: None,
            file: None,
            line_count: None,
            new_lines: None,
            skipped: None,
            process: None,
            ok: None,
            error_code: None,
            details: None,
        }
    }

    pub fn module(mut self, module: impl Into<String>) -> Self {
        self.module = Some(module.into());
        self
    }

    pub fn file(mut self, file: &Path) -> Self {
        self.file = Some(file.display().to_string());
        self
    }

    pub fn details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

/// Where events currently go.
enum Sink {
    /// An open log file, either the primary or the fallback path.
    LogFile {
        writer: BufWriter<File>,
        path: PathBuf,
        on_fallback: bool,
        written: u64,
    },
    Stderr,
    Discard,
}

/// Append-only diagnostic log with rotation and multi-level fallback.
pub struct DiagnosticsLog {
    config: DiagnosticsConfig,
    sink: Sink,
    last_fsync: SystemTime,
}

impl DiagnosticsLog {
    /// Open the diagnostic log, stepping down the chain as far as needed.
    pub fn open(config: DiagnosticsConfig) -> Self {
        let sink = file_sink(&config.jsonl_log, false)
            .or_else(|| {
                eprintln!("[LSH-DIAG] primary log path unusable, trying fallback");
                config
                    .fallback_log
                    .as_deref()
                    .and_then(|path| file_sink(path, true))
            })
            .unwrap_or(Sink::Stderr);
        Self {
            config,
            sink,
            last_fsync: SystemTime::now(),
        }
    }

    /// A log that drops every event; used where diagnostics are unwanted.
    pub fn disabled() -> Self {
        Self {
            config: DiagnosticsConfig::default(),
            sink: Sink::Discard,
            last_fsync: SystemTime::now(),
        }
    }

    /// Record one event as a single atomic JSONL line.
    pub fn record(&mut self, event: &DiagEvent) {
        match serde_json::to_string(event) {
            Ok(mut line) => {
                line.push('\n');
                self.write_line(&line);
            }
            Err(e) => eprintln!("[LSH-DIAG] serialize error: {e}"),
        }
    }

    /// Flush buffered lines.
    pub fn flush(&mut self) {
        if let Sink::LogFile { writer, .. } = &mut self.sink {
            let _ = writer.flush();
        }
    }

    /// Flush and sync the underlying file.
    pub fn fsync(&mut self) {
        if let Sink::LogFile { writer, .. } = &mut self.sink {
            let _ = writer.flush();
            let _ = writer.get_ref().sync_data();
        }
        self.last_fsync = SystemTime::now();
    }

    /// Current sink, for status reporting.
    pub fn state(&self) -> &'static str {
        match &self.sink {
            Sink::LogFile {
                on_fallback: false, ..
            } => "normal",
            Sink::LogFile {
                on_fallback: true, ..
            } => "fallback",
            Sink::Stderr => "stderr",
            Sink::Discard => "discard",
        }
    }

    // ──────────────────────── internals ────────────────────────

    fn write_line(&mut self, line: &str) {
        loop {
            match &mut self.sink {
                Sink::LogFile {
                    writer, written, ..
                } => {
                    // An oversize single line is written anyway; rotating an
                    // empty file would loop forever.
                    if *written > 0 && *written + line.len() as u64 > self.config.max_size_bytes {
                        self.rotate();
                        continue;
                    }
                    if writer.write_all(line.as_bytes()).is_ok() {
                        *written += line.len() as u64;
                        self.fsync_if_due();
                        return;
                    }
                    self.step_down();
                }
                Sink::Stderr => {
                    let _ = write!(io::stderr(), "[LSH-DIAG] {line}");
                    return;
                }
                Sink::Discard => return,
            }
        }
    }

    fn fsync_if_due(&mut self) {
        let due = SystemTime::now()
            .duration_since(self.last_fsync)
            .unwrap_or(Duration::ZERO)
            .as_secs()
            >= self.config.fsync_interval_secs;
        if due {
            self.fsync();
        }
    }

    /// Shift the current file to `.1` (pushing older rotations down, capped
    /// at `max_rotated_files`) and reopen it fresh.
    fn rotate(&mut self) {
        self.flush();
        let Sink::LogFile {
            path, on_fallback, ..
        } = &self.sink
        else {
            return;
        };
        let (path, on_fallback) = (path.clone(), *on_fallback);

        self.sink = Sink::Discard;
        let oldest = numbered(&path, self.config.max_rotated_files);
        let _ = fs::remove_file(&oldest);
        for index in (1..self.config.max_rotated_files).rev() {
            let _ = fs::rename(numbered(&path, index), numbered(&path, index + 1));
        }
        let _ = fs::rename(&path, numbered(&path, 1));

        match file_sink(&path, on_fallback) {
            Some(sink) => self.sink = sink,
            None if on_fallback => {
                eprintln!("[LSH-DIAG] fallback log failing, falling back to stderr");
                self.sink = Sink::Stderr;
            }
            None => {
                self.sink = self
                    .config
                    .fallback_log
                    .as_deref()
                    .and_then(|fallback| file_sink(fallback, true))
                    .unwrap_or_else(|| {
                        eprintln!("[LSH-DIAG] log writes failing, falling back to stderr");
                        Sink::Stderr
                    });
            }
        }
    }

    /// Drop to the next level of the chain.
    fn step_down(&mut self) {
        self.sink = match &self.sink {
            Sink::LogFile {
                on_fallback: false, ..
            } => self
                .config
                .fallback_log
                .as_deref()
                .and_then(|path| file_sink(path, true))
                .unwrap_or_else(|| {
                    eprintln!("[LSH-DIAG] log writes failing, falling back to stderr");
                    Sink::Stderr
                }),
            Sink::LogFile {
                on_fallback: true, ..
            } => {
                eprintln!("[LSH-DIAG] fallback log failing, falling back to stderr");
                Sink::Stderr
            }
            Sink::Stderr => Sink::Discard,
            Sink::Discard => Sink::Discard,
        };
    }
}

impl Drop for DiagnosticsLog {
    fn drop(&mut self) {
        self.flush();
    }
}

/// Open a path for appending, creating parent directories on demand.
fn file_sink(path: &Path, on_fallback: bool) -> Option<Sink> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).ok()?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .ok()?;
    let written = file.metadata().map(|m| m.len()).unwrap_or(0);
    Some(Sink::LogFile {
        writer: BufWriter::with_capacity(64 * 1024, file),
        path: path.to_path_buf(),
        on_fallback,
        written,
    })
}

fn numbered(base: &Path, index: u32) -> PathBuf {
    let mut name = base.as_os_str().to_os_string();
    name.push(format!(".{index}"));
    PathBuf::from(name)
}
