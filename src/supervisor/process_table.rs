//! OS process table capability: list matching daemon processes, issue start
//! commands, and deliver termination signals.
//!
//! The supervisor's retry state machine only ever talks to the
//! [`ProcessTable`] trait, so it is testable against a fake without spawning
//! real processes. The ps(1)-backed implementation parses the thirteen fixed
//! columns and filters out terminal-attached processes and the helper
//! commands this tool itself runs.

#![allow(missing_docs)]

use std::process::Command;

use regex::Regex;

use crate::core::errors::{LshError, Result};

/// One row of the process table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessRow {
    pub pid: u32,
    pub start_time: String,
    pub cpu_pct: String,
    pub cpu_time: String,
    pub mem_pct: String,
    pub rss: u64,
    pub vsz: u64,
    pub state: String,
    pub priority: String,
    pub nice: String,
    pub tty: String,
    pub user: String,
    pub group: String,
    pub command: String,
}

/// Capability the supervisor is built on.
pub trait ProcessTable {
    /// Daemon processes whose command matches `name_filter` (a regex) and,
    /// when non-empty, whose user equals `user_filter`.
    fn list(&mut self, name_filter: &str, user_filter: &str) -> Result<Vec<ProcessRow>>;

    /// Issue the start command once; returns its captured output.
    fn start(&mut self, command: &str) -> String;

    /// Deliver a termination signal to every matching process; returns
    /// captured diagnostics.
    fn terminate(&mut self, name_filter: &str, user_filter: &str) -> String;
}

/// Commands this tool runs on its own behalf; their rows must never count
/// as the supervised daemon being alive.
const HELPER_PATTERN: &str = r"\b(lsh|grep|kill|pkill)\b";

const PS_COLUMNS: &str = "pid,start,%cpu,time,%mem,rss,vsz,stat,pri,nice,tty,user,group,command";

/// ps(1)-backed process table.
#[cfg(unix)]
#[derive(Debug)]
pub struct PsProcessTable {
    helper: Regex,
}

#[cfg(unix)]
impl Default for PsProcessTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(unix)]
impl PsProcessTable {
    #[must_use]
    pub fn new() -> Self {
        Self {
            helper: Regex::new(HELPER_PATTERN).expect("helper pattern is a valid literal"),
        }
    }
}

#[cfg(unix)]
impl ProcessTable for PsProcessTable {
    fn list(&mut self, name_filter: &str, user_filter: &str) -> Result<Vec<ProcessRow>> {
        let name = Regex::new(name_filter).map_err(|error| LshError::ProcessTable {
            details: format!("name filter {name_filter:?}: {error}"),
        })?;

        let output = Command::new("ps")
            .args(["axww", "-o", PS_COLUMNS])
            .output()
            .map_err(|error| LshError::ProcessTable {
                details: format!("ps: {error}"),
            })?;
        if !output.status.success() {
            return Err(LshError::ProcessTable {
                details: format!(
                    "ps exited {}: {}",
                    output.status.code().unwrap_or(-1),
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }

        let raw = String::from_utf8_lossy(&output.stdout);
        Ok(select_rows(&raw, &name, user_filter, &self.helper))
    }

    fn start(&mut self, command: &str) -> String {
        match Command::new("/bin/sh").args(["-c", command]).output() {
            Ok(output) => {
                let mut captured = String::from_utf8_lossy(&output.stdout).into_owned();
                captured.push_str(&String::from_utf8_lossy(&output.stderr));
                captured.trim().to_string()
            }
            Err(error) => format!("failed to run start command: {error}"),
        }
    }

    fn terminate(&mut self, name_filter: &str, user_filter: &str) -> String {
        use nix::sys::signal::{Signal, kill};
        use nix::unistd::Pid;

        let rows = match self.list(name_filter, user_filter) {
            Ok(rows) => rows,
            Err(error) => return error.to_string(),
        };

        let mut diagnostics = String::new();
        for row in rows {
            let pid = Pid::from_raw(i32::try_from(row.pid).unwrap_or(i32::MAX));
            if let Err(errno) = kill(pid, Signal::SIGTERM) {
                diagnostics.push_str(&format!("kill {}: {errno}\n", row.pid));
            }
        }
        diagnostics.trim().to_string()
    }
}

/// Select daemon rows from raw ps output.
///
/// Terminal-attached processes (vi, tail, man, the ps invocation itself) are
/// skipped, as are this tool's own helper commands.
fn select_rows(
    raw: &str,
    name_filter: &Regex,
    user_filter: &str,
    helper: &Regex,
) -> Vec<ProcessRow> {
    raw.lines()
        .skip(1)
        .filter_map(parse_row)
        .filter(|row| row.tty.starts_with('?'))
        .filter(|row| user_filter.is_empty() || row.user == user_filter)
        .filter(|row| name_filter.is_match(&row.command))
        .filter(|row| !helper.is_match(&row.command))
        .collect()
}

/// Parse one ps output line: thirteen whitespace-separated columns, then the
/// command with its embedded spaces preserved.
fn parse_row(line: &str) -> Option<ProcessRow> {
    let mut rest = line.trim_start();
    let mut columns = Vec::with_capacity(13);
    for _ in 0..13 {
        let end = rest.find(char::is_whitespace)?;
        columns.push(&rest[..end]);
        rest = rest[end..].trim_start();
    }
    if rest.is_empty() {
        return None;
    }

    Some(ProcessRow {
        pid: columns[0].parse().ok()?,
        start_time: columns[1].to_string(),
        cpu_pct: columns[2].to_string(),
        cpu_time: columns[3].to_string(),
        mem_pct: columns[4].to_string(),
        rss: columns[5].parse().ok()?,
        vsz: columns[6].parse().ok()?,
        state: columns[7].to_string(),
        priority: columns[8].to_string(),
        nice: columns[9].to_string(),
        tty: columns[10].to_string(),
        user: columns[11].to_string(),
        group: columns[12].to_string(),
        command: rest.to_string(),
    })
}
