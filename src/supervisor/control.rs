//! Bounded-retry start/stop state machine over a [`ProcessTable`].
//!
//! Start issues the underlying action once, then polls liveness; Stop
//! re-issues the termination signal on every iteration, tolerating daemons
//! that need repeated signals or several cycles to exit. Both poll up to a
//! fixed iteration budget with a fixed sleep between polls, take one final
//! probe to account for the last sleep, and surface the captured output of
//! the last attempted action when they fail.

use std::thread;
use std::time::Duration;

use crate::core::config::SupervisorConfig;
use crate::core::errors::{LshError, Result};
use crate::supervisor::process_table::ProcessTable;

/// Lifecycle state of the supervised daemon as last observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum ServiceState {
    Stopped,
    Starting,
    Running,
    Stopping,
}

impl ServiceState {
    /// Stable label for status output.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Stopped => "stopped",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Stopping => "stopping",
        }
    }
}

/// Supervises one daemon through a [`ProcessTable`].
pub struct ProcessSupervisor<T: ProcessTable> {
    table: T,
    config: SupervisorConfig,
    process: String,
    user: String,
    start_cmd: String,
    state: ServiceState,
}

impl<T: ProcessTable> ProcessSupervisor<T> {
    /// Create a supervisor for one daemon.
    pub fn new(
        table: T,
        config: SupervisorConfig,
        process: impl Into<String>,
        user: impl Into<String>,
        start_cmd: impl Into<String>,
    ) -> Self {
        Self {
            table,
            config,
            process: process.into(),
            user: user.into(),
            start_cmd: start_cmd.into(),
            state: ServiceState::Stopped,
        }
    }

    /// Last observed lifecycle state.
    #[must_use]
    pub fn state(&self) -> ServiceState {
        self.state
    }

    /// The underlying process table (used by tests to observe a fake).
    #[must_use]
    pub fn table(&self) -> &T {
        &self.table
    }

    /// Whether any matching daemon process is currently alive. Probing a
    /// different process name than the configured one is allowed.
    pub fn probe(&mut self, process: Option<&str>) -> bool {
        let name = process.unwrap_or(&self.process).to_string();
        let alive = self
            .table
            .list(&name, &self.user)
            .map(|rows| !rows.is_empty())
            .unwrap_or(false);
        if process.is_none() {
            self.state = if alive {
                ServiceState::Running
            } else {
                ServiceState::Stopped
            };
        }
        alive
    }

    /// Issue the start command once and poll until the daemon is observed
    /// running, up to the retry budget.
    pub fn start(&mut self) -> Result<()> {
        self.state = ServiceState::Starting;
        let output = self.table.start(&self.start_cmd);

        for _ in 0..self.config.max_iterations {
            if self.is_alive() {
                self.state = ServiceState::Running;
                return Ok(());
            }
            self.sleep_interval();
        }

        // One more probe: the last sleep may have been the one that let the
        // daemon come up.
        if self.is_alive() {
            self.state = ServiceState::Running;
            return Ok(());
        }

        self.state = ServiceState::Stopped;
        Err(LshError::SupervisorTimeout {
            process: self.process.clone(),
            action: "start",
            diagnostic: output,
        })
    }

    /// Stop the configured daemon.
    pub fn stop(&mut self) -> Result<()> {
        let process = self.process.clone();
        self.terminate(&process)
    }

    /// Terminate the named process(es), re-signaling on every iteration
    /// until they are gone or the budget runs out.
    pub fn terminate(&mut self, process: &str) -> Result<()> {
        self.state = ServiceState::Stopping;
        let mut output = String::new();

        for _ in 0..self.config.max_iterations {
            if !self.is_named_alive(process) {
                self.state = ServiceState::Stopped;
                return Ok(());
            }
            output = self.table.terminate(process, &self.user);
            self.sleep_interval();
        }

        if !self.is_named_alive(process) {
            self.state = ServiceState::Stopped;
            return Ok(());
        }

        self.state = ServiceState::Running;
        Err(LshError::SupervisorTimeout {
            process: process.to_string(),
            action: "stop",
            diagnostic: output,
        })
    }

    fn is_alive(&mut self) -> bool {
        let process = self.process.clone();
        self.is_named_alive(&process)
    }

    fn is_named_alive(&mut self, process: &str) -> bool {
        self.table
            .list(process, &self.user)
            .map(|rows| !rows.is_empty())
            .unwrap_or(false)
    }

    fn sleep_interval(&self) {
        thread::sleep(Duration::from_millis(self.config.poll_interval_ms));
    }
}
