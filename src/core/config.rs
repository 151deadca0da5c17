//! Configuration system: TOML file + env var overrides + smart defaults.
//!
//! Each monitored daemon is a `[modules.<name>]` section carrying its log
//! file, process identity, start command, line pattern, and statistics
//! definitions. The statistics surface per stat name: `cmd`, `needle`,
//! `title`, `nvps`, `counters`, `brief_stats`.

#![allow(missing_docs)]

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::errors::{LshError, Result};

/// Full configuration model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct Config {
    pub paths: PathsConfig,
    pub supervisor: SupervisorConfig,
    pub diagnostics: DiagnosticsConfig,
    pub modules: BTreeMap<String, ModuleConfig>,
}

/// Filesystem roots used by the engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PathsConfig {
    pub config_file: PathBuf,
    /// Per-module workspace copies live under `<workspace_dir>/<module>/`.
    pub workspace_dir: PathBuf,
    /// Per-module cache artifacts live under `<cache_dir>/<module>/`.
    pub cache_dir: PathBuf,
}

/// Bounded-retry budget for process start/stop polling.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SupervisorConfig {
    pub max_iterations: u32,
    pub poll_interval_ms: u64,
}

/// Diagnostic JSONL log tuning.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DiagnosticsConfig {
    pub jsonl_log: PathBuf,
    pub fallback_log: Option<PathBuf>,
    pub max_size_bytes: u64,
    pub max_rotated_files: u32,
    pub fsync_interval_secs: u64,
}

/// One monitored daemon: its log, its process identity, and what to count.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct ModuleConfig {
    /// Active log file in the canonical log directory.
    pub log_file: PathBuf,
    /// Process name used for liveness probes and termination.
    pub process: String,
    /// Daemon user the process rows must match.
    pub user: String,
    /// Shell command that starts the daemon.
    pub start_cmd: String,
    /// Named-capture regex turning a raw line into a field map. Must bind at
    /// least `Date` and `Time`.
    pub line_pattern: String,
    /// Statistics definitions keyed by stat name.
    pub stats: BTreeMap<String, StatDef>,
}

/// One named statistic definition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct StatDef {
    /// External counting command producing the line set (scalar stats only).
    pub cmd: Option<String>,
    /// Pattern over the raw line text; presence makes this a keyword matcher.
    pub needle: Option<String>,
    /// Display label.
    pub title: Option<String>,
    /// Ordered breakdown dimensions: field name → display label.
    pub nvps: Vec<Nvp>,
    /// Numeric counters keyed by counter name.
    pub counters: BTreeMap<String, CounterDef>,
    /// Fields to tally flatly across the whole file.
    pub brief_stats: Vec<Nvp>,
}

/// A numeric counter summing one source field.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct CounterDef {
    /// Log record field whose numeric value is summed.
    pub field: String,
    /// Display label.
    pub title: Option<String>,
    /// Ordered breakdown dimensions for this counter.
    pub nvps: Vec<Nvp>,
}

/// A breakdown dimension: field name plus its display label.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Nvp {
    pub field: String,
    pub title: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            config_file: PathBuf::from("/etc/lsh/config.toml"),
            workspace_dir: PathBuf::from("/var/tmp/lsh/logs"),
            cache_dir: PathBuf::from("/var/tmp/lsh/stats"),
        }
    }
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            poll_interval_ms: 100,
        }
    }
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            jsonl_log: PathBuf::from("/var/tmp/lsh/diagnostics.jsonl"),
            fallback_log: Some(PathBuf::from("/dev/shm/lsh.jsonl")),
            max_size_bytes: 50 * 1024 * 1024,
            max_rotated_files: 3,
            fsync_interval_secs: 10,
        }
    }
}

impl Config {
    /// Workspace directory holding one module's log copies.
    #[must_use]
    pub fn module_workspace_dir(&self, module: &str) -> PathBuf {
        self.paths.workspace_dir.join(module)
    }

    /// Cache directory holding one module's stats artifacts.
    #[must_use]
    pub fn module_cache_dir(&self, module: &str) -> PathBuf {
        self.paths.cache_dir.join(module)
    }

    /// Default configuration path.
    #[must_use]
    pub fn default_path() -> PathBuf {
        env::var_os("LSH_CONFIG").map_or_else(|| PathsConfig::default().config_file, PathBuf::from)
    }

    /// Load config from default or explicit path, then apply env overrides.
    ///
    /// A missing file is only an error when the path was explicit; the
    /// default path falls back to built-in defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path_buf = path.map_or_else(Self::default_path, Path::to_path_buf);
        let is_explicit_path = path.is_some();

        let mut cfg = if path_buf.exists() {
            let raw = fs::read_to_string(&path_buf)
                .map_err(|source| LshError::io(&path_buf, source))?;
            toml::from_str::<Self>(&raw)?
        } else if is_explicit_path {
            return Err(LshError::MissingConfig { path: path_buf });
        } else {
            Self::default()
        };

        cfg.paths.config_file = path_buf;
        cfg.apply_env_overrides();
        cfg.validate()?;
        Ok(cfg)
    }

    /// Parse a config from TOML text (used by tests and embedded callers).
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let cfg: Self = toml::from_str(raw)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Look up a module definition by name.
    pub fn module(&self, name: &str) -> Result<&ModuleConfig> {
        self.modules
            .get(name)
            .ok_or_else(|| LshError::UnknownModule {
                name: name.to_string(),
            })
    }

    fn apply_env_overrides(&mut self) {
        if let Some(raw) = env_var("LSH_WORKSPACE_DIR") {
            self.paths.workspace_dir = PathBuf::from(raw);
        }
        if let Some(raw) = env_var("LSH_CACHE_DIR") {
            self.paths.cache_dir = PathBuf::from(raw);
        }
        if let Some(raw) = env_var("LSH_JSONL_LOG") {
            self.diagnostics.jsonl_log = PathBuf::from(raw);
        }
    }

    fn validate(&self) -> Result<()> {
        if self.supervisor.max_iterations == 0 {
            return Err(LshError::InvalidConfig {
                details: "supervisor.max_iterations must be >= 1".to_string(),
            });
        }
        if self.supervisor.poll_interval_ms == 0 {
            return Err(LshError::InvalidConfig {
                details: "supervisor.poll_interval_ms must be >= 1".to_string(),
            });
        }
        if self.diagnostics.max_size_bytes == 0 {
            return Err(LshError::InvalidConfig {
                details: "diagnostics.max_size_bytes must be > 0".to_string(),
            });
        }

        for (name, module) in &self.modules {
            if module.log_file.as_os_str().is_empty() {
                return Err(LshError::InvalidConfig {
                    details: format!("modules.{name}.log_file must be set"),
                });
            }
            if module.process.is_empty() {
                return Err(LshError::InvalidConfig {
                    details: format!("modules.{name}.process must be set"),
                });
            }
            if module.line_pattern.is_empty() {
                return Err(LshError::InvalidConfig {
                    details: format!("modules.{name}.line_pattern must be set"),
                });
            }
            for (stat, def) in &module.stats {
                let collects_nothing = def.cmd.is_none()
                    && def.needle.is_none()
                    && def.counters.is_empty()
                    && def.brief_stats.is_empty();
                if collects_nothing {
                    return Err(LshError::InvalidConfig {
                        details: format!(
                            "modules.{name}.stats.{stat} defines nothing to collect \
                             (needs cmd, needle, counters, or brief_stats)"
                        ),
                    });
                }
                for (counter, cdef) in &def.counters {
                    if cdef.field.is_empty() {
                        return Err(LshError::InvalidConfig {
                            details: format!(
                                "modules.{name}.stats.{stat}.counters.{counter}.field must be set"
                            ),
                        });
                    }
                }
            }
        }
        Ok(())
    }
}

fn env_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|raw| !raw.trim().is_empty())
}
