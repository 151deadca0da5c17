//! Compilation of the per-module statistics definitions into rule lists.
//!
//! The configuration surface is declarative (`cmd`, `needle`, `title`,
//! `nvps`, `counters`, `brief_stats` per stat name). Compiling it up front
//! turns every `needle` into a compiled regex exactly once — the aggregator
//! never compiles patterns per line — and flattens counters and brief fields
//! into ordered rule lists the fold loop can walk directly.

use std::collections::BTreeMap;

use regex::Regex;

use crate::core::config::StatDef;
use crate::core::errors::{LshError, Result};

/// A numeric counter: sums `source_field`, broken down by `breakdowns`.
#[derive(Debug, Clone)]
pub struct CounterRule {
    pub id: String,
    pub source_field: String,
    pub breakdowns: Vec<String>,
}

/// A keyword matcher: counts raw lines matching `pattern`.
#[derive(Debug, Clone)]
pub struct MatcherRule {
    pub id: String,
    pub pattern: Regex,
    pub breakdowns: Vec<String>,
}

/// A scalar stat computed outside the per-line scan: an external command,
/// a pattern over the log file, or both (pattern filters the command output).
#[derive(Debug, Clone)]
pub struct CommandRule {
    pub id: String,
    pub title: String,
    pub command: Option<String>,
    pub pattern: Option<Regex>,
}

/// Compiled statistics definition for one module.
#[derive(Debug, Clone, Default)]
pub struct StatsCatalog {
    pub counters: Vec<CounterRule>,
    pub matchers: Vec<MatcherRule>,
    /// Brief tally fields; `Date` is always present.
    pub brief_fields: Vec<String>,
    pub commands: Vec<CommandRule>,
}

impl StatsCatalog {
    /// Compile a module's stat definitions. Invalid needle patterns are
    /// configuration errors, caught here rather than mid-aggregation.
    pub fn compile(stats: &BTreeMap<String, StatDef>) -> Result<Self> {
        let mut catalog = Self {
            brief_fields: vec!["Date".to_string()],
            ..Self::default()
        };

        for (id, def) in stats {
            for (counter_id, counter) in &def.counters {
                catalog.counters.push(CounterRule {
                    id: counter_id.clone(),
                    source_field: counter.field.clone(),
                    breakdowns: counter.nvps.iter().map(|nvp| nvp.field.clone()).collect(),
                });
            }

            let pattern = def
                .needle
                .as_deref()
                .map(|needle| compile_needle(id, needle))
                .transpose()?;

            if let Some(pattern) = &pattern {
                catalog.matchers.push(MatcherRule {
                    id: id.clone(),
                    pattern: pattern.clone(),
                    breakdowns: def.nvps.iter().map(|nvp| nvp.field.clone()).collect(),
                });
            }

            if def.cmd.is_some() || pattern.is_some() {
                catalog.commands.push(CommandRule {
                    id: id.clone(),
                    title: def.title.clone().unwrap_or_else(|| id.clone()),
                    command: def.cmd.clone(),
                    pattern,
                });
            }

            for nvp in &def.brief_stats {
                if !catalog.brief_fields.contains(&nvp.field) {
                    catalog.brief_fields.push(nvp.field.clone());
                }
            }
        }

        Ok(catalog)
    }
}

fn compile_needle(id: &str, needle: &str) -> Result<Regex> {
    Regex::new(needle).map_err(|error| LshError::InvalidConfig {
        details: format!("stats.{id}.needle {needle:?}: {error}"),
    })
}
