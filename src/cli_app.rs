//! Top-level CLI definition and dispatch.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use colored::{Colorize, control};
use serde_json::json;

use log_stats_helper::core::config::Config;
use log_stats_helper::core::errors::Result;
use log_stats_helper::logfile::catalog::StartDate;
use log_stats_helper::stats::filter::DateSelector;
use log_stats_helper::stats::service::StatsService;
use log_stats_helper::stats::tree::StatsTree;
use log_stats_helper::supervisor::control::ProcessSupervisor;
use log_stats_helper::supervisor::process_table::PsProcessTable;

/// Log Stats Helper — cached day/hour/minute statistics over daemon logs.
#[derive(Debug, Parser)]
#[command(
    name = "lsh",
    author,
    version,
    about = "Log Stats Helper - incremental log statistics",
    long_about = None,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Override config file path.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Force JSON output mode.
    #[arg(long, global = true)]
    json: bool,
    /// Disable colored output.
    #[arg(long, global = true)]
    no_color: bool,
    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Show the day/hour statistics tree for a module's log.
    Stats(StatsArgs),
    /// Show the full tree plus brief tallies.
    AllStats(TargetArgs),
    /// List a module's log files with start dates.
    Logs(ModuleArgs),
    /// Evaluate the configured scalar counting stats.
    Counts(TargetArgs),
    /// Probe whether the module's daemon is running.
    Status(ModuleArgs),
    /// Start the module's daemon and wait for liveness.
    Start(ModuleArgs),
    /// Stop the module's daemon and wait for exit.
    Stop(ModuleArgs),
}

#[derive(Debug, Clone, Args)]
struct ModuleArgs {
    /// Module name from the configuration.
    module: String,
}

#[derive(Debug, Clone, Args)]
struct TargetArgs {
    /// Module name from the configuration.
    module: String,
    /// Log file to inspect instead of the active one.
    #[arg(long, value_name = "PATH")]
    file: Option<PathBuf>,
}

#[derive(Debug, Clone, Args)]
struct StatsArgs {
    /// Module name from the configuration.
    module: String,
    /// Log file to inspect instead of the active one.
    #[arg(long, value_name = "PATH")]
    file: Option<PathBuf>,
    /// Month selector (01-12); empty selects all months.
    #[arg(long, default_value = "")]
    month: String,
    /// Day selector (01-31); needs --month.
    #[arg(long, default_value = "")]
    day: String,
    /// Hour selector (00-23).
    #[arg(long, default_value = "")]
    hour: String,
    /// Include hourly granularity in the output.
    #[arg(long)]
    hours: bool,
}

/// Dispatch a parsed command line.
pub fn run(args: &Cli) -> Result<()> {
    if args.no_color {
        control::set_override(false);
    }

    let config = Config::load(args.config.as_deref())?;

    match &args.command {
        Command::Stats(cmd) => run_stats(&config, cmd, args.json),
        Command::AllStats(cmd) => run_all_stats(&config, cmd, args.json),
        Command::Logs(cmd) => run_logs(&config, cmd, args.json),
        Command::Counts(cmd) => run_counts(&config, cmd, args.json),
        Command::Status(cmd) => run_status(&config, cmd, args.json),
        Command::Start(cmd) => run_start(&config, cmd),
        Command::Stop(cmd) => run_stop(&config, cmd),
    }
}

fn run_stats(config: &Config, cmd: &StatsArgs, json: bool) -> Result<()> {
    let mut service = StatsService::from_config(config, &cmd.module)?;
    let selector = DateSelector {
        month: cmd.month.clone(),
        day: cmd.day.clone(),
        hour: cmd.hour.clone(),
    };
    let collect_hours = cmd.hours || !selector.is_range();
    let tree = service.get_stats(cmd.file.as_deref(), &selector, collect_hours)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&tree)?);
    } else {
        print_tree(&tree, collect_hours);
    }
    Ok(())
}

fn run_all_stats(config: &Config, cmd: &TargetArgs, json: bool) -> Result<()> {
    let mut service = StatsService::from_config(config, &cmd.module)?;
    let (tree, brief) = service.get_all_stats(cmd.file.as_deref())?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({ "stats": tree, "briefstats": brief }))?
        );
        return Ok(());
    }

    print_tree(&tree, true);
    for (field, tallies) in &brief {
        println!("{}", field.bold());
        for (value, count) in tallies {
            println!("  {value:<40} {count}");
        }
    }
    Ok(())
}

fn run_logs(config: &Config, cmd: &ModuleArgs, json: bool) -> Result<()> {
    let service = StatsService::from_config(config, &cmd.module)?;
    let entries = service.log_files()?;

    if json {
        let rows: Vec<serde_json::Value> = entries
            .iter()
            .map(|entry| {
                json!({
                    "file": entry.file.display().to_string(),
                    "start": start_date_label(&entry.start),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    for entry in &entries {
        let name = entry
            .file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        println!("{name:<32} {}", start_date_label(&entry.start).dimmed());
    }
    Ok(())
}

fn run_counts(config: &Config, cmd: &TargetArgs, json: bool) -> Result<()> {
    let mut service = StatsService::from_config(config, &cmd.module)?;
    let counts = service.command_counts(cmd.file.as_deref())?;

    if json {
        let rows: Vec<serde_json::Value> = counts
            .iter()
            .map(|c| json!({ "id": c.id, "title": c.title, "count": c.count }))
            .collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    for count in &counts {
        println!("{:<40} {}", count.title, count.count.to_string().bold());
    }
    Ok(())
}

fn run_status(config: &Config, cmd: &ModuleArgs, json: bool) -> Result<()> {
    let mut supervisor = build_supervisor(config, &cmd.module)?;
    let running = supervisor.probe(None);

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({
                "module": cmd.module,
                "running": running,
                "state": supervisor.state().as_str(),
            }))?
        );
    } else if running {
        println!("{}: {}", cmd.module, "running".green());
    } else {
        println!("{}: {}", cmd.module, "stopped".red());
    }
    Ok(())
}

fn run_start(config: &Config, cmd: &ModuleArgs) -> Result<()> {
    let mut supervisor = build_supervisor(config, &cmd.module)?;
    supervisor.start()?;
    println!("{}: {}", cmd.module, "running".green());
    Ok(())
}

fn run_stop(config: &Config, cmd: &ModuleArgs) -> Result<()> {
    let mut supervisor = build_supervisor(config, &cmd.module)?;
    supervisor.stop()?;
    println!("{}: {}", cmd.module, "stopped".red());
    Ok(())
}

fn build_supervisor(
    config: &Config,
    module: &str,
) -> Result<ProcessSupervisor<PsProcessTable>> {
    let module_config = config.module(module)?;
    Ok(ProcessSupervisor::new(
        PsProcessTable::new(),
        config.supervisor,
        module_config.process.clone(),
        module_config.user.clone(),
        module_config.start_cmd.clone(),
    ))
}

fn print_tree(tree: &StatsTree, with_hours: bool) {
    for (date, day) in &tree.date {
        println!("{} {}", date.bold(), day.node.sum);
        for (id, stat) in &day.stats {
            println!("  {id:<24} {}", stat.sum);
        }
        if with_hours {
            for (hour, hour_stats) in &day.hours {
                println!("  {}:00 {}", hour.dimmed(), hour_stats.node.sum);
                for (id, stat) in &hour_stats.stats {
                    println!("    {id:<22} {}", stat.sum);
                }
            }
        }
    }
}

fn start_date_label(start: &StartDate) -> String {
    match start {
        StartDate::Timestamp(ts) => ts.clone(),
        StartDate::Compressed => "(compressed)".to_string(),
        StartDate::Unknown => "(unknown)".to_string(),
    }
}
