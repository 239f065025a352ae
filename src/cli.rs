//! Command-line interface module for pctidy.
//!
//! This module handles all CLI-related functionality including:
//! - Argument parsing (clap derive)
//! - Layering flags over the loaded configuration
//! - Confirming temp cleanup
//! - One-shot and scheduled runs
//! - Summary output

use crate::action_log::{FanoutSink, JsonLinesSink, TracingSink};
use crate::config::AppConfig;
use crate::maintenance::{Maintenance, MaintenanceOptions, PassOrder, RunSummary};
use crate::output::OutputFormatter;
use crate::scheduler::Scheduler;
use clap::{ArgGroup, Parser};
use std::io::{self, BufRead, IsTerminal, Write};
use std::path::PathBuf;
use std::time::Duration;

/// Organize a directory by file type, remove duplicate files and clean temp folders.
#[derive(Parser, Debug, Clone)]
#[command(name = "pctidy", version, about)]
#[command(group(
    ArgGroup::new("target")
        .required(true)
        .multiple(true)
        .args(["directory", "clean_temp"])
))]
pub struct Cli {
    /// Directory to organize
    #[arg(short = 'd', long, value_name = "DIR")]
    pub directory: Option<PathBuf>,

    /// Delete files whose content duplicates another file in the directory
    #[arg(long, requires = "directory")]
    pub delete_duplicates: bool,

    /// Delete files from the configured temp locations
    #[arg(long)]
    pub clean_temp: bool,

    /// Keep running on a fixed interval instead of once
    #[arg(long)]
    pub schedule: bool,

    /// Hours between scheduled runs (default from config, 24)
    #[arg(long, value_name = "HOURS", requires = "schedule")]
    pub interval_hours: Option<u64>,

    /// Stop after this many scheduled runs
    #[arg(long, value_name = "N", requires = "schedule")]
    pub max_runs: Option<usize>,

    /// Show what would happen without touching any file
    #[arg(long)]
    pub dry_run: bool,

    /// Also organize files in subdirectories
    #[arg(short, long)]
    pub recursive: bool,

    /// Remove duplicates before organizing
    #[arg(long)]
    pub dedupe_first: bool,

    /// Configuration file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Do not ask before cleaning temp locations
    #[arg(short = 'y', long)]
    pub yes: bool,

    /// Append one JSON record per action to this file
    #[arg(long, value_name = "FILE")]
    pub action_log: Option<PathBuf>,

    /// Diagnostic log file (default pc_cleaner.log)
    #[arg(long, value_name = "FILE")]
    pub log_file: Option<PathBuf>,
}

impl Cli {
    /// Loads the configuration and applies the flags that override it.
    pub fn load_config(&self) -> Result<AppConfig, String> {
        let mut config = AppConfig::load(self.config.as_deref())
            .map_err(|e| format!("Error loading configuration: {}", e))?;

        if self.recursive {
            config.organize.recursive = true;
        }
        if self.dedupe_first {
            config.run.order = PassOrder::DedupeFirst;
        }
        if let Some(hours) = self.interval_hours {
            config.schedule.interval_hours = hours;
        }
        if let Some(log_file) = &self.log_file {
            config.logging.log_file = log_file.clone();
        }
        if let Some(action_log) = &self.action_log {
            config.logging.action_log = Some(action_log.clone());
        }

        config
            .validate()
            .map_err(|e| format!("Invalid configuration: {}", e))?;
        Ok(config)
    }

    /// Which passes run, derived from the flags on top of the configuration.
    pub fn maintenance_options(&self, config: &AppConfig) -> MaintenanceOptions {
        MaintenanceOptions {
            organize: self.directory.is_some(),
            delete_duplicates: self.delete_duplicates,
            clean_temp: self.clean_temp,
            dry_run: self.dry_run,
            ..MaintenanceOptions::from_config(config)
        }
    }
}

/// Loads the configuration named by `cli` and runs it.
///
/// # Examples
///
/// ```no_run
/// use clap::Parser;
/// use pctidy::cli::{Cli, run_cli};
///
/// let cli = Cli::parse_from(["pctidy", "-d", "/home/me/Downloads", "--dry-run"]);
/// match run_cli(&cli) {
///     Ok(summary) => println!("{} files would move", summary.files_moved),
///     Err(e) => eprintln!("Error: {}", e),
/// }
/// ```
pub fn run_cli(cli: &Cli) -> Result<RunSummary, String> {
    let config = cli.load_config()?;
    run_with_config(cli, &config)
}

/// Runs once, or on a schedule, with an already loaded configuration.
///
/// Returns the summary of the last completed run. Only configuration and
/// target problems are errors; per-file failures are counted in the summary.
pub fn run_with_config(cli: &Cli, config: &AppConfig) -> Result<RunSummary, String> {
    let mut options = cli.maintenance_options(config);

    if options.clean_temp && !options.dry_run && !cli.yes {
        let prompt = format!(
            "Delete everything inside {}?",
            options
                .temp_locations
                .iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        );
        let confirmed = prompt_confirm(&prompt, Some(false))
            .map_err(|e| format!("Failed to read confirmation: {}", e))?;
        if !confirmed {
            OutputFormatter::warning("Temp cleanup cancelled");
            options.clean_temp = false;
            if cli.directory.is_none() {
                return Ok(RunSummary::default());
            }
        }
    }

    let maintenance = Maintenance::from_config(config, options)
        .map_err(|e| format!("Invalid configuration: {}", e))?
        .with_progress(io::stdout().is_terminal());

    let mut sink = FanoutSink::new().with(TracingSink);
    if let Some(path) = &config.logging.action_log {
        let json = JsonLinesSink::open(path)
            .map_err(|e| format!("Error opening action log {}: {}", path.display(), e))?;
        sink = sink.with(json);
    }

    if cli.dry_run {
        OutputFormatter::dry_run_notice("No files will be moved or deleted");
    }
    if let Some(dir) = &cli.directory {
        OutputFormatter::info(&format!("Organizing contents of: {}", dir.display()));
    }

    if !cli.schedule {
        let summary = maintenance
            .run(cli.directory.as_deref(), &mut sink)
            .map_err(|e| e.to_string())?;
        report(&summary);
        return Ok(summary);
    }

    let hours = config.schedule.interval_hours;
    OutputFormatter::info(&format!("Running every {} hour(s); press Ctrl+C to stop", hours));
    let mut last = RunSummary::default();
    Scheduler::new(Duration::from_secs(hours.saturating_mul(3600)))
        .run_on_start(config.schedule.run_on_start)
        .max_runs(cli.max_runs)
        .run(|run| {
            OutputFormatter::header(&format!("Run #{}", run));
            let summary = maintenance.run(cli.directory.as_deref(), &mut sink)?;
            report(&summary);
            last = summary;
            Ok::<(), crate::maintenance::MaintenanceError>(())
        });
    Ok(last)
}

fn report(summary: &RunSummary) {
    OutputFormatter::run_summary(summary);
    if summary.has_errors() {
        OutputFormatter::warning(&format!(
            "{} file(s) could not be processed; see the log for details",
            summary.errors
        ));
    } else if summary.dry_run {
        OutputFormatter::dry_run_notice("Nothing was changed");
    } else {
        OutputFormatter::success("Maintenance finished");
    }
}

/// Asks a yes/no question on stdin. End of input counts as the default.
pub fn prompt_confirm(prompt: &str, default: Option<bool>) -> io::Result<bool> {
    let stdin = io::stdin();
    let mut input = String::new();
    loop {
        input.clear();
        match default {
            Some(true) => print!("{} (Y/n): ", prompt),
            Some(false) | None => print!("{} (y/N): ", prompt),
        }
        io::stdout().flush()?;

        let read = stdin.lock().read_line(&mut input)?;
        if read == 0 {
            return Ok(default.unwrap_or(false));
        }
        if let Some(answer) = parse_confirmation(&input, default) {
            return Ok(answer);
        }
    }
}

/// `None` means the answer was not understood and the question should be repeated.
fn parse_confirmation(input: &str, default: Option<bool>) -> Option<bool> {
    match input.trim().to_uppercase().as_str() {
        "Y" | "YES" => Some(true),
        "N" | "NO" => Some(false),
        "" => default,
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requires_directory_or_clean_temp() {
        let err = Cli::try_parse_from(["pctidy", "--dry-run"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);

        assert!(Cli::try_parse_from(["pctidy", "-d", "/tmp/x"]).is_ok());
        assert!(Cli::try_parse_from(["pctidy", "--clean-temp"]).is_ok());
        assert!(Cli::try_parse_from(["pctidy", "-d", "/tmp/x", "--clean-temp"]).is_ok());
    }

    #[test]
    fn test_interval_requires_schedule() {
        assert!(Cli::try_parse_from(["pctidy", "-d", "/tmp/x", "--interval-hours", "2"]).is_err());
        let cli = Cli::try_parse_from([
            "pctidy",
            "-d",
            "/tmp/x",
            "--schedule",
            "--interval-hours",
            "2",
        ])
        .unwrap();
        assert_eq!(cli.interval_hours, Some(2));
    }

    #[test]
    fn test_delete_duplicates_requires_directory() {
        assert!(Cli::try_parse_from(["pctidy", "--clean-temp", "--delete-duplicates"]).is_err());
    }

    #[test]
    fn test_flags_map_to_options() {
        let cli = Cli::try_parse_from([
            "pctidy",
            "-d",
            "/tmp/x",
            "--delete-duplicates",
            "--dry-run",
            "-r",
        ])
        .unwrap();
        let mut config = AppConfig::default();
        config.organize.recursive = cli.recursive;
        let options = cli.maintenance_options(&config);

        assert!(options.organize);
        assert!(options.delete_duplicates);
        assert!(!options.clean_temp);
        assert!(options.dry_run);
        assert!(options.recursive);
    }

    #[test]
    fn test_flags_override_config_file() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        std::fs::write(
            &config_path,
            "[schedule]\ninterval_hours = 6\n[run]\norder = \"organize-first\"\n",
        )
        .unwrap();
        let config_arg = config_path.to_string_lossy().to_string();

        let cli = Cli::try_parse_from([
            "pctidy",
            "-d",
            "/tmp/x",
            "-c",
            &config_arg,
            "--dedupe-first",
            "--schedule",
            "--interval-hours",
            "1",
            "--action-log",
            "actions.jsonl",
        ])
        .unwrap();
        let config = cli.load_config().unwrap();

        assert_eq!(config.schedule.interval_hours, 1);
        assert_eq!(config.run.order, PassOrder::DedupeFirst);
        assert_eq!(config.logging.action_log, Some(PathBuf::from("actions.jsonl")));
    }

    #[test]
    fn test_missing_config_file_is_fatal() {
        let cli = Cli::try_parse_from(["pctidy", "-d", "/tmp/x", "-c", "/definitely/not/here.toml"])
            .unwrap();
        assert!(cli.load_config().unwrap_err().contains("Error loading configuration"));
    }

    #[test]
    fn test_zero_interval_is_rejected() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        std::fs::write(&config_path, "").unwrap();
        let config_arg = config_path.to_string_lossy().to_string();

        let cli = Cli::try_parse_from([
            "pctidy",
            "-d",
            "/tmp/x",
            "-c",
            &config_arg,
            "--schedule",
            "--interval-hours",
            "0",
        ])
        .unwrap();
        assert!(cli.load_config().unwrap_err().contains("Invalid configuration"));
    }

    #[test]
    fn test_parse_confirmation() {
        assert_eq!(parse_confirmation("y\n", Some(false)), Some(true));
        assert_eq!(parse_confirmation("YES", None), Some(true));
        assert_eq!(parse_confirmation("n", Some(true)), Some(false));
        assert_eq!(parse_confirmation("\n", Some(false)), Some(false));
        assert_eq!(parse_confirmation("", None), None);
        assert_eq!(parse_confirmation("maybe", Some(true)), None);
    }
}
