//! Diagnostic logging setup: a console layer on stderr plus a plain-text log file.

use crate::config::LoggingSettings;
use std::env;
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

/// Environment variable overriding the configured filter, e.g. `PCTIDY_LOG=debug`.
pub const LOG_ENV_VAR: &str = "PCTIDY_LOG";

/// Picks the filter directive: the environment wins over the configured level.
pub fn resolve_filter(env_value: Option<String>, configured: &str) -> String {
    env_value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| configured.to_string())
}

/// Splits the log file setting into the directory and file name the appender wants.
fn split_log_path(log_file: &Path) -> (PathBuf, String) {
    let dir = log_file
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let name = log_file
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "pc_cleaner.log".to_string());
    (dir, name)
}

/// Installs the global subscriber. Keep the returned guard alive for the
/// whole process; dropping it flushes and closes the log file.
///
/// An unparsable filter falls back to `info`. Installing twice is a no-op.
/// Fails when the log file cannot be created or opened.
pub fn init_logging(settings: &LoggingSettings) -> Result<WorkerGuard, String> {
    let directive = resolve_filter(env::var(LOG_ENV_VAR).ok(), &settings.level);
    let filter = EnvFilter::try_new(&directive).unwrap_or_else(|e| {
        eprintln!("Invalid log filter '{}': {}; using 'info'", directive, e);
        EnvFilter::new("info")
    });

    let (dir, file_name) = split_log_path(&settings.log_file);
    std::fs::create_dir_all(&dir)
        .map_err(|e| format!("Failed to create log directory {}: {}", dir.display(), e))?;
    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(file_name)
        .build(&dir)
        .map_err(|e| {
            format!(
                "Failed to open log file {}: {}",
                settings.log_file.display(),
                e
            )
        })?;
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let installed = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .without_time()
                .with_ansi(true),
        )
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .with(filter)
        .try_init();

    if installed.is_ok() {
        tracing::debug!(log_file = %settings.log_file.display(), filter = %directive, "logging initialised");
    }
    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_overrides_configured_level() {
        assert_eq!(resolve_filter(Some("debug".into()), "info"), "debug");
        assert_eq!(
            resolve_filter(Some("pctidy=trace,warn".into()), "info"),
            "pctidy=trace,warn"
        );
    }

    #[test]
    fn test_configured_level_used_without_env() {
        assert_eq!(resolve_filter(None, "warn"), "warn");
        assert_eq!(resolve_filter(Some("   ".into()), "warn"), "warn");
    }

    #[test]
    fn test_split_log_path() {
        let (dir, name) = split_log_path(Path::new("pc_cleaner.log"));
        assert_eq!(dir, PathBuf::from("."));
        assert_eq!(name, "pc_cleaner.log");

        let (dir, name) = split_log_path(Path::new("/var/log/pctidy/run.log"));
        assert_eq!(dir, PathBuf::from("/var/log/pctidy"));
        assert_eq!(name, "run.log");
    }

    #[test]
    fn test_unopenable_log_file_is_an_error() {
        let temp_dir = tempfile::TempDir::new().expect("Failed to create temp directory");
        let settings = LoggingSettings {
            log_file: temp_dir.path().to_path_buf(),
            ..LoggingSettings::default()
        };

        let err = match init_logging(&settings) {
            Ok(_) => panic!("a directory cannot be opened as the log file"),
            Err(e) => e,
        };
        assert!(err.contains("Failed to open log file"), "unexpected error: {}", err);
    }
}
