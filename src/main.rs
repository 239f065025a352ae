use clap::Parser;
use pctidy::cli::{Cli, run_with_config};
use pctidy::logging::init_logging;
use pctidy::output::OutputFormatter;
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Configuration comes first: it names the log file.
    let config = match cli.load_config() {
        Ok(config) => config,
        Err(e) => {
            OutputFormatter::error(&e);
            return ExitCode::FAILURE;
        }
    };

    let _guard = match init_logging(&config.logging) {
        Ok(guard) => guard,
        Err(e) => {
            OutputFormatter::error(&e);
            return ExitCode::FAILURE;
        }
    };

    match run_with_config(&cli, &config) {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "run aborted");
            OutputFormatter::error(&format!("Error: {}", e));
            ExitCode::FAILURE
        }
    }
}
