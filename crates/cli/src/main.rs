//! # fetchpipe CLI
//!
//! Entry point of the `fetchpipe` binary.
//!
//! Exit status:
//! - `0` the command succeeded
//! - `1` the run failed or produced nothing
//! - `2` the configuration could not be loaded or is invalid
//! - `130` a shutdown signal stopped the run; the partial report was printed

mod cli;
mod commands;
mod error;

use std::process::ExitCode;

use clap::Parser;
use observability::ObservabilityConfig;
use tracing::{debug, error, info};

use cli::{Cli, Commands, LogFormat};
use commands::{run_info, run_pipeline, run_validate};
use error::exit_code;

#[tokio::main]
async fn main() -> ExitCode {
    // May carry FETCHPIPE_API_KEY and RUST_LOG
    let env_file = dotenvy::dotenv();

    let cli = Cli::parse();

    if let Err(e) = observability::init_with_config(observability_config(&cli)) {
        eprintln!("fetchpipe: {e:#}");
        return ExitCode::FAILURE;
    }
    if let Ok(path) = env_file {
        debug!(path = %path.display(), "Environment file loaded");
    }

    info!(version = env!("CARGO_PKG_VERSION"), "fetchpipe starting");

    let result = match &cli.command {
        Commands::Run(args) => run_pipeline(args).await,
        Commands::Validate(args) => run_validate(args),
        Commands::Info(args) => run_info(args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = format!("{e:#}"), "Command failed");
            eprintln!("Error: {e:#}");
            ExitCode::from(exit_code(&e))
        }
    }
}

/// Logging setup for the chosen verbosity and format
///
/// `RUST_LOG`, when set, overrides the level picked here.
fn observability_config(cli: &Cli) -> ObservabilityConfig {
    let level = match (cli.quiet, cli.verbose) {
        (true, _) => "warn",
        (false, 0) => "info",
        (false, 1) => "debug",
        (false, _) => "trace",
    };
    let log_format = match cli.log_format {
        LogFormat::Json => observability::LogFormat::Json,
        LogFormat::Pretty => observability::LogFormat::Pretty,
        LogFormat::Compact => observability::LogFormat::Compact,
    };

    ObservabilityConfig {
        log_format,
        metrics_port: None,
        default_log_level: level.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_levels() {
        let level = |argv: &[&str]| {
            let cli = Cli::parse_from(argv);
            observability_config(&cli).default_log_level
        };

        assert_eq!(level(&["fetchpipe", "validate"]), "info");
        assert_eq!(level(&["fetchpipe", "-v", "validate"]), "debug");
        assert_eq!(level(&["fetchpipe", "-vvv", "validate"]), "trace");
        assert_eq!(level(&["fetchpipe", "--quiet", "validate"]), "warn");
    }

    #[test]
    fn test_log_format_passed_through() {
        let cli = Cli::parse_from(["fetchpipe", "--log-format", "json", "validate"]);
        let config = observability_config(&cli);
        assert_eq!(config.log_format, observability::LogFormat::Json);
        assert_eq!(config.metrics_port, None);
    }
}
