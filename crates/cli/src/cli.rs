//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// fetchpipe - concurrent search-and-download pipeline
#[derive(Parser, Debug)]
#[command(
    name = "fetchpipe",
    author,
    version,
    about = "Concurrent search-and-download pipeline",
    long_about = "Moves work items through independently running stages.\n\n\
                  Queries or URLs are produced into a bounded queue, a pool of fetch \n\
                  workers resolves and stores them, and stored artifacts are handed \n\
                  to the configured consumers."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "FETCHPIPE_VERBOSE")]
    pub verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "FETCHPIPE_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the pipeline
    Run(RunArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// Display configuration information
    Info(InfoArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(
        short,
        long,
        default_value = "fetchpipe.toml",
        env = "FETCHPIPE_CONFIG"
    )]
    pub config: PathBuf,

    /// Override the number of fetch workers
    #[arg(short, long, env = "FETCHPIPE_WORKERS")]
    pub workers: Option<usize>,

    /// Override the pipeline topology
    #[arg(long, value_enum, env = "FETCHPIPE_MODE")]
    pub mode: Option<ModeArg>,

    /// Fetch every item, even when it repeats the previous one
    #[arg(long)]
    pub no_dedup: bool,

    /// Override attempts per item (including the first)
    #[arg(long, env = "FETCHPIPE_MAX_ATTEMPTS")]
    pub max_attempts: Option<u32>,

    /// Override the per-fetch timeout in milliseconds
    #[arg(long, env = "FETCHPIPE_TIMEOUT_MS")]
    pub timeout_ms: Option<u64>,

    /// Override the artifact directory
    #[arg(short, long, env = "FETCHPIPE_OUTPUT_DIR")]
    pub output_dir: Option<PathBuf>,

    /// Validate configuration and exit without running pipeline
    #[arg(long)]
    pub dry_run: bool,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", env = "FETCHPIPE_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "fetchpipe.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "fetchpipe.toml")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// List every work item of the source
    #[arg(long)]
    pub items: bool,

    /// Show consumer configuration
    #[arg(long)]
    pub consumers: bool,
}

/// Pipeline topology
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModeArg {
    /// Producer, shared queues, worker pool, consumers
    Queue,
    /// Work list split into one chunk per worker
    Static,
}

/// Log output format
#[derive(ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}
