//! `run` command implementation.

use anyhow::{Context, Result};
use config_loader::ConfigLoader;
use contracts::{PipelineBlueprint, PipelineMode};
use orchestrator::{start_blueprint, PipelineHandle, PipelineReport};
use tracing::{info, warn};

use crate::cli::{ModeArg, RunArgs};
use crate::error::CliError;

/// Environment variable holding the search API key
pub const API_KEY_VAR: &str = "FETCHPIPE_API_KEY";

/// Execute the `run` command
pub async fn run_pipeline(args: &RunArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");

    if !args.config.exists() {
        return Err(CliError::config_not_found(args.config.display().to_string()).into());
    }

    let mut blueprint = ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    if ConfigLoader::apply_env_overrides(&mut blueprint, API_KEY_VAR) {
        info!("Search API key taken from {}", API_KEY_VAR);
    }

    let overrides = apply_overrides(&mut blueprint, args);
    if !overrides.is_empty() {
        info!(overrides = ?overrides, "Applied command line overrides");
        ConfigLoader::validate(&blueprint)
            .map_err(|e| CliError::invalid_override(e.to_string()))?;
    }

    info!(
        mode = ?blueprint.pipeline.mode,
        workers = blueprint.pipeline.workers,
        items = blueprint.source_len(),
        rounds = blueprint.source.rounds,
        consumers = blueprint.consumers.len(),
        output = %blueprint.storage.base_dir.display(),
        "Configuration loaded"
    );

    // Dry run - just validate and exit
    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        print_config_summary(&blueprint);
        return Ok(());
    }

    if args.metrics_port != 0 {
        observability::init_metrics_only(args.metrics_port)?;
        info!(port = args.metrics_port, "Metrics endpoint available");
    }

    info!("Starting pipeline...");
    let handle = start_blueprint(&blueprint).context("Pipeline startup failed")?;
    let report = join_until_done(handle)
        .await
        .context("Pipeline execution failed")?;
    finish(&report)?;

    info!("fetchpipe finished");
    Ok(())
}

/// Wait for the run to end; a shutdown signal only stops intake
///
/// After the first signal the pipeline drains what it already holds and the
/// report of the partial run is still returned. A second signal is logged and
/// otherwise ignored.
async fn join_until_done(handle: PipelineHandle) -> orchestrator::Result<PipelineReport> {
    let trigger = handle.shutdown_trigger();
    let join = handle.join();
    tokio::pin!(join);

    tokio::select! {
        result = &mut join => return result,
        _ = setup_shutdown_signal() => {
            warn!("Received shutdown signal, draining pipeline...");
            trigger.trigger();
        }
    }

    loop {
        tokio::select! {
            result = &mut join => return result,
            _ = setup_shutdown_signal() => {
                warn!("Shutdown already in progress, waiting for workers to finish");
            }
        }
    }
}

/// Apply command line overrides, returning the names of the changed settings
fn apply_overrides(blueprint: &mut PipelineBlueprint, args: &RunArgs) -> Vec<&'static str> {
    let mut applied = Vec::new();

    if let Some(workers) = args.workers {
        blueprint.pipeline.workers = workers;
        applied.push("workers");
    }
    if let Some(mode) = args.mode {
        blueprint.pipeline.mode = match mode {
            ModeArg::Queue => PipelineMode::Queue,
            ModeArg::Static => PipelineMode::Static,
        };
        applied.push("mode");
    }
    if args.no_dedup {
        blueprint.dedup.enabled = false;
        applied.push("dedup");
    }
    if let Some(max_attempts) = args.max_attempts {
        blueprint.fetch.max_attempts = max_attempts;
        applied.push("max_attempts");
    }
    if let Some(timeout_ms) = args.timeout_ms {
        blueprint.fetch.timeout_ms = timeout_ms;
        applied.push("timeout_ms");
    }
    if let Some(dir) = &args.output_dir {
        blueprint.storage.base_dir = dir.clone();
        applied.push("output_dir");
    }

    applied
}

fn finish(report: &PipelineReport) -> Result<()> {
    info!(
        stored = report.summary.stored,
        failed = report.summary.failed,
        skipped = report.summary.skipped,
        duration_secs = report.duration.as_secs_f64(),
        throughput = format!("{:.2}", report.throughput()),
        "Pipeline completed"
    );

    println!("\n{report}\n");

    if report.interrupted {
        warn!(
            produced = report.produced,
            abandoned = report.summary.abandoned,
            "Pipeline stopped by shutdown signal, results are partial"
        );
        return Err(CliError::interrupted(report.summary.stored, report.summary.abandoned).into());
    }

    let any_completed = report.summary.workers.iter().any(|w| w.exit.is_completed());
    if !any_completed && !report.summary.workers.is_empty() {
        return Err(CliError::pipeline_execution("every fetch worker stopped early").into());
    }
    if !report.is_clean() {
        warn!(
            fatal = ?report.summary.fatal_workers(),
            panicked = ?report.summary.panicked_workers(),
            abandoned = report.summary.abandoned,
            undelivered = report.undelivered(),
            "Pipeline finished with failures"
        );
    }
    Ok(())
}

/// Setup Ctrl+C and SIGTERM signal handlers
async fn setup_shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Print configuration summary for dry-run mode
fn print_config_summary(blueprint: &PipelineBlueprint) {
    println!("\n=== Configuration Summary ===\n");
    println!("Pipeline:");
    println!("  Mode: {:?}", blueprint.pipeline.mode);
    println!("  Workers: {}", blueprint.pipeline.workers);
    println!(
        "  Queues: inbound={} outbound={}",
        blueprint.pipeline.inbound_capacity, blueprint.pipeline.outbound_capacity
    );
    println!(
        "  Dedup: {} ({:?})",
        if blueprint.dedup.enabled { "on" } else { "off" },
        blueprint.dedup.scope
    );
    println!(
        "  Fetch: timeout={}ms attempts={} backoff={}ms",
        blueprint.fetch.timeout_ms, blueprint.fetch.max_attempts, blueprint.fetch.retry_backoff_ms
    );

    println!("\nSource ({} items x {} rounds):", blueprint.source_len(), blueprint.source.rounds);
    if let Some(search) = &blueprint.search {
        println!("  Search endpoint: {} (page {})", search.endpoint, search.page);
        println!(
            "  API key: {}",
            if search.api_key.is_some() { "set" } else { "not set" }
        );
    }
    println!("  Output: {}", blueprint.storage.base_dir.display());

    if !blueprint.consumers.is_empty() {
        println!("\nConsumers ({}):", blueprint.consumers.len());
        for consumer in &blueprint.consumers {
            println!("  - {} ({:?})", consumer.name, consumer.kind);
        }
    }

    println!();
}
