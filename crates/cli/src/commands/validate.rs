//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::{PipelineBlueprint, PipelineMode, SourceKind};
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;
use crate::commands::run::API_KEY_VAR;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    version: String,
    mode: String,
    workers: usize,
    source: String,
    items: u64,
    rounds: u32,
    consumer_count: usize,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    // Check file exists
    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", args.config.display())),
            warnings: None,
            summary: None,
        };
    }

    // Try to load and validate
    match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(blueprint) => {
            let warnings = collect_warnings(&blueprint);

            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: if warnings.is_empty() {
                    None
                } else {
                    Some(warnings)
                },
                summary: Some(ConfigSummary {
                    version: format!("{:?}", blueprint.version),
                    mode: format!("{:?}", blueprint.pipeline.mode),
                    workers: blueprint.pipeline.workers,
                    source: match blueprint.source.kind() {
                        Some(SourceKind::Queries) => "queries".to_string(),
                        Some(SourceKind::Urls) => "urls".to_string(),
                        None => "none".to_string(),
                    },
                    items: blueprint.source_len(),
                    rounds: blueprint.source.rounds,
                    consumer_count: blueprint.consumers.len(),
                }),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(blueprint: &PipelineBlueprint) -> Vec<String> {
    let mut warnings = Vec::new();

    match blueprint.pipeline.mode {
        PipelineMode::Queue if blueprint.consumers.is_empty() => {
            warnings.push("No consumers configured - artifacts are only counted".to_string());
        }
        PipelineMode::Static => {
            if !blueprint.consumers.is_empty() {
                warnings.push("Consumers are ignored in static mode".to_string());
            }
            if blueprint.source.rounds > 1 || blueprint.source.interval_ms > 0 {
                warnings.push(
                    "source.rounds and source.interval_ms are ignored in static mode".to_string(),
                );
            }
        }
        PipelineMode::Queue => {}
    }

    if blueprint.source_len() == 0 {
        warnings.push("Source yields no items".to_string());
    }

    if let Some(search) = &blueprint.search {
        if search.api_key.is_none() && std::env::var(API_KEY_VAR).is_err() {
            warnings.push(format!("No search API key configured (set {API_KEY_VAR})"));
        }
    }

    if !blueprint.dedup.enabled && blueprint.source.rounds > 1 {
        warnings.push("Dedup is disabled - repeated rounds fetch every item again".to_string());
    }

    let workers = blueprint.pipeline.workers as u64;
    if blueprint.pipeline.mode == PipelineMode::Static && workers > blueprint.source_len() {
        warnings.push(format!(
            "{} workers for {} items - some workers get an empty chunk",
            workers,
            blueprint.source_len()
        ));
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!("  Mode: {}", summary.mode);
            println!("  Workers: {}", summary.workers);
            println!(
                "  Source: {} ({} items x {} rounds)",
                summary.source, summary.items, summary.rounds
            );
            println!("  Consumers: {}", summary.consumer_count);
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}
