//! `info` command implementation.

use anyhow::{Context, Result};
use contracts::PipelineBlueprint;
use orchestrator::{source_urls, TemplateUrls};
use serde::Serialize;
use tracing::info;

use crate::cli::InfoArgs;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    version: String,
    pipeline: PipelineInfo,
    source: SourceInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    search: Option<SearchInfo>,
    storage: StorageInfo,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    consumers: Vec<ConsumerInfo>,
}

#[derive(Serialize)]
struct PipelineInfo {
    mode: String,
    workers: usize,
    inbound_capacity: usize,
    outbound_capacity: usize,
    dedup: bool,
    dedup_scope: String,
    timeout_ms: u64,
    max_attempts: u32,
}

#[derive(Serialize)]
struct SourceInfo {
    items: u64,
    rounds: u32,
    interval_ms: u64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    list: Vec<String>,
}

#[derive(Serialize)]
struct SearchInfo {
    endpoint: String,
    page: u32,
    api_key_set: bool,
}

#[derive(Serialize)]
struct StorageInfo {
    base_dir: String,
    extension: String,
}

#[derive(Serialize)]
struct ConsumerInfo {
    name: String,
    kind: String,
    queue_capacity: usize,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    if !args.config.exists() {
        anyhow::bail!("Configuration file not found: {}", args.config.display());
    }

    let blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    let info = build_config_info(&blueprint, args)?;
    if args.json {
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&info);
    }

    Ok(())
}

/// Every work item of the source, rendered as text
fn source_items(blueprint: &PipelineBlueprint) -> Result<Vec<String>> {
    let source = &blueprint.source;
    if !source.queries.is_empty() {
        let queries = orchestrator::source_queries(source)?;
        return Ok(queries.iter().map(|q| q.to_string()).collect());
    }
    if let Some(template) = &source.template {
        return Ok(TemplateUrls::new(template)?.map(String::from).collect());
    }
    Ok(source_urls(source)?.into_iter().map(|u| u.to_string()).collect())
}

fn build_config_info(blueprint: &PipelineBlueprint, args: &InfoArgs) -> Result<ConfigInfo> {
    let list = if args.items {
        source_items(blueprint)?
    } else {
        Vec::new()
    };

    let consumers = if args.consumers {
        blueprint
            .consumers
            .iter()
            .map(|c| ConsumerInfo {
                name: c.name.clone(),
                kind: format!("{:?}", c.kind),
                queue_capacity: c.queue_capacity,
            })
            .collect()
    } else {
        Vec::new()
    };

    Ok(ConfigInfo {
        version: format!("{:?}", blueprint.version),
        pipeline: PipelineInfo {
            mode: format!("{:?}", blueprint.pipeline.mode),
            workers: blueprint.pipeline.workers,
            inbound_capacity: blueprint.pipeline.inbound_capacity,
            outbound_capacity: blueprint.pipeline.outbound_capacity,
            dedup: blueprint.dedup.enabled,
            dedup_scope: format!("{:?}", blueprint.dedup.scope),
            timeout_ms: blueprint.fetch.timeout_ms,
            max_attempts: blueprint.fetch.max_attempts,
        },
        source: SourceInfo {
            items: blueprint.source_len(),
            rounds: blueprint.source.rounds,
            interval_ms: blueprint.source.interval_ms,
            list,
        },
        search: blueprint.search.as_ref().map(|s| SearchInfo {
            endpoint: s.endpoint.clone(),
            page: s.page,
            api_key_set: s.api_key.is_some(),
        }),
        storage: StorageInfo {
            base_dir: blueprint.storage.base_dir.display().to_string(),
            extension: blueprint.storage.extension.clone(),
        },
        consumers,
    })
}

fn print_config_info(info: &ConfigInfo) {
    println!("=== fetchpipe configuration ===\n");

    let pipeline = &info.pipeline;
    println!("⚙️  Pipeline");
    println!("   ├─ Version: {}", info.version);
    println!("   ├─ Mode: {}", pipeline.mode);
    println!("   ├─ Workers: {}", pipeline.workers);
    println!(
        "   ├─ Queues: inbound={} outbound={}",
        pipeline.inbound_capacity, pipeline.outbound_capacity
    );
    println!(
        "   ├─ Dedup: {} ({})",
        if pipeline.dedup { "on" } else { "off" },
        pipeline.dedup_scope
    );
    println!(
        "   └─ Fetch: timeout={}ms attempts={}",
        pipeline.timeout_ms, pipeline.max_attempts
    );

    let source = &info.source;
    println!("\n📥 Source ({} items)", source.items);
    println!("   ├─ Rounds: {}", source.rounds);
    if source.list.is_empty() {
        println!("   └─ Interval: {}ms", source.interval_ms);
    } else {
        println!("   ├─ Interval: {}ms", source.interval_ms);
        for (i, item) in source.list.iter().enumerate() {
            let prefix = if i == source.list.len() - 1 { "└─" } else { "├─" };
            println!("   {} {}", prefix, item);
        }
    }

    if let Some(search) = &info.search {
        println!("\n🔎 Search");
        println!("   ├─ Endpoint: {}", search.endpoint);
        println!("   ├─ Page: {}", search.page);
        println!(
            "   └─ API key: {}",
            if search.api_key_set { "set" } else { "from environment" }
        );
    }

    println!("\n💾 Storage");
    println!("   ├─ Directory: {}", info.storage.base_dir);
    println!("   └─ Extension: .{}", info.storage.extension);

    if !info.consumers.is_empty() {
        println!("\n📤 Consumers ({})", info.consumers.len());
        for (i, consumer) in info.consumers.iter().enumerate() {
            let prefix = if i == info.consumers.len() - 1 { "└─" } else { "├─" };
            println!(
                "   {} {} ({}, queue {})",
                prefix, consumer.name, consumer.kind, consumer.queue_capacity
            );
        }
    }

    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::UrlTemplate;
    use std::path::PathBuf;

    fn args(items: bool) -> InfoArgs {
        InfoArgs {
            config: PathBuf::from("fetchpipe.toml"),
            json: true,
            items,
            consumers: false,
        }
    }

    #[test]
    fn test_template_items_listed() {
        let mut blueprint = PipelineBlueprint::for_queries(&[], "https://api.example.com/search");
        blueprint.search = None;
        blueprint.source.template = Some(UrlTemplate {
            pattern: "https://picsum.photos/id/{i}/400/600".into(),
            count: 2,
            start: 0,
        });

        let info = build_config_info(&blueprint, &args(true)).unwrap();
        assert_eq!(info.source.items, 2);
        assert_eq!(info.source.list[1], "https://picsum.photos/id/1/400/600");
        assert!(info.search.is_none());
    }

    #[test]
    fn test_items_hidden_by_default() {
        let endpoint = "https://api.example.com/search";
        let blueprint = PipelineBlueprint::for_queries(&["colombo", "matara"], endpoint);
        let info = build_config_info(&blueprint, &args(false)).unwrap();
        assert!(info.source.list.is_empty());
        assert_eq!(info.source.items, 2);
        assert!(info.search.is_some());
    }

    #[test]
    fn test_listed_queries_are_normalised() {
        let endpoint = "https://api.example.com/search";
        let blueprint = PipelineBlueprint::for_queries(&[" light   rain "], endpoint);
        let info = build_config_info(&blueprint, &args(true)).unwrap();
        assert_eq!(info.source.list, vec!["light rain"]);
    }
}
