//! Mock Pipeline Example
//!
//! Runs the queue topology and then the static topology against a mock
//! fetcher, writing artifacts to a local directory. No network is needed.
//!
//! Run with: cargo run -p demos --bin mock_pipeline [config.toml]

use std::sync::Arc;
use std::time::Duration;

use config_loader::ConfigLoader;
use contracts::{ConsumerConfig, ConsumerKind, PipelineBlueprint, UrlTemplate};
use fetcher::{MockFetcher, MockResponse};
use orchestrator::{source_queries, IntervalProducer, QueuePipeline, StaticPipeline, TemplateUrls};
use storage::FsArtifactStore;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    observability::init()?;

    tracing::info!("Starting Mock Pipeline Demo");

    // ==== Stage 1: Use default config or load from file ====
    let mut blueprint = if let Some(path) = std::env::args().nth(1) {
        tracing::info!(path = %path, "Loading blueprint config");
        ConfigLoader::load_from_path(std::path::Path::new(&path))?
    } else {
        create_demo_blueprint()
    };
    blueprint.storage.base_dir = std::env::temp_dir().join("fetchpipe-demo");
    let store = Arc::new(FsArtifactStore::new(&blueprint.storage)?);

    // ==== Stage 2: Queue topology ====
    // "kandy" fails once and succeeds on retry; "galle" never resolves.
    // "Colombo" right after "colombo" is the same query and is skipped.
    let fetcher = MockFetcher::new()
        .with_delay(Duration::from_millis(20))
        .with_jitter(Duration::from_millis(30))
        .respond("colombo", MockResponse::Resources(3))
        .respond_sequence(
            "kandy",
            vec![MockResponse::Transient(Some(503)), MockResponse::Resources(2)],
        )
        .respond("galle", MockResponse::Malformed);

    let queries = source_queries(&blueprint.source)?;
    let producer = IntervalProducer::new(
        "queries",
        queries,
        blueprint.source.interval(),
        blueprint.source.rounds,
    );

    let report = QueuePipeline::new(producer, Arc::new(fetcher), Arc::clone(&store))
        .with_settings(blueprint.pipeline.clone())
        .with_dedup(blueprint.dedup)
        .with_consumers(blueprint.consumers.clone())
        .run()
        .await?;
    println!("\n=== Queue topology ===\n{report}");

    // ==== Stage 3: Static topology ====
    let template = UrlTemplate {
        pattern: "https://picsum.photos/id/{i}/400/600".into(),
        count: 10,
        start: 0,
    };
    let urls: Vec<_> = TemplateUrls::new(&template)?.collect();
    let report = StaticPipeline::new(
        urls,
        Arc::new(MockFetcher::new().with_delay(Duration::from_millis(50))),
        Arc::clone(&store),
    )
    .with_workers(blueprint.pipeline.workers)
    .run()
    .await?;
    println!("\n=== Static topology ===\n{report}");

    tracing::info!(dir = %store.base_dir().display(), "Mock Pipeline Demo finished");
    Ok(())
}

fn create_demo_blueprint() -> PipelineBlueprint {
    let mut blueprint = PipelineBlueprint::for_queries(
        &["colombo", "Colombo", "kandy", "galle", "matara"],
        "https://unsplash.com/napi/search/photos",
    );
    blueprint.pipeline.workers = 3;
    blueprint.source.rounds = 2;
    blueprint.source.interval_ms = 100;
    blueprint.consumers.push(ConsumerConfig {
        name: "log".to_string(),
        kind: ConsumerKind::Log,
        queue_capacity: 16,
        params: Default::default(),
    });
    blueprint
}
