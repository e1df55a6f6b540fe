//! Building a pipeline from a [`PipelineBlueprint`]

use std::sync::Arc;

use contracts::{
    ArtifactStore, Fetcher, PipelineBlueprint, PipelineMode, Query, SourceConfig, SourceKind,
    WorkItem, WorkProducer,
};
use fetcher::{HttpFetcher, SearchFetcher};
use storage::FsArtifactStore;
use tracing::{info, instrument, warn};
use url::Url;
use worker::WorkerSettings;

use crate::error::{OrchestratorError, Result};
use crate::handle::PipelineHandle;
use crate::producer::{IntervalProducer, TemplateUrls};
use crate::queue_pipeline::QueuePipeline;
use crate::report::PipelineReport;
use crate::static_pipeline::StaticPipeline;

/// Explicit download URLs of a source, or every URL of its template
///
/// Static mode partitions the whole list, so it needs it up front; queue mode
/// pulls template URLs lazily instead.
pub fn source_urls(source: &SourceConfig) -> Result<Vec<Url>> {
    if let Some(template) = &source.template {
        return Ok(TemplateUrls::new(template)?.collect());
    }
    source
        .urls
        .iter()
        .map(|s| {
            Url::parse(s).map_err(|e| {
                OrchestratorError::startup("source", format!("invalid URL '{s}': {e}"))
            })
        })
        .collect()
}

/// Search terms of a query source
///
/// Terms that normalise to the same text are kept; consecutive repeats are
/// left to dedup.
pub fn source_queries(source: &SourceConfig) -> Result<Vec<Query>> {
    source
        .queries
        .iter()
        .map(|raw| Query::parse(raw).map_err(OrchestratorError::from))
        .collect()
}

/// Wire real fetchers and storage according to `blueprint` and start it
///
/// Must be called from inside a Tokio runtime.
#[instrument(
    name = "pipeline_launch",
    skip(blueprint),
    fields(mode = ?blueprint.pipeline.mode, workers = blueprint.pipeline.workers)
)]
pub fn start_blueprint(blueprint: &PipelineBlueprint) -> Result<PipelineHandle> {
    let store = Arc::new(FsArtifactStore::new(&blueprint.storage)?);
    let source = &blueprint.source;

    let kind = source.kind().ok_or_else(|| {
        OrchestratorError::startup("source", "no unambiguous work source configured")
    })?;

    match (blueprint.pipeline.mode, kind) {
        (PipelineMode::Queue, SourceKind::Queries) => {
            let search = blueprint.search.clone().ok_or_else(|| {
                OrchestratorError::startup("fetch", "query source requires [search]")
            })?;
            let fetcher = Arc::new(SearchFetcher::new(&blueprint.fetch, search)?);
            let queries = source_queries(source)?;
            info!(queries = queries.len(), rounds = source.rounds, "Resolving queries");

            let producer =
                IntervalProducer::new("queries", queries, source.interval(), source.rounds);
            start_queue(blueprint, producer, fetcher, store)
        }
        (PipelineMode::Queue, SourceKind::Urls) => {
            let fetcher = Arc::new(HttpFetcher::new(&blueprint.fetch)?);
            match &source.template {
                Some(template) => {
                    let urls = TemplateUrls::new(template)?;
                    info!(
                        urls = template.count,
                        rounds = source.rounds,
                        "Downloading template URLs"
                    );
                    let producer =
                        IntervalProducer::new("template", urls, source.interval(), source.rounds);
                    start_queue(blueprint, producer, fetcher, store)
                }
                None => {
                    let urls = source_urls(source)?;
                    info!(urls = urls.len(), rounds = source.rounds, "Downloading URLs");
                    let producer =
                        IntervalProducer::new("urls", urls, source.interval(), source.rounds);
                    start_queue(blueprint, producer, fetcher, store)
                }
            }
        }
        (PipelineMode::Static, SourceKind::Urls) => {
            if !blueprint.consumers.is_empty() {
                warn!("Consumers are not used in static mode");
            }
            let urls = source_urls(source)?;
            let fetcher = Arc::new(HttpFetcher::new(&blueprint.fetch)?);
            info!(urls = urls.len(), "Downloading URLs in static chunks");

            StaticPipeline::new(urls, fetcher, store)
                .with_workers(blueprint.pipeline.workers)
                .with_dedup(blueprint.dedup)
                .with_worker_settings(WorkerSettings::from_config(&blueprint.fetch))
                .start()
        }
        (PipelineMode::Static, SourceKind::Queries) => Err(OrchestratorError::startup(
            "source",
            "static mode needs a urls or template source",
        )),
    }
}

/// Start `blueprint` and wait for the end of the run
pub async fn run_blueprint(blueprint: &PipelineBlueprint) -> Result<PipelineReport> {
    start_blueprint(blueprint)?.join().await
}

fn start_queue<I, P, F, S>(
    blueprint: &PipelineBlueprint,
    producer: P,
    fetcher: Arc<F>,
    store: Arc<S>,
) -> Result<PipelineHandle>
where
    I: WorkItem,
    P: WorkProducer<I> + 'static,
    F: Fetcher<I> + 'static,
    S: ArtifactStore + Send + Sync + 'static,
{
    QueuePipeline::new(producer, fetcher, store)
        .with_settings(blueprint.pipeline.clone())
        .with_dedup(blueprint.dedup)
        .with_worker_settings(WorkerSettings::from_config(&blueprint.fetch))
        .with_consumers(blueprint.consumers.clone())
        .start()
}
