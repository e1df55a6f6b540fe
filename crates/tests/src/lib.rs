//! # Integration Tests
//!
//! End-to-end tests across the workspace crates:
//! - config loading through to a running pipeline
//! - mock e2e runs with `MockFetcher`, no network needed
//! - real downloads from a local HTTP server (wiremock)
//! - source layout checks

#[cfg(test)]
mod config_tests {
    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::{DedupScope, PipelineMode, SourceKind};

    const QUEUE_TOML: &str = r#"
[pipeline]
workers = 3
inbound_capacity = 16

[dedup]
scope = "shared"

[source]
queries = ["colombo", "kandy", "matara"]
rounds = 2
interval_ms = 10

[search]
endpoint = "https://unsplash.com/napi/search/photos"

[[consumers]]
name = "manifest"
kind = "manifest"
params = { path = "manifest.jsonl" }
"#;

    #[test]
    fn test_queue_config_round_trips_through_toml() {
        let blueprint = ConfigLoader::load_from_str(QUEUE_TOML, ConfigFormat::Toml).unwrap();
        assert_eq!(blueprint.pipeline.mode, PipelineMode::Queue);
        assert_eq!(blueprint.pipeline.workers, 3);
        assert_eq!(blueprint.dedup.scope, DedupScope::Shared);
        assert_eq!(blueprint.source.kind(), Some(SourceKind::Queries));
        assert_eq!(blueprint.source_len(), 3);

        let rendered = ConfigLoader::to_toml(&blueprint).unwrap();
        let reloaded = ConfigLoader::load_from_str(&rendered, ConfigFormat::Toml).unwrap();
        assert_eq!(reloaded.source.queries, blueprint.source.queries);
        assert_eq!(reloaded.consumers.len(), 1);
    }

    #[test]
    fn test_zero_workers_rejected_at_load() {
        let content = QUEUE_TOML.replace("workers = 3", "workers = 0");
        assert!(ConfigLoader::load_from_str(&content, ConfigFormat::Toml).is_err());
    }
}

#[cfg(test)]
mod queue_tests {
    use std::collections::HashSet;

    use stage_queue::{Envelope, StageQueue};

    /// Every item is taken exactly once and every consumer sees the end once
    #[tokio::test]
    async fn test_items_delivered_exactly_once() {
        let queue = StageQueue::<u32>::bounded("inbound", 16).unwrap();

        let mut consumers = Vec::new();
        for _ in 0..4 {
            let queue = queue.clone();
            consumers.push(tokio::spawn(async move {
                let mut taken = Vec::new();
                let mut ends = 0;
                loop {
                    match queue.get().await {
                        Envelope::Item(item) => taken.push(item),
                        Envelope::EndOfStream => {
                            ends += 1;
                            break;
                        }
                    }
                }
                (taken, ends)
            }));
        }

        for item in 0..1000 {
            queue.put(item).await.unwrap();
        }
        assert!(queue.close());
        assert!(!queue.close());

        let mut seen = HashSet::new();
        for consumer in consumers {
            let (taken, ends) = consumer.await.unwrap();
            assert_eq!(ends, 1);
            for item in taken {
                assert!(seen.insert(item), "item {item} delivered twice");
            }
        }
        assert_eq!(seen.len(), 1000);
        assert!(queue.put(1).await.is_err());
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::time::Duration;

    use contracts::{
        ArtifactStore, ConsumerConfig, ConsumerKind, DedupConfig, FailureKind, PipelineSettings,
        Query, Resource, StorageConfig,
    };
    use fetcher::{MockFetcher, MockResponse};
    use orchestrator::{ListProducer, QueuePipeline, StageState, StaticPipeline};
    use storage::FsArtifactStore;
    use worker::{RetryPolicy, WorkerSettings};

    fn resource(identity: &str, content: &str) -> Resource {
        Resource::new(identity, content.to_string())
    }

    fn store_in(dir: &tempfile::TempDir) -> Arc<FsArtifactStore> {
        let config = StorageConfig {
            base_dir: dir.path().join("images"),
            ..Default::default()
        };
        Arc::new(FsArtifactStore::new(&config).unwrap())
    }

    fn files_in(dir: &std::path::Path) -> usize {
        std::fs::read_dir(dir)
            .unwrap()
            .filter_map(|entry| entry.ok())
            .filter(|entry| !entry.file_name().to_string_lossy().starts_with('.'))
            .count()
    }

    fn settings(workers: usize, capacity: usize) -> PipelineSettings {
        PipelineSettings {
            workers,
            inbound_capacity: capacity,
            outbound_capacity: capacity,
            ..Default::default()
        }
    }

    fn fast_worker() -> WorkerSettings {
        WorkerSettings {
            timeout: Duration::from_secs(2),
            retry: RetryPolicy {
                max_attempts: 2,
                backoff: Duration::from_millis(1),
            },
        }
    }

    fn urls(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("https://picsum.photos/id/{i}/400/600")).collect()
    }

    fn log_consumer() -> ConsumerConfig {
        ConsumerConfig {
            name: "log".into(),
            kind: ConsumerKind::Log,
            queue_capacity: 32,
            params: HashMap::new(),
        }
    }

    /// MockFetcher -> FetchWorker pool -> FsArtifactStore -> Dispatcher
    #[tokio::test]
    async fn test_e2e_thousand_items_no_loss() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        let report = QueuePipeline::new(
            ListProducer::new("urls", urls(1000)),
            Arc::new(MockFetcher::new()),
            Arc::clone(&store),
        )
        .with_settings(settings(8, 16))
        .with_worker_settings(fast_worker())
        .with_consumers(vec![log_consumer()])
        .run()
        .await
        .unwrap();

        assert_eq!(report.produced, 1000);
        assert_eq!(report.summary.items, 1000);
        assert_eq!(report.summary.stored, 1000);
        assert_eq!(report.summary.abandoned, 0);
        assert_eq!(report.summary.artifacts.len(), 1000);
        assert_eq!(files_in(store.base_dir()), 1000);

        let dispatch = report.dispatch.as_ref().unwrap();
        assert_eq!(dispatch.received, 1000);
        assert_eq!(dispatch.consumers[0].1.consumed_count, 1000);
        assert!(report
            .stages
            .iter()
            .all(|(_, state)| *state == StageState::Terminated));
    }

    /// Random completion order does not change the aggregate
    #[tokio::test]
    async fn test_summary_independent_of_timing() {
        async fn run_once() -> orchestrator::PipelineSummary {
            let fetcher = MockFetcher::new()
                .with_jitter(Duration::from_millis(3))
                .respond(urls(60)[7].clone(), MockResponse::Malformed)
                .respond(urls(60)[31].clone(), MockResponse::Transient(Some(404)));
            let dir = tempfile::tempdir().unwrap();
            let report = QueuePipeline::new(
                ListProducer::new("urls", urls(60)),
                Arc::new(fetcher),
                store_in(&dir),
            )
            .with_settings(settings(4, 4))
            .with_worker_settings(fast_worker())
            .run()
            .await
            .unwrap();
            report.summary
        }

        let first = run_once().await;
        let second = run_once().await;

        assert_eq!(first.stored, 58);
        assert_eq!(first.failed, 2);
        assert_eq!(first.stored, second.stored);
        assert_eq!(first.failed, second.failed);
        assert_eq!(first.failures_by_kind, second.failures_by_kind);
        assert_eq!(first.failures_by_kind.get(&FailureKind::Malformed), Some(&1));
        let names = |s: &orchestrator::PipelineSummary| -> Vec<_> {
            s.artifacts.iter().map(|p| p.file_name().map(|n| n.to_owned())).collect()
        };
        assert_eq!(names(&first), names(&second));
    }

    #[tokio::test]
    async fn test_static_partition_of_eight_over_three() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        let report = StaticPipeline::new(urls(8), Arc::new(MockFetcher::new()), Arc::clone(&store))
            .with_workers(3)
            .run()
            .await
            .unwrap();

        let per_worker: Vec<u64> = report.summary.workers.iter().map(|w| w.items).collect();
        assert_eq!(per_worker, vec![3, 3, 2]);
        assert_eq!(files_in(store.base_dir()), 8);
    }

    #[tokio::test]
    async fn test_consecutive_duplicate_fetched_once() {
        let fetcher = Arc::new(MockFetcher::new());
        let queries: Vec<Query> = ["colombo", "Colombo ", "matara"]
            .into_iter()
            .map(|raw| Query::parse(raw).unwrap())
            .collect();
        let dir = tempfile::tempdir().unwrap();

        let producer = ListProducer::new("queries", queries);
        let report = QueuePipeline::new(producer, Arc::clone(&fetcher), store_in(&dir))
            .with_settings(settings(1, 4))
            .with_dedup(DedupConfig::default())
            .run()
            .await
            .unwrap();

        assert_eq!(fetcher.calls(), 2);
        assert_eq!(fetcher.history(), vec!["colombo".to_string(), "matara".to_string()]);
        assert_eq!(report.summary.skipped, 1);
        assert_eq!(report.summary.stored, 2);
    }

    #[tokio::test]
    async fn test_fatal_worker_keeps_sibling_results() {
        // Worker 1 owns items 5..10 and dies on its third
        let fetcher = MockFetcher::new().respond(urls(15)[7].clone(), MockResponse::Fatal);
        let dir = tempfile::tempdir().unwrap();
        let report = StaticPipeline::new(urls(15), Arc::new(fetcher), store_in(&dir))
            .with_workers(3)
            .with_worker_settings(fast_worker())
            .run()
            .await
            .unwrap();

        let per_worker: Vec<u64> = report.summary.workers.iter().map(|w| w.stored).collect();
        assert_eq!(per_worker, vec![5, 2, 5]);
        assert_eq!(report.summary.fatal_workers(), vec![1]);
        assert!(report.summary.workers[0].exit.is_completed());
        assert!(report.summary.workers[2].exit.is_completed());
    }

    #[tokio::test]
    async fn test_storing_twice_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        let first = store
            .store(&resource("https://picsum.photos/id/1/400/600", "old"))
            .await
            .unwrap();
        let second = store
            .store(&resource("https://picsum.photos/id/1/400/600", "new"))
            .await
            .unwrap();

        assert_eq!(first.path, second.path);
        assert_eq!(files_in(store.base_dir()), 1);
        assert_eq!(std::fs::read_to_string(&second.path).unwrap(), "new");
    }
}

#[cfg(test)]
mod http_tests {
    use std::collections::HashMap;

    use std::path::Path;
    use std::time::Duration;

    use contracts::{ConsumerConfig, ConsumerKind, PipelineBlueprint, PipelineMode, UrlTemplate};
    use orchestrator::{run_blueprint, start_blueprint, PipelineReport};
    use wiremock::matchers::{method, path_regex};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn image_server() -> MockServer {
        slow_image_server(Duration::ZERO).await
    }

    async fn slow_image_server(delay: Duration) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path_regex(r"^/id/\d+/400/600$"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "image/jpeg")
                    .set_body_bytes(vec![0xFF, 0xD8, 0xFF, 0xE0])
                    .set_delay(delay),
            )
            .mount(&server)
            .await;
        server
    }

    fn template_blueprint(
        server: &MockServer,
        dir: &tempfile::TempDir,
        count: u64,
    ) -> PipelineBlueprint {
        let mut blueprint = PipelineBlueprint::for_queries(&[], "https://api.example.com/search");
        blueprint.search = None;
        blueprint.pipeline.workers = 3;
        blueprint.storage.base_dir = dir.path().join("images");
        blueprint.source.template = Some(UrlTemplate {
            pattern: format!("{}/id/{{i}}/400/600", server.uri()),
            count,
            start: 0,
        });
        blueprint
    }

    #[tokio::test]
    async fn test_queue_mode_downloads_and_writes_manifest() {
        let server = image_server().await;
        let dir = tempfile::tempdir().unwrap();
        let manifest = dir.path().join("manifest.jsonl");

        let mut blueprint = template_blueprint(&server, &dir, 12);
        blueprint.consumers.push(ConsumerConfig {
            name: "manifest".into(),
            kind: ConsumerKind::Manifest,
            queue_capacity: 8,
            params: HashMap::from([("path".to_string(), manifest.display().to_string())]),
        });

        let report = run_blueprint(&blueprint).await.unwrap();

        assert_eq!(report.summary.stored, 12);
        assert!(report.is_clean());
        for artifact in &report.summary.artifacts {
            assert_eq!(std::fs::read(artifact).unwrap(), vec![0xFF, 0xD8, 0xFF, 0xE0]);
        }
        let lines = std::fs::read_to_string(&manifest).unwrap();
        assert_eq!(lines.lines().count(), 12);
    }

    #[tokio::test]
    async fn test_static_mode_downloads_every_chunk() {
        let server = image_server().await;
        let dir = tempfile::tempdir().unwrap();

        let mut blueprint = template_blueprint(&server, &dir, 7);
        blueprint.pipeline.mode = PipelineMode::Static;

        let report = run_blueprint(&blueprint).await.unwrap();

        let per_worker: Vec<u64> = report.summary.workers.iter().map(|w| w.stored).collect();
        assert_eq!(per_worker, vec![3, 3, 1]);
        assert_eq!(report.summary.artifacts.len(), 7);
        assert!(report.dispatch.is_none());
    }

    #[tokio::test]
    async fn test_missing_images_are_counted_not_fatal() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        let dir = tempfile::tempdir().unwrap();

        let report = run_blueprint(&template_blueprint(&server, &dir, 4)).await.unwrap();

        assert_eq!(report.summary.stored, 0);
        assert_eq!(report.summary.failed, 4);
        assert!(report.summary.all_completed());
    }

    /// (finished images, leftover temp files)
    fn image_files(dir: &Path) -> (usize, usize) {
        let names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .collect();
        let partial = names.iter().filter(|n| n.ends_with(".part")).count();
        (names.len() - partial, partial)
    }

    async fn interrupted_run(mode: PipelineMode) -> (PipelineReport, tempfile::TempDir) {
        let server = slow_image_server(Duration::from_millis(20)).await;
        let dir = tempfile::tempdir().unwrap();

        let mut blueprint = template_blueprint(&server, &dir, 300);
        blueprint.pipeline.mode = mode;
        blueprint.pipeline.inbound_capacity = 4;

        let handle = start_blueprint(&blueprint).unwrap();
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(handle.shutdown());
        let report = handle.join().await.unwrap();
        (report, dir)
    }

    fn assert_partial_run_accounted(report: &PipelineReport, dir: &tempfile::TempDir) {
        let summary = &report.summary;
        assert!(report.interrupted);
        assert_eq!(summary.workers.len(), 3);
        assert!(summary.all_completed(), "every worker was joined after finishing");
        assert!(summary.stored > 0 && summary.stored < 300);
        assert_eq!(summary.stored + summary.failed, summary.items);
        assert_eq!(summary.items + summary.abandoned, report.produced);

        let (images, partial) = image_files(&dir.path().join("images"));
        assert_eq!(partial, 0, "no half-written downloads left behind");
        assert_eq!(images as u64, summary.stored);
    }

    #[tokio::test]
    async fn test_shutdown_in_queue_mode_drains_and_reports() {
        let (report, dir) = interrupted_run(PipelineMode::Queue).await;
        assert_partial_run_accounted(&report, &dir);
        assert!(report.produced < 300);
        assert_eq!(report.summary.abandoned, 0, "queued items are still fetched");
    }

    #[tokio::test]
    async fn test_shutdown_in_static_mode_abandons_rest() {
        let (report, dir) = interrupted_run(PipelineMode::Static).await;
        assert_partial_run_accounted(&report, &dir);
        assert_eq!(report.produced, 300);
        assert!(report.summary.abandoned > 0);
    }
}

#[cfg(test)]
mod layout_tests {
    use std::path::{Path, PathBuf};

    const MAX_WIDTH: usize = 100;

    fn rust_sources(dir: &Path, out: &mut Vec<PathBuf>) {
        for entry in std::fs::read_dir(dir).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                rust_sources(&path, out);
            } else if path.extension().is_some_and(|ext| ext == "rs") {
                out.push(path);
            }
        }
    }

    fn workspace_sources() -> Vec<PathBuf> {
        let crates = Path::new(env!("CARGO_MANIFEST_DIR")).join("..");
        let mut sources = Vec::new();
        for member in std::fs::read_dir(&crates).unwrap() {
            let src = member.unwrap().path().join("src");
            if src.is_dir() {
                rust_sources(&src, &mut sources);
            }
        }
        assert!(sources.len() > 20, "found only {} sources", sources.len());
        sources
    }

    fn has_cjk(line: &str) -> bool {
        line.chars().any(|c| ('\u{4e00}'..='\u{9fff}').contains(&c))
    }

    /// Three words in a row that read like an English sentence
    fn english_prose(line: &str) -> bool {
        let word = |w: &str, min: usize| {
            w.len() >= min && w.bytes().all(|b| b.is_ascii_alphabetic())
        };
        let words: Vec<&str> = line.split_whitespace().collect();
        words.windows(3).any(|w| {
            word(w[0], 3)
                && [w[1], w[2]]
                    .into_iter()
                    .all(|x| word(x, 2) && x.bytes().all(|b| b.is_ascii_lowercase()))
        })
    }

    #[test]
    fn test_comments_use_one_language_per_file() {
        let mut mixed = Vec::new();
        for path in workspace_sources() {
            let text = std::fs::read_to_string(&path).unwrap();
            let (mut chinese, mut english) = (0, 0);
            for line in text.lines().map(str::trim) {
                if !line.starts_with("//") || line.contains("```") || line.contains("::") {
                    continue;
                }
                if has_cjk(line) {
                    chinese += 1;
                } else if english_prose(line) {
                    english += 1;
                }
            }
            if chinese > 0 && english > 0 {
                mixed.push(path.display().to_string());
            }
        }
        assert!(mixed.is_empty(), "comments mix languages in {mixed:#?}");
    }

    #[test]
    fn test_sources_fit_rustfmt_width() {
        let mut wide = Vec::new();
        for path in &workspace_sources() {
            let text = std::fs::read_to_string(path).unwrap();
            for (n, line) in text.lines().enumerate() {
                if line.chars().count() > MAX_WIDTH {
                    wide.push(format!("{}:{}", path.display(), n + 1));
                }
            }
        }
        assert!(wide.is_empty(), "lines over {MAX_WIDTH} columns: {wide:#?}");
    }
}
