// tests/watch_fetch_failure.rs
//
// A failing or hanging source contributes nothing this cycle, other sources
// still process, and the next cycle picks the failed source back up.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;

use gazette_watcher::dedup::DedupStore;
use gazette_watcher::extract::Extractor;
use gazette_watcher::fetch::{FetchError, Fetcher, StaticFetcher};
use gazette_watcher::notify::{CollectingSink, NotifierMux};
use gazette_watcher::pipeline::{CycleTrigger, Pipeline};
use gazette_watcher::source::{CompiledSource, PatternSpec, SourceSpec};
use gazette_watcher::state::JsonStateStore;

const SLOW_URL: &str = "https://example.org/slow";
const FAST_URL: &str = "https://example.org/fast";

fn source(id: &str, location: &str) -> CompiledSource {
    let mut spec = SourceSpec {
        id: id.into(),
        display_name: String::new(),
        location: location.into(),
        patterns: vec![PatternSpec::Literal("EDIÇÃO:".into())],
    };
    spec.normalize();
    CompiledSource::compile(spec).unwrap()
}

/// Hangs forever on one location, serves canned content for the rest.
struct HangingFetcher {
    hang: String,
    inner: StaticFetcher,
}

#[async_trait]
impl Fetcher for HangingFetcher {
    async fn fetch(&self, location: &str) -> Result<String, FetchError> {
        if location == self.hang {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        self.inner.fetch(location).await
    }
}

#[tokio::test(start_paused = true)]
async fn hung_fetch_times_out_and_other_sources_proceed() {
    let dir = tempfile::tempdir().unwrap();
    let fetcher = HangingFetcher {
        hang: SLOW_URL.into(),
        inner: StaticFetcher::new()
            .with_page(FAST_URL, "<p>EDIÇÃO: 77 de 05/03/2024</p>"),
    };
    let sink = Arc::new(CollectingSink::new());
    let pipeline = Pipeline {
        sources: vec![source("slow", SLOW_URL), source("fast", FAST_URL)],
        extractor: Extractor::default(),
        fetcher: Arc::new(fetcher),
        store: Arc::new(DedupStore::new(100)),
        state: Arc::new(JsonStateStore::new(dir.path().join("dedup.json"))),
        notifier: Arc::new(NotifierMux::new(vec![Box::new(sink.clone())])),
        fetch_timeout: Duration::from_secs(10),
        pacing_delay: Duration::from_millis(100),
    };
    let (_shutdown_tx, shutdown) = watch::channel(false);

    let report = pipeline.run_cycle(CycleTrigger::Tick, &shutdown).await;
    assert_eq!(report.sources_checked, 2);
    assert_eq!(report.fetch_failures, 1);
    assert_eq!(report.new_occurrences, 1);

    let batches = sink.batches.lock().unwrap();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].source_id, "fast");
}

#[tokio::test]
async fn failed_source_is_retried_on_the_next_cycle() {
    let dir = tempfile::tempdir().unwrap();
    // first cycle: no fixture for SLOW_URL -> permanent fetch error
    let fetcher = Arc::new(
        StaticFetcher::new().with_page(FAST_URL, "<p>EDIÇÃO: 77 de 05/03/2024</p>"),
    );
    let sink = Arc::new(CollectingSink::new());
    let pipeline = Pipeline {
        sources: vec![source("slow", SLOW_URL), source("fast", FAST_URL)],
        extractor: Extractor::default(),
        fetcher: fetcher.clone(),
        store: Arc::new(DedupStore::new(100)),
        state: Arc::new(JsonStateStore::new(dir.path().join("dedup.json"))),
        notifier: Arc::new(NotifierMux::new(vec![Box::new(sink.clone())])),
        fetch_timeout: Duration::from_secs(5),
        pacing_delay: Duration::from_millis(0),
    };
    let (_shutdown_tx, shutdown) = watch::channel(false);

    let first = pipeline.run_cycle(CycleTrigger::Tick, &shutdown).await;
    assert_eq!(first.fetch_failures, 1);
    assert_eq!(first.new_occurrences, 1);

    // the slow source comes back before the next cycle
    fetcher.set_page(SLOW_URL, "<p>EDIÇÃO: 12 de 05/03/2024</p>");

    let second = pipeline.run_cycle(CycleTrigger::Tick, &shutdown).await;
    assert_eq!(second.fetch_failures, 0);
    assert_eq!(second.new_occurrences, 1);

    let batches = sink.batches.lock().unwrap();
    assert_eq!(batches.len(), 2);
    assert_eq!(batches[1].source_id, "slow");
}
