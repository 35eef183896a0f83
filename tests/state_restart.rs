// tests/state_restart.rs
//
// Restart durability: reloaded state must answer is_new exactly like the
// in-memory store did at save time.

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use tokio::sync::watch;

use gazette_watcher::dedup::DedupStore;
use gazette_watcher::extract::Extractor;
use gazette_watcher::fetch::StaticFetcher;
use gazette_watcher::notify::{CollectingSink, NotifierMux};
use gazette_watcher::pipeline::{CycleTrigger, Pipeline};
use gazette_watcher::source::{CompiledSource, PatternSpec, SourceSpec};
use gazette_watcher::state::{JsonStateStore, StateStore};

#[tokio::test]
async fn reloaded_store_answers_is_new_identically() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("dedup.json");

    let before = DedupStore::new(100);
    let t = Utc.with_ymd_and_hms(2024, 2, 1, 9, 0, 0).unwrap();
    for (source, fp) in [
        ("diario", "diario_123_01022024_edio123"),
        ("diario", "diario_124_02022024_edio124"),
        ("concurso", "concurso_7_20240201_edital7"),
    ] {
        before.commit(source, fp, t);
    }

    let state = JsonStateStore::new(&path);
    state.save_all(&before.snapshot()).await.unwrap();

    let after = DedupStore::with_records(100, state.load_all().await.unwrap());
    for (source, fp) in [
        ("diario", "diario_123_01022024_edio123"),
        ("diario", "diario_124_02022024_edio124"),
        ("concurso", "concurso_7_20240201_edital7"),
        ("diario", "diario_999_unknown_x"),
        ("outro", "diario_123_01022024_edio123"),
    ] {
        assert_eq!(
            before.is_new(source, fp),
            after.is_new(source, fp),
            "divergent answer for {source}/{fp}"
        );
    }
}

#[tokio::test]
async fn process_restart_does_not_renotify() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("dedup.json");
    let url = "https://example.org/diario";

    let mut spec = SourceSpec {
        id: "diario".into(),
        display_name: "Diário".into(),
        location: url.into(),
        patterns: vec![PatternSpec::Literal("EDIÇÃO:".into())],
    };
    spec.normalize();

    let build = |sink: Arc<CollectingSink>, store: Arc<DedupStore>| Pipeline {
        sources: vec![CompiledSource::compile(spec.clone()).unwrap()],
        extractor: Extractor::default(),
        fetcher: Arc::new(
            StaticFetcher::new().with_page(url, "<p>EDIÇÃO: 123 de 01/02/2024</p>"),
        ),
        store,
        state: Arc::new(JsonStateStore::new(&path)),
        notifier: Arc::new(NotifierMux::new(vec![Box::new(sink)])),
        fetch_timeout: Duration::from_secs(5),
        pacing_delay: Duration::from_millis(0),
    };
    let (_shutdown_tx, shutdown) = watch::channel(false);

    // first process lifetime: one detection, state saved as part of the cycle
    let sink1 = Arc::new(CollectingSink::new());
    let p1 = build(sink1.clone(), Arc::new(DedupStore::new(100)));
    let first = p1.run_cycle(CycleTrigger::Tick, &shutdown).await;
    assert_eq!(first.new_occurrences, 1);
    drop(p1);

    // "restart": fresh store rehydrated from disk
    let reloaded = JsonStateStore::new(&path).load_all().await.unwrap();
    assert_eq!(reloaded.len(), 1);
    let sink2 = Arc::new(CollectingSink::new());
    let p2 = build(sink2.clone(), Arc::new(DedupStore::with_records(100, reloaded)));
    let second = p2.run_cycle(CycleTrigger::Tick, &shutdown).await;

    assert_eq!(second.new_occurrences, 0);
    assert!(sink2.batches.lock().unwrap().is_empty());
}
