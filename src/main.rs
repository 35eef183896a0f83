//! Gazette Watcher — Binary Entrypoint
//! Boots the scheduler and the Axum status surface, wiring config, state,
//! fetcher and notification channels.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use gazette_watcher::api;
use gazette_watcher::config::WatcherConfig;
use gazette_watcher::dedup::DedupStore;
use gazette_watcher::extract::Extractor;
use gazette_watcher::fetch::{Fetcher, HttpFetcher};
use gazette_watcher::metrics::Metrics;
use gazette_watcher::notify::NotifierMux;
use gazette_watcher::pipeline::Pipeline;
use gazette_watcher::scheduler::{self, SchedulerCfg};
use gazette_watcher::state::{JsonStateStore, StateStore};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("gazette_watcher=info,warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = WatcherConfig::load_default().context("loading watcher config")?;
    let sources = cfg.compile_sources().context("compiling source patterns")?;
    if sources.is_empty() {
        tracing::warn!("no sources configured; nothing will be watched");
    }

    let metrics = Metrics::init();

    // Unusable state storage is the one startup failure worth dying for;
    // everything after this point degrades instead of crashing.
    let json_store = Arc::new(JsonStateStore::new(cfg.state_path.clone()));
    json_store
        .ensure_writable()
        .await
        .context("initializing state storage")?;
    let state_store: Arc<dyn StateStore> = json_store;

    let records = match state_store.load_all().await {
        Ok(r) => r,
        Err(e) => {
            tracing::warn!(error = ?e, "state load failed, starting with an empty dedup store");
            HashMap::new()
        }
    };
    let store = Arc::new(DedupStore::with_records(cfg.dedup_capacity, records));

    let fetcher: Arc<dyn Fetcher> = Arc::new(HttpFetcher::new(cfg.fetch_timeout())?);
    let notifier = Arc::new(NotifierMux::from_env());
    if notifier.is_empty() {
        tracing::warn!("no notification channels configured; detections will only be logged");
    }

    let pipeline = Arc::new(Pipeline {
        sources,
        extractor: Extractor::new(cfg.context_chars, cfg.max_per_pattern),
        fetcher,
        store: store.clone(),
        state: state_store.clone(),
        notifier,
        fetch_timeout: cfg.fetch_timeout(),
        pacing_delay: cfg.pacing_delay(),
    });

    let handle = scheduler::spawn(
        pipeline,
        SchedulerCfg {
            check_interval: cfg.check_interval(),
            warmup_delay: cfg.warmup_delay(),
        },
    );

    let app_state = api::AppState {
        store,
        state_store,
        scheduler: handle.client(),
        sources: Arc::new(cfg.sources.clone()),
        check_interval_secs: cfg.check_interval_secs,
    };
    let app = api::router(app_state).merge(metrics.router());

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(8000);
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port))
        .await
        .with_context(|| format!("binding 0.0.0.0:{port}"))?;
    tracing::info!(
        port,
        sources = cfg.sources.len(),
        interval_secs = cfg.check_interval_secs,
        "gazette watcher up"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving status api")?;

    handle.shutdown().await;
    Ok(())
}
