use axum::{routing::get, Router};
use metrics::{describe_counter, describe_gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

/// One-time metrics registration (so series show up on /metrics).
pub fn describe_watch_metrics() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("watch_cycles_total", "Completed check cycles.");
        describe_counter!(
            "watch_fetch_errors_total",
            "Sources skipped due to fetch failure or timeout."
        );
        describe_counter!(
            "watch_candidates_total",
            "Candidate occurrences extracted across all cycles."
        );
        describe_counter!(
            "watch_new_occurrences_total",
            "Occurrences committed as new and handed to the sinks."
        );
        describe_gauge!("watch_last_cycle_ts", "Unix ts when the last cycle finished.");
        describe_gauge!(
            "watch_tracked_fingerprints",
            "Fingerprints currently tracked across all sources."
        );
    });
}

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Initialize the Prometheus recorder. Call once, at startup.
    pub fn init() -> Self {
        let builder = PrometheusBuilder::new();
        let handle = builder
            .install_recorder()
            .expect("prometheus: install recorder");
        describe_watch_metrics();
        Self { handle }
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}
