// src/pipeline.rs
//
// One check cycle: for each source in turn, fetch -> extract -> fingerprint
// -> dedup-filter -> commit -> notify, with pacing between sources. No error
// in here is fatal; a failed source is skipped until the next cycle.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use metrics::{counter, gauge};
use serde::Serialize;
use tokio::sync::watch;

use crate::dedup::DedupStore;
use crate::extract::Extractor;
use crate::fetch::{FetchError, Fetcher};
use crate::fingerprint;
use crate::metrics::describe_watch_metrics;
use crate::notify::{NotificationBatch, NotifierMux};
use crate::source::CompiledSource;
use crate::state::StateStore;

/// What one full pass over all sources did.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct CycleReport {
    pub sources_checked: usize,
    pub fetch_failures: usize,
    pub candidates_seen: usize,
    pub new_occurrences: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleTrigger {
    Tick,
    Manual,
}

struct SourceOutcome {
    candidates: usize,
    committed: usize,
}

pub struct Pipeline {
    pub sources: Vec<CompiledSource>,
    pub extractor: Extractor,
    pub fetcher: Arc<dyn Fetcher>,
    pub store: Arc<DedupStore>,
    pub state: Arc<dyn StateStore>,
    pub notifier: Arc<NotifierMux>,
    pub fetch_timeout: Duration,
    pub pacing_delay: Duration,
}

impl Pipeline {
    /// Run one full cycle over all sources, sequentially. `shutdown` is
    /// consulted between sources; a source already being processed finishes
    /// its commit-and-notify step so dedup state never gets ahead of a
    /// delivery that was never attempted.
    pub async fn run_cycle(
        &self,
        trigger: CycleTrigger,
        shutdown: &watch::Receiver<bool>,
    ) -> CycleReport {
        describe_watch_metrics();
        tracing::info!(?trigger, sources = self.sources.len(), "check cycle started");

        let mut report = CycleReport::default();
        let mut committed_any = false;

        for (i, source) in self.sources.iter().enumerate() {
            if *shutdown.borrow() {
                tracing::info!("shutdown requested, abandoning remaining sources");
                break;
            }
            if i > 0 {
                tokio::time::sleep(self.pacing_delay).await;
            }

            match self.check_source(source).await {
                Ok(outcome) => {
                    report.sources_checked += 1;
                    report.candidates_seen += outcome.candidates;
                    report.new_occurrences += outcome.committed;
                    committed_any |= outcome.committed > 0;
                }
                Err(e) => {
                    report.sources_checked += 1;
                    report.fetch_failures += 1;
                    counter!("watch_fetch_errors_total").increment(1);
                    tracing::warn!(source = source.id(), error = %e, "fetch failed, source skipped this cycle");
                }
            }
        }

        if committed_any {
            if let Err(e) = self.state.save_all(&self.store.snapshot()).await {
                tracing::warn!(error = ?e, "state save failed, in-memory records stay authoritative");
            }
        }

        counter!("watch_cycles_total").increment(1);
        counter!("watch_candidates_total").increment(report.candidates_seen as u64);
        counter!("watch_new_occurrences_total").increment(report.new_occurrences as u64);
        gauge!("watch_last_cycle_ts").set(Utc::now().timestamp().max(0) as f64);
        gauge!("watch_tracked_fingerprints").set(self.store.total_tracked() as f64);

        tracing::info!(
            new = report.new_occurrences,
            failures = report.fetch_failures,
            tracked = self.store.total_tracked(),
            "check cycle finished"
        );
        report
    }

    async fn check_source(&self, source: &CompiledSource) -> Result<SourceOutcome, FetchError> {
        let raw = match tokio::time::timeout(
            self.fetch_timeout,
            self.fetcher.fetch(&source.spec.location),
        )
        .await
        {
            Ok(Ok(body)) => body,
            Ok(Err(e)) => return Err(e),
            Err(_) => {
                return Err(FetchError::Transient(format!(
                    "fetch exceeded {:?}",
                    self.fetch_timeout
                )))
            }
        };

        let text = crate::extract::page_text(&raw);
        let candidates = self.extractor.extract(&text, source);
        let now = Utc::now();

        let mut fresh = Vec::new();
        for candidate in candidates.iter() {
            let fp = fingerprint::fingerprint(candidate);
            if self.store.is_new(source.id(), &fp) {
                self.store.commit(source.id(), &fp, now);
                fresh.push(candidate.clone());
            }
        }
        self.store.touch_checked(source.id(), now);

        if !fresh.is_empty() {
            tracing::info!(
                source = source.id(),
                new = fresh.len(),
                "new occurrences detected"
            );
            let batch = NotificationBatch {
                source_id: source.id().to_string(),
                display_name: source.spec.display_name.clone(),
                location: source.spec.location.clone(),
                occurrences: fresh.clone(),
            };
            // Commits above stand regardless of the outcome here.
            self.notifier.deliver(&batch).await;
        } else {
            tracing::debug!(source = source.id(), "no new occurrences");
        }

        Ok(SourceOutcome {
            candidates: candidates.len(),
            committed: fresh.len(),
        })
    }
}
