use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use tower_http::cors::CorsLayer;

use crate::dedup::{DedupStore, SourceStat};
use crate::scheduler::SchedulerClient;
use crate::source::SourceSpec;
use crate::state::StateStore;

/// Thin status/admin surface over the watcher: the same operations the old
/// chat commands exposed, minus the chat.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<DedupStore>,
    pub state_store: Arc<dyn StateStore>,
    pub scheduler: SchedulerClient,
    pub sources: Arc<Vec<SourceSpec>>,
    pub check_interval_secs: u64,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/status", get(status))
        .route("/sources", get(sources))
        .route("/check", post(trigger_check))
        .route("/admin/reset", post(reset))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

#[derive(serde::Serialize)]
struct StatusResponse {
    check_interval_secs: u64,
    sources_configured: usize,
    total_tracked: usize,
    sources: Vec<SourceStat>,
}

async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        check_interval_secs: state.check_interval_secs,
        sources_configured: state.sources.len(),
        total_tracked: state.store.total_tracked(),
        sources: state.store.source_stats(),
    })
}

#[derive(serde::Serialize)]
struct SourceInfo {
    id: String,
    display_name: String,
    location: String,
    patterns: Vec<String>,
}

async fn sources(State(state): State<AppState>) -> Json<Vec<SourceInfo>> {
    let out = state
        .sources
        .iter()
        .map(|s| SourceInfo {
            id: s.id.clone(),
            display_name: s.display_name.clone(),
            location: s.location.clone(),
            patterns: s.patterns.iter().map(|p| p.label().to_string()).collect(),
        })
        .collect();
    Json(out)
}

async fn trigger_check(State(state): State<AppState>) -> impl IntoResponse {
    match state.scheduler.trigger_manual().await {
        Some(report) => Json(report).into_response(),
        None => (
            StatusCode::CONFLICT,
            "a check cycle is already running or queued",
        )
            .into_response(),
    }
}

#[derive(serde::Deserialize)]
struct ResetParams {
    /// Reset a single source; omit to reset everything.
    source: Option<String>,
}

#[derive(serde::Serialize)]
struct ResetResponse {
    cleared: usize,
    source: Option<String>,
}

async fn reset(
    State(state): State<AppState>,
    Query(params): Query<ResetParams>,
) -> Json<ResetResponse> {
    let cleared = state.store.reset(params.source.as_deref());
    tracing::info!(source = ?params.source, cleared, "dedup records reset");
    // Persist right away so a crash does not resurrect the cleared records.
    if let Err(e) = state.state_store.save_all(&state.store.snapshot()).await {
        tracing::warn!(error = ?e, "state save after reset failed");
    }
    Json(ResetResponse {
        cleared,
        source: params.source,
    })
}
