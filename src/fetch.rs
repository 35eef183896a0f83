// src/fetch.rs
use std::collections::HashMap;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use thiserror::Error;

/// Fetch failures, split so a future backoff policy can treat them
/// differently. The pipeline currently skips the source for the cycle in
/// both cases; the next scheduled cycle is the retry.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("transient fetch failure: {0}")]
    Transient(String),
    #[error("permanent fetch failure: {0}")]
    Permanent(String),
}

#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Retrieve the raw content behind `location`. Must not retry
    /// internally; retry is cycle-level.
    async fn fetch(&self, location: &str) -> Result<String, FetchError>;
}

/// Plain reqwest-backed fetcher. One attempt per call, bounded by the
/// request timeout; gazette sites tend to reject unknown agents, hence the
/// browser-ish User-Agent.
pub struct HttpFetcher {
    client: reqwest::Client,
}

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .context("building http client")?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, location: &str) -> Result<String, FetchError> {
        let resp = self
            .client
            .get(location)
            .send()
            .await
            .map_err(classify_reqwest_error)?;

        let status = resp.status();
        if status.is_client_error() {
            return Err(FetchError::Permanent(format!(
                "http status {status} for {location}"
            )));
        }
        if !status.is_success() {
            return Err(FetchError::Transient(format!(
                "http status {status} for {location}"
            )));
        }

        resp.text().await.map_err(classify_reqwest_error)
    }
}

/// Timeouts and connection drops come back on the next cycle; anything
/// structurally broken (bad URL, redirect loop) will not fix itself.
fn classify_reqwest_error(err: reqwest::Error) -> FetchError {
    if err.is_timeout() || err.is_connect() || err.is_request() {
        FetchError::Transient(err.to_string())
    } else {
        FetchError::Permanent(err.to_string())
    }
}

// --- Test helper ---
/// Serves canned content per location. Locations without a fixture fail
/// permanently, which doubles as the malformed-location case in tests.
#[derive(Debug, Default)]
pub struct StaticFetcher {
    pages: std::sync::Mutex<HashMap<String, String>>,
}

impl StaticFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(self, location: &str, content: &str) -> Self {
        self.pages
            .lock()
            .unwrap()
            .insert(location.to_string(), content.to_string());
        self
    }

    /// Swap a page's content between cycles.
    pub fn set_page(&self, location: &str, content: &str) {
        self.pages
            .lock()
            .unwrap()
            .insert(location.to_string(), content.to_string());
    }
}

#[async_trait]
impl Fetcher for StaticFetcher {
    async fn fetch(&self, location: &str) -> Result<String, FetchError> {
        self.pages
            .lock()
            .unwrap()
            .get(location)
            .cloned()
            .ok_or_else(|| FetchError::Permanent(format!("no fixture for {location}")))
    }
}
