// src/notify/mod.rs
pub mod discord;
pub mod email;
pub mod slack;

use anyhow::Result;
use serde::Serialize;

use crate::extract::CandidateOccurrence;

/// Everything a sink needs to announce the newly-detected occurrences of one
/// source for one cycle. Built only when at least one fingerprint was
/// committed; handed over and discarded.
#[derive(Debug, Clone, Serialize)]
pub struct NotificationBatch {
    pub source_id: String,
    pub display_name: String,
    pub location: String,
    pub occurrences: Vec<CandidateOccurrence>,
}

#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    async fn deliver(&self, batch: &NotificationBatch) -> Result<()>;
    fn name(&self) -> &'static str;
}

#[async_trait::async_trait]
impl<T: Notifier + ?Sized> Notifier for std::sync::Arc<T> {
    async fn deliver(&self, batch: &NotificationBatch) -> Result<()> {
        (**self).deliver(batch).await
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}

/// Fan-out to every configured channel. Channel failures are logged and
/// swallowed: dedup commits are never rolled back because a webhook was
/// down, so an occurrence is announced at most once.
pub struct NotifierMux {
    channels: Vec<Box<dyn Notifier>>,
}

impl NotifierMux {
    pub fn new(channels: Vec<Box<dyn Notifier>>) -> Self {
        Self { channels }
    }

    /// Build from the environment: Discord/Slack webhooks and SMTP email,
    /// each enabled by the presence of its variables.
    pub fn from_env() -> Self {
        let mut channels: Vec<Box<dyn Notifier>> = Vec::new();
        if let Some(d) = discord::DiscordNotifier::from_env() {
            channels.push(Box::new(d));
        }
        if let Some(s) = slack::SlackNotifier::from_env() {
            channels.push(Box::new(s));
        }
        match email::EmailSender::from_env() {
            Ok(Some(e)) => channels.push(Box::new(e)),
            Ok(None) => {}
            Err(e) => tracing::warn!(error = ?e, "email notifier misconfigured, disabled"),
        }
        Self { channels }
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Deliver to every channel; returns how many accepted the batch.
    pub async fn deliver(&self, batch: &NotificationBatch) -> usize {
        if self.channels.is_empty() {
            tracing::debug!(
                source = %batch.source_id,
                occurrences = batch.occurrences.len(),
                "no notification channels configured, batch dropped"
            );
            return 0;
        }
        let mut delivered = 0;
        for channel in &self.channels {
            match channel.deliver(batch).await {
                Ok(()) => delivered += 1,
                Err(e) => {
                    tracing::warn!(
                        channel = channel.name(),
                        source = %batch.source_id,
                        error = ?e,
                        "notification delivery failed"
                    );
                }
            }
        }
        delivered
    }
}

// --- Test helper ---
/// Records every batch it is handed; `fail` makes deliveries error to
/// exercise the commits-stand-on-failure contract.
#[derive(Default)]
pub struct CollectingSink {
    pub batches: std::sync::Mutex<Vec<NotificationBatch>>,
    pub fail: bool,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            batches: std::sync::Mutex::new(vec![]),
            fail: true,
        }
    }
}

#[async_trait::async_trait]
impl Notifier for CollectingSink {
    async fn deliver(&self, batch: &NotificationBatch) -> Result<()> {
        self.batches.lock().unwrap().push(batch.clone());
        if self.fail {
            anyhow::bail!("sink configured to fail");
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "collecting"
    }
}
