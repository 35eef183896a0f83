use anyhow::{Context, Result};
use reqwest::Client;

use super::{NotificationBatch, Notifier};

pub struct SlackNotifier {
    webhook_url: String,
    client: Client,
}

impl SlackNotifier {
    pub fn new(url: String) -> Self {
        Self {
            webhook_url: url,
            client: Client::new(),
        }
    }

    pub fn from_env() -> Option<Self> {
        std::env::var("SLACK_WEBHOOK_URL").ok().map(Self::new)
    }
}

#[async_trait::async_trait]
impl Notifier for SlackNotifier {
    async fn deliver(&self, batch: &NotificationBatch) -> Result<()> {
        let mut lines = vec![format!(
            "*{}* — {} nova(s) ocorrência(s)\n{}",
            batch.display_name,
            batch.occurrences.len(),
            batch.location
        )];
        for occ in &batch.occurrences {
            lines.push(format!("> `{}` {}", occ.pattern, occ.context_text));
        }
        let body = serde_json::json!({ "text": lines.join("\n") });

        self.client
            .post(&self.webhook_url)
            .json(&body)
            .send()
            .await
            .context("slack post")?
            .error_for_status()
            .context("slack non-2xx")?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "slack"
    }
}
