use anyhow::{anyhow, Result};
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

use super::{NotificationBatch, Notifier};

/// Discord webhook sink. One embed per detected occurrence, mirroring the
/// channel messages the bot this replaced used to post.
#[derive(Clone)]
pub struct DiscordNotifier {
    webhook: String,
    client: Client,
    timeout: Duration,
    max_retries: u8,
}

impl DiscordNotifier {
    pub fn new(webhook: String) -> Self {
        Self {
            webhook,
            client: Client::new(),
            timeout: Duration::from_secs(5),
            max_retries: 3,
        }
    }

    pub fn from_env() -> Option<Self> {
        std::env::var("DISCORD_WEBHOOK_URL").ok().map(Self::new)
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    pub fn with_retries(mut self, retries: u8) -> Self {
        self.max_retries = retries;
        self
    }

    async fn post(&self, payload: &DiscordWebhookPayload) -> Result<()> {
        let mut attempt: u8 = 0;
        loop {
            attempt += 1;
            let res = self
                .client
                .post(&self.webhook)
                .timeout(self.timeout)
                .json(payload)
                .send()
                .await;

            match res {
                Ok(rsp) => {
                    if let Err(e) = rsp.error_for_status_ref() {
                        if attempt < self.max_retries {
                            tokio::time::sleep(Duration::from_millis(500u64 << (attempt - 1)))
                                .await;
                            continue;
                        }
                        return Err(anyhow!("Discord webhook HTTP error: {e}"));
                    }
                    return Ok(());
                }
                Err(e) => {
                    if attempt < self.max_retries {
                        tokio::time::sleep(Duration::from_millis(500u64 << (attempt - 1))).await;
                        continue;
                    }
                    return Err(anyhow!("Discord webhook request failed: {e}"));
                }
            }
        }
    }
}

#[async_trait::async_trait]
impl Notifier for DiscordNotifier {
    async fn deliver(&self, batch: &NotificationBatch) -> Result<()> {
        for occ in &batch.occurrences {
            let title = format!("Nova atualização — {}", batch.display_name);
            let description = format!(
                "**Fonte:** {}\n**Padrão:** {}\n**Detectado em:** {}\n```{}```",
                batch.location,
                occ.pattern,
                occ.extracted_at.to_rfc3339(),
                occ.context_text
            );
            let payload = DiscordWebhookPayload::embed(&title, &description, &batch.location);
            self.post(&payload).await?;
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "discord"
    }
}

#[derive(Serialize)]
struct DiscordEmbed {
    title: String,
    description: String,
    url: String,
}

#[derive(Serialize)]
struct DiscordWebhookPayload {
    content: Option<String>,
    embeds: Vec<DiscordEmbed>,
}

impl DiscordWebhookPayload {
    fn embed(title: &str, description: &str, url: &str) -> Self {
        Self {
            content: None,
            embeds: vec![DiscordEmbed {
                title: title.to_string(),
                description: description.to_string(),
                url: url.to_string(),
            }],
        }
    }
}
