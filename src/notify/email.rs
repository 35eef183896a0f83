use anyhow::{Context, Result};
use lettre::message::{header, Mailbox, Message};
use lettre::transport::smtp::{authentication::Credentials, AsyncSmtpTransport};
use lettre::{AsyncTransport, Tokio1Executor};

use super::{NotificationBatch, Notifier};

pub struct EmailSender {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Mailbox,
}

impl EmailSender {
    /// Enabled only when SMTP_HOST is set; the remaining variables must then
    /// be present and valid.
    pub fn from_env() -> Result<Option<Self>> {
        let Ok(host) = std::env::var("SMTP_HOST") else {
            return Ok(None);
        };
        let user = std::env::var("SMTP_USER").context("SMTP_USER missing")?;
        let pass = std::env::var("SMTP_PASS").context("SMTP_PASS missing")?;
        let from_addr =
            std::env::var("NOTIFY_EMAIL_FROM").context("NOTIFY_EMAIL_FROM missing")?;
        let to_addr = std::env::var("NOTIFY_EMAIL_TO").context("NOTIFY_EMAIL_TO missing")?;

        let creds = Credentials::new(user, pass);
        let mailer = AsyncSmtpTransport::<Tokio1Executor>::relay(&host)
            .context("invalid SMTP_HOST")?
            .credentials(creds)
            .build();

        let from = from_addr.parse().context("invalid NOTIFY_EMAIL_FROM")?;
        let to = to_addr.parse().context("invalid NOTIFY_EMAIL_TO")?;

        Ok(Some(Self { mailer, from, to }))
    }
}

#[async_trait::async_trait]
impl Notifier for EmailSender {
    async fn deliver(&self, batch: &NotificationBatch) -> Result<()> {
        let subject = format!(
            "{}: {} nova(s) ocorrência(s)",
            batch.display_name,
            batch.occurrences.len()
        );
        let mut body = format!("Fonte: {}\n\n", batch.location);
        for occ in &batch.occurrences {
            body.push_str(&format!(
                "[{}] {}\n  {}\n\n",
                occ.extracted_at.to_rfc3339(),
                occ.pattern,
                occ.context_text
            ));
        }

        let msg = Message::builder()
            .from(self.from.clone())
            .to(self.to.clone())
            .subject(subject)
            .header(header::ContentType::TEXT_PLAIN)
            .body(body)
            .context("build email")?;

        self.mailer.send(msg).await.context("send email")?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "email"
    }
}
