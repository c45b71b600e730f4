// src/notify/email.rs
use anyhow::{bail, Context, Result};
use lettre::message::{header, Mailbox, Message};
use lettre::transport::smtp::{authentication::Credentials, AsyncSmtpTransport};
use lettre::{AsyncTransport, Tokio1Executor};

use super::{Notifier, OutboundAlert};

pub struct EmailSender {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

impl EmailSender {
    /// `Ok(None)` when `SMTP_HOST` is unset. A half-configured channel is an error.
    pub fn from_env() -> Result<Option<Self>> {
        let Some(host) = env_opt("SMTP_HOST") else {
            return Ok(None);
        };
        let (Some(user), Some(pass), Some(from_addr)) =
            (env_opt("SMTP_USER"), env_opt("SMTP_PASS"), env_opt("NOTIFY_EMAIL_FROM"))
        else {
            bail!("SMTP_HOST is set but SMTP_USER, SMTP_PASS or NOTIFY_EMAIL_FROM is missing");
        };

        let creds = Credentials::new(user, pass);
        let mailer = AsyncSmtpTransport::<Tokio1Executor>::relay(&host)
            .context("invalid SMTP_HOST")?
            .credentials(creds)
            .build();

        let from: Mailbox = from_addr.parse().context("invalid NOTIFY_EMAIL_FROM")?;

        Ok(Some(Self { mailer, from }))
    }
}

#[async_trait::async_trait]
impl Notifier for EmailSender {
    async fn send(&self, alert: &OutboundAlert) -> Result<()> {
        let to: Mailbox = alert
            .destination
            .address
            .parse()
            .context("invalid recipient address")?;

        let msg = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(alert.subject.clone())
            .header(header::ContentType::TEXT_PLAIN)
            .body(alert.body.clone())
            .context("build email")?;

        self.mailer.send(msg).await.context("send email")?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "email"
    }
}
