// src/notify/imessage.rs
use anyhow::{Context, Result};
use reqwest::Client;
use std::time::Duration;

use super::{Notifier, OutboundAlert};

/// Hands the message to an iMessage bridge (a webhook on a Mac that relays to Messages).
pub struct IMessageBridgeNotifier {
    bridge_url: String,
    token: Option<String>,
    client: Client,
    timeout: Duration,
}

impl IMessageBridgeNotifier {
    pub fn new(bridge_url: impl Into<String>) -> Self {
        Self {
            bridge_url: bridge_url.into(),
            token: None,
            client: Client::new(),
            timeout: Duration::from_secs(10),
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn from_env() -> Option<Self> {
        let url = std::env::var("IMESSAGE_BRIDGE_URL").ok().filter(|u| !u.trim().is_empty())?;
        let mut n = Self::new(url.trim());
        if let Ok(t) = std::env::var("IMESSAGE_BRIDGE_TOKEN") {
            n = n.with_token(t);
        }
        Some(n)
    }
}

#[async_trait::async_trait]
impl Notifier for IMessageBridgeNotifier {
    async fn send(&self, alert: &OutboundAlert) -> Result<()> {
        let body = serde_json::json!({
            "recipient": alert.destination.address,
            "text": alert.body,
        });

        let mut req = self.client.post(&self.bridge_url).timeout(self.timeout).json(&body);
        if let Some(t) = &self.token {
            req = req.bearer_auth(t);
        }

        req.send()
            .await
            .context("imessage bridge post")?
            .error_for_status()
            .context("imessage bridge non-2xx")?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "imessage"
    }
}
