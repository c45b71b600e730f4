// src/notify/sms.rs
use anyhow::{anyhow, Context, Result};
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

use super::{Notifier, OutboundAlert};

/// Posts `{ "to", "message" }` to an HTTP SMS gateway with a bearer key.
#[derive(Clone)]
pub struct SmsGatewayNotifier {
    gateway_url: String,
    api_key: Option<String>,
    client: Client,
    timeout: Duration,
}

#[derive(Serialize)]
struct SmsPayload<'a> {
    to: &'a str,
    message: &'a str,
}

impl SmsGatewayNotifier {
    pub fn new(gateway_url: impl Into<String>) -> Self {
        Self {
            gateway_url: gateway_url.into(),
            api_key: None,
            client: Client::new(),
            timeout: Duration::from_secs(10),
        }
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// `SMS_GATEWAY_URL` enables the channel; `SMS_GATEWAY_KEY` is optional.
    pub fn from_env() -> Option<Self> {
        let url = std::env::var("SMS_GATEWAY_URL").ok().filter(|u| !u.trim().is_empty())?;
        let mut n = Self::new(url.trim());
        if let Ok(key) = std::env::var("SMS_GATEWAY_KEY") {
            n = n.with_api_key(key);
        }
        Some(n)
    }
}

#[async_trait::async_trait]
impl Notifier for SmsGatewayNotifier {
    async fn send(&self, alert: &OutboundAlert) -> Result<()> {
        let payload = SmsPayload {
            to: &alert.destination.address,
            message: &alert.body,
        };

        let mut req = self
            .client
            .post(&self.gateway_url)
            .timeout(self.timeout)
            .json(&payload);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        let rsp = req.send().await.context("sms gateway request")?;
        if let Err(e) = rsp.error_for_status_ref() {
            return Err(anyhow!("sms gateway HTTP error: {e}"));
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "sms"
    }
}
