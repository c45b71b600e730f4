// src/notify/mod.rs
//! Outbound notification channels and the multiplexer that routes an alert to
//! the channel matching its destination kind.

pub mod email;
pub mod imessage;
pub mod sms;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};

use crate::registrant::{Destination, DestinationKind};

/// One message to one destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundAlert {
    pub destination: Destination,
    pub subject: String,
    pub body: String,
}

#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    /// Best-effort delivery. No confirmation beyond the transport's own answer.
    async fn send(&self, alert: &OutboundAlert) -> Result<()>;
    fn name(&self) -> &'static str;
}

/// Routes by destination kind, bounding every send with a timeout.
/// A kind without a configured channel is logged instead of sent.
pub struct NotifierMux {
    channels: HashMap<DestinationKind, Arc<dyn Notifier>>,
    timeout: Duration,
}

impl Default for NotifierMux {
    fn default() -> Self {
        Self {
            channels: HashMap::new(),
            timeout: Duration::from_secs(15),
        }
    }
}

impl NotifierMux {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_channel(mut self, kind: DestinationKind, notifier: Arc<dyn Notifier>) -> Self {
        self.channels.insert(kind, notifier);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Build every channel whose environment is configured.
    pub fn from_env() -> Self {
        let mut mux = Self::new();
        if let Some(sms) = sms::SmsGatewayNotifier::from_env() {
            mux = mux.with_channel(DestinationKind::Sms, Arc::new(sms));
        }
        if let Some(im) = imessage::IMessageBridgeNotifier::from_env() {
            mux = mux.with_channel(DestinationKind::Imessage, Arc::new(im));
        }
        match email::EmailSender::from_env() {
            Ok(Some(mail)) => mux = mux.with_channel(DestinationKind::Email, Arc::new(mail)),
            Ok(None) => {}
            Err(e) => tracing::warn!(error = %format!("{e:#}"), "email channel misconfigured, disabled"),
        }
        tracing::info!(
            sms = mux.channels.contains_key(&DestinationKind::Sms),
            imessage = mux.channels.contains_key(&DestinationKind::Imessage),
            email = mux.channels.contains_key(&DestinationKind::Email),
            "notification channels"
        );
        mux
    }
}

#[async_trait::async_trait]
impl Notifier for NotifierMux {
    async fn send(&self, alert: &OutboundAlert) -> Result<()> {
        let kind = alert.destination.kind;
        let Some(channel) = self.channels.get(&kind) else {
            tracing::info!(
                channel = %kind,
                to = %alert.destination.redacted(),
                body = %alert.body,
                "channel not configured, alert logged only"
            );
            return Ok(());
        };

        match tokio::time::timeout(self.timeout, channel.send(alert)).await {
            Ok(res) => res,
            Err(_) => Err(anyhow!(
                "{} send timed out after {:?}",
                channel.name(),
                self.timeout
            )),
        }
    }

    fn name(&self) -> &'static str {
        "mux"
    }
}
