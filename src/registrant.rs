// src/registrant.rs
//! Registrant: one monitored person and where their alerts go.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::feed::GeoPoint;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DestinationKind {
    Sms,
    Imessage,
    Email,
}

impl fmt::Display for DestinationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DestinationKind::Sms => "sms",
            DestinationKind::Imessage => "imessage",
            DestinationKind::Email => "email",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Destination {
    pub kind: DestinationKind,
    pub address: String,
}

/// Identity of a destination inside the dedup ledger.
///
/// Phone destinations (sms and imessage) key on the trimmed number itself, which
/// keeps entries written by older versions, keyed on a bare phone, valid.
/// Email keys are lower-cased.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DestinationKey(pub String);

impl DestinationKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DestinationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Destination {
    pub fn new(kind: DestinationKind, address: impl Into<String>) -> Self {
        Self {
            kind,
            address: address.into().trim().to_string(),
        }
    }

    pub fn key(&self) -> DestinationKey {
        match self.kind {
            DestinationKind::Sms | DestinationKind::Imessage => {
                DestinationKey(self.address.trim().to_string())
            }
            DestinationKind::Email => DestinationKey(self.address.trim().to_lowercase()),
        }
    }

    /// Short digest safe to put in logs.
    pub fn redacted(&self) -> String {
        use sha2::{Digest, Sha256};
        let digest = Sha256::digest(self.key().as_str().as_bytes());
        let mut out = String::with_capacity(12);
        for b in digest.iter().take(6) {
            use std::fmt::Write as _;
            let _ = write!(&mut out, "{:02x}", b);
        }
        format!("{}:{}", self.kind, out)
    }
}

/// Daily notification window as configured. Parsed (and validated) by
/// [`crate::window::AlertWindow::parse`] at the start of each cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertWindowSpec {
    pub start: String,
    pub end: String,
    #[serde(alias = "timeZone", alias = "tz")]
    pub timezone: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Registrant {
    pub name: String,
    pub center: GeoPoint,
    pub radius_miles: f64,
    #[serde(default)]
    pub excluded_cities: Vec<String>,
    pub eligibility_date: NaiveDate,
    pub alert_window: AlertWindowSpec,
    pub destination: Destination,
    /// Feed partition, e.g. a state code.
    pub feed_partition: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phone_destinations_share_the_legacy_bare_number_key() {
        let sms = Destination::new(DestinationKind::Sms, " +13125550100 ");
        let imsg = Destination::new(DestinationKind::Imessage, "+13125550100");
        assert_eq!(sms.key(), DestinationKey("+13125550100".into()));
        assert_eq!(sms.key(), imsg.key());
    }

    #[test]
    fn email_key_is_case_insensitive() {
        let a = Destination::new(DestinationKind::Email, "Someone@Example.com");
        assert_eq!(a.key().as_str(), "someone@example.com");
    }

    #[test]
    fn redacted_never_contains_address() {
        let d = Destination::new(DestinationKind::Sms, "+13125550100");
        let r = d.redacted();
        assert!(r.starts_with("sms:"));
        assert!(!r.contains("5550100"));
        assert_eq!(r.len(), "sms:".len() + 12);
    }
}
