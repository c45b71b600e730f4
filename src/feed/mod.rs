// src/feed/mod.rs
//! Availability feed: wire format, parsing, and the providers that fetch it.

pub mod types;

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use chrono::DateTime;
use reqwest::Client;
use serde::de::{DeserializeOwned, Deserializer};
use serde::Deserialize;
use serde_json::Value;

pub use types::{AppointmentSlot, GeoPoint, LocationSnapshot};

pub const DEFAULT_FEED_BASE_URL: &str = "https://www.vaccinespotter.org/api/v0/states";

#[async_trait::async_trait]
pub trait FeedSource: Send + Sync {
    /// Fetch the current snapshot for one partition (state code).
    async fn fetch(&self, partition: &str) -> Result<Vec<LocationSnapshot>>;
    fn name(&self) -> &'static str;
}

/// Non-2xx answer from the feed. Kept as a typed error so summaries can report the status.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("feed HTTP {status} {message}")]
pub struct FeedHttpError {
    pub status: u16,
    pub message: String,
}

// --- wire format (GeoJSON FeatureCollection) ---
//
// Only `properties.id` is required. Every other field falls back to its
// default when it has an unexpected type, so one odd value never drops a
// location from the snapshot.

/// Deserialize `T`, or `T::default()` when the value has the wrong shape.
fn lenient<'de, D, T>(d: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let raw = Value::deserialize(d)?;
    Ok(serde_json::from_value(raw).unwrap_or_default())
}

#[derive(Debug, Deserialize)]
struct WireCollection {
    #[serde(default)]
    features: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct WireFeature {
    #[serde(default, deserialize_with = "lenient")]
    geometry: Option<WireGeometry>,
    properties: WireProperties,
}

#[derive(Debug, Default, Deserialize)]
struct WireGeometry {
    #[serde(default, deserialize_with = "lenient")]
    coordinates: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct WireProperties {
    id: u64,
    #[serde(default, deserialize_with = "lenient")]
    name: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    url: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    city: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    state: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    address: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    postal_code: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    provider_brand_name: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    appointments: Vec<Value>,
    #[serde(default, deserialize_with = "lenient")]
    appointments_available: Option<bool>,
    #[serde(default, deserialize_with = "lenient")]
    carries_vaccine: Option<bool>,
    #[serde(default, deserialize_with = "lenient")]
    appointment_vaccine_types: BTreeMap<String, Value>,
    #[serde(default, deserialize_with = "lenient")]
    appointment_types: BTreeMap<String, Value>,
    #[serde(default, deserialize_with = "lenient")]
    appointments_available_all_doses: Option<bool>,
    #[serde(default, deserialize_with = "lenient")]
    appointments_available_2nd_dose_only: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct WireAppointment {
    #[serde(default, deserialize_with = "lenient")]
    time: Option<String>,
    #[serde(rename = "type", default, deserialize_with = "lenient")]
    product: Option<String>,
}

/// Keeps only boolean flags; anything else is treated as unknown and left out.
fn bool_flags(map: BTreeMap<String, Value>) -> BTreeMap<String, bool> {
    map.into_iter()
        .filter_map(|(k, v)| v.as_bool().map(|b| (k, b)))
        .collect()
}

fn true_keys(flags: &BTreeMap<String, bool>) -> BTreeSet<String> {
    flags
        .iter()
        .filter_map(|(k, v)| v.then(|| k.clone()))
        .collect()
}

fn empty_to_none(s: Option<String>) -> Option<String> {
    s.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

impl From<WireFeature> for LocationSnapshot {
    fn from(f: WireFeature) -> Self {
        let p = f.properties;

        let coordinates = f.geometry.and_then(|g| {
            let coords: Option<Vec<f64>> = g.coordinates.iter().map(Value::as_f64).collect();
            coords.and_then(|c| GeoPoint::from_lon_lat(&c))
        });

        let appointments = p
            .appointments
            .into_iter()
            .filter_map(|raw| {
                let a: WireAppointment = serde_json::from_value(raw).unwrap_or_default();
                let time = a.time?;
                match DateTime::parse_from_rfc3339(time.trim()) {
                    Ok(parsed) => Some(AppointmentSlot {
                        time: parsed,
                        product: empty_to_none(a.product),
                    }),
                    Err(e) => {
                        tracing::debug!(target: "feed", location = p.id, raw = %time, error = %e, "skipping slot with bad timestamp");
                        None
                    }
                }
            })
            .collect();

        let vaccine_availability = bool_flags(p.appointment_vaccine_types);
        let appointment_flags = bool_flags(p.appointment_types);

        LocationSnapshot {
            id: p.id,
            name: empty_to_none(p.name).unwrap_or_else(|| format!("Location {}", p.id)),
            address: empty_to_none(p.address),
            city: empty_to_none(p.city),
            region: empty_to_none(p.state),
            postal_code: empty_to_none(p.postal_code),
            url: empty_to_none(p.url),
            provider: empty_to_none(p.provider_brand_name),
            coordinates,
            appointments_available: p.appointments_available.unwrap_or(false),
            carries_vaccine: p.carries_vaccine,
            appointments,
            vaccine_types: true_keys(&vaccine_availability),
            vaccine_availability,
            appointment_types: true_keys(&appointment_flags),
            all_doses: p.appointments_available_all_doses,
            second_dose_only: p.appointments_available_2nd_dose_only,
        }
    }
}

/// Parse one feed response body. Individual malformed features are skipped;
/// only an unreadable document is an error.
pub fn parse_feed(body: &str) -> Result<Vec<LocationSnapshot>> {
    let doc: WireCollection = serde_json::from_str(body).context("parse feed JSON")?;
    let mut out = Vec::with_capacity(doc.features.len());
    for raw in doc.features {
        match serde_json::from_value::<WireFeature>(raw) {
            Ok(f) => out.push(f.into()),
            Err(e) => tracing::debug!(target: "feed", error = %e, "skipping malformed feature"),
        }
    }
    Ok(out)
}

/// HTTP provider for the public per-state JSON endpoints.
#[derive(Clone)]
pub struct VaccineSpotterFeed {
    base_url: String,
    client: Client,
    timeout: Duration,
}

impl VaccineSpotterFeed {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: Client::new(),
            timeout: Duration::from_secs(20),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn url_for(&self, partition: &str) -> String {
        format!("{}/{}.json", self.base_url, partition.trim().to_ascii_uppercase())
    }
}

#[async_trait::async_trait]
impl FeedSource for VaccineSpotterFeed {
    async fn fetch(&self, partition: &str) -> Result<Vec<LocationSnapshot>> {
        let url = self.url_for(partition);
        let resp = self
            .client
            .get(&url)
            .timeout(self.timeout)
            .send()
            .await
            .with_context(|| format!("fetch {url}"))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(anyhow!(FeedHttpError {
                status: status.as_u16(),
                message: status.canonical_reason().unwrap_or("unknown").to_string(),
            }));
        }

        let body = resp.text().await.context("read feed body")?;
        parse_feed(&body)
    }

    fn name(&self) -> &'static str {
        "vaccinespotter"
    }
}

/// Serves canned feed bodies keyed by partition. Used by tests and dry runs.
#[derive(Debug, Clone, Default)]
pub struct FixtureFeed {
    bodies: HashMap<String, String>,
}

impl FixtureFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_partition(mut self, partition: &str, body: impl Into<String>) -> Self {
        self.bodies
            .insert(partition.trim().to_ascii_uppercase(), body.into());
        self
    }
}

#[async_trait::async_trait]
impl FeedSource for FixtureFeed {
    async fn fetch(&self, partition: &str) -> Result<Vec<LocationSnapshot>> {
        let key = partition.trim().to_ascii_uppercase();
        let body = self.bodies.get(&key).ok_or_else(|| {
            anyhow!(FeedHttpError {
                status: 404,
                message: format!("no fixture for {key}"),
            })
        })?;
        parse_feed(body)
    }

    fn name(&self) -> &'static str {
        "fixture"
    }
}
