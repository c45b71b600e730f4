// tests/common/mod.rs
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use parking_lot::Mutex;
use serde_json::{json, Value};

use vaccine_hunter::feed::{FeedSource, FixtureFeed};
use vaccine_hunter::LocationSnapshot;
use vaccine_hunter::ledger::{LedgerEntry, LedgerStore};
use vaccine_hunter::notify::{Notifier, OutboundAlert};
use vaccine_hunter::orchestrator::{poll_cycle, CycleReport};
use vaccine_hunter::registrant::{AlertWindowSpec, Destination, DestinationKind, Registrant};
use vaccine_hunter::GeoPoint;

/// 10:00 in Chicago on 2021-04-05.
pub fn morning() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2021, 4, 5, 15, 0, 0).unwrap()
}

pub fn day(m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2021, m, d).unwrap()
}

pub fn registrant(name: &str, phone: &str) -> Registrant {
    Registrant {
        name: name.into(),
        center: GeoPoint::new(41.88, -87.63).unwrap(),
        radius_miles: 10.0,
        excluded_cities: vec![],
        eligibility_date: day(4, 1),
        alert_window: AlertWindowSpec {
            start: "07:00".into(),
            end: "23:00".into(),
            timezone: "America/Chicago".into(),
        },
        destination: Destination::new(DestinationKind::Sms, phone),
        feed_partition: "IL".into(),
    }
}

pub fn feature(id: u64, lat: f64, lon: f64, city: &str, available: bool, times: &[&str]) -> Value {
    let appts: Vec<Value> = times
        .iter()
        .map(|t| json!({ "time": t, "type": "Pfizer", "vaccine_types": ["pfizer"] }))
        .collect();
    json!({
        "type": "Feature",
        "geometry": { "type": "Point", "coordinates": [lon, lat] },
        "properties": {
            "id": id,
            "name": format!("Pharmacy {id}"),
            "url": format!("https://example.test/{id}"),
            "city": city,
            "state": "IL",
            "address": format!("{id} Main St"),
            "postal_code": "60601",
            "appointments_available": available,
            "appointment_vaccine_types": { "pfizer": true },
            "appointments": appts
        }
    })
}

pub fn fixture(features: Vec<Value>) -> Arc<FixtureFeed> {
    let body = json!({ "type": "FeatureCollection", "features": features }).to_string();
    Arc::new(FixtureFeed::new().with_partition("IL", body))
}

#[derive(Default)]
pub struct MemStore {
    pub entries: Mutex<Vec<LedgerEntry>>,
    pub saves: AtomicUsize,
    pub fail_saves: bool,
}

impl MemStore {
    pub fn failing() -> Self {
        Self {
            fail_saves: true,
            ..Default::default()
        }
    }

    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LedgerStore for MemStore {
    async fn load(&self) -> Result<Vec<LedgerEntry>> {
        Ok(self.entries.lock().clone())
    }

    async fn save(&self, entries: &[LedgerEntry]) -> Result<()> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        if self.fail_saves {
            return Err(anyhow!("disk full"));
        }
        *self.entries.lock() = entries.to_vec();
        Ok(())
    }
}

/// Serves the fixture, except that one partition never answers.
pub struct StallingFeed {
    pub inner: Arc<FixtureFeed>,
    pub stalled_partition: String,
}

#[async_trait]
impl FeedSource for StallingFeed {
    async fn fetch(&self, partition: &str) -> Result<Vec<LocationSnapshot>> {
        if partition.eq_ignore_ascii_case(&self.stalled_partition) {
            tokio::time::sleep(Duration::from_secs(30)).await;
        }
        self.inner.fetch(partition).await
    }

    fn name(&self) -> &'static str {
        "stalling"
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<OutboundAlert>>,
    pub fail: bool,
    pub fail_first: bool,
    calls: AtomicUsize,
}

impl RecordingNotifier {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    /// Fails only the first send.
    pub fn failing_once() -> Self {
        Self {
            fail_first: true,
            ..Default::default()
        }
    }

    pub fn sent_to(&self, address: &str) -> Vec<OutboundAlert> {
        self.sent
            .lock()
            .iter()
            .filter(|a| a.destination.address == address)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, alert: &OutboundAlert) -> Result<()> {
        self.sent.lock().push(alert.clone());
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail || (self.fail_first && call == 0) {
            return Err(anyhow!("gateway down"));
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

pub async fn run(
    feed: Arc<FixtureFeed>,
    notifier: Arc<RecordingNotifier>,
    store: &MemStore,
    registrants: &[Registrant],
    now: DateTime<Utc>,
) -> CycleReport {
    poll_cycle(feed, notifier, store, registrants, Duration::from_secs(5), now).await
}
