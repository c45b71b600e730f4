// src/feed/types.rs
use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

/// A (latitude, longitude) pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    /// Returns `None` when either component is non-finite or out of range.
    pub fn new(latitude: f64, longitude: f64) -> Option<Self> {
        let valid = latitude.is_finite()
            && longitude.is_finite()
            && (-90.0..=90.0).contains(&latitude)
            && (-180.0..=180.0).contains(&longitude);
        valid.then_some(Self {
            latitude,
            longitude,
        })
    }

    /// GeoJSON order: `[longitude, latitude]`. Anything but a two-element pair is malformed.
    pub fn from_lon_lat(coords: &[f64]) -> Option<Self> {
        match coords {
            [lon, lat] => Self::new(*lat, *lon),
            _ => None,
        }
    }
}

/// One bookable slot as reported by the feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppointmentSlot {
    pub time: DateTime<FixedOffset>,
    /// Product label, e.g. "Pfizer" or "Moderna - 2nd Dose Only".
    pub product: Option<String>,
}

/// One polled location. Rebuilt from scratch on every poll.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LocationSnapshot {
    pub id: u64,
    pub name: String,
    pub address: Option<String>,
    pub city: Option<String>,
    pub region: Option<String>,
    pub postal_code: Option<String>,
    pub url: Option<String>,
    pub provider: Option<String>,
    /// `None` when the feed geometry was missing or malformed.
    pub coordinates: Option<GeoPoint>,
    pub appointments_available: bool,
    pub carries_vaccine: Option<bool>,
    pub appointments: Vec<AppointmentSlot>,
    /// Per-product availability flags exactly as the feed reported them.
    pub vaccine_availability: BTreeMap<String, bool>,
    /// Products flagged available.
    pub vaccine_types: BTreeSet<String>,
    pub appointment_types: BTreeSet<String>,
    pub all_doses: Option<bool>,
    pub second_dose_only: Option<bool>,
}
