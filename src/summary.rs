// src/summary.rs
//! Per-registrant summary record emitted at the end of each pipeline run.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::Serialize;

use crate::candidate::{format_address, local_days};
use crate::feed::{GeoPoint, LocationSnapshot};
use crate::geo;

/// Radius bands (miles) reported in stats regardless of the registrant's own radius.
pub const RADIUS_BANDS: [u32; 4] = [5, 10, 25, 50];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RadiusStats {
    pub total_locations: usize,
    pub locations_with_availability: usize,
    /// In radius, not excluded, available.
    pub favorite_locations_with_availability: usize,
    /// Available locations per band, keyed `within_<n>_miles`.
    pub availability_by_band: BTreeMap<String, usize>,
}

pub fn radius_stats(
    locations: &[LocationSnapshot],
    center: GeoPoint,
    favorites: &[&LocationSnapshot],
) -> RadiusStats {
    let available: Vec<&LocationSnapshot> =
        locations.iter().filter(|l| l.appointments_available).collect();

    let availability_by_band = RADIUS_BANDS
        .iter()
        .map(|band| {
            let n = available
                .iter()
                .filter(|l| geo::is_within(center, f64::from(*band), l))
                .count();
            (format!("within_{band}_miles"), n)
        })
        .collect();

    RadiusStats {
        total_locations: locations.len(),
        locations_with_availability: available.len(),
        favorite_locations_with_availability: favorites
            .iter()
            .filter(|l| l.appointments_available)
            .count(),
        availability_by_band,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocationStatus {
    pub id: u64,
    pub name: String,
    pub address: String,
    pub appointments_available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub carries_vaccine: Option<bool>,
    pub appointment_vaccine_types: BTreeMap<String, bool>,
    pub all_doses: Option<bool>,
    pub second_dose_only: Option<bool>,
    /// Distinct ISO dates of listed slots in the registrant's zone, same keys as the ledger.
    pub appointment_dates: Vec<String>,
}

impl LocationStatus {
    pub fn new(loc: &LocationSnapshot, tz: Tz) -> Self {
        let (days, _) = local_days(loc, tz);
        Self {
            id: loc.id,
            name: loc.name.clone(),
            address: format_address(loc),
            appointments_available: loc.appointments_available,
            carries_vaccine: loc.carries_vaccine,
            appointment_vaccine_types: loc.vaccine_availability.clone(),
            all_doses: loc.all_doses,
            second_dose_only: loc.second_dose_only,
            appointment_dates: days
                .known()
                .iter()
                .map(|d| d.format("%Y-%m-%d").to_string())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SentAlert {
    pub location_id: u64,
    pub name: String,
    pub address: String,
    /// Ledger days newly reserved by this alert.
    pub new_days: Vec<String>,
    pub delivered: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    Completed,
    WindowClosed,
    WindowInvalid,
    FeedFailed,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegistrantReport {
    pub registrant: String,
    /// Redacted destination.
    pub destination: String,
    pub success: bool,
    pub outcome: RunOutcome,
    pub time: DateTime<Utc>,
    pub center: GeoPoint,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<RadiusStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub favorite_locations: Vec<LocationStatus>,
    pub ineligible: usize,
    pub suppressed: usize,
    pub sent: Vec<SentAlert>,
}

impl RegistrantReport {
    pub fn new(registrant: &crate::registrant::Registrant, outcome: RunOutcome, time: DateTime<Utc>) -> Self {
        Self {
            registrant: registrant.name.clone(),
            destination: registrant.destination.redacted(),
            success: !matches!(outcome, RunOutcome::FeedFailed | RunOutcome::WindowInvalid),
            outcome,
            time,
            center: registrant.center,
            stats: None,
            error_status: None,
            error_message: None,
            favorite_locations: Vec::new(),
            ineligible: 0,
            suppressed: 0,
            sent: Vec::new(),
        }
    }

    pub fn failed(mut self, status: Option<u16>, message: impl Into<String>) -> Self {
        self.success = false;
        self.error_status = status;
        self.error_message = Some(message.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc(id: u64, lat: f64, available: bool) -> LocationSnapshot {
        LocationSnapshot {
            id,
            name: format!("l{id}"),
            coordinates: GeoPoint::new(lat, -87.63),
            appointments_available: available,
            ..Default::default()
        }
    }

    #[test]
    fn status_dates_are_local_to_the_registrant() {
        use crate::feed::AppointmentSlot;
        use chrono::DateTime;

        let mut l = loc(9, 41.90, true);
        l.carries_vaccine = Some(true);
        l.vaccine_availability = [("moderna".to_string(), false), ("pfizer".to_string(), true)]
            .into_iter()
            .collect();
        l.appointments = ["2021-04-06T03:30:00+00:00", "2021-04-06T14:00:00+00:00"]
            .iter()
            .map(|t| AppointmentSlot {
                time: DateTime::parse_from_rfc3339(t).unwrap(),
                product: None,
            })
            .collect();

        let s = LocationStatus::new(&l, chrono_tz::America::Chicago);
        // 03:30 UTC is still the evening of the 5th in Chicago
        assert_eq!(s.appointment_dates, vec!["2021-04-05", "2021-04-06"]);
        assert_eq!(s.carries_vaccine, Some(true));
        assert_eq!(s.appointment_vaccine_types.get("moderna"), Some(&false));
    }

    #[test]
    fn bands_count_available_locations_only() {
        let center = GeoPoint::new(41.88, -87.63).unwrap();
        // one degree of latitude is ~69 miles
        let locs = vec![
            loc(1, 41.90, true),  // ~1.4 mi
            loc(2, 42.00, true),  // ~8.3 mi
            loc(3, 42.20, true),  // ~22 mi
            loc(4, 41.90, false), // near, unavailable
            loc(5, 43.00, true),  // ~77 mi
        ];
        let favs: Vec<&LocationSnapshot> = locs.iter().take(2).collect();
        let s = radius_stats(&locs, center, &favs);

        assert_eq!(s.total_locations, 5);
        assert_eq!(s.locations_with_availability, 4);
        assert_eq!(s.favorite_locations_with_availability, 2);
        assert_eq!(s.availability_by_band["within_5_miles"], 1);
        assert_eq!(s.availability_by_band["within_10_miles"], 2);
        assert_eq!(s.availability_by_band["within_25_miles"], 3);
        assert_eq!(s.availability_by_band["within_50_miles"], 3);
    }
}
