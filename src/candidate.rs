// src/candidate.rs
//! Turns one available location into an alert candidate: address, the distinct
//! local days that have slots, and the rendered message. No I/O.

use std::collections::{BTreeSet, HashSet};

use chrono::{DateTime, FixedOffset, NaiveDate};
use chrono_tz::Tz;
use serde::Serialize;

use crate::feed::LocationSnapshot;

/// Marker used in messages when the feed reports availability without slot detail.
pub const DATES_NOT_AVAILABLE: &str = "not available";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "days", rename_all = "snake_case")]
pub enum AppointmentDays {
    /// Distinct local days in first-seen order. Never empty.
    Known(Vec<NaiveDate>),
    /// Availability flagged, but no concrete dates known.
    Unknown,
}

impl AppointmentDays {
    pub fn known(&self) -> &[NaiveDate] {
        match self {
            AppointmentDays::Known(days) => days,
            AppointmentDays::Unknown => &[],
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, AppointmentDays::Unknown)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertCandidate {
    pub location_id: u64,
    pub name: String,
    pub address: String,
    pub url: Option<String>,
    pub days: AppointmentDays,
    /// Distinct slot timestamps, first-seen order.
    pub slot_times: Vec<DateTime<FixedOffset>>,
    pub message: String,
    pub vaccine_types: BTreeSet<String>,
    pub appointment_types: BTreeSet<String>,
}

/// `address, city, region postal`, skipping whatever is missing.
pub fn format_address(loc: &LocationSnapshot) -> String {
    let region = match (loc.region.as_deref(), loc.postal_code.as_deref()) {
        (Some(r), Some(p)) => Some(format!("{r} {p}")),
        (Some(r), None) => Some(r.to_string()),
        (None, Some(p)) => Some(p.to_string()),
        (None, None) => None,
    };
    [loc.address.clone(), loc.city.clone(), region]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(", ")
}

/// US short date, e.g. `4/5/2021`.
pub fn format_day(day: NaiveDate) -> String {
    day.format("%-m/%-d/%Y").to_string()
}

pub fn format_days(days: &AppointmentDays) -> String {
    match days {
        AppointmentDays::Known(d) => d.iter().map(|d| format_day(*d)).collect::<Vec<_>>().join(", "),
        AppointmentDays::Unknown => DATES_NOT_AVAILABLE.to_string(),
    }
}

/// Distinct local days (in `tz`) and distinct timestamps, both in first-seen order.
pub fn local_days(loc: &LocationSnapshot, tz: Tz) -> (AppointmentDays, Vec<DateTime<FixedOffset>>) {
    let mut seen_days = HashSet::new();
    let mut seen_times = HashSet::new();
    let mut days = Vec::new();
    let mut times = Vec::new();

    for slot in &loc.appointments {
        let day = slot.time.with_timezone(&tz).date_naive();
        if seen_days.insert(day) {
            days.push(day);
        }
        if seen_times.insert(slot.time) {
            times.push(slot.time);
        }
    }

    if days.is_empty() {
        (AppointmentDays::Unknown, times)
    } else {
        (AppointmentDays::Known(days), times)
    }
}

fn render_message(
    name: &str,
    address: &str,
    days: &AppointmentDays,
    vaccine_types: &BTreeSet<String>,
    url: Option<&str>,
) -> String {
    let mut lines = vec![
        format!("Vaccine appointments available at {name}"),
        address.to_string(),
        format!("Dates: {}", format_days(days)),
    ];
    if !vaccine_types.is_empty() {
        let v: Vec<&str> = vaccine_types.iter().map(String::as_str).collect();
        lines.push(format!("Vaccines: {}", v.join(", ")));
    }
    if let Some(u) = url {
        lines.push(u.to_string());
    }
    lines.retain(|l| !l.is_empty());
    lines.join("\n")
}

/// Build the candidate for a location believed to have availability.
pub fn build_candidate(loc: &LocationSnapshot, tz: Tz) -> AlertCandidate {
    let address = format_address(loc);
    let (days, slot_times) = local_days(loc, tz);
    let message = render_message(&loc.name, &address, &days, &loc.vaccine_types, loc.url.as_deref());

    AlertCandidate {
        location_id: loc.id,
        name: loc.name.clone(),
        address,
        url: loc.url.clone(),
        days,
        slot_times,
        message,
        vaccine_types: loc.vaccine_types.clone(),
        appointment_types: loc.appointment_types.clone(),
    }
}
