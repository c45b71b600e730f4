// src/eligibility.rs
//! Eligibility gate: suppress alerts for days before the registrant may book.

use chrono::NaiveDate;

use crate::candidate::{AlertCandidate, AppointmentDays};

/// Known days: pass when any day is on or after `eligibility_date`.
/// Unknown days: nothing to check against, so pass only when the registrant is
/// already eligible as of `today`.
pub fn is_eligible(candidate: &AlertCandidate, eligibility_date: NaiveDate, today: NaiveDate) -> bool {
    match &candidate.days {
        AppointmentDays::Known(days) => days.iter().any(|d| *d >= eligibility_date),
        AppointmentDays::Unknown => eligibility_date <= today,
    }
}
