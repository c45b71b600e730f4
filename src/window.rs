// src/window.rs
//! Daily alert window, evaluated in the registrant's own timezone.
//!
//! Windows that wrap past midnight are rejected at parse time: start must be
//! earlier than end on the same local day.

use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

use crate::registrant::AlertWindowSpec;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlertWindow {
    start: NaiveTime,
    end: NaiveTime,
    tz: Tz,
}

fn parse_time(raw: &str) -> Result<NaiveTime> {
    let s = raw.trim();
    NaiveTime::parse_from_str(s, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
        .with_context(|| format!("invalid window time {raw:?} (expected HH:MM or HH:MM:SS)"))
}

impl AlertWindow {
    pub fn new(start: NaiveTime, end: NaiveTime, tz: Tz) -> Result<Self> {
        if start >= end {
            bail!("alert window start {start} must be before end {end} (wrapping windows are not supported)");
        }
        Ok(Self { start, end, tz })
    }

    pub fn parse(spec: &AlertWindowSpec) -> Result<Self> {
        let start = parse_time(&spec.start)?;
        let end = parse_time(&spec.end)?;
        let tz: Tz = spec
            .timezone
            .trim()
            .parse()
            .map_err(|e| anyhow!("invalid timezone {:?}: {e}", spec.timezone))?;
        Self::new(start, end, tz)
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    /// The registrant-local calendar date at `now`.
    pub fn today(&self, now: DateTime<Utc>) -> NaiveDate {
        now.with_timezone(&self.tz).date_naive()
    }

    fn instant(&self, day: NaiveDate, t: NaiveTime) -> Result<DateTime<Utc>> {
        self.tz
            .from_local_datetime(&day.and_time(t))
            .earliest()
            .map(|dt| dt.with_timezone(&Utc))
            .ok_or_else(|| anyhow!("{t} does not exist on {day} in {}", self.tz))
    }

    /// Open when `now` is strictly after today's start and strictly before today's end.
    pub fn is_open(&self, now: DateTime<Utc>) -> Result<bool> {
        let day = self.today(now);
        let start = self.instant(day, self.start)?;
        let end = self.instant(day, self.end)?;
        Ok(now > start && now < end)
    }
}
