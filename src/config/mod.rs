// src/config/mod.rs
//! Registrant list loading and normalisation.
//!
//! Older config files carried a bare `phone` instead of a `destination`; both
//! shapes are folded into [`Destination`] here so nothing past this boundary
//! sees config versions.

pub mod settings;

use anyhow::{anyhow, bail, Context, Result};
use chrono::NaiveDate;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::feed::GeoPoint;
use crate::registrant::{AlertWindowSpec, Destination, DestinationKind, Registrant};

pub use settings::RunSettings;

pub const ENV_REGISTRANTS_PATH: &str = "REGISTRANTS_PATH";

#[derive(Debug, Deserialize)]
struct RawPoint {
    latitude: f64,
    longitude: f64,
}

#[derive(Debug, Deserialize)]
struct RawRegistrant {
    name: Option<String>,
    #[serde(alias = "centerCoords")]
    center: RawPoint,
    #[serde(alias = "radiusMiles", alias = "radius")]
    radius_miles: f64,
    #[serde(default, alias = "excludedCities")]
    excluded_cities: Vec<String>,
    #[serde(alias = "eligibilityDate")]
    eligibility_date: String,
    #[serde(alias = "alertWindow")]
    alert_window: AlertWindowSpec,
    destination: Option<Destination>,
    /// Legacy: SMS number.
    phone: Option<String>,
    #[serde(alias = "feedPartition", alias = "state")]
    feed_partition: String,
}

fn parse_date(raw: &str) -> Result<NaiveDate> {
    let s = raw.trim();
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(s, "%m/%d/%Y"))
        .with_context(|| format!("invalid eligibility date {raw:?}"))
}

fn normalize(raw: RawRegistrant, index: usize) -> Result<Registrant> {
    let name = raw
        .name
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| format!("registrant-{}", index + 1));

    let center = GeoPoint::new(raw.center.latitude, raw.center.longitude)
        .ok_or_else(|| anyhow!("{name}: center coordinates out of range"))?;

    if !raw.radius_miles.is_finite() || raw.radius_miles <= 0.0 {
        bail!("{name}: radius must be a positive number of miles");
    }

    let destination = match (raw.destination, raw.phone) {
        (Some(d), phone) => {
            if phone.is_some() {
                tracing::warn!(registrant = %name, "both destination and legacy phone set, using destination");
            }
            Destination::new(d.kind, d.address)
        }
        (None, Some(phone)) => Destination::new(DestinationKind::Sms, phone),
        (None, None) => bail!("{name}: no destination configured"),
    };
    if destination.address.is_empty() {
        bail!("{name}: destination address is empty");
    }

    let feed_partition = raw.feed_partition.trim().to_ascii_uppercase();
    if feed_partition.is_empty() {
        bail!("{name}: feed partition is empty");
    }

    let excluded_cities = raw
        .excluded_cities
        .into_iter()
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .collect();

    Ok(Registrant {
        eligibility_date: parse_date(&raw.eligibility_date).with_context(|| name.clone())?,
        name,
        center,
        radius_miles: raw.radius_miles,
        excluded_cities,
        alert_window: raw.alert_window,
        destination,
        feed_partition,
    })
}

/// Keep valid entries, log and drop the rest.
fn collect_valid(items: Vec<Result<RawRegistrant, String>>) -> Vec<Registrant> {
    let mut out = Vec::with_capacity(items.len());
    for (i, item) in items.into_iter().enumerate() {
        match item.map_err(|e| anyhow!(e)).and_then(|raw| normalize(raw, i)) {
            Ok(r) => out.push(r),
            Err(e) => tracing::warn!(index = i, error = %format!("{e:#}"), "dropping invalid registrant"),
        }
    }
    out
}

/// TOML dates and times are first-class values; the schema wants them as strings.
fn stringify_datetimes(v: &mut toml::Value) {
    match v {
        toml::Value::Datetime(dt) => *v = toml::Value::String(dt.to_string()),
        toml::Value::Table(t) => t.iter_mut().for_each(|(_, x)| stringify_datetimes(x)),
        toml::Value::Array(a) => a.iter_mut().for_each(stringify_datetimes),
        _ => {}
    }
}

fn parse_toml(s: &str) -> Result<Vec<Registrant>> {
    #[derive(Deserialize)]
    struct TomlDoc {
        #[serde(default)]
        registrants: Vec<toml::Value>,
    }
    let doc: TomlDoc = toml::from_str(s)?;
    let items = doc
        .registrants
        .into_iter()
        .map(|mut v| {
            stringify_datetimes(&mut v);
            v.try_into::<RawRegistrant>().map_err(|e| e.to_string())
        })
        .collect();
    Ok(collect_valid(items))
}

/// Either a bare array or `{ "registrants": [...] }`.
fn parse_json(s: &str) -> Result<Vec<Registrant>> {
    let v: serde_json::Value = serde_json::from_str(s)?;
    let list = match v {
        serde_json::Value::Array(a) => a,
        serde_json::Value::Object(mut m) => match m.remove("registrants") {
            Some(serde_json::Value::Array(a)) => a,
            _ => bail!("JSON config has no registrants array"),
        },
        _ => bail!("JSON config must be an array or an object"),
    };
    let items = list
        .into_iter()
        .map(|v| serde_json::from_value::<RawRegistrant>(v).map_err(|e| e.to_string()))
        .collect();
    Ok(collect_valid(items))
}

fn parse_registrants(s: &str, hint_ext: &str) -> Result<Vec<Registrant>> {
    if hint_ext == "json" {
        return parse_json(s);
    }
    if hint_ext == "toml" {
        return parse_toml(s);
    }
    parse_toml(s).or_else(|_| parse_json(s))
}

/// Load registrants from an explicit TOML or JSON file.
pub fn load_registrants_from(path: &Path) -> Result<Vec<Registrant>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading registrants from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    parse_registrants(&content, ext.as_str())
        .with_context(|| format!("parsing registrants from {}", path.display()))
}

/// Load registrants using env var + fallbacks:
/// 1) $REGISTRANTS_PATH
/// 2) config/registrants.toml
/// 3) config/registrants.json
pub fn load_registrants_default() -> Result<Vec<Registrant>> {
    if let Ok(p) = std::env::var(ENV_REGISTRANTS_PATH) {
        let pb = PathBuf::from(p);
        if !pb.exists() {
            bail!("{ENV_REGISTRANTS_PATH} points to non-existent path {}", pb.display());
        }
        return load_registrants_from(&pb);
    }
    for candidate in ["config/registrants.toml", "config/registrants.json"] {
        let p = PathBuf::from(candidate);
        if p.exists() {
            return load_registrants_from(&p);
        }
    }
    bail!("no registrant config found (set {ENV_REGISTRANTS_PATH} or add config/registrants.toml)")
}
