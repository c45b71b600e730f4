// src/geo.rs
//! Distance and city-exclusion filtering over polled locations. Pure functions.

use crate::feed::{GeoPoint, LocationSnapshot};

/// Mean Earth radius in statute miles.
pub const EARTH_RADIUS_MILES: f64 = 3958.8;

/// Great-circle distance in miles (haversine).
pub fn haversine_miles(a: GeoPoint, b: GeoPoint) -> f64 {
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lon = (b.longitude - a.longitude).to_radians();
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_MILES * h.sqrt().min(1.0).asin()
}

/// Distance from `center`, or `None` when the location has no usable coordinates.
pub fn distance_miles(center: GeoPoint, loc: &LocationSnapshot) -> Option<f64> {
    let d = haversine_miles(center, loc.coordinates?);
    d.is_finite().then_some(d)
}

/// True when the location is strictly closer than `radius_miles`.
/// Locations without coordinates never match.
pub fn is_within(center: GeoPoint, radius_miles: f64, loc: &LocationSnapshot) -> bool {
    distance_miles(center, loc).is_some_and(|d| d < radius_miles)
}

pub fn within_radius<'a>(
    locations: &'a [LocationSnapshot],
    center: GeoPoint,
    radius_miles: f64,
) -> Vec<&'a LocationSnapshot> {
    locations
        .iter()
        .filter(|loc| is_within(center, radius_miles, loc))
        .collect()
}

/// Case-insensitive city match against the exclusion list. A missing city is never excluded.
pub fn is_excluded_city(loc: &LocationSnapshot, excluded: &[String]) -> bool {
    let Some(city) = loc.city.as_deref() else {
        return false;
    };
    let city = city.trim().to_lowercase();
    excluded.iter().any(|e| e.trim().to_lowercase() == city)
}

pub fn exclude_cities<'a>(
    locations: Vec<&'a LocationSnapshot>,
    excluded: &[String],
) -> Vec<&'a LocationSnapshot> {
    locations
        .into_iter()
        .filter(|loc| !is_excluded_city(loc, excluded))
        .collect()
}

/// Both stages: radius first, then city exclusion.
pub fn filter_locations<'a>(
    locations: &'a [LocationSnapshot],
    center: GeoPoint,
    radius_miles: f64,
    excluded: &[String],
) -> Vec<&'a LocationSnapshot> {
    exclude_cities(within_radius(locations, center, radius_miles), excluded)
}
