//! Great-circle distance and initial bearing on WGS84 coordinates.

use crate::error::Result;
use crate::models::Coordinate;

/// Mean Earth radius (IUGG) in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_008.8;

/// Haversine distance in meters between two coordinates.
///
/// Symmetric, zero for identical points, and accurate to well under a meter
/// at campus scale.
pub fn distance(a: &Coordinate, b: &Coordinate) -> Result<f64> {
    a.validate()?;
    b.validate()?;
    Ok(haversine(a, b))
}

/// Initial bearing from `a` to `b`, in degrees within [0, 360).
pub fn bearing(a: &Coordinate, b: &Coordinate) -> Result<f64> {
    a.validate()?;
    b.validate()?;
    Ok(initial_bearing(a, b))
}

/// Unchecked variant for coordinates that were validated at ingestion.
pub(crate) fn haversine(a: &Coordinate, b: &Coordinate) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let dlat = (b.lat - a.lat).to_radians();
    let dlon = (b.lon - a.lon).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    // Clamp guards asin against rounding just above 1.0 for antipodal points.
    2.0 * EARTH_RADIUS_M * h.sqrt().min(1.0).asin()
}

pub(crate) fn initial_bearing(a: &Coordinate, b: &Coordinate) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let dlon = (b.lon - a.lon).to_radians();

    let y = dlon.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * dlon.cos();
    let degrees = y.atan2(x).to_degrees().rem_euclid(360.0);
    // rem_euclid can return exactly 360.0 for tiny negative inputs
    if degrees >= 360.0 {
        0.0
    } else {
        degrees
    }
}
