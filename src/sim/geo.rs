//! Great-circle geometry for the world-map animation.

use serde::{Deserialize, Serialize};

/// Mean Earth radius in kilometers
const EARTH_RADIUS_KM: f64 = 6371.0;

/// A point on the globe in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coord {
    pub lat: f64,
    pub lon: f64,
}

impl Coord {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

/// Great-circle distance between two points (haversine)
pub fn distance_km(a: Coord, b: Coord) -> f64 {
    let (lat1, lon1) = (a.lat.to_radians(), a.lon.to_radians());
    let (lat2, lon2) = (b.lat.to_radians(), b.lon.to_radians());

    let dlat = lat2 - lat1;
    let dlon = lon2 - lon1;

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().asin()
}

/// Point at fraction `t` (0..=1) along the great circle from `a` to `b`.
///
/// Spherical interpolation through 3-space; degenerate (identical or
/// antipodal-adjacent) pairs fall back to the start point.
pub fn intermediate(a: Coord, b: Coord, t: f64) -> Coord {
    let t = t.clamp(0.0, 1.0);
    let va = to_unit_vector(a);
    let vb = to_unit_vector(b);

    let dot = (va.0 * vb.0 + va.1 * vb.1 + va.2 * vb.2).clamp(-1.0, 1.0);
    let angle = dot.acos();

    if angle.sin().abs() < 1e-9 {
        return a;
    }

    let wa = ((1.0 - t) * angle).sin() / angle.sin();
    let wb = (t * angle).sin() / angle.sin();

    let v = (
        wa * va.0 + wb * vb.0,
        wa * va.1 + wb * vb.1,
        wa * va.2 + wb * vb.2,
    );

    from_unit_vector(v)
}

fn to_unit_vector(c: Coord) -> (f64, f64, f64) {
    let lat = c.lat.to_radians();
    let lon = c.lon.to_radians();
    (lat.cos() * lon.cos(), lat.cos() * lon.sin(), lat.sin())
}

fn from_unit_vector(v: (f64, f64, f64)) -> Coord {
    let norm = (v.0 * v.0 + v.1 * v.1 + v.2 * v.2).sqrt();
    let lat = (v.2 / norm).asin().to_degrees();
    let lon = v.1.atan2(v.0).to_degrees();
    Coord { lat, lon }
}
