//! Geometry primitives: positions, great-circle distance, bearing, wind
//! components.

use serde::{Deserialize, Serialize};

/// Earth radius in nautical miles.
pub const EARTH_RADIUS_NM: f64 = 3440.065;

/// Metres per nautical mile.
pub const METERS_PER_NM: f64 = 1852.0;

/// Immutable geographic sample: degrees, feet, seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub lat: f64,
    pub lon: f64,
    pub altitude_ft: f64,
    pub timestamp: f64,
}

impl Position {
    pub fn new(lat: f64, lon: f64, altitude_ft: f64, timestamp: f64) -> Self {
        Position {
            lat,
            lon,
            altitude_ft,
            timestamp,
        }
    }

    pub fn distance_nm(&self, other: &Position) -> f64 {
        distance_nm(self, other)
    }

    pub fn bearing_deg(&self, other: &Position) -> f64 {
        bearing_deg(self, other)
    }
}

/// Great-circle distance in nautical miles (Haversine).
pub fn distance_nm(a: &Position, b: &Position) -> f64 {
    let dlat = (b.lat - a.lat).to_radians();
    let dlon = (b.lon - a.lon).to_radians();
    let h = (dlat / 2.0).sin().powi(2)
        + a.lat.to_radians().cos() * b.lat.to_radians().cos() * (dlon / 2.0).sin().powi(2);
    // Rounding can push h past 1 for near-antipodal points
    let h = h.clamp(0.0, 1.0);
    EARTH_RADIUS_NM * 2.0 * h.sqrt().atan2((1.0 - h).sqrt())
}

/// Initial bearing from `a` to `b` in degrees, normalized to [0, 360).
pub fn bearing_deg(a: &Position, b: &Position) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let dlon = (b.lon - a.lon).to_radians();

    let x = dlon.sin() * lat2.cos();
    let y = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * dlon.cos();

    normalize_heading(x.atan2(y).to_degrees())
}

/// Wrap any angle into [0, 360).
pub fn normalize_heading(deg: f64) -> f64 {
    let h = deg.rem_euclid(360.0);
    // rem_euclid can return 360.0 for tiny negative inputs
    if h >= 360.0 {
        0.0
    } else {
        h
    }
}

/// Shortest angular distance between two headings, in [0, 180].
pub fn angular_difference(a: f64, b: f64) -> f64 {
    let diff = (a - b).abs() % 360.0;
    if diff > 180.0 {
        360.0 - diff
    } else {
        diff
    }
}

/// Signed tailwind component in knots; positive is tailwind.
pub fn tailwind_component(runway_heading: f64, wind_dir: f64, wind_speed: f64) -> f64 {
    -wind_speed * (wind_dir - runway_heading).to_radians().cos()
}

/// Signed headwind component in knots; positive is headwind.
pub fn headwind_component(runway_heading: f64, wind_dir: f64, wind_speed: f64) -> f64 {
    -tailwind_component(runway_heading, wind_dir, wind_speed)
}

/// True if the wind blows within `threshold_deg` of the runway heading.
pub fn is_headwind(runway_heading: f64, wind_dir: f64, threshold_deg: f64) -> bool {
    angular_difference(runway_heading, wind_dir) <= threshold_deg
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
