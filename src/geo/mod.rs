//! Coordinates and great-circle distance.

pub mod geocoding;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

pub use geocoding::{Geocoder, GoogleGeocoder, StaticGeocoder};

/// Mean Earth radius in meters
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// WGS84 position in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    /// Checked constructor for user-supplied positions
    pub fn new(latitude: f64, longitude: f64) -> AppResult<Self> {
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return Err(AppError::BadValues(format!(
                "Latitude {} is outside [-90, 90]",
                latitude
            )));
        }
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            return Err(AppError::BadValues(format!(
                "Longitude {} is outside [-180, 180]",
                longitude
            )));
        }
        Ok(Self { latitude, longitude })
    }

    pub fn distance_to(&self, other: &Coordinate) -> f64 {
        distance(self, other)
    }
}

/// Haversine distance in meters.
///
/// The intermediate term is clamped to `[0, 1]`; rounding can push it
/// slightly past 1 for near-antipodal points, which would make the
/// square root of `1 - h` NaN.
pub fn distance(a: &Coordinate, b: &Coordinate) -> f64 {
    let phi1 = a.latitude.to_radians();
    let phi2 = b.latitude.to_radians();
    let delta_phi = (b.latitude - a.latitude).to_radians();
    let delta_lambda = (b.longitude - a.longitude).to_radians();

    let sin_phi = (delta_phi / 2.0).sin();
    let sin_lambda = (delta_lambda / 2.0).sin();
    let h = (sin_phi * sin_phi + phi1.cos() * phi2.cos() * sin_lambda * sin_lambda).clamp(0.0, 1.0);

    2.0 * h.sqrt().atan2((1.0 - h).sqrt()) * EARTH_RADIUS_METERS
}
