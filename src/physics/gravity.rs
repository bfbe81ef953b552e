use serde::{Deserialize, Serialize};

use crate::dynamics::state::{EARTH_RADIUS, G0};
use crate::physics::geodetic::WorldCoordinate;

// ---------------------------------------------------------------------------
// Gravity models
// ---------------------------------------------------------------------------

/// Magnitude of gravitational acceleration at a world position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GravityModel {
    /// Fixed value, m/s^2.
    Constant(f64),
    /// WGS84 normal gravity at the ellipsoid, inverse-square scaled by altitude.
    Wgs84,
}

impl Default for GravityModel {
    fn default() -> Self {
        GravityModel::Wgs84
    }
}

impl GravityModel {
    pub fn gravity(&self, position: &WorldCoordinate) -> f64 {
        match *self {
            GravityModel::Constant(g) => g,
            GravityModel::Wgs84 => wgs84_gravity(position.latitude, position.altitude),
        }
    }
}

/// Somigliana normal gravity for latitude (rad), corrected for altitude (m).
pub fn wgs84_gravity(latitude: f64, altitude: f64) -> f64 {
    let sin2 = latitude.sin().powi(2);
    let g_surface =
        9.780_326_771_4 * (1.0 + 0.001_931_851_386_39 * sin2) / (1.0 - 0.006_694_379_990_13 * sin2).sqrt();
    g_surface * inverse_square(altitude)
}

/// Scale of sea-level gravity at a given altitude.
fn inverse_square(altitude: f64) -> f64 {
    (EARTH_RADIUS / (EARTH_RADIUS + altitude)).powi(2)
}

/// Standard gravity scaled by altitude only.
pub fn standard_gravity(altitude: f64) -> f64 {
    G0 * inverse_square(altitude.max(0.0))
}
