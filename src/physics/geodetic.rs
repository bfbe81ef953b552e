use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::dynamics::state::EARTH_RADIUS;

/// Earth rotation rate, rad/s.
pub const EARTH_ROTATION: f64 = 7.292_115_0e-5;

const METERS_PER_DEGREE_LATITUDE: f64 = 111_325.0;
const METERS_PER_DEGREE_LONGITUDE_EQUATOR: f64 = 111_050.0;

// ---------------------------------------------------------------------------
// World coordinate
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct WorldCoordinate {
    pub latitude: f64,  // rad, [-pi/2, pi/2]
    pub longitude: f64, // rad, (-pi, pi]
    pub altitude: f64,  // m above sea level
}

impl WorldCoordinate {
    pub fn new(latitude: f64, longitude: f64, altitude: f64) -> Self {
        use std::f64::consts::{FRAC_PI_2, PI, TAU};
        let latitude = latitude.clamp(-FRAC_PI_2, FRAC_PI_2);
        let mut longitude = longitude.rem_euclid(TAU);
        if longitude > PI {
            longitude -= TAU;
        }
        Self { latitude, longitude, altitude }
    }

    pub fn from_degrees(latitude: f64, longitude: f64, altitude: f64) -> Self {
        Self::new(latitude.to_radians(), longitude.to_radians(), altitude)
    }

    pub fn latitude_deg(&self) -> f64 {
        self.latitude.to_degrees()
    }

    pub fn longitude_deg(&self) -> f64 {
        self.longitude.to_degrees()
    }
}

// ---------------------------------------------------------------------------
// Geodetic computation strategy
// ---------------------------------------------------------------------------

/// How launch-frame displacements map onto the globe. Launch frame: x east, y north, z up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeodeticComputation {
    /// Equirectangular approximation, no Coriolis effect.
    #[default]
    Flat,
    /// Great-circle displacement on a spherical Earth, with Coriolis acceleration.
    Spherical,
}

impl GeodeticComputation {
    pub fn add_coordinate(&self, origin: &WorldCoordinate, delta: &Vector3<f64>) -> WorldCoordinate {
        match self {
            GeodeticComputation::Flat => {
                let per_deg_lon = METERS_PER_DEGREE_LONGITUDE_EQUATOR * origin.latitude.cos();
                let dlon = if per_deg_lon.abs() > 1e-6 { delta.x / per_deg_lon } else { 0.0 };
                WorldCoordinate::from_degrees(
                    origin.latitude_deg() + delta.y / METERS_PER_DEGREE_LATITUDE,
                    origin.longitude_deg() + dlon,
                    origin.altitude + delta.z,
                )
            }
            GeodeticComputation::Spherical => {
                let distance = delta.x.hypot(delta.y);
                let bearing = delta.x.atan2(delta.y);
                let angle = distance / EARTH_RADIUS;
                let (sin_lat, cos_lat) = origin.latitude.sin_cos();
                let lat = (sin_lat * angle.cos() + cos_lat * angle.sin() * bearing.cos()).asin();
                let lon = origin.longitude
                    + (bearing.sin() * angle.sin() * cos_lat).atan2(angle.cos() - sin_lat * lat.sin());
                WorldCoordinate::new(lat, lon, origin.altitude + delta.z)
            }
        }
    }

    /// Coriolis acceleration `-2 Ω × v` in the local east-north-up frame.
    pub fn coriolis_acceleration(
        &self,
        position: &WorldCoordinate,
        velocity: &Vector3<f64>,
    ) -> Vector3<f64> {
        match self {
            GeodeticComputation::Flat => Vector3::zeros(),
            GeodeticComputation::Spherical => {
                let (sin_lat, cos_lat) = position.latitude.sin_cos();
                let omega = Vector3::new(0.0, cos_lat, sin_lat) * EARTH_ROTATION;
                -2.0 * omega.cross(velocity)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn flat_moves_north() {
        let origin = WorldCoordinate::from_degrees(0.0, 0.0, 100.0);
        let p = GeodeticComputation::Flat.add_coordinate(&origin, &Vector3::new(0.0, 111_325.0, 50.0));
        assert_abs_diff_eq!(p.latitude_deg(), 1.0, epsilon = 1e-9);
        assert_abs_diff_eq!(p.altitude, 150.0, epsilon = 1e-9);
    }

    #[test]
    fn spherical_matches_flat_for_short_hops() {
        let origin = WorldCoordinate::from_degrees(40.0, -105.0, 1500.0);
        let d = Vector3::new(300.0, -400.0, 0.0);
        let a = GeodeticComputation::Flat.add_coordinate(&origin, &d);
        let b = GeodeticComputation::Spherical.add_coordinate(&origin, &d);
        assert_abs_diff_eq!(a.latitude_deg(), b.latitude_deg(), epsilon = 1e-4);
        assert_abs_diff_eq!(a.longitude_deg(), b.longitude_deg(), epsilon = 1e-4);
    }

    #[test]
    fn coriolis_deflects_right_in_north() {
        let here = WorldCoordinate::from_degrees(45.0, 0.0, 0.0);
        let a = GeodeticComputation::Spherical
            .coriolis_acceleration(&here, &Vector3::new(0.0, 100.0, 0.0));
        assert!(a.x > 0.0);
        let flat = GeodeticComputation::Flat.coriolis_acceleration(&here, &Vector3::new(0.0, 100.0, 0.0));
        assert_eq!(flat, Vector3::zeros());
    }

    #[test]
    fn longitude_wraps() {
        let p = WorldCoordinate::from_degrees(0.0, 190.0, 0.0);
        assert_abs_diff_eq!(p.longitude_deg(), -170.0, epsilon = 1e-9);
    }
}
