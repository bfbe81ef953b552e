use nalgebra::Vector3;
use serde::Serialize;

use crate::math::{finite_or_zero, pow2, EPSILON};

// ---------------------------------------------------------------------------
// Weighted point (center of pressure with its CNa weight)
// ---------------------------------------------------------------------------

/// A position carrying a weight. For a center of pressure the weight is the
/// CNa that produced it, so combining CPs is a weighted average.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct WeightedPoint {
    pub x: f64, // m, rocket frame (aft of nose tip)
    pub y: f64,
    pub z: f64,
    pub weight: f64,
}

impl WeightedPoint {
    pub fn new(x: f64, y: f64, z: f64, weight: f64) -> Self {
        Self { x, y, z, weight }
    }

    pub fn axial(x: f64, weight: f64) -> Self {
        Self { x, y: 0.0, z: 0.0, weight }
    }

    pub fn position(&self) -> Vector3<f64> {
        Vector3::new(self.x, self.y, self.z)
    }

    /// Weighted average. With (near) zero total weight the plain midpoint is returned with weight 0.
    pub fn average(&self, other: &WeightedPoint) -> WeightedPoint {
        let w = self.weight + other.weight;
        if w.abs() < pow2(EPSILON) {
            WeightedPoint {
                x: (self.x + other.x) / 2.0,
                y: (self.y + other.y) / 2.0,
                z: (self.z + other.z) / 2.0,
                weight: 0.0,
            }
        } else {
            WeightedPoint {
                x: (self.x * self.weight + other.x * other.weight) / w,
                y: (self.y * self.weight + other.y * other.weight) / w,
                z: (self.z * self.weight + other.z * other.weight) / w,
                weight: w,
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Aerodynamic coefficients
// ---------------------------------------------------------------------------

/// Nondimensional force/moment coefficients, all referenced to the rocket's
/// reference area and length.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct AerodynamicForces {
    pub cp: WeightedPoint,
    pub cna: f64,
    pub cn: f64,
    pub cm: f64,
    pub cside: f64,
    pub cyaw: f64,
    pub croll: f64,
    pub croll_damp: f64,
    pub croll_force: f64,

    pub cd: f64,
    pub friction_cd: f64,
    pub pressure_cd: f64,
    pub base_cd: f64,
    pub override_cd: f64,
    pub cd_axial: f64,

    pub pitch_damping_moment: f64,
    pub yaw_damping_moment: f64,
}

impl AerodynamicForces {
    pub fn zero() -> Self {
        Self::default()
    }

    /// Sum coefficients and average the CP by CNa weight.
    pub fn merge(&mut self, other: &AerodynamicForces) {
        self.cp = self.cp.average(&other.cp);
        self.cna += other.cna;
        self.cn += other.cn;
        self.cm += other.cm;
        self.cside += other.cside;
        self.cyaw += other.cyaw;
        self.croll += other.croll;
        self.croll_damp += other.croll_damp;
        self.croll_force += other.croll_force;

        self.cd += other.cd;
        self.friction_cd += other.friction_cd;
        self.pressure_cd += other.pressure_cd;
        self.base_cd += other.base_cd;
        self.override_cd += other.override_cd;
        self.cd_axial += other.cd_axial;

        self.pitch_damping_moment += other.pitch_damping_moment;
        self.yaw_damping_moment += other.yaw_damping_moment;
    }

    /// Replace non-finite values with zero.
    pub fn zero_non_finite(&mut self) {
        for v in [
            &mut self.cna,
            &mut self.cn,
            &mut self.cm,
            &mut self.cside,
            &mut self.cyaw,
            &mut self.croll,
            &mut self.croll_damp,
            &mut self.croll_force,
            &mut self.cd,
            &mut self.friction_cd,
            &mut self.pressure_cd,
            &mut self.base_cd,
            &mut self.override_cd,
            &mut self.cd_axial,
            &mut self.pitch_damping_moment,
            &mut self.yaw_damping_moment,
            &mut self.cp.x,
            &mut self.cp.y,
            &mut self.cp.z,
            &mut self.cp.weight,
        ] {
            *v = finite_or_zero(*v);
        }
    }

    /// Turn area-weighted sums (m^2, moments m^3) into coefficients.
    pub fn nondimensionalize(&mut self, ref_area: f64, ref_length: f64) {
        let moment = ref_area * ref_length;
        for v in [
            &mut self.cna,
            &mut self.cn,
            &mut self.cside,
            &mut self.cp.weight,
            &mut self.cd,
            &mut self.friction_cd,
            &mut self.pressure_cd,
            &mut self.base_cd,
            &mut self.override_cd,
            &mut self.cd_axial,
        ] {
            *v /= ref_area;
        }
        for v in [
            &mut self.cm,
            &mut self.cyaw,
            &mut self.croll,
            &mut self.croll_damp,
            &mut self.croll_force,
            &mut self.pitch_damping_moment,
            &mut self.yaw_damping_moment,
        ] {
            *v /= moment;
        }
    }

    pub fn is_finite(&self) -> bool {
        [self.cn, self.cm, self.cside, self.cyaw, self.croll, self.cd_axial]
            .iter()
            .all(|v| v.is_finite())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn cp_weighted_average() {
        let (cp1, cna1) = (0.2, 2.0);
        let (cp2, cna2) = (0.9, 7.5);
        let combined = WeightedPoint::axial(cp1, cna1).average(&WeightedPoint::axial(cp2, cna2));
        assert_abs_diff_eq!(combined.x, (cp1 * cna1 + cp2 * cna2) / (cna1 + cna2), epsilon = 1e-12);
        assert_abs_diff_eq!(combined.weight, cna1 + cna2, epsilon = 1e-12);
    }

    #[test]
    fn zero_weights_average_to_midpoint() {
        let c = WeightedPoint::axial(1.0, 0.0).average(&WeightedPoint::axial(3.0, 0.0));
        assert_abs_diff_eq!(c.x, 2.0, epsilon = 1e-12);
        assert_eq!(c.weight, 0.0);
    }

    #[test]
    fn merge_keeps_weight_equal_to_cna() {
        let mut a = AerodynamicForces {
            cp: WeightedPoint::axial(0.1, 2.0),
            cna: 2.0,
            friction_cd: 0.2,
            ..Default::default()
        };
        let b = AerodynamicForces {
            cp: WeightedPoint::axial(0.5, 6.0),
            cna: 6.0,
            friction_cd: 0.1,
            ..Default::default()
        };
        a.merge(&b);
        assert_abs_diff_eq!(a.cp.weight, a.cna, epsilon = 1e-12);
        assert_abs_diff_eq!(a.cp.x, 0.4, epsilon = 1e-12);
        assert_abs_diff_eq!(a.friction_cd, 0.3, epsilon = 1e-12);
    }

    #[test]
    fn nondimensionalize_keeps_cp_location() {
        let mut f = AerodynamicForces {
            cp: WeightedPoint::axial(0.4, 0.002),
            cna: 0.002,
            cm: 0.0008,
            pressure_cd: 0.001,
            ..Default::default()
        };
        f.nondimensionalize(0.001, 0.02);
        assert_abs_diff_eq!(f.cna, 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(f.cp.weight, f.cna, epsilon = 1e-12);
        assert_abs_diff_eq!(f.cp.x, 0.4, epsilon = 1e-12);
        assert_abs_diff_eq!(f.cm, 40.0, epsilon = 1e-9);
        assert_abs_diff_eq!(f.pressure_cd, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn non_finite_values_zeroed() {
        let mut f = AerodynamicForces { cn: f64::NAN, cm: 1.0, ..Default::default() };
        assert!(!f.is_finite());
        f.zero_non_finite();
        assert_eq!(f.cn, 0.0);
        assert_eq!(f.cm, 1.0);
    }
}
