use std::f64::consts::PI;

use super::fins::{cp_fraction, cp_poly, STALL_ANGLE};
use super::tube::OpenTube;
use crate::aero::conditions::FlightConditions;
use crate::aero::forces::{AerodynamicForces, WeightedPoint};
use crate::math::{pow2, EPSILON};
use crate::vehicle::{Component, TubeFinSet};
use crate::warning::{Warning, WarningSet};

// ---------------------------------------------------------------------------
// Tube fins (ring airfoils around the body)
// ---------------------------------------------------------------------------

/// Tube fin set. Each tube is a ring airfoil; the set is the sum over tubes
/// with no tube-tube interference.
#[derive(Debug, Clone)]
pub struct TubeFinSetCalc {
    count: usize,
    body_radius: f64,
    chord: f64,
    outer_radius: f64,
    ar: f64,
    interstice_area: f64, // frontal gap between one tube and the body
    wetted_area: f64,
    cna: f64, // one tube, m^2
    poly: [f64; 6],
    tube: OpenTube,
    geometry_warnings: Vec<Warning>,
}

impl TubeFinSetCalc {
    pub fn new(component: &Component, tubes: &TubeFinSet) -> Self {
        let body_radius = component.body_radius();
        let chord = tubes.length;
        let ro = tubes.outer_radius;
        let ri = tubes.inner_radius();

        let mut geometry_warnings = Vec::new();
        if tubes.count >= 2 {
            let separation = 2.0 * (body_radius + ro) * (PI / tubes.count as f64).sin() - 2.0 * ro;
            if separation > EPSILON {
                geometry_warnings.push(Warning::TubeSeparation);
            } else if separation < -EPSILON {
                geometry_warnings.push(Warning::TubeOverlap);
            }
        }

        let ar = if chord > 0.0 { 2.0 * ri / chord } else { 0.0 };

        // Right triangle from the body axis to the tube axis (hypotenuse
        // rb + ro) and to the tangent point on the tube (leg d, normal to ro).
        let d = (pow2(body_radius + ro) - pow2(ro)).max(0.0).sqrt();
        let diamond = d * ro;
        let theta1 = if ro + body_radius > 0.0 { (ro / (ro + body_radius)).acos() } else { 0.0 };
        let theta2 = PI / 2.0 - theta1;
        let interstice_area = (diamond - pow2(ro) * theta1 - pow2(body_radius) * theta2).max(0.0);

        // outer surface minus the stretch of body tube it hides
        let outer_area = chord * 2.0 * (PI - theta1) * ro;
        let masked_area = chord * 2.0 * theta2 * body_radius;

        // Ribner, ring airfoil in nonaxial flow
        let arp = 2.0 * ar / PI;
        let cna = 2.0 * (arp / (1.0 + arp)) * PI * PI * ri * chord;

        Self {
            count: tubes.count,
            body_radius,
            chord,
            outer_radius: ro,
            ar,
            interstice_area,
            wetted_area: outer_area - masked_area,
            cna,
            poly: cp_poly(ar),
            tube: OpenTube { length: chord, inner_radius: ri, outer_radius: ro, roughness: component.finish.roughness() },
            geometry_warnings,
        }
    }

    pub fn nonaxial_forces(&self, conditions: &FlightConditions) -> AerodynamicForces {
        if self.outer_radius < 0.001 {
            return AerodynamicForces::zero();
        }
        let n = self.count as f64;
        let cna = n * self.cna;
        let x = cp_fraction(conditions.mach(), conditions.beta(), self.ar, &self.poly) * self.chord;

        // tubes carry no cant, so the only roll term is damping
        let v = conditions.velocity();
        let croll_damp = if v > EPSILON {
            (self.body_radius + self.outer_radius) * conditions.roll_rate() / v * cna
        } else {
            0.0
        };

        AerodynamicForces {
            cp: WeightedPoint::axial(x, cna),
            cna,
            cn: cna * conditions.aoa().min(STALL_ANGLE),
            croll: -croll_damp,
            croll_damp,
            ..Default::default()
        }
    }

    pub fn friction_cd(&self, cf: f64) -> f64 {
        self.count as f64 * cf * self.wetted_area
    }

    pub fn pressure_cd(
        &self,
        conditions: &FlightConditions,
        stagnation: f64,
        base: f64,
        warnings: &mut WarningSet,
    ) -> f64 {
        for w in &self.geometry_warnings {
            warnings.add(w.clone());
        }
        let per_tube = self.tube.pressure_cd(conditions, stagnation, base) + (stagnation + base) * self.interstice_area;
        self.count as f64 * per_tube
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vehicle::{ComponentKind, Rocket, RocketBuilder};
    use approx::assert_abs_diff_eq;

    fn tube_rocket(count: usize, ro: f64) -> (Rocket, crate::vehicle::ComponentId) {
        let mut b = RocketBuilder::new("tubes");
        let stage = b.stage("s");
        let body = b.add(stage, Component::body_tube("body", 0.4, 0.02));
        let id = b.add(body, Component::tube_fins("tubes", count, 0.1, ro));
        (b.build().unwrap(), id)
    }

    fn calc(r: &Rocket, id: crate::vehicle::ComponentId) -> TubeFinSetCalc {
        let c = r.component(id);
        match &c.kind {
            ComponentKind::TubeFinSet(t) => TubeFinSetCalc::new(c, t),
            _ => unreachable!(),
        }
    }

    #[test]
    fn tube_spacing_warnings() {
        // six tubes around a body touch when ro = rb
        let (r, id) = tube_rocket(6, 0.02);
        let mut w = WarningSet::new();
        let cond = FlightConditions::new(0.04);
        calc(&r, id).pressure_cd(&cond, 0.9, 0.13, &mut w);
        assert!(w.is_empty());

        let (r, id) = tube_rocket(6, 0.01);
        calc(&r, id).pressure_cd(&cond, 0.9, 0.13, &mut w);
        assert!(w.contains(|x| *x == Warning::TubeSeparation));

        let (r, id) = tube_rocket(8, 0.02);
        let mut w = WarningSet::new();
        calc(&r, id).pressure_cd(&cond, 0.9, 0.13, &mut w);
        assert!(w.contains(|x| *x == Warning::TubeOverlap));
    }

    #[test]
    fn lift_is_independent_of_roll_angle() {
        let (r, id) = tube_rocket(6, 0.02);
        let c = calc(&r, id);
        let mut cond = FlightConditions::new(0.04);
        cond.set_mach(0.3);
        let a = c.nonaxial_forces(&cond);
        cond.set_theta(0.4);
        let b = c.nonaxial_forces(&cond);
        assert_abs_diff_eq!(a.cna, b.cna, epsilon = 1e-15);
        assert!(a.cna > 0.0);
        assert_abs_diff_eq!(a.cp.x, 0.025, epsilon = 1e-12);
    }

    #[test]
    fn stall_caps_normal_force() {
        let (r, id) = tube_rocket(4, 0.015);
        let c = calc(&r, id);
        let mut cond = FlightConditions::new(0.04);
        cond.set_aoa(0.6);
        let f = c.nonaxial_forces(&cond);
        assert_abs_diff_eq!(f.cn, f.cna * STALL_ANGLE, epsilon = 1e-12);
    }
}
