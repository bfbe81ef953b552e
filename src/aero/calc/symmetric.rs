use std::f64::consts::PI;

use super::nose_drag::{is_extrapolated, pressure_interpolator};
use crate::aero::conditions::FlightConditions;
use crate::aero::forces::{AerodynamicForces, WeightedPoint};
use crate::math::{equals, pow2, LinearInterpolator};
use crate::vehicle::{Component, ComponentKind};
use crate::warning::{Warning, WarningSet};

/// Galejs body-lift constant.
const BODY_LIFT_K: f64 = 1.1;

// ---------------------------------------------------------------------------
// Body of revolution: nose cone, transition, body tube
// ---------------------------------------------------------------------------

/// Barrowman slender-body normal force plus Galejs body lift. Results are
/// area-weighted (m^2) and positions are measured from the component's fore end.
#[derive(Debug, Clone)]
pub struct SymmetricCalc {
    length: f64,
    fore_radius: f64,
    aft_radius: f64,
    fineness: f64,
    frontal_area: f64,
    planform_area: f64,
    planform_center: f64,
    wetted_area: f64,
    tube: bool,
    cna: f64, // 2 (A_aft - A_fore)
    cp: f64,
    /// Pressure CD against Mach for forward-facing transitions.
    nose_drag: Option<LinearInterpolator>,
    extrapolated: bool,
}

impl SymmetricCalc {
    pub fn new(component: &Component) -> Self {
        let g = component.integrals();
        let length = component.length();
        let fore = component.fore_radius();
        let aft = component.aft_radius();
        let fineness = length / (2.0 * (aft - fore).abs());
        let tube = equals(fore, aft);

        let (cna, cp) = if tube {
            (0.0, 0.0)
        } else {
            let a0 = PI * pow2(fore);
            let a1 = PI * pow2(aft);
            (2.0 * (a1 - a0), (length * a1 - g.full_volume) / (a1 - a0))
        };

        let (nose_drag, extrapolated) = match &component.kind {
            ComponentKind::NoseCone(t) | ComponentKind::Transition(t)
                if !tube && length >= 0.001 && aft > fore =>
            {
                let r = t.radius(0.99 * length);
                let sinphi = (aft - r) / (aft - r).hypot(0.01 * length);
                (
                    Some(pressure_interpolator(t.shape, t.shape_parameter, fineness, sinphi)),
                    is_extrapolated(t.shape, fineness),
                )
            }
            _ => (None, false),
        };

        Self {
            length,
            fore_radius: fore,
            aft_radius: aft,
            fineness,
            frontal_area: if tube { 0.0 } else { (PI * (pow2(fore) - pow2(aft))).abs() },
            planform_area: g.planform_area,
            planform_center: g.planform_center,
            wetted_area: g.wetted_area,
            tube,
            cna,
            cp,
            nose_drag,
            extrapolated,
        }
    }

    pub fn nonaxial_forces(&self, conditions: &FlightConditions, warnings: &mut WarningSet) -> AerodynamicForces {
        let lift = self.lift_cp(conditions, warnings);
        let cp = if self.tube {
            lift
        } else {
            WeightedPoint::axial(self.cp, self.cna * conditions.sinc_aoa()).average(&lift)
        };

        if conditions.mach() > 1.1 {
            warnings.add(Warning::Supersonic);
        }

        AerodynamicForces { cp, cna: cp.weight, cn: cp.weight * conditions.aoa(), ..Default::default() }
    }

    /// Body lift. Damped below Mach 0.05 at AOA over 45 degrees so the
    /// rocket does not oscillate while turning over at apogee.
    fn lift_cp(&self, conditions: &FlightConditions, warnings: &mut WarningSet) -> WeightedPoint {
        let mul = if conditions.mach() < 0.05 && conditions.aoa() > PI / 4.0 {
            warnings.add(Warning::BodyLiftDamped);
            pow2(conditions.mach() / 0.05)
        } else {
            1.0
        };
        WeightedPoint::axial(
            self.planform_center,
            mul * BODY_LIFT_K * self.planform_area * conditions.sin_aoa() * conditions.sinc_aoa(),
        )
    }

    pub fn friction_cd(&self, cf: f64) -> f64 {
        cf * self.wetted_area
    }

    pub fn pressure_cd(
        &self,
        conditions: &FlightConditions,
        stagnation: f64,
        base: f64,
        warnings: &mut WarningSet,
    ) -> f64 {
        if self.tube {
            return 0.0;
        }
        if self.length < 0.001 {
            return if self.fore_radius < self.aft_radius {
                stagnation * self.frontal_area
            } else {
                base * self.frontal_area
            };
        }

        // boattail: base drag reduced by fineness ratio
        if self.aft_radius < self.fore_radius {
            if self.fineness >= 3.0 {
                return 0.0;
            }
            let cd = base * self.frontal_area;
            if self.fineness <= 1.0 {
                return cd;
            }
            return cd * (3.0 - self.fineness) / 2.0;
        }

        if self.extrapolated {
            warnings.add(Warning::FinenessExtrapolated);
        }
        match &self.nose_drag {
            Some(interp) => interp.value(conditions.mach()) * self.frontal_area,
            None => 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vehicle::Shape;
    use approx::assert_abs_diff_eq;

    fn built(mut c: Component) -> Component {
        c.compute_integrals();
        c
    }

    #[test]
    fn cone_matches_slender_body_theory() {
        let r = 0.05;
        let len = 0.3;
        let cone = built(Component::nose_cone("cone", Shape::Conical, len, r));
        let calc = SymmetricCalc::new(&cone);
        let mut w = WarningSet::new();
        for mach in [0.1, 0.3, 0.6] {
            let mut c = FlightConditions::new(2.0 * r);
            c.set_mach(mach);
            c.set_aoa(0.0);
            let f = calc.nonaxial_forces(&c, &mut w);
            assert_abs_diff_eq!(f.cna / c.ref_area(), 2.0, epsilon = 1e-9);
            assert_abs_diff_eq!(f.cp.x, 2.0 * len / 3.0, epsilon = 1e-9);
        }
        assert!(w.is_empty());
    }

    #[test]
    fn tube_has_only_body_lift() {
        let tube = built(Component::body_tube("t", 0.5, 0.02));
        let calc = SymmetricCalc::new(&tube);
        let mut c = FlightConditions::new(0.04);
        c.set_mach(0.3);
        let mut w = WarningSet::new();
        assert_eq!(calc.nonaxial_forces(&c, &mut w).cna, 0.0);
        c.set_aoa(0.1);
        let f = calc.nonaxial_forces(&c, &mut w);
        assert!(f.cna > 0.0);
        assert_abs_diff_eq!(f.cp.x, 0.25, epsilon = 1e-9);
        assert_eq!(calc.pressure_cd(&c, 0.85, 0.12, &mut w), 0.0);
    }

    #[test]
    fn boattail_drag_fades_with_fineness() {
        let short = built(Component::transition("bt", Shape::Conical, 0.02, 0.03, 0.02));
        let long = built(Component::transition("bt", Shape::Conical, 0.08, 0.03, 0.02));
        let c = FlightConditions::new(0.06);
        let base = 0.12;
        let mut w = WarningSet::new();
        let short_cd = SymmetricCalc::new(&short).pressure_cd(&c, 0.85, base, &mut w);
        let long_cd = SymmetricCalc::new(&long).pressure_cd(&c, 0.85, base, &mut w);
        assert_abs_diff_eq!(short_cd, base * PI * (0.03f64.powi(2) - 0.02f64.powi(2)), epsilon = 1e-12);
        assert!(long_cd < short_cd);
    }

    #[test]
    fn supersonic_flight_is_flagged() {
        let cone = built(Component::nose_cone("cone", Shape::Ogive, 0.2, 0.03));
        let calc = SymmetricCalc::new(&cone);
        let mut c = FlightConditions::new(0.06);
        c.set_mach(1.5);
        let mut w = WarningSet::new();
        calc.nonaxial_forces(&c, &mut w);
        assert!(w.contains(|x| *x == Warning::Supersonic));
        assert!(calc.pressure_cd(&c, 1.3, 0.17, &mut w) > 0.0);
    }

    #[test]
    fn body_lift_damping_is_flagged() {
        let tube = built(Component::body_tube("t", 0.5, 0.02));
        let calc = SymmetricCalc::new(&tube);
        let mut c = FlightConditions::new(0.04);
        c.set_mach(0.3);
        c.set_aoa(1.0);
        let mut w = WarningSet::new();
        let fast = calc.nonaxial_forces(&c, &mut w);
        assert!(w.is_empty());

        c.set_mach(0.025);
        let slow = calc.nonaxial_forces(&c, &mut w);
        assert!(w.contains(|x| *x == Warning::BodyLiftDamped));
        // (0.025 / 0.05)^2
        assert_abs_diff_eq!(slow.cna, 0.25 * fast.cna, epsilon = 1e-12);
    }

    #[test]
    fn tabulated_nose_outside_fineness_range_is_flagged() {
        let c = FlightConditions::new(0.06);
        let mut w = WarningSet::new();
        // fineness 0.5
        let stubby = built(Component::nose_cone("n", Shape::Ellipsoid, 0.03, 0.03));
        SymmetricCalc::new(&stubby).pressure_cd(&c, 0.85, 0.12, &mut w);
        assert!(w.contains(|x| *x == Warning::FinenessExtrapolated));

        // fineness 10
        let mut w = WarningSet::new();
        let slender = built(Component::nose_cone("n", Shape::Haack, 0.6, 0.03));
        SymmetricCalc::new(&slender).pressure_cd(&c, 0.85, 0.12, &mut w);
        assert!(w.contains(|x| *x == Warning::FinenessExtrapolated));

        let mut w = WarningSet::new();
        let regular = built(Component::nose_cone("n", Shape::Ellipsoid, 0.18, 0.03));
        SymmetricCalc::new(&regular).pressure_cd(&c, 0.85, 0.12, &mut w);
        let ogive = built(Component::nose_cone("n", Shape::Ogive, 0.5, 0.03));
        SymmetricCalc::new(&ogive).pressure_cd(&c, 0.85, 0.12, &mut w);
        assert!(w.is_empty());
    }
}
