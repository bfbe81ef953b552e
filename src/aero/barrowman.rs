use std::f64::consts::PI;

use serde::Serialize;
use tracing::trace;

use crate::aero::calc::{ComponentCalc, Transform};
use crate::aero::conditions::FlightConditions;
use crate::aero::drag::{
    axial_cd, base_cd, component_cf, friction_coefficient, roughness_correction, roughness_limited_cf,
    stagnation_cd,
};
use crate::aero::forces::{AerodynamicForces, WeightedPoint};
use crate::math::{pow2, pow3, sign, EPSILON};
use crate::vehicle::{ComponentId, FlightConfiguration, Finish, Rocket};
use crate::warning::{Warning, WarningSet};

/// AOA above which the linear aerodynamics are flagged as unreliable.
const LARGE_AOA: f64 = 17.5 * PI / 180.0;

/// Roll positions tried when searching for the worst CP.
const WORST_CP_DIVISIONS: usize = 360;

/// Empirical boost on the pitch damping; better matches the apogee turn.
const DAMPING_BOOST: f64 = 3.0;

// ---------------------------------------------------------------------------
// Aggregation over the component tree
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct Entry {
    id: ComponentId,
    calc: ComponentCalc,
    transform: Transform,
    /// Neighbouring body components along the airframe, across stages.
    prev_body: Option<usize>,
    next_body: Option<usize>,
    /// Own CD override, when no ancestor overrides it.
    cd_override: Option<f64>,
    /// Drag counted elsewhere because this or an ancestor is overridden.
    overridden: bool,
}

/// Extended Barrowman aerodynamics for a whole rocket. Built once per rocket;
/// every query takes the flight configuration so inactive stages drop out.
#[derive(Debug)]
pub struct BarrowmanCalculator {
    entries: Vec<Entry>,
}

/// Nondimensional forces of one component or stage.
#[derive(Debug, Clone, Serialize)]
pub struct ComponentForces {
    pub id: ComponentId,
    pub name: String,
    pub forces: AerodynamicForces,
}

/// Dimensional drag areas per entry, m^2.
#[derive(Debug, Clone, Copy, Default)]
struct Drag {
    friction: f64,
    pressure: f64,
    base: f64,
    override_cd: f64,
}

impl BarrowmanCalculator {
    pub fn new(rocket: &Rocket) -> Self {
        let mut entries: Vec<Entry> = Vec::new();
        for (id, component) in rocket.components() {
            let Some((calc, transform)) = ComponentCalc::new(rocket, id) else {
                continue;
            };
            let ancestor_override = ancestors(rocket, id).any(|a| rocket.component(a).cd_override.is_some());
            entries.push(Entry {
                id,
                calc,
                transform,
                prev_body: None,
                next_body: None,
                cd_override: if ancestor_override { None } else { component.cd_override },
                overridden: ancestor_override || component.cd_override.is_some(),
            });
        }

        let bodies: Vec<usize> = (0..entries.len()).filter(|&i| entries[i].calc.is_symmetric()).collect();
        for w in bodies.windows(2) {
            entries[w[0]].next_body = Some(w[1]);
            entries[w[1]].prev_body = Some(w[0]);
        }
        Self { entries }
    }

    fn active<'a>(&'a self, config: &'a FlightConfiguration) -> impl Iterator<Item = (usize, &'a Entry)> + 'a {
        self.entries.iter().enumerate().filter(move |(_, e)| config.is_component_active(e.id))
    }

    /// Whole-rocket coefficients, nondimensionalized by the reference area and
    /// length in `conditions`. Moments are about the nose tip, pitch and yaw
    /// damping already applied.
    pub fn forces(
        &self,
        config: &FlightConfiguration,
        conditions: &FlightConditions,
        warnings: &mut WarningSet,
    ) -> AerodynamicForces {
        let mut total = self.dimensional_nonaxial(config, conditions, warnings);

        let drag = self.drag(config, conditions, warnings);
        let sum = drag.iter().fold(Drag::default(), |acc, d| Drag {
            friction: acc.friction + d.friction,
            pressure: acc.pressure + d.pressure,
            base: acc.base + d.base,
            override_cd: acc.override_cd + d.override_cd,
        });
        total.friction_cd = sum.friction;
        total.pressure_cd = sum.pressure;
        total.base_cd = sum.base;
        total.override_cd = sum.override_cd;
        total.cd = sum.friction + sum.pressure + sum.base + sum.override_cd;
        total.cd_axial = axial_cd(conditions.aoa(), total.cd);

        self.damping(config, conditions, &mut total);
        total.cm -= total.pitch_damping_moment;
        total.cyaw -= total.yaw_damping_moment;

        total.nondimensionalize(conditions.ref_area(), conditions.ref_length());
        total.zero_non_finite();
        total
    }

    /// Normal force, CP and moments only, nondimensional.
    pub fn nonaxial_forces(
        &self,
        config: &FlightConfiguration,
        conditions: &FlightConditions,
        warnings: &mut WarningSet,
    ) -> AerodynamicForces {
        let mut total = self.dimensional_nonaxial(config, conditions, warnings);
        total.nondimensionalize(conditions.ref_area(), conditions.ref_length());
        total.zero_non_finite();
        total
    }

    /// Center of pressure in the rocket frame, weight = CNa.
    pub fn cp(
        &self,
        config: &FlightConfiguration,
        conditions: &FlightConditions,
        warnings: &mut WarningSet,
    ) -> WeightedPoint {
        self.nonaxial_forces(config, conditions, warnings).cp
    }

    /// Most forward CP over all airflow roll angles, and the angle producing it.
    pub fn worst_cp(
        &self,
        config: &FlightConfiguration,
        conditions: &FlightConditions,
        warnings: &mut WarningSet,
    ) -> (WeightedPoint, f64) {
        let mut cond = conditions.clone();
        let mut worst = WeightedPoint::axial(f64::MAX, 0.0);
        let mut worst_theta = 0.0;
        for i in 0..WORST_CP_DIVISIONS {
            let theta = 2.0 * PI * i as f64 / WORST_CP_DIVISIONS as f64;
            cond.set_theta(theta);
            let cp = self.cp(config, &cond, warnings);
            if cp.x < worst.x {
                worst = cp;
                worst_theta = theta;
            }
        }
        (worst, worst_theta)
    }

    /// Airframe continuity checks over the active body components, fore to aft.
    pub fn check_geometry(&self, config: &FlightConfiguration, warnings: &mut WarningSet) {
        if config.body_diameter().is_none() {
            warnings.add(Warning::ZeroReferenceArea);
        }
        let rocket = config.rocket();
        let mut prev: Option<ComponentId> = None;
        for (_, e) in self.active(config).filter(|(_, e)| e.calc.is_symmetric()) {
            let c = rocket.component(e.id);
            match prev.map(|p| rocket.component(p)) {
                None => {
                    if c.fore_radius() - wall_thickness(c) > EPSILON {
                        warnings.add(Warning::OpenAirframeForward);
                    }
                }
                Some(p) => {
                    // compare at the 0.1 mm display resolution
                    let round = |v: f64| (v * 1e4).round() as i64;
                    if round(2.0 * c.fore_radius()) != round(2.0 * p.aft_radius()) {
                        warnings.add(Warning::DiameterDiscontinuity);
                    }
                    if c.length() < EPSILON || (c.fore_radius() < EPSILON && c.aft_radius() < EPSILON) {
                        warnings.add(Warning::ZeroVolumeBody);
                    }
                    let fore = c.position();
                    let prev_aft = p.position() + p.length();
                    if round(fore) != round(prev_aft) {
                        if fore > prev_aft {
                            warnings.add(Warning::AirframeGap);
                        } else {
                            warnings.add(Warning::AirframeOverlap);
                        }
                    }
                }
            }
            prev = Some(e.id);
        }
    }

    /// Per-component and per-stage breakdown, each fully nondimensionalized
    /// with its own CD and axial CD.
    pub fn force_analysis(
        &self,
        config: &FlightConfiguration,
        conditions: &FlightConditions,
        warnings: &mut WarningSet,
    ) -> Vec<ComponentForces> {
        let rocket = config.rocket();
        let drag = self.drag(config, conditions, warnings);

        let mut out: Vec<ComponentForces> = Vec::new();
        let mut stage_index: Option<usize> = None;
        for (i, e) in self.active(config) {
            let mut f = e.calc.nonaxial_forces(conditions, &e.transform, warnings);
            f.friction_cd = drag[i].friction;
            f.pressure_cd = drag[i].pressure;
            f.base_cd = drag[i].base;
            f.override_cd = drag[i].override_cd;
            f.cd = f.friction_cd + f.pressure_cd + f.base_cd + f.override_cd;
            f.cd_axial = axial_cd(conditions.aoa(), f.cd);

            if matches!(e.calc, ComponentCalc::Assembly) {
                stage_index = Some(out.len());
            } else if let Some(s) = stage_index {
                out[s].forces.merge(&f);
            }
            out.push(ComponentForces { id: e.id, name: rocket.component(e.id).name.clone(), forces: f });
        }

        for c in out.iter_mut() {
            c.forces.nondimensionalize(conditions.ref_area(), conditions.ref_length());
            c.forces.zero_non_finite();
        }
        out
    }

    fn dimensional_nonaxial(
        &self,
        config: &FlightConfiguration,
        conditions: &FlightConditions,
        warnings: &mut WarningSet,
    ) -> AerodynamicForces {
        if conditions.aoa() > LARGE_AOA {
            warnings.add(Warning::LargeAoa(conditions.aoa()));
        }
        self.check_geometry(config, warnings);

        let mut total = AerodynamicForces::zero();
        for (_, e) in self.active(config) {
            let f = e.calc.nonaxial_forces(conditions, &e.transform, warnings);
            total.merge(&f);
        }
        total
    }

    /// Friction, pressure, base and override drag areas per entry (m^2,
    /// indexed like `entries`; inactive entries stay zero).
    fn drag(&self, config: &FlightConfiguration, conditions: &FlightConditions, warnings: &mut WarningSet) -> Vec<Drag> {
        let rocket = config.rocket();
        let mach = conditions.mach();
        let length = config.length();
        let re = conditions.reynolds(length);
        let perfect = self.perfect_finish(config);
        let cf = friction_coefficient(mach, re, perfect);
        let correction = roughness_correction(mach);
        let stagnation = stagnation_cd(mach);
        let base = base_cd(mach);

        let mut drag = vec![Drag::default(); self.entries.len()];

        // friction; body friction is corrected for the rocket's fineness below
        let (mut min_x, mut max_x, mut max_r) = (f64::MAX, 0.0f64, 0.0f64);
        for (i, e) in self.active(config) {
            if let Some(cd) = e.cd_override {
                drag[i].override_cd = cd * conditions.ref_area();
            }
            if e.overridden {
                continue;
            }
            let c = rocket.component(e.id);
            let limited = roughness_limited_cf(c.finish.roughness(), length, correction);
            drag[i].friction = e.calc.friction_cd(component_cf(cf, limited, re, perfect));
            if e.calc.is_symmetric() {
                min_x = min_x.min(c.position());
                max_x = max_x.max(c.position() + c.length());
                max_r = max_r.max(c.max_radius());
            }
        }
        let fineness = (max_x - min_x + 0.0001) / max_r;
        let body_correction = 1.0 + 1.0 / (2.0 * fineness);
        for (i, e) in self.entries.iter().enumerate() {
            if e.calc.is_symmetric() {
                drag[i].friction *= body_correction;
            }
        }

        for (i, e) in self.active(config) {
            if e.overridden {
                continue;
            }
            drag[i].pressure = e.calc.pressure_cd(conditions, stagnation, base, warnings);
            if !e.calc.is_symmetric() {
                continue;
            }

            let c = rocket.component(e.id);
            let (mut fore, mut aft) = (c.fore_radius(), c.aft_radius());
            if c.length() == 0.0 {
                fore = fore.max(aft);
                aft = fore;
            }
            let prev_aft = e
                .prev_body
                .map(|p| &self.entries[p])
                .filter(|p| config.is_component_active(p.id))
                .map(|p| rocket.component(p.id).aft_radius())
                .unwrap_or(0.0);

            // a step up from the previous body faces the flow
            if prev_aft < fore {
                drag[i].pressure += stagnation * PI * (pow2(fore) - pow2(prev_aft));
            }
            // a step down leaves a base behind the previous body
            if prev_aft > fore {
                if let Some(p) = e.prev_body {
                    drag[p].base += base * PI * (pow2(prev_aft) - pow2(fore));
                }
            }
            let last = e.next_body.map_or(true, |n| !config.is_component_active(self.entries[n].id));
            if last {
                drag[i].base += base * PI * pow2(aft);
            }
        }

        trace!(mach, re, cf, "drag breakdown");
        drag
    }

    /// Pitch and yaw damping moments (m^3), opposing the rotation rates and
    /// never larger than the restoring moment.
    fn damping(&self, config: &FlightConfiguration, conditions: &FlightConditions, total: &mut AerodynamicForces) {
        let v = conditions.velocity();
        if v < EPSILON {
            return;
        }
        let rocket = config.rocket();
        let cg = conditions.pitch_center().x;

        let (mut planform, mut length) = (0.0, 0.0);
        for (_, e) in self.active(config).filter(|(_, e)| e.calc.is_symmetric()) {
            let c = rocket.component(e.id);
            planform += c.integrals().planform_area;
            length += c.length();
        }
        let diameter = if length > 0.0 { planform / length } else { 0.0 };

        let mut mul = 0.275 * diameter * (pow2(pow2(cg)) + pow2(pow2(length - cg)));
        for (_, e) in self.active(config) {
            if let ComponentCalc::Fins(f) = &e.calc {
                let midchord = e.transform.offset + f.midchord_position();
                mul += 0.6 * f.count().min(4) as f64 * f.planform_area() * pow3((midchord - cg).abs());
            }
        }
        mul *= DAMPING_BOOST;

        let pitch_rate = conditions.pitch_rate();
        let yaw_rate = conditions.yaw_rate();
        total.pitch_damping_moment = sign(pitch_rate) * (mul * pow2(pitch_rate / v)).min(total.cm.abs());
        total.yaw_damping_moment = sign(yaw_rate) * (mul * pow2(yaw_rate / v)).min(total.cyaw.abs());
    }

    /// Laminar flow is only possible when every exposed surface is mirror smooth.
    fn perfect_finish(&self, config: &FlightConfiguration) -> bool {
        let rocket = config.rocket();
        let mut any = false;
        for (_, e) in self.active(config) {
            if matches!(e.calc, ComponentCalc::Assembly) {
                continue;
            }
            any = true;
            if rocket.component(e.id).finish != Finish::Mirror {
                return false;
            }
        }
        any
    }
}

fn ancestors(rocket: &Rocket, id: ComponentId) -> impl Iterator<Item = ComponentId> + '_ {
    std::iter::successors(rocket.component(id).parent(), move |&p| rocket.component(p).parent())
}

fn wall_thickness(c: &crate::vehicle::Component) -> f64 {
    use crate::vehicle::ComponentKind;
    match &c.kind {
        ComponentKind::NoseCone(t) | ComponentKind::Transition(t) => {
            if t.filled {
                f64::INFINITY
            } else {
                t.thickness
            }
        }
        ComponentKind::BodyTube(b) => b.thickness,
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::vehicle::{presets, Component, RocketBuilder, Shape};
    use approx::assert_abs_diff_eq;

    fn alpha() -> (BarrowmanCalculator, FlightConfiguration, FlightConditions) {
        let config = presets::alpha().unwrap();
        let calc = BarrowmanCalculator::new(config.rocket());
        let mut cond = FlightConditions::new(config.reference_length());
        cond.set_mach(0.3);
        (calc, config, cond)
    }

    #[test]
    fn cp_lies_behind_nose_and_ahead_of_tail() {
        let (calc, config, cond) = alpha();
        let cp = calc.cp(&config, &cond, &mut WarningSet::new());
        let len = config.rocket().length();
        assert!(cp.x > 0.5 * len && cp.x < len, "cp {} of {}", cp.x, len);
        assert!(cp.weight > 2.0);
    }

    #[test]
    fn drag_adds_up() {
        let (calc, config, mut cond) = alpha();
        cond.set_velocity(60.0);
        let f = calc.forces(&config, &cond, &mut WarningSet::new());
        assert_abs_diff_eq!(f.cd, f.friction_cd + f.pressure_cd + f.base_cd + f.override_cd, epsilon = 1e-12);
        assert!(f.cd > 0.2 && f.cd < 1.5, "cd {}", f.cd);
        assert_abs_diff_eq!(f.cd_axial, f.cd, epsilon = 1e-9);
    }

    #[test]
    fn component_breakdown_sums_to_total() {
        let (calc, config, mut cond) = alpha();
        cond.set_aoa(0.05);
        let mut w = WarningSet::new();
        let total = calc.forces(&config, &cond, &mut w);
        let parts = calc.force_analysis(&config, &cond, &mut w);
        let rocket = config.rocket();
        let sum: f64 = parts.iter().filter(|p| !rocket.component(p.id).is_stage()).map(|p| p.forces.cna).sum();
        assert_abs_diff_eq!(sum, total.cna, epsilon = 1e-9);
        let friction: f64 =
            parts.iter().filter(|p| !rocket.component(p.id).is_stage()).map(|p| p.forces.friction_cd).sum();
        assert_abs_diff_eq!(friction, total.friction_cd, epsilon = 1e-9);
    }

    #[test]
    fn worst_cp_is_no_further_aft_than_any_angle() {
        let (calc, config, mut cond) = alpha();
        let mut w = WarningSet::new();
        let (worst, _) = calc.worst_cp(&config, &cond, &mut w);
        for theta in [0.0, 0.7, 2.0] {
            cond.set_theta(theta);
            assert!(worst.x <= calc.cp(&config, &cond, &mut w).x + 1e-12);
        }
    }

    #[test]
    fn large_aoa_is_flagged() {
        let (calc, config, mut cond) = alpha();
        cond.set_aoa(0.5);
        let mut w = WarningSet::new();
        calc.forces(&config, &cond, &mut w);
        assert!(w.contains(|x| matches!(x, Warning::LargeAoa(_))));
    }

    #[test]
    fn pitch_damping_opposes_rotation() {
        let (calc, config, mut cond) = alpha();
        cond.set_velocity(30.0);
        cond.set_aoa(0.1);
        cond.set_pitch_center(nalgebra::Vector3::new(0.2, 0.0, 0.0));
        let undamped = calc.forces(&config, &cond, &mut WarningSet::new());
        cond.set_pitch_rate(2.0);
        let damped = calc.forces(&config, &cond, &mut WarningSet::new());
        assert!(damped.pitch_damping_moment > 0.0);
        assert!(damped.cm < undamped.cm);
    }

    fn airframe(parts: Vec<Component>) -> FlightConfiguration {
        let mut b = RocketBuilder::new("r");
        let stage = b.stage("s");
        for p in parts {
            b.add(stage, p);
        }
        FlightConfiguration::new(Arc::new(b.build().unwrap()))
    }

    #[test]
    fn airframe_geometry_warnings() {
        let config = airframe(vec![
            Component::nose_cone("nose", Shape::Ogive, 0.1, 0.02),
            Component::body_tube("body", 0.3, 0.025),
        ]);
        let mut w = WarningSet::new();
        BarrowmanCalculator::new(config.rocket()).check_geometry(&config, &mut w);
        assert!(w.contains(|x| *x == Warning::DiameterDiscontinuity));
        assert!(!w.contains(|x| *x == Warning::OpenAirframeForward));

        let config = airframe(vec![Component::body_tube("open", 0.3, 0.025)]);
        let mut w = WarningSet::new();
        BarrowmanCalculator::new(config.rocket()).check_geometry(&config, &mut w);
        assert!(w.contains(|x| *x == Warning::OpenAirframeForward));

        let config = airframe(vec![
            Component::nose_cone("nose", Shape::Ogive, 0.1, 0.02),
            Component::body_tube("body", 0.3, 0.02).placement(crate::vehicle::Placement::Top(0.12)),
        ]);
        let mut w = WarningSet::new();
        BarrowmanCalculator::new(config.rocket()).check_geometry(&config, &mut w);
        assert!(w.contains(|x| *x == Warning::AirframeGap));
    }

    #[test]
    fn missing_body_diameter_is_flagged() {
        let config = airframe(Vec::new());
        let mut w = WarningSet::new();
        BarrowmanCalculator::new(config.rocket()).check_geometry(&config, &mut w);
        assert!(w.contains(|x| *x == Warning::ZeroReferenceArea));

        let (calc, config, _) = alpha();
        let mut w = WarningSet::new();
        calc.check_geometry(&config, &mut w);
        assert!(!w.contains(|x| *x == Warning::ZeroReferenceArea));
    }

    #[test]
    fn override_replaces_computed_drag() {
        let config = airframe(vec![
            Component::nose_cone("nose", Shape::Ogive, 0.1, 0.02),
            Component::body_tube("body", 0.3, 0.02).cd_override(0.4),
        ]);
        let calc = BarrowmanCalculator::new(config.rocket());
        let mut cond = FlightConditions::new(config.reference_length());
        cond.set_velocity(50.0);
        let parts = calc.force_analysis(&config, &cond, &mut WarningSet::new());
        let body = parts.iter().find(|p| p.name == "body").unwrap();
        assert_abs_diff_eq!(body.forces.override_cd, 0.4, epsilon = 1e-12);
        assert_eq!(body.forces.friction_cd, 0.0);
        assert_eq!(body.forces.base_cd, 0.0);
    }
}
