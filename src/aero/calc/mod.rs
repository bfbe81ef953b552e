//! Per-component aerodynamic calculators. Every calculator works in
//! dimensional units (areas in m^2, moments in m^3, positions in m from the
//! component's fore end); the aggregator shifts and nondimensionalizes.

pub mod fins;
pub mod nose_drag;
pub mod protuberance;
pub mod symmetric;
pub mod tube;
pub mod tube_fins;

pub use fins::FinSetCalc;
pub use protuberance::{LaunchLugCalc, RailButtonCalc};
pub use symmetric::SymmetricCalc;
pub use tube_fins::TubeFinSetCalc;

use crate::aero::conditions::FlightConditions;
use crate::aero::forces::AerodynamicForces;
use crate::vehicle::{ComponentId, ComponentKind, Rocket};
use crate::warning::WarningSet;

/// Where a component sits in the rocket frame.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Transform {
    pub offset: f64,   // m from the nose tip to the component's fore end
    pub rotation: f64, // rad, roll position of the first fin
}

/// Calculator for one component, chosen by component kind.
#[derive(Debug, Clone)]
pub enum ComponentCalc {
    /// Stages: their children are calculated on their own.
    Assembly,
    Symmetric(SymmetricCalc),
    Fins(FinSetCalc),
    TubeFins(TubeFinSetCalc),
    LaunchLug(LaunchLugCalc),
    RailButton(RailButtonCalc),
}

impl ComponentCalc {
    /// `None` for internal components, which have no aerodynamic effect.
    pub fn new(rocket: &Rocket, id: ComponentId) -> Option<(Self, Transform)> {
        let c = rocket.component(id);
        let mut transform = Transform { offset: c.position(), rotation: 0.0 };
        let calc = match &c.kind {
            ComponentKind::Stage(_) => ComponentCalc::Assembly,
            ComponentKind::NoseCone(_) | ComponentKind::Transition(_) | ComponentKind::BodyTube(_) => {
                ComponentCalc::Symmetric(SymmetricCalc::new(c))
            }
            ComponentKind::FinSet(f) => {
                transform.rotation = f.base_rotation;
                ComponentCalc::Fins(FinSetCalc::new(rocket, c, f))
            }
            ComponentKind::TubeFinSet(t) => {
                transform.rotation = t.base_rotation;
                ComponentCalc::TubeFins(TubeFinSetCalc::new(c, t))
            }
            ComponentKind::LaunchLug(l) => ComponentCalc::LaunchLug(LaunchLugCalc::new(c, l)),
            ComponentKind::RailButton(b) => ComponentCalc::RailButton(RailButtonCalc::new(c, b)),
            ComponentKind::Parachute(_) | ComponentKind::Streamer(_) | ComponentKind::Mass { .. } => return None,
        };
        Some((calc, transform))
    }

    /// Normal force, CP and roll terms with the CP moved into the rocket frame.
    /// The pitching moment is taken about the nose tip.
    pub fn nonaxial_forces(
        &self,
        conditions: &FlightConditions,
        transform: &Transform,
        warnings: &mut WarningSet,
    ) -> AerodynamicForces {
        let mut f = match self {
            ComponentCalc::Symmetric(c) => c.nonaxial_forces(conditions, warnings),
            ComponentCalc::Fins(c) => c.nonaxial_forces(conditions, transform.rotation, warnings),
            ComponentCalc::TubeFins(c) => c.nonaxial_forces(conditions),
            ComponentCalc::Assembly | ComponentCalc::LaunchLug(_) | ComponentCalc::RailButton(_) => {
                return AerodynamicForces::zero();
            }
        };
        f.cp.x += transform.offset;
        f.cm = f.cn * f.cp.x;
        f
    }

    pub fn friction_cd(&self, cf: f64) -> f64 {
        match self {
            ComponentCalc::Symmetric(c) => c.friction_cd(cf),
            ComponentCalc::Fins(c) => c.friction_cd(cf),
            ComponentCalc::TubeFins(c) => c.friction_cd(cf),
            // protrusions sit in the body's boundary layer; their drag is all form drag
            ComponentCalc::Assembly | ComponentCalc::LaunchLug(_) | ComponentCalc::RailButton(_) => 0.0,
        }
    }

    pub fn pressure_cd(
        &self,
        conditions: &FlightConditions,
        stagnation: f64,
        base: f64,
        warnings: &mut WarningSet,
    ) -> f64 {
        match self {
            ComponentCalc::Assembly => 0.0,
            ComponentCalc::Symmetric(c) => c.pressure_cd(conditions, stagnation, base, warnings),
            ComponentCalc::Fins(c) => c.pressure_cd(conditions, stagnation, base),
            ComponentCalc::TubeFins(c) => c.pressure_cd(conditions, stagnation, base, warnings),
            ComponentCalc::LaunchLug(c) => c.pressure_cd(conditions),
            ComponentCalc::RailButton(c) => c.pressure_cd(conditions),
        }
    }

    pub fn is_symmetric(&self) -> bool {
        matches!(self, ComponentCalc::Symmetric(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vehicle::{Component, RocketBuilder, Shape};
    use approx::assert_abs_diff_eq;

    #[test]
    fn internal_components_have_no_calculator() {
        let mut b = RocketBuilder::new("r");
        let stage = b.stage("s");
        let nose = b.add(stage, Component::nose_cone("nose", Shape::Ogive, 0.1, 0.02));
        let body = b.add(stage, Component::body_tube("body", 0.3, 0.02));
        let chute = b.add(body, Component::parachute("chute", 0.3, 0.01));
        let r = b.build().unwrap();
        assert!(ComponentCalc::new(&r, chute).is_none());
        assert!(matches!(ComponentCalc::new(&r, stage), Some((ComponentCalc::Assembly, _))));
        let (calc, t) = ComponentCalc::new(&r, body).unwrap();
        assert!(calc.is_symmetric());
        assert_abs_diff_eq!(t.offset, 0.1, epsilon = 1e-12);
        assert!(ComponentCalc::new(&r, nose).is_some());
    }

    #[test]
    fn cp_is_shifted_into_rocket_frame() {
        let mut b = RocketBuilder::new("r");
        let stage = b.stage("s");
        b.add(stage, Component::body_tube("front", 0.2, 0.02));
        let tail = b.add(stage, Component::transition("tail", Shape::Conical, 0.1, 0.02, 0.03));
        let r = b.build().unwrap();
        let (calc, t) = ComponentCalc::new(&r, tail).unwrap();
        let cond = FlightConditions::new(0.06);
        let f = calc.nonaxial_forces(&cond, &t, &mut WarningSet::new());
        assert!(f.cp.x > 0.2 && f.cp.x < 0.3);
        assert_abs_diff_eq!(f.cm, f.cn * f.cp.x, epsilon = 1e-15);
    }
}
