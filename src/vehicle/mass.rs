use std::f64::consts::PI;

use crate::math::{pow2, EPSILON};
use crate::vehicle::component::{Component, ComponentKind};
use crate::vehicle::configuration::FlightConfiguration;
use crate::vehicle::motor::MotorState;

// ---------------------------------------------------------------------------
// Rigid-body mass properties
// ---------------------------------------------------------------------------

/// Mass, axial CG and inertia about the CG of an axisymmetric body.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RigidBody {
    pub mass: f64,                 // kg
    pub cg: f64,                   // m from the nose tip
    pub longitudinal_inertia: f64, // kg·m^2, pitch/yaw
    pub rotational_inertia: f64,   // kg·m^2, roll
}

impl RigidBody {
    pub const EMPTY: RigidBody =
        RigidBody { mass: 0.0, cg: 0.0, longitudinal_inertia: 0.0, rotational_inertia: 0.0 };

    pub fn new(mass: f64, cg: f64, longitudinal_inertia: f64, rotational_inertia: f64) -> Self {
        Self { mass, cg, longitudinal_inertia, rotational_inertia }
    }

    pub fn point(mass: f64, cg: f64) -> Self {
        Self::new(mass, cg, 0.0, 0.0)
    }

    /// Combine two bodies, moving both inertias to the common CG.
    pub fn add(&self, other: &RigidBody) -> RigidBody {
        let mass = self.mass + other.mass;
        if mass < EPSILON {
            return RigidBody { cg: (self.cg + other.cg) / 2.0, ..RigidBody::EMPTY };
        }
        let cg = (self.cg * self.mass + other.cg * other.mass) / mass;
        let longitudinal = self.longitudinal_inertia
            + self.mass * pow2(self.cg - cg)
            + other.longitudinal_inertia
            + other.mass * pow2(other.cg - cg);
        RigidBody {
            mass,
            cg,
            longitudinal_inertia: longitudinal,
            rotational_inertia: self.rotational_inertia + other.rotational_inertia,
        }
    }

    fn scaled(&self, factor: f64) -> RigidBody {
        RigidBody {
            mass: self.mass * factor,
            longitudinal_inertia: self.longitudinal_inertia * factor,
            rotational_inertia: self.rotational_inertia * factor,
            ..*self
        }
    }
}

impl std::iter::Sum for RigidBody {
    fn sum<I: Iterator<Item = RigidBody>>(iter: I) -> Self {
        iter.fold(RigidBody::EMPTY, |acc, b| acc.add(&b))
    }
}

// ---------------------------------------------------------------------------
// Component masses
// ---------------------------------------------------------------------------

/// Mass properties of one component (without children), with overrides applied.
pub fn component_mass(c: &Component) -> RigidBody {
    let pos = c.position();
    let len = c.length();
    let body = match &c.kind {
        ComponentKind::Stage(_) => RigidBody::EMPTY,
        ComponentKind::NoseCone(_) | ComponentKind::Transition(_) | ComponentKind::BodyTube(_) => {
            let g = c.integrals();
            let filled = matches!(&c.kind, ComponentKind::NoseCone(t) | ComponentKind::Transition(t) if t.filled);
            let volume = if filled { g.full_volume } else { g.shell_volume };
            let m = volume * c.density;
            let i_rot = m * g.shell_radial_moment;
            let i_long = m * (g.shell_axial_moment - pow2(g.shell_cg)).max(0.0) + i_rot / 2.0;
            RigidBody::new(m, pos + g.shell_cg, i_long, i_rot)
        }
        ComponentKind::FinSet(f) => {
            let m = f.planform_area() * f.thickness * f.count as f64 * c.density;
            let (cx, cy) = f.centroid();
            let r = c.body_radius() + cy;
            RigidBody::new(m, pos + cx, m * (pow2(r) / 2.0 + pow2(f.root_chord()) / 12.0), m * pow2(r))
        }
        ComponentKind::TubeFinSet(f) => {
            let m = f.count as f64 * PI * (pow2(f.outer_radius) - pow2(f.inner_radius())) * f.length * c.density;
            let d = c.body_radius() + f.outer_radius;
            let r2 = pow2(d) + pow2(f.outer_radius);
            RigidBody::new(m, pos + f.length / 2.0, m * (r2 / 2.0 + pow2(f.length) / 12.0), m * r2)
        }
        ComponentKind::LaunchLug(l) => {
            let m = PI * (pow2(l.outer_radius) - pow2(l.inner_radius())) * l.length * c.density;
            let d = c.body_radius() + l.outer_radius;
            RigidBody::new(m, pos + l.length / 2.0, m * (pow2(d) + pow2(l.length) / 12.0), m * pow2(d))
        }
        ComponentKind::RailButton(r) => {
            let stem = (r.total_height - r.base_height - r.flange_height).max(0.0);
            let each = PI * pow2(r.outer_diameter / 2.0) * (r.base_height + r.flange_height)
                + PI * pow2(r.inner_diameter / 2.0) * stem;
            let m = each * r.count as f64 * c.density;
            let d = c.body_radius() + r.total_height / 2.0;
            RigidBody::new(m, pos + len / 2.0, m * (pow2(d) + pow2(len) / 12.0), m * pow2(d))
        }
        ComponentKind::Parachute(p) => packed(p.mass, pos, len, c.body_radius()),
        ComponentKind::Streamer(s) => {
            packed(s.length * s.width * s.material_density, pos, len, c.body_radius())
        }
        ComponentKind::Mass { mass, .. } => packed(*mass, pos, len, 0.0),
    };

    let mut body = body;
    if let Some(m) = c.mass_override {
        body = if body.mass > EPSILON {
            body.scaled(m / body.mass)
        } else {
            RigidBody::point(m, pos + len / 2.0)
        };
    }
    if let Some(cg) = c.cg_override {
        body.cg = pos + cg;
    }
    body
}

/// Cylinder of packed material filling a body of the given radius.
fn packed(mass: f64, pos: f64, len: f64, radius: f64) -> RigidBody {
    let r2 = pow2(radius);
    RigidBody::new(mass, pos + len / 2.0, mass * (3.0 * r2 + pow2(len)) / 12.0, mass * r2 / 2.0)
}

/// Structural mass of the active stages (no motors).
pub fn structure_mass(config: &FlightConfiguration) -> RigidBody {
    config.active_components().map(|(_, c)| component_mass(c)).sum()
}

/// Mass of the motors in active stages at `time`.
pub fn motor_mass(config: &FlightConfiguration, states: &[MotorState], time: f64) -> RigidBody {
    config
        .active_motors()
        .map(|(i, m)| {
            let mass = match states.get(i) {
                Some(s) => s.mass(&m.motor, time),
                None => m.motor.launch_mass(),
            };
            let (long, rot) = m.motor.inertia(mass);
            RigidBody::new(mass, config.motor_position(m) + m.motor.cg(), long, rot)
        })
        .sum()
}

/// Propellant mass still on board, kg.
pub fn propellant_mass(config: &FlightConfiguration, states: &[MotorState], time: f64) -> f64 {
    motor_mass(config, states, time).mass
        - config.active_motors().map(|(_, m)| m.motor.burnout_mass()).sum::<f64>()
}
