use std::sync::Arc;

use crate::error::ConfigError;
use crate::vehicle::component::{Component, ComponentId, Finish, Placement};
use crate::vehicle::configuration::{FlightConfiguration, MotorConfig};
use crate::vehicle::motor::{IgnitionEvent, ThrustCurveMotor};
use crate::vehicle::recovery::{DeployEvent, DeploymentConfig};
use crate::vehicle::rocket::RocketBuilder;
use crate::vehicle::shape::Shape;

/// BT-50 body radius, m.
pub const ALPHA_RADIUS: f64 = 0.0124;

pub const NAMES: [&str; 2] = ["alpha", "two-stage"];

// ---------------------------------------------------------------------------
// Motors
// ---------------------------------------------------------------------------

const C6_CURVE: [(f64, f64); 24] = [
    (0.031, 0.946),
    (0.092, 4.826),
    (0.139, 9.936),
    (0.192, 14.090),
    (0.209, 11.446),
    (0.231, 7.381),
    (0.248, 6.151),
    (0.292, 5.489),
    (0.370, 4.921),
    (0.475, 4.448),
    (0.671, 4.258),
    (0.702, 4.542),
    (0.723, 4.164),
    (0.850, 4.448),
    (1.063, 4.353),
    (1.211, 4.353),
    (1.242, 4.069),
    (1.303, 4.258),
    (1.468, 4.353),
    (1.656, 4.448),
    (1.821, 4.448),
    (1.834, 2.933),
    (1.847, 1.325),
    (1.860, 0.000),
];

/// Estes C6 18 mm black-powder motor with the given ejection delay.
pub fn estes_c6(delay: f64) -> Result<ThrustCurveMotor, ConfigError> {
    Ok(ThrustCurveMotor::new(format!("C6-{}", delay.round()), 0.018, 0.070, &C6_CURVE, 0.0231, 0.0123)?
        .with_delays(&[delay]))
}

// ---------------------------------------------------------------------------
// Rockets
// ---------------------------------------------------------------------------

/// Alpha airframe as the top stage; returns the motor mount.
fn add_sustainer(b: &mut RocketBuilder) -> ComponentId {
    let stage = b.stage("Sustainer");
    b.add(stage, Component::nose_cone("Nose cone", Shape::Ogive, 0.10, ALPHA_RADIUS).finish(Finish::Smooth));
    let body = b.add(
        stage,
        Component::body_tube("Body tube", 0.20, ALPHA_RADIUS).thickness(0.0005).motor_mount(0.005),
    );
    b.add(body, Component::trapezoidal_fins("Fins", 3, 0.06, 0.03, 0.03, 0.045).thickness(0.0024));
    b.add(body, Component::launch_lug("Launch lug", 0.035, 0.0025));
    b.add(
        body,
        Component::parachute("Parachute", 0.30, 0.006)
            .placement(Placement::Top(0.02))
            .deployment(DeploymentConfig::new(DeployEvent::Ejection)),
    );
    b.add(body, Component::mass_component("Shock cord", 0.003, 0.02).placement(Placement::Top(0.0)));
    body
}

/// Single-stage 24.8 mm sport rocket flying an Estes C6-5.
pub fn alpha() -> Result<FlightConfiguration, ConfigError> {
    let mut b = RocketBuilder::new("Alpha");
    let body = add_sustainer(&mut b);
    let rocket = Arc::new(b.build()?);
    FlightConfiguration::new(rocket).with_motor(MotorConfig::new(body, Arc::new(estes_c6(5.0)?)))
}

/// Two-stage version: a short C6-0 booster below the Alpha airframe with a C6-7.
pub fn two_stage() -> Result<FlightConfiguration, ConfigError> {
    let mut b = RocketBuilder::new("Alpha two-stage");
    let upper = add_sustainer(&mut b);
    let booster = b.stage("Booster");
    let tube = b.add(
        booster,
        Component::body_tube("Booster tube", 0.075, ALPHA_RADIUS).thickness(0.0005).motor_mount(0.0),
    );
    b.add(tube, Component::trapezoidal_fins("Booster fins", 3, 0.06, 0.03, 0.03, 0.05).thickness(0.0024));
    let rocket = Arc::new(b.build()?);

    FlightConfiguration::new(rocket)
        .with_motor(MotorConfig::new(tube, Arc::new(estes_c6(0.0)?)).ignition(IgnitionEvent::Launch))?
        .with_motor(MotorConfig::new(upper, Arc::new(estes_c6(7.0)?)))
}

pub fn by_name(name: &str) -> Result<FlightConfiguration, ConfigError> {
    match name {
        "alpha" => alpha(),
        "two-stage" => two_stage(),
        other => Err(ConfigError::UnknownPreset(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_presets_build() {
        for name in NAMES {
            let config = by_name(name).unwrap();
            assert!(config.has_motors(), "{} has no motor", name);
        }
        assert!(by_name("saturn-v").is_err());
    }

    #[test]
    fn motors_are_not_rocket_presets() {
        assert_eq!(NAMES, ["alpha", "two-stage"]);
        assert!(matches!(by_name("estes_c6"), Err(ConfigError::UnknownPreset(_))));
    }

    #[test]
    fn c6_impulse_is_c_class() {
        let m = estes_c6(5.0).unwrap();
        // C class: 5-10 N·s
        assert!(m.total_impulse() > 5.0 && m.total_impulse() <= 10.0, "{}", m.total_impulse());
        assert_eq!(m.designation(), "C6-5");
        assert!((m.burn_time() - 1.86).abs() < 1e-9);
    }
}
