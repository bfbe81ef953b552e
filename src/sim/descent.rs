use nalgebra::Vector3;

use crate::error::SimulationError;
use crate::math::EPSILON;
use crate::sim::data::FlightDataType;
use crate::sim::integrator::{self, MIN_TIME_STEP};
use crate::sim::listener::ListenerChain;
use crate::sim::status::SimulationStatus;
use crate::vehicle::ComponentKind;

// ---------------------------------------------------------------------------
// Three-degree-of-freedom descent
// ---------------------------------------------------------------------------
//
// After a recovery device opens, or the rocket starts tumbling, orientation no
// longer matters: the body falls as a point mass with a fixed drag area.

const RECOVERY_TIME_STEP: f64 = 0.5; // s

/// Drag coefficient of a tumbling body, per unit planform area.
const TUMBLE_BODY_CD: f64 = 0.56;
const TUMBLE_FIN_CD: f64 = 1.42;
/// Fin efficiency by fin count (index clamped to 7).
const FIN_EFFICIENCY: [f64; 8] = [0.0, 0.5, 1.0, 1.41, 1.81, 1.73, 1.90, 1.85];

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DescentKind {
    /// Under the deployed recovery devices.
    Landing,
    /// Tumbling end over end; drag coefficient fixed at the start of the tumble.
    Tumble { cd: f64 },
}

#[derive(Debug, Clone)]
pub struct DescentStepper {
    kind: DescentKind,
}

impl DescentStepper {
    pub fn landing() -> Self {
        Self { kind: DescentKind::Landing }
    }

    /// Tumble stepper for the stages active in `status`.
    pub fn tumble(status: &SimulationStatus) -> Self {
        Self { kind: DescentKind::Tumble { cd: tumble_cd(status) } }
    }

    pub fn kind(&self) -> DescentKind {
        self.kind
    }

    fn drag_coefficient(&self, status: &SimulationStatus) -> f64 {
        match self.kind {
            DescentKind::Tumble { cd } => cd,
            DescentKind::Landing => {
                let config = &status.configuration;
                let area: f64 = status
                    .deployed
                    .iter()
                    .filter(|&&id| config.is_component_active(id))
                    .map(|&id| config.rocket().component(id).recovery_drag_area())
                    .sum();
                area / config.reference_area()
            }
        }
    }

    pub fn step(
        &mut self,
        status: &mut SimulationStatus,
        listeners: &mut ListenerChain,
        max_step: f64,
    ) -> Result<(), SimulationError> {
        let atmosphere = integrator::atmosphere(status, listeners)?;
        let wind = integrator::wind(status, listeners)?;
        let (structure, motors) = integrator::mass_data(status, listeners)?;
        let gravity = integrator::gravity(status, listeners)?;
        let coriolis = integrator::coriolis(status);
        let mass = structure.mass + motors.mass;

        let airspeed = status.state.velocity - wind;
        let speed = airspeed.norm();
        let cd = self.drag_coefficient(status);
        let ref_area = status.configuration.reference_area();
        let cda = cd * ref_area;
        let drag = 0.5 * cda * atmosphere.density() * speed * speed;

        let mut a = Vector3::new(0.0, 0.0, -gravity) + coriolis;
        if speed > EPSILON {
            a -= airspeed / speed * (drag / mass);
        }

        let mut dt = RECOVERY_TIME_STEP;
        let magnitude = a.norm();
        if magnitude > EPSILON {
            dt = dt.min(1.0 / magnitude);
        }
        dt = dt.min(max_step).max(MIN_TIME_STEP);

        let p = status.state.position;
        let v = status.state.velocity;
        if p.z + v.z * dt + 0.5 * a.z * dt * dt < 0.0 {
            // stop exactly at ground contact
            dt = ground_contact_time(p.z, v.z, a.z).clamp(0.0, dt);
        } else if v.z * (v.z + a.z * dt) < 0.0 && a.z.abs() > EPSILON {
            // or at the top of the arc
            dt = (v.z / a.z).abs();
        } else {
            // Explicit Euler overshoots terminal velocity when the step outlasts
            // the drag time constant; end the step where acceleration would vanish.
            let jerk = drag_jerk(&airspeed, &a, cda * atmosphere.density() / mass);
            if (a.z + jerk.z * dt) * a.z < 0.0 {
                dt = (a.z / jerk.z).abs();
            }
        }
        dt = dt.max(MIN_TIME_STEP);

        status.store_data();
        status.store_acceleration(&a);
        let b = &mut status.branch;
        b.set_value(FlightDataType::TimeStep, dt);
        b.set_value(FlightDataType::Mass, mass);
        b.set_value(FlightDataType::MotorMass, motors.mass);
        b.set_value(FlightDataType::Thrust, 0.0);
        b.set_value(FlightDataType::Drag, drag);
        b.set_value(FlightDataType::DragCoeff, cd);
        b.set_value(FlightDataType::Gravity, gravity);
        b.set_value(FlightDataType::Coriolis, coriolis.norm());
        b.set_value(FlightDataType::WindVelocity, wind.norm());
        b.set_value(FlightDataType::Mach, speed / atmosphere.speed_of_sound());
        b.set_value(FlightDataType::ReferenceArea, ref_area);
        b.set_value(FlightDataType::AirTemperature, atmosphere.temperature());
        b.set_value(FlightDataType::AirPressure, atmosphere.pressure());
        b.set_value(FlightDataType::SpeedOfSound, atmosphere.speed_of_sound());

        let s = &mut status.state;
        s.position += v * dt + 0.5 * a * dt * dt;
        s.velocity += a * dt;
        s.rotation_velocity = Vector3::zeros();
        if s.position.z < 0.0 {
            s.position.z = 0.0;
        }
        status.time += dt;
        Ok(())
    }
}

/// Rate of change of drag acceleration `-k |u| u / 2` as the airspeed `u`
/// follows the acceleration `a`, with `k = CdA rho / m`.
fn drag_jerk(airspeed: &Vector3<f64>, a: &Vector3<f64>, k: f64) -> Vector3<f64> {
    let speed = airspeed.norm();
    if speed < EPSILON {
        return Vector3::zeros();
    }
    let along = airspeed.dot(a) / speed;
    -0.5 * k * (speed * a + airspeed * along)
}

/// Time until `z + v t + a t^2 / 2` reaches zero.
fn ground_contact_time(z: f64, v: f64, a: f64) -> f64 {
    let z = z.max(0.0);
    if a.abs() > EPSILON {
        let disc = v * v - 2.0 * a * z;
        if disc >= 0.0 {
            return (-v - disc.sqrt()) / a;
        }
    }
    if v < -EPSILON {
        -z / v
    } else {
        0.0
    }
}

/// Drag coefficient of the tumbling stages, referenced to the configuration's area.
fn tumble_cd(status: &SimulationStatus) -> f64 {
    let config = &status.configuration;
    let mut fin_area = 0.0;
    let mut body_area = 0.0;
    for (_, c) in config.active_components() {
        match &c.kind {
            ComponentKind::FinSet(f) => {
                fin_area += f.planform_area() * FIN_EFFICIENCY[f.count.min(7)];
            }
            _ if c.is_symmetric() => body_area += c.integrals().planform_area,
            _ => {}
        }
    }
    (TUMBLE_FIN_CD * fin_area + TUMBLE_BODY_CD * body_area) / config.reference_area()
}

/// Idle stepper once the rocket is on the ground: time advances, nothing moves.
pub fn ground_step(status: &mut SimulationStatus, max_step: f64) {
    status.state.velocity = Vector3::zeros();
    status.state.rotation_velocity = Vector3::zeros();
    status.time += max_step;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::options::SimulationOptions;
    use crate::vehicle::presets;
    use approx::assert_abs_diff_eq;

    fn status() -> SimulationStatus {
        let opts = SimulationOptions { wind_average: 0.0, wind_turbulence: 0.0, ..Default::default() };
        let mut s = SimulationStatus::new(opts.to_conditions(presets::alpha().unwrap()).unwrap());
        s.liftoff = true;
        s.launch_rod_cleared = true;
        s
    }

    #[test]
    fn contact_time_solves_the_quadratic() {
        // 10 m free fall from rest
        assert_abs_diff_eq!(ground_contact_time(10.0, 0.0, -9.81), (20.0_f64 / 9.81).sqrt(), epsilon = 1e-12);
        assert_abs_diff_eq!(ground_contact_time(10.0, -5.0, 0.0), 2.0, epsilon = 1e-12);
    }

    #[test]
    fn parachute_reaches_terminal_velocity() {
        let mut s = status();
        let chute = s.configuration.rocket().find("Parachute").unwrap();
        s.deployed.push(chute);
        s.state.position.z = 3000.0;
        let mut stepper = DescentStepper::landing();
        let mut listeners = ListenerChain::new();
        for _ in 0..200 {
            stepper.step(&mut s, &mut listeners, f64::INFINITY).unwrap();
        }
        let v1 = s.state.velocity.z;
        stepper.step(&mut s, &mut listeners, f64::INFINITY).unwrap();
        assert!(v1 < 0.0);
        assert_abs_diff_eq!(s.state.velocity.z, v1, epsilon = 0.01);
    }

    #[test]
    fn descent_rate_settles_without_oscillating() {
        let mut s = status();
        let chute = s.configuration.rocket().find("Parachute").unwrap();
        s.deployed.push(chute);
        s.state.position.z = 3000.0;
        let mut stepper = DescentStepper::landing();
        let mut listeners = ListenerChain::new();
        for _ in 0..260 {
            stepper.step(&mut s, &mut listeners, f64::INFINITY).unwrap();
        }

        let az = s.branch.get(FlightDataType::AccelerationZ).unwrap();
        let vz = s.branch.get(FlightDataType::VelocityZ).unwrap();
        let tail = az.len() - 60;
        let flips = az[tail..].windows(2).filter(|w| w[0] * w[1] < 0.0).count();
        assert_eq!(flips, 0);
        // monotonic approach: the descent rate only moves one way
        let rising = vz[tail..].windows(2).all(|w| w[1] >= w[0]);
        let falling = vz[tail..].windows(2).all(|w| w[1] <= w[0]);
        assert!(rising || falling);
        assert!(az[az.len() - 1].abs() < 0.05);
        assert!(s.state.position.z > 0.0);
    }

    #[test]
    fn stops_exactly_on_the_ground() {
        let mut s = status();
        s.state.position.z = 0.5;
        s.state.velocity.z = -10.0;
        let mut stepper = DescentStepper::tumble(&s);
        assert!(matches!(stepper.kind(), DescentKind::Tumble { cd } if cd > 0.0));
        stepper.step(&mut s, &mut ListenerChain::new(), f64::INFINITY).unwrap();
        assert_abs_diff_eq!(s.state.position.z, 0.0, epsilon = 1e-9);
        assert!(s.time < 0.06);
    }

    #[test]
    fn ground_step_only_moves_time() {
        let mut s = status();
        s.state.velocity.z = -3.0;
        ground_step(&mut s, 0.7);
        assert_eq!(s.time, 0.7);
        assert_eq!(s.state.velocity, Vector3::zeros());
    }
}
