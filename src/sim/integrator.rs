use std::f64::consts::PI;

use nalgebra::{UnitQuaternion, Vector3};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};

use crate::aero::{AerodynamicForces, FlightConditions};
use crate::dynamics::{airflow_angles, angular_acceleration, linear_acceleration, Deriv, RigidState};
use crate::error::{AbortReason, SimulationError};
use crate::math::EPSILON;
use crate::physics::AtmosphericConditions;
use crate::sim::data::FlightDataType;
use crate::sim::listener::{AccelerationData, ListenerChain, MassKind};
use crate::sim::status::SimulationStatus;
use crate::vehicle::{mass, RigidBody};
use crate::warning::WarningSet;

// ---------------------------------------------------------------------------
// Step limits
// ---------------------------------------------------------------------------

pub const MIN_TIME_STEP: f64 = 0.001; // s

const MAX_ROLL_STEP_ANGLE: f64 = 2.0 * 28.32 * PI / 180.0; // rad per step
const MAX_ROLL_RATE_CHANGE: f64 = 2.0 * PI / 180.0;        // rad/s per step
const MAX_PITCH_YAW_CHANGE: f64 = 4.0 * PI / 180.0;        // rad/s per step

/// Standard deviation of the pitch/yaw moment noise.
const PITCH_YAW_RANDOM: f64 = 0.0005;
const PERTURBATION_SEED_MASK: u64 = 0x23E3_A01F;

/// Squared magnitudes beyond this mean the integration diverged.
const MAX_MAGNITUDE_SQUARED: f64 = 1e18;

// ---------------------------------------------------------------------------
// Shared model evaluation
// ---------------------------------------------------------------------------
//
// Each model is queried through its listener hooks: a `pre_*` override
// replaces the built-in model and skips the `post_*` hooks.

pub(crate) fn atmosphere(
    status: &mut SimulationStatus,
    listeners: &mut ListenerChain,
) -> Result<AtmosphericConditions, SimulationError> {
    if let Some(a) = listeners.pre_atmosphere(status)? {
        return Ok(a);
    }
    let a = status.conditions().atmosphere.conditions(status.altitude_msl());
    listeners.post_atmosphere(status, a)
}

pub(crate) fn wind(
    status: &mut SimulationStatus,
    listeners: &mut ListenerChain,
) -> Result<Vector3<f64>, SimulationError> {
    if let Some(w) = listeners.pre_wind(status)? {
        return Ok(w);
    }
    let (time, altitude) = (status.time, status.altitude_msl());
    let w = status.wind.wind_velocity(time, altitude);
    listeners.post_wind(status, w)
}

pub(crate) fn gravity(
    status: &mut SimulationStatus,
    listeners: &mut ListenerChain,
) -> Result<f64, SimulationError> {
    if let Some(g) = listeners.pre_gravity(status)? {
        return Ok(g);
    }
    let g = status.conditions().gravity.gravity(&status.world_position());
    listeners.post_gravity(status, g)
}

pub(crate) fn coriolis(status: &SimulationStatus) -> Vector3<f64> {
    status
        .conditions()
        .geodetic
        .coriolis_acceleration(&status.world_position(), &status.state.velocity)
}

/// Structure and motor mass of the active stages.
pub(crate) fn mass_data(
    status: &mut SimulationStatus,
    listeners: &mut ListenerChain,
) -> Result<(RigidBody, RigidBody), SimulationError> {
    let structure = match listeners.pre_mass(status, MassKind::Structure)? {
        Some(m) => m,
        None => {
            let m = mass::structure_mass(&status.configuration);
            listeners.post_mass(status, MassKind::Structure, m)?
        }
    };
    let motors = match listeners.pre_mass(status, MassKind::Motors)? {
        Some(m) => m,
        None => {
            let m = mass::motor_mass(&status.configuration, &status.motor_states, status.time);
            listeners.post_mass(status, MassKind::Motors, m)?
        }
    };
    if structure.mass + motors.mass < EPSILON {
        return Err(SimulationError::Aborted { time: status.time, reason: AbortReason::ActiveMassZero });
    }
    Ok((structure, motors))
}

pub(crate) fn thrust(
    status: &mut SimulationStatus,
    listeners: &mut ListenerChain,
) -> Result<f64, SimulationError> {
    let thrust = match listeners.pre_thrust(status)? {
        Some(t) => t,
        None => {
            let t: f64 = status
                .configuration
                .active_motors()
                .map(|(i, m)| status.motor_states[i].thrust(&m.motor, status.time))
                .sum();
            listeners.post_thrust(status, t)?
        }
    };
    if !thrust.is_finite() || thrust < 0.0 {
        return Err(SimulationError::numerical(status.time, format!("invalid thrust {thrust}")));
    }
    Ok(thrust)
}

/// Airspeed, angles and body rates at the current state. Returns the
/// conditions together with the wind used to build them.
fn flight_conditions(
    status: &mut SimulationStatus,
    listeners: &mut ListenerChain,
    cg: f64,
) -> Result<(FlightConditions, Vector3<f64>), SimulationError> {
    let wind = wind(status, listeners)?;
    if let Some(c) = listeners.pre_flight_conditions(status)? {
        return Ok((c, wind));
    }
    let atmosphere = atmosphere(status, listeners)?;

    let q = status.state.orientation;
    let airspeed = q.inverse() * (status.state.velocity - wind);
    let (aoa, theta) = airflow_angles(&airspeed);

    let mut c = FlightConditions::new(status.configuration.reference_length());
    c.set_atmosphere(atmosphere);
    c.set_velocity(airspeed.norm());
    c.set_aoa(aoa);
    c.set_theta(theta);

    // body rates in the airflow plane
    let omega = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), -theta)
        * (q.inverse() * status.state.rotation_velocity);
    c.set_roll_rate(omega.z);
    c.set_pitch_rate(omega.y);
    c.set_yaw_rate(omega.x);
    c.set_pitch_center(Vector3::new(cg, 0.0, 0.0));

    let c = listeners.post_flight_conditions(status, c)?;
    Ok((c, wind))
}

// ---------------------------------------------------------------------------
// One model evaluation (an RK4 stage)
// ---------------------------------------------------------------------------

/// Quantities recorded alongside a data point.
#[derive(Debug, Clone)]
struct Snapshot {
    conditions: FlightConditions,
    forces: AerodynamicForces,
    structure: RigidBody,
    motors: RigidBody,
    thrust: f64,
    gravity: f64,
    wind: Vector3<f64>,
    coriolis: Vector3<f64>,
}

#[derive(Debug, Clone)]
struct Evaluation {
    deriv: Deriv,
    roll_acceleration: f64,  // rad/s^2, body frame
    pitch_acceleration: f64, // larger of pitch and yaw
    /// `None` when a listener supplied the acceleration directly.
    snapshot: Option<Snapshot>,
}

// ---------------------------------------------------------------------------
// RK4 flight stepper
// ---------------------------------------------------------------------------

/// Six-degree-of-freedom flight stepper used from launch until a recovery
/// device opens or the rocket tumbles.
#[derive(Debug)]
pub struct Rk4Stepper {
    rod_direction: Vector3<f64>,
    rng: StdRng,
    perturbation: Normal<f64>,
}

impl Rk4Stepper {
    pub fn new(status: &SimulationStatus) -> Result<Self, SimulationError> {
        let c = status.conditions();
        let perturbation = Normal::new(0.0, PITCH_YAW_RANDOM)
            .map_err(|e| SimulationError::numerical(status.time, e.to_string()))?;
        Ok(Self {
            rod_direction: c.rod_direction(),
            rng: StdRng::seed_from_u64(c.seed ^ PERTURBATION_SEED_MASK),
            perturbation,
        })
    }

    /// Advance `status` by one adaptive step no longer than `max_step`.
    pub fn step(
        &mut self,
        status: &mut SimulationStatus,
        listeners: &mut ListenerChain,
        max_step: f64,
    ) -> Result<(), SimulationError> {
        let k1 = self.evaluate(status, listeners)?;
        let dt = self.time_step(status, &k1, max_step);
        status.previous_time_step = Some(dt);

        status.store_data();
        store(status, &k1, dt);

        let t0 = status.time;
        let s0 = status.state.clone();
        let k2 = self.trial(status, listeners, s0.apply(&k1.deriv, dt / 2.0), t0 + dt / 2.0)?;
        let k3 = self.trial(status, listeners, s0.apply(&k2.deriv, dt / 2.0), t0 + dt / 2.0)?;
        let k4 = self.trial(status, listeners, s0.apply(&k3.deriv, dt), t0 + dt)?;

        let avg = Deriv::rk4_average(&k1.deriv, &k2.deriv, &k3.deriv, &k4.deriv);
        status.state = s0.apply(&avg, dt);
        status.time = t0 + dt;

        let s = &status.state;
        if s.position.norm_squared() > MAX_MAGNITUDE_SQUARED
            || s.velocity.norm_squared() > MAX_MAGNITUDE_SQUARED
            || s.rotation_velocity.norm_squared() > MAX_MAGNITUDE_SQUARED
        {
            return Err(SimulationError::numerical(status.time, "state magnitude out of range"));
        }
        Ok(())
    }

    fn time_step(&self, status: &SimulationStatus, k1: &Evaluation, max_step: f64) -> f64 {
        let c = status.conditions();
        let min_step = c.time_step / 20.0;
        let mut user = c.time_step;

        let omega = status.state.orientation.inverse() * status.state.rotation_velocity;
        let lateral_rate = omega.x.hypot(omega.y);

        let mut rod_limit = f64::INFINITY;
        if !status.launch_rod_cleared {
            user /= 5.0;
            let v = status.state.velocity.norm();
            if v > EPSILON {
                rod_limit = c.launch_rod_length / v / 10.0;
            }
        }
        let growth_limit = status.previous_time_step.map_or(f64::INFINITY, |p| 1.5 * p);

        let mut dt = [
            user,
            max_step,
            c.max_angle_step / lateral_rate,
            (MAX_ROLL_STEP_ANGLE / omega.z).abs(),
            (MAX_ROLL_RATE_CHANGE / k1.roll_acceleration).abs(),
            (MAX_PITCH_YAW_CHANGE / k1.pitch_acceleration).abs(),
            rod_limit,
            growth_limit,
        ]
        .into_iter()
        .fold(f64::INFINITY, f64::min);

        if max_step - dt < min_step {
            dt = max_step;
        }
        dt.max(min_step)
    }

    /// Evaluate the models at a trial state, restoring the committed one afterwards.
    fn trial(
        &mut self,
        status: &mut SimulationStatus,
        listeners: &mut ListenerChain,
        state: RigidState,
        time: f64,
    ) -> Result<Evaluation, SimulationError> {
        let saved_state = std::mem::replace(&mut status.state, state);
        let saved_time = std::mem::replace(&mut status.time, time);
        let result = self.evaluate(status, listeners);
        status.state = saved_state;
        status.time = saved_time;
        result
    }

    fn evaluate(
        &mut self,
        status: &mut SimulationStatus,
        listeners: &mut ListenerChain,
    ) -> Result<Evaluation, SimulationError> {
        if let Some(a) = listeners.pre_acceleration(status)? {
            return Ok(self.finish(status, a, None));
        }

        let (structure, motors) = mass_data(status, listeners)?;
        let total = structure.add(&motors);
        let (conditions, wind) = flight_conditions(status, listeners, total.cg)?;
        let forces = self.aerodynamic_forces(status, listeners, &conditions)?;
        let thrust = thrust(status, listeners)?;
        let gravity = gravity(status, listeners)?;
        let coriolis = coriolis(status);

        let q = status.state.orientation;
        let qa = conditions.dynamic_pressure() * conditions.ref_area();
        let mut linear = linear_acceleration(&forces, qa, thrust, total.mass, conditions.theta(), &q);
        linear.z -= gravity;
        linear += coriolis;

        let mut angular = Vector3::zeros();
        if status.launch_rod_cleared {
            angular = angular_acceleration(
                &forces,
                qa,
                conditions.ref_length(),
                &total,
                conditions.theta(),
                &q,
            );
        } else {
            linear = self.rod_direction * linear.dot(&self.rod_direction);
        }
        if !status.liftoff && linear.z < 0.0 {
            linear = Vector3::zeros();
        }

        let a = listeners.post_acceleration(status, AccelerationData { linear, angular })?;
        let snapshot = Snapshot { conditions, forces, structure, motors, thrust, gravity, wind, coriolis };
        Ok(self.finish(status, a, Some(snapshot)))
    }

    fn finish(&self, status: &SimulationStatus, a: AccelerationData, snapshot: Option<Snapshot>) -> Evaluation {
        let s = &status.state;
        let local = s.orientation.inverse() * a.angular;
        Evaluation {
            deriv: Deriv {
                dpos: s.velocity,
                dvel: a.linear,
                drot: s.rotation_velocity,
                domega: a.angular,
            },
            roll_acceleration: local.z,
            pitch_acceleration: local.x.abs().max(local.y.abs()),
            snapshot,
        }
    }

    fn aerodynamic_forces(
        &mut self,
        status: &mut SimulationStatus,
        listeners: &mut ListenerChain,
        conditions: &FlightConditions,
    ) -> Result<AerodynamicForces, SimulationError> {
        if let Some(f) = listeners.pre_aerodynamic_forces(status, conditions)? {
            return Ok(f);
        }
        let mut warnings = WarningSet::new();
        let mut forces = status.conditions().calculator.forces(&status.configuration, conditions, &mut warnings);
        // on the rod the airflow angles are meaningless
        if status.launch_rod_cleared {
            status.warnings.extend(&warnings);
        }

        // keep perfectly symmetric flights from staying perfectly straight
        forces.cm += self.perturbation.sample(&mut self.rng);
        forces.cyaw += self.perturbation.sample(&mut self.rng);

        listeners.post_aerodynamic_forces(status, forces)
    }
}

// ---------------------------------------------------------------------------
// Data recording
// ---------------------------------------------------------------------------

fn store(status: &mut SimulationStatus, eval: &Evaluation, dt: f64) {
    status.store_acceleration(&eval.deriv.dvel);
    let cleared = status.launch_rod_cleared;
    let b = &mut status.branch;
    b.set_value(FlightDataType::TimeStep, dt);
    let Some(s) = &eval.snapshot else {
        return;
    };

    let c = &s.conditions;
    let f = &s.forces;
    let total = s.structure.add(&s.motors);
    let ref_length = c.ref_length();
    let qa = c.dynamic_pressure() * c.ref_area();

    b.set_value(FlightDataType::Mass, total.mass);
    b.set_value(FlightDataType::MotorMass, s.motors.mass);
    b.set_value(FlightDataType::LongitudinalInertia, total.longitudinal_inertia);
    b.set_value(FlightDataType::RotationalInertia, total.rotational_inertia);
    b.set_value(FlightDataType::CgLocation, total.cg);
    b.set_value(FlightDataType::Thrust, s.thrust);
    b.set_value(FlightDataType::Gravity, s.gravity);
    if total.mass * s.gravity > EPSILON {
        b.set_value(FlightDataType::ThrustWeightRatio, s.thrust / (total.mass * s.gravity));
    }
    b.set_value(FlightDataType::Drag, f.cd * qa);
    b.set_value(FlightDataType::Coriolis, s.coriolis.norm());
    b.set_value(FlightDataType::WindVelocity, s.wind.norm());

    b.set_value(FlightDataType::Aoa, c.aoa());
    b.set_value(FlightDataType::RollRate, c.roll_rate());
    b.set_value(FlightDataType::PitchRate, c.pitch_rate());
    b.set_value(FlightDataType::YawRate, c.yaw_rate());
    b.set_value(FlightDataType::Mach, c.mach());
    b.set_value(FlightDataType::Reynolds, c.reynolds(status.configuration.length()));
    b.set_value(FlightDataType::ReferenceLength, ref_length);
    b.set_value(FlightDataType::ReferenceArea, c.ref_area());
    b.set_value(FlightDataType::AirTemperature, c.atmosphere().temperature());
    b.set_value(FlightDataType::AirPressure, c.atmosphere().pressure());
    b.set_value(FlightDataType::SpeedOfSound, c.atmosphere().speed_of_sound());

    b.set_value(FlightDataType::DragCoeff, f.cd);
    b.set_value(FlightDataType::AxialDragCoeff, f.cd_axial);
    b.set_value(FlightDataType::FrictionDragCoeff, f.friction_cd);
    b.set_value(FlightDataType::PressureDragCoeff, f.pressure_cd);
    b.set_value(FlightDataType::BaseDragCoeff, f.base_cd);

    if cleared {
        b.set_value(FlightDataType::CpLocation, f.cp.x);
        b.set_value(FlightDataType::Stability, (f.cp.x - total.cg) / ref_length);
        b.set_value(FlightDataType::NormalForceCoeff, f.cn);
        b.set_value(FlightDataType::NormalForceSlope, f.cna);
        b.set_value(FlightDataType::SideForceCoeff, f.cside);
        b.set_value(FlightDataType::PitchMomentCoeff, f.cm - f.cn * total.cg / ref_length);
        b.set_value(FlightDataType::YawMomentCoeff, f.cyaw - f.cside * total.cg / ref_length);
        b.set_value(FlightDataType::RollMomentCoeff, f.croll);
        b.set_value(FlightDataType::RollForcingCoeff, f.croll_force);
        b.set_value(FlightDataType::RollDampingCoeff, f.croll_damp);
        b.set_value(FlightDataType::PitchDampingCoeff, f.pitch_damping_moment);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dynamics::launch_rod_direction;
    use crate::sim::options::SimulationOptions;
    use crate::vehicle::presets;
    use approx::assert_abs_diff_eq;

    fn status(angle: f64) -> SimulationStatus {
        let opts = SimulationOptions { launch_rod_angle: angle, wind_average: 0.0, ..Default::default() };
        SimulationStatus::new(opts.to_conditions(presets::alpha().unwrap()).unwrap())
    }

    #[test]
    fn unlit_rocket_stays_on_the_pad() {
        let mut s = status(0.0);
        let mut listeners = ListenerChain::new();
        let mut stepper = Rk4Stepper::new(&s).unwrap();
        stepper.step(&mut s, &mut listeners, 1.0).unwrap();
        assert!(s.time > 0.0);
        assert_eq!(s.state.position, Vector3::zeros());
        assert_eq!(s.branch.len(), 1);
        assert_eq!(s.branch.last(FlightDataType::Thrust), 0.0);
        // CP is only recorded once the rod is cleared
        assert!(s.branch.last(FlightDataType::CpLocation).is_nan());
    }

    #[test]
    fn burning_motor_accelerates_along_the_rod() {
        let mut s = status(10.0);
        s.motor_states[0].ignition_time = Some(0.0);
        s.liftoff = true;
        let mut listeners = ListenerChain::new();
        let mut stepper = Rk4Stepper::new(&s).unwrap();
        for _ in 0..5 {
            stepper.step(&mut s, &mut listeners, 1.0).unwrap();
        }
        let v = s.state.velocity;
        assert!(v.norm() > 0.0);
        let rod = launch_rod_direction(10.0_f64.to_radians(), 0.0);
        assert_abs_diff_eq!(v.normalize().dot(&rod), 1.0, epsilon = 1e-9);
        assert!(s.branch.last(FlightDataType::Thrust) > 0.0);
    }

    #[test]
    fn step_never_passes_the_next_event() {
        let mut s = status(0.0);
        let mut listeners = ListenerChain::new();
        let mut stepper = Rk4Stepper::new(&s).unwrap();
        stepper.step(&mut s, &mut listeners, 0.004).unwrap();
        assert_abs_diff_eq!(s.time, 0.004, epsilon = 1e-12);
    }

    #[test]
    fn step_grows_at_most_fifty_percent() {
        let mut s = status(0.0);
        s.launch_rod_cleared = true;
        s.previous_time_step = Some(0.002);
        let mut listeners = ListenerChain::new();
        let mut stepper = Rk4Stepper::new(&s).unwrap();
        stepper.step(&mut s, &mut listeners, 1.0).unwrap();
        assert_abs_diff_eq!(s.time, 0.003, epsilon = 1e-12);
    }
}
