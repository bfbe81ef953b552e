use std::sync::Arc;

use nalgebra::Vector3;
use tracing::{debug, info, warn};

use crate::error::{AbortReason, SimulationError};
use crate::math::EPSILON;
use crate::sim::cancel::CancelToken;
use crate::sim::data::{FlightDataBranch, FlightDataType};
use crate::sim::descent::{ground_step, DescentStepper};
use crate::sim::event::{EventData, FlightEvent, FlightEventType};
use crate::sim::integrator::{Rk4Stepper, MIN_TIME_STEP};
use crate::sim::listener::{ListenerChain, ListenerResult, SimulationListener};
use crate::sim::options::SimulationConditions;
use crate::sim::status::SimulationStatus;
use crate::vehicle::{ComponentId, ComponentKind};
use crate::warning::{Warning, WarningSet};

// ---------------------------------------------------------------------------
// Thresholds
// ---------------------------------------------------------------------------

const LIFTOFF_ALTITUDE: f64 = 0.02;       // m
const APOGEE_TOLERANCE: f64 = 0.01;       // m below the maximum
const TUMBLE_AOA: f64 = std::f64::consts::PI / 9.0; // 20 deg
const TUMBLE_THRUST: f64 = 0.01;          // N
const HIGH_SPEED_DEPLOYMENT: f64 = 20.0;  // m/s

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// How a run ended. Data recorded up to that point is kept in every case.
#[derive(Debug)]
pub enum SimulationOutcome {
    Succeeded,
    Failed(SimulationError),
    Cancelled,
}

impl SimulationOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, SimulationOutcome::Succeeded)
    }

    pub fn error(&self) -> Option<&SimulationError> {
        match self {
            SimulationOutcome::Failed(e) => Some(e),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub struct SimulationResult {
    /// Main branch first, then one branch per separated stage.
    pub branches: Vec<FlightDataBranch>,
    pub warnings: WarningSet,
    pub outcome: SimulationOutcome,
}

impl SimulationResult {
    pub fn main_branch(&self) -> Option<&FlightDataBranch> {
        self.branches.first()
    }
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Simulate one flight with no listeners.
pub fn simulate(conditions: Arc<SimulationConditions>) -> SimulationResult {
    simulate_with(conditions, &mut ListenerChain::new(), &CancelToken::new())
}

/// Simulate one flight, calling `listeners` at every hook and polling
/// `cancel` once per step.
pub fn simulate_with(
    conditions: Arc<SimulationConditions>,
    listeners: &mut ListenerChain,
    cancel: &CancelToken,
) -> SimulationResult {
    info!(
        rocket = conditions.configuration.rocket().name(),
        seed = conditions.seed,
        listeners = listeners.len(),
        "simulation started"
    );
    let mut engine = Engine { listeners, cancel, pending: Vec::new() };
    let mut branches = Vec::new();
    let mut warnings = WarningSet::new();
    let outcome = engine.run(SimulationStatus::new(conditions), &mut branches, &mut warnings);

    match &outcome {
        SimulationOutcome::Succeeded => info!(
            branches = branches.len(),
            max_altitude = branches.first().map_or(f64::NAN, FlightDataBranch::max_altitude),
            "simulation finished"
        ),
        SimulationOutcome::Cancelled => info!("simulation cancelled"),
        SimulationOutcome::Failed(e) => warn!(error = %e, "simulation failed"),
    }
    SimulationResult { branches, warnings, outcome }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

enum Stepper {
    Flight(Rk4Stepper),
    Descent(DescentStepper),
    Ground,
}

impl Stepper {
    fn for_status(status: &SimulationStatus) -> Result<Self, SimulationError> {
        Ok(if status.landed {
            Stepper::Ground
        } else if !status.deployed.is_empty() {
            Stepper::Descent(DescentStepper::landing())
        } else if status.tumbling {
            Stepper::Descent(DescentStepper::tumble(status))
        } else {
            Stepper::Flight(Rk4Stepper::new(status)?)
        })
    }

    fn step(
        &mut self,
        status: &mut SimulationStatus,
        listeners: &mut ListenerChain,
        max_step: f64,
    ) -> Result<(), SimulationError> {
        match self {
            Stepper::Flight(s) => s.step(status, listeners, max_step),
            Stepper::Descent(s) => s.step(status, listeners, max_step),
            Stepper::Ground => {
                ground_step(status, max_step);
                Ok(())
            }
        }
    }
}

enum BranchEnd {
    Completed,
    Cancelled,
}

struct Engine<'a> {
    listeners: &'a mut ListenerChain,
    cancel: &'a CancelToken,
    /// Separated stages waiting to be simulated.
    pending: Vec<SimulationStatus>,
}

impl Engine<'_> {
    fn run(
        &mut self,
        mut status: SimulationStatus,
        branches: &mut Vec<FlightDataBranch>,
        warnings: &mut WarningSet,
    ) -> SimulationOutcome {
        let mut first = true;
        loop {
            let result = if first {
                self.start(&mut status).and_then(|()| self.run_branch(&mut status))
            } else {
                self.run_branch(&mut status)
            };
            first = false;

            let outcome = match result {
                Ok(BranchEnd::Completed) => {
                    self.listeners.end_simulation(&mut status, None);
                    None
                }
                Ok(BranchEnd::Cancelled) => {
                    self.listeners.end_simulation(&mut status, None);
                    Some(SimulationOutcome::Cancelled)
                }
                Err(e) => {
                    status.branch.add_event(FlightEvent::new(status.time, FlightEventType::Exception));
                    self.listeners.end_simulation(&mut status, Some(&e));
                    Some(SimulationOutcome::Failed(e))
                }
            };
            if status.branch.is_empty() {
                status.warnings.add(Warning::EmptyBranch);
            }
            debug!(branch = status.branch.name(), points = status.branch.len(), "branch finished");
            warnings.extend(&status.warnings);
            branches.push(status.branch);

            if let Some(outcome) = outcome {
                return outcome;
            }
            match self.pending.pop() {
                Some(next) => status = next,
                None => return SimulationOutcome::Succeeded,
            }
        }
    }

    fn start(&mut self, status: &mut SimulationStatus) -> Result<(), SimulationError> {
        let abort = |reason| SimulationError::Aborted { time: 0.0, reason };
        let config = &status.configuration;
        if config.active_stage_count() == 0 {
            return Err(abort(AbortReason::NoActiveStages));
        }
        if config.active_motors().next().is_none() {
            return Err(abort(AbortReason::NoMotorsDefined));
        }
        if !config.active_components().any(|(_, c)| c.is_recovery_device()) {
            status.warnings.add(Warning::NoRecoveryDevice);
        }
        let conditions = status.conditions().clone();
        conditions.calculator.check_geometry(&status.configuration, &mut status.warnings);

        self.listeners.start_simulation(status)?;
        self.add_event(status, FlightEvent::new(0.0, FlightEventType::Launch))
    }

    fn run_branch(&mut self, status: &mut SimulationStatus) -> Result<BranchEnd, SimulationError> {
        let mut stepper = Stepper::for_status(status)?;
        debug!(branch = status.branch.name(), time = status.time, "branch started");

        loop {
            if !self.handle_events(status, &mut stepper)? {
                break;
            }
            if self.cancel.is_cancelled() {
                return Ok(BranchEnd::Cancelled);
            }

            let previous_altitude = status.state.position.z;
            let previous_vz = status.state.velocity.z;
            let previous_time = status.time;

            if self.listeners.pre_step(status)? {
                let max_step = max_step(status);
                stepper.step(status, self.listeners, max_step)?;
            }
            self.listeners.post_step(status)?;

            if !status.state.is_finite() {
                return Err(SimulationError::numerical(status.time, "non-finite flight state"));
            }
            self.detect_events(status, previous_altitude, previous_vz, previous_time)?;
        }

        if !(status.branch.last(FlightDataType::Time) >= status.time) {
            status.store_data();
        }
        Ok(BranchEnd::Completed)
    }

    // -- continuous event detection --

    fn detect_events(
        &mut self,
        status: &mut SimulationStatus,
        previous_altitude: f64,
        previous_vz: f64,
        previous_time: f64,
    ) -> Result<(), SimulationError> {
        let z = status.state.position.z;
        let time = status.time;

        if status.landed {
            if status.events.is_empty() {
                self.add_event(status, FlightEvent::new(time, FlightEventType::SimulationEnd))?;
            }
            return Ok(());
        }

        let crossing = EventData::AltitudeCrossing { previous: previous_altitude, current: z, previous_time };
        self.add_event(status, FlightEvent::new(time, FlightEventType::Altitude).with_data(crossing))?;

        if z > status.max_altitude {
            status.max_altitude = z;
            status.max_altitude_time = time;
        }

        if !status.liftoff {
            if z < 0.0 {
                status.state.position = Vector3::zeros();
                status.state.velocity = Vector3::zeros();
            }
            if status.state.position.z > LIFTOFF_ALTITUDE {
                self.add_event(status, FlightEvent::new(time, FlightEventType::Liftoff))?;
            }
        } else if z < EPSILON {
            let hit = if previous_altitude > 0.0 && previous_altitude > z {
                previous_time + (time - previous_time) * previous_altitude / (previous_altitude - z)
            } else {
                time
            };
            self.add_event(status, FlightEvent::new(hit, FlightEventType::GroundHit))?;
        }

        if status.liftoff
            && !status.launch_rod_cleared
            && status.rod_distance() > status.conditions().launch_rod_length
        {
            self.add_event(status, FlightEvent::new(time, FlightEventType::LaunchRod))?;
        }

        if status.liftoff && !status.apogee_reached {
            let vz = status.state.velocity.z;
            if previous_vz > 0.0 && vz <= 0.0 {
                // constant deceleration across the step
                let tau = (time - previous_time) * previous_vz / (previous_vz - vz);
                let altitude = (previous_altitude + 0.5 * previous_vz * tau).max(status.max_altitude);
                status.max_altitude = altitude;
                status.max_altitude_time = previous_time + tau;
                status.branch.set_apogee_altitude(altitude);
                self.add_event(status, FlightEvent::new(previous_time + tau, FlightEventType::Apogee))?;
            } else if z < status.max_altitude - APOGEE_TOLERANCE {
                let at = status.max_altitude_time;
                self.add_event(status, FlightEvent::new(at, FlightEventType::Apogee))?;
            }
        }

        if status.launch_rod_cleared && !status.tumbling && status.deployed.is_empty() {
            let b = &status.branch;
            let cg = b.last(FlightDataType::CgLocation);
            let cp = b.last(FlightDataType::CpLocation);
            if cg > cp && b.last(FlightDataType::Aoa) > TUMBLE_AOA {
                self.add_event(status, FlightEvent::new(time, FlightEventType::Tumble))?;
            }
        }
        Ok(())
    }

    // -- discrete events --

    fn add_event(&mut self, status: &mut SimulationStatus, event: FlightEvent) -> Result<(), SimulationError> {
        if self.listeners.add_flight_event(status, &event)? {
            status.events.add(event);
        }
        Ok(())
    }

    /// Handle every due event. Returns `false` once the branch should end.
    fn handle_events(
        &mut self,
        status: &mut SimulationStatus,
        stepper: &mut Stepper,
    ) -> Result<bool, SimulationError> {
        let conditions = status.conditions().clone();
        let mut proceed = true;

        while let Some(event) = next_event(status) {
            if status.landed
                && !matches!(event.kind, FlightEventType::Altitude | FlightEventType::SimulationEnd)
            {
                status.warnings.add(Warning::EventAfterLanding(event.kind));
            }

            for e in ignition_triggers(status, &event) {
                self.add_event(status, e)?;
            }

            if let Some(source) = event.source {
                if !status.configuration.is_component_active(source) {
                    continue;
                }
            }
            if !self.listeners.handle_flight_event(status, &event)? {
                continue;
            }

            for e in separation_triggers(status, &event) {
                self.add_event(status, e)?;
            }
            for e in deployment_triggers(status, &event) {
                self.add_event(status, e)?;
            }

            match event.kind {
                FlightEventType::Launch | FlightEventType::Exception => log(status, &event),

                FlightEventType::Ignition => {
                    let Some(i) = event.motor_index() else { continue };
                    if status.motor_states[i].is_ignited() || !self.listeners.motor_ignition(status, i)? {
                        continue;
                    }
                    status.motor_states[i].ignition_time = Some(event.time);
                    status.motor_ignited = true;

                    let m = &status.configuration.motors()[i];
                    let (mount, motor) = (m.mount, m.motor.clone());
                    let stage = event.stage.unwrap_or_else(|| status.configuration.motor_stage(m));
                    // step boundaries at the thrust curve points
                    for &t in motor.time_points() {
                        self.add_event(status, FlightEvent::new(event.time + t, FlightEventType::Altitude))?;
                    }
                    let burnout = FlightEvent::new(event.time + motor.burn_time(), FlightEventType::Burnout)
                        .with_source(mount, stage)
                        .with_data(EventData::Motor(i));
                    self.add_event(status, burnout)?;
                    log(status, &event);
                }

                FlightEventType::Liftoff => {
                    status.liftoff = true;
                    log(status, &event);
                }

                FlightEventType::LaunchRod => {
                    status.launch_rod_cleared = true;
                    log(status, &event);
                }

                FlightEventType::Burnout => {
                    let Some(i) = event.motor_index() else { continue };
                    if !status.liftoff {
                        return Err(SimulationError::Aborted { time: event.time, reason: AbortReason::NoLiftoff });
                    }
                    status.motor_states[i].burnout_time = Some(event.time);
                    let m = &status.configuration.motors()[i];
                    if m.ejection_delay.is_finite() {
                        let stage = event.stage.unwrap_or_else(|| status.configuration.motor_stage(m));
                        let ejection = FlightEvent::new(status.time + m.ejection_delay, FlightEventType::EjectionCharge)
                            .with_source(m.mount, stage)
                            .with_data(EventData::Motor(i));
                        self.add_event(status, ejection)?;
                    }
                    log(status, &event);
                }

                FlightEventType::EjectionCharge => {
                    if let Some(i) = event.motor_index() {
                        status.motor_states[i].ejection_fired = true;
                    }
                    log(status, &event);
                }

                FlightEventType::StageSeparation => {
                    let Some(stage) = event.stage else { continue };
                    if stage == 0 || !status.configuration.is_stage_active(stage - 1) {
                        continue;
                    }
                    self.separate(status, &event, stage);
                }

                FlightEventType::Apogee => {
                    status.apogee_reached = true;
                    if status.deployed.is_empty() {
                        status.branch.set_optimum_altitude(status.max_altitude, status.max_altitude_time);
                    }
                    log(status, &event);
                }

                FlightEventType::RecoveryDeviceDeployment => {
                    let Some(device) = event.source else { continue };
                    if status.deployed.contains(&device)
                        || !self.listeners.recovery_device_deployment(status, device)?
                    {
                        continue;
                    }
                    if status.is_motor_burning() {
                        return Err(SimulationError::Aborted {
                            time: event.time,
                            reason: AbortReason::DeployUnderThrust,
                        });
                    }
                    if !status.launch_rod_cleared {
                        status.warnings.add(Warning::RecoveryLaunchRod);
                    }
                    let speed = status.state.velocity.norm();
                    if speed > HIGH_SPEED_DEPLOYMENT {
                        status.warnings.add(Warning::HighSpeedDeployment(speed));
                    }
                    if !status.apogee_reached && status.deployed.is_empty() {
                        if let Some((time, altitude)) = coast_to_apogee(&conditions, self.cancel) {
                            status.branch.set_optimum_altitude(altitude, time);
                        }
                    }
                    status.liftoff = true;
                    status.deployed.push(device);
                    if !status.landed {
                        *stepper = Stepper::Descent(DescentStepper::landing());
                    }
                    log(status, &event);
                }

                FlightEventType::GroundHit => {
                    // impact state, before the ground stepper stops the rocket
                    status.store_data();
                    status.landed = true;
                    *stepper = Stepper::Ground;
                    log(status, &event);
                }

                FlightEventType::Tumble => {
                    if status.tumbling || status.landed || !status.deployed.is_empty() {
                        continue;
                    }
                    if status.branch.last(FlightDataType::Thrust) > TUMBLE_THRUST {
                        return Err(SimulationError::Aborted {
                            time: event.time,
                            reason: AbortReason::TumbleUnderThrust,
                        });
                    }
                    status.tumbling = true;
                    *stepper = Stepper::Descent(DescentStepper::tumble(status));
                    log(status, &event);
                }

                FlightEventType::SimulationEnd => {
                    proceed = false;
                    log(status, &event);
                }

                FlightEventType::Altitude => {}
            }
        }

        if status.time > conditions.max_time {
            debug!(time = status.time, "maximum simulation time reached");
            status.branch.add_event(FlightEvent::new(status.time, FlightEventType::SimulationEnd));
            return Ok(false);
        }
        if !status.motor_ignited {
            return Err(SimulationError::Aborted { time: status.time, reason: AbortReason::NoMotorsFired });
        }
        Ok(proceed)
    }

    /// Split off the stages from `stage` down into their own branch.
    fn separate(&mut self, status: &mut SimulationStatus, event: &FlightEvent, stage: usize) {
        if status.configuration.active_stages().filter(|&s| s >= stage).count() != 1 {
            status.warnings.add(Warning::SeparationOrder);
        }
        if !status.launch_rod_cleared {
            status.warnings.add(Warning::EarlySeparation);
        }
        log(status, event);

        let rocket = status.configuration.rocket().clone();
        let name = &rocket.component(rocket.stages()[stage]).name;
        let mut booster = status.fork(name.as_str());
        booster.configuration.keep_stages_from(stage);
        booster.branch.add_event(event.clone());
        status.configuration.drop_stages_from(stage);

        info!(branch = %name, time = event.time, altitude = status.state.position.z, "stage separated");
        self.pending.push(booster);
    }
}

fn log(status: &mut SimulationStatus, event: &FlightEvent) {
    debug!(branch = status.branch.name(), %event, "flight event");
    status.branch.add_event(event.clone());
}

/// Next due event. Before any motor has ignited the clock jumps straight to
/// the next scheduled event.
fn next_event(status: &mut SimulationStatus) -> Option<FlightEvent> {
    let next = status.events.next_time()?;
    if next > status.time && !status.motor_ignited {
        status.time = next;
    }
    status.events.pop_due(status.time)
}

fn max_step(status: &SimulationStatus) -> f64 {
    let next = status.events.next_time();
    if status.landed {
        next.map_or(0.0, |t| (t - status.time).max(0.0))
    } else {
        next.map_or(f64::INFINITY, |t| (t - status.time).max(MIN_TIME_STEP))
    }
}

// -- event triggers --

fn ignition_triggers(status: &SimulationStatus, event: &FlightEvent) -> Vec<FlightEvent> {
    let config = &status.configuration;
    let stage_count = config.stage_count();
    config
        .active_motors()
        .filter(|(i, _)| !status.motor_states[*i].is_ignited())
        .filter_map(|(i, m)| {
            let stage = config.motor_stage(m);
            m.ignition.is_triggered_by(event, stage, stage_count).then(|| {
                FlightEvent::new(status.time + m.ignition_delay, FlightEventType::Ignition)
                    .with_source(m.mount, stage)
                    .with_data(EventData::Motor(i))
            })
        })
        .collect()
}

fn separation_triggers(status: &SimulationStatus, event: &FlightEvent) -> Vec<FlightEvent> {
    let config = &status.configuration;
    let rocket = config.rocket();
    config
        .active_stages()
        .filter(|&s| s > 0)
        .filter_map(|s| {
            let id = rocket.stages()[s];
            let ComponentKind::Stage(data) = &rocket.component(id).kind else {
                return None;
            };
            data.separation.is_triggered_by(event, s).then(|| {
                FlightEvent::new(status.time + data.separation.delay, FlightEventType::StageSeparation)
                    .with_source(id, s)
            })
        })
        .collect()
}

fn deployment_triggers(status: &SimulationStatus, event: &FlightEvent) -> Vec<FlightEvent> {
    status
        .configuration
        .active_components()
        .filter(|(id, _)| !status.deployed.contains(id))
        .filter_map(|(id, c)| {
            let dc = c.deployment_config()?;
            let stage = c.stage_number();
            dc.is_triggered_by(event, stage, status.apogee_reached).then(|| {
                FlightEvent::new(
                    dc.trigger_time(event) + dc.delay.max(MIN_TIME_STEP),
                    FlightEventType::RecoveryDeviceDeployment,
                )
                .with_source(id, stage)
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Optimum coast
// ---------------------------------------------------------------------------

/// Keeps every recovery device packed and ends the flight at apogee.
struct CoastToApogee;

impl SimulationListener for CoastToApogee {
    fn name(&self) -> &str {
        "coast-to-apogee"
    }

    fn handle_flight_event(&mut self, status: &mut SimulationStatus, event: &FlightEvent) -> ListenerResult<bool> {
        if event.kind == FlightEventType::Apogee {
            status.events.add(FlightEvent::new(event.time, FlightEventType::SimulationEnd));
        }
        Ok(true)
    }

    fn recovery_device_deployment(&mut self, _status: &mut SimulationStatus, _device: ComponentId) -> ListenerResult<bool> {
        Ok(false)
    }
}

/// Apogee time and altitude the rocket would reach with no recovery device
/// deployed. Used when a device opens before apogee.
fn coast_to_apogee(conditions: &Arc<SimulationConditions>, cancel: &CancelToken) -> Option<(f64, f64)> {
    if cancel.is_cancelled() {
        return None;
    }
    debug!("computing coast to apogee");
    let mut listeners = ListenerChain::new().with(CoastToApogee);
    let result = simulate_with(conditions.clone(), &mut listeners, cancel);
    let branch = result.main_branch()?;
    let apogee = branch.first_event(FlightEventType::Apogee)?;
    Some((apogee.time, branch.max_altitude()))
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::aero::{AerodynamicForces, FlightConditions};
    use crate::physics::{GeodeticComputation, GravityModel};
    use crate::sim::listener::MassKind;
    use crate::sim::options::SimulationOptions;
    use crate::vehicle::{presets, RigidBody};
    use approx::assert_abs_diff_eq;

    fn calm() -> SimulationOptions {
        SimulationOptions { wind_average: 0.0, wind_turbulence: 0.0, ..Default::default() }
    }

    /// Point mass thrown straight up: no aerodynamics, no thrust, no chute.
    struct Ballistic;

    impl SimulationListener for Ballistic {
        fn start_simulation(&mut self, status: &mut SimulationStatus) -> ListenerResult<()> {
            status.state.velocity = Vector3::new(0.0, 0.0, 50.0);
            status.liftoff = true;
            status.launch_rod_cleared = true;
            Ok(())
        }

        fn pre_aerodynamic_forces(
            &mut self,
            _status: &SimulationStatus,
            _conditions: &FlightConditions,
        ) -> ListenerResult<Option<AerodynamicForces>> {
            Ok(Some(AerodynamicForces::zero()))
        }

        fn pre_mass(&mut self, _status: &SimulationStatus, kind: MassKind) -> ListenerResult<Option<RigidBody>> {
            Ok(Some(match kind {
                MassKind::Structure => RigidBody::new(2.0, 0.0, 0.01, 0.01),
                MassKind::Motors => RigidBody::EMPTY,
            }))
        }

        fn pre_thrust(&mut self, _status: &SimulationStatus) -> ListenerResult<Option<f64>> {
            Ok(Some(0.0))
        }

        fn recovery_device_deployment(&mut self, _: &mut SimulationStatus, _: ComponentId) -> ListenerResult<bool> {
            Ok(false)
        }
    }

    #[test]
    fn ballistic_flight_matches_closed_form() {
        let opts = SimulationOptions {
            gravity: GravityModel::Constant(9.81),
            geodetic: GeodeticComputation::Flat,
            ..calm()
        };
        let conditions = opts.to_conditions(presets::alpha().unwrap()).unwrap();
        let mut listeners = ListenerChain::new().with(Ballistic);
        let result = simulate_with(conditions, &mut listeners, &CancelToken::new());
        assert!(result.outcome.is_success(), "{:?}", result.outcome);

        let b = result.main_branch().unwrap();
        let apogee = 50.0 * 50.0 / (2.0 * 9.81);
        assert_abs_diff_eq!(b.max_altitude(), apogee, epsilon = 0.05);
        assert_abs_diff_eq!(b.time_to_apogee(), 50.0 / 9.81, epsilon = 0.01);
        let hit = b.first_event(FlightEventType::GroundHit).unwrap();
        assert_abs_diff_eq!(hit.time, 100.0 / 9.81, epsilon = 0.01);
        assert!(result.warnings.contains(|w| *w == Warning::ListenersAffected));
    }

    #[test]
    fn alpha_flies_and_lands_under_its_chute() {
        let result = simulate(calm().to_conditions(presets::alpha().unwrap()).unwrap());
        assert!(result.outcome.is_success(), "{:?}", result.outcome);
        assert_eq!(result.branches.len(), 1);

        let b = result.main_branch().unwrap();
        // Reference flight in still air; tolerances cover step-size jitter.
        assert_abs_diff_eq!(b.max_altitude(), 274.78, epsilon = 1.0);
        assert_abs_diff_eq!(b.time_to_apogee(), 6.364, epsilon = 0.05);
        assert_abs_diff_eq!(b.summary().max_velocity, 104.84, epsilon = 0.3);

        let events = b.events();
        assert_eq!(events.first().map(|e| e.kind), Some(FlightEventType::Launch));
        assert_eq!(events.last().map(|e| e.kind), Some(FlightEventType::SimulationEnd));
        assert!(events.windows(2).all(|w| w[0].time <= w[1].time));
        let at = |k| b.first_event(k).unwrap().time;
        assert!(at(FlightEventType::Liftoff) < at(FlightEventType::LaunchRod));
        assert!(at(FlightEventType::LaunchRod) < at(FlightEventType::Burnout));
        assert!(at(FlightEventType::RecoveryDeviceDeployment) < at(FlightEventType::GroundHit));
        assert!(b.ground_hit_velocity() < 15.0);
    }

    #[test]
    fn same_seed_same_flight() {
        let opts = SimulationOptions { seed: 7, ..Default::default() };
        let a = simulate(opts.to_conditions(presets::alpha().unwrap()).unwrap());
        let b = simulate(opts.to_conditions(presets::alpha().unwrap()).unwrap());
        let (a, b) = (a.main_branch().unwrap(), b.main_branch().unwrap());
        assert_eq!(a.len(), b.len());
        assert_eq!(a.max_altitude(), b.max_altitude());
        assert_eq!(a.flight_time(), b.flight_time());
    }

    #[test]
    fn two_stage_flight_produces_a_booster_branch() {
        let result = simulate(calm().to_conditions(presets::two_stage().unwrap()).unwrap());
        assert_eq!(result.branches.len(), 2, "{:?}", result.outcome);
        assert_eq!(result.branches[0].name(), "Sustainer");
        assert_eq!(result.branches[1].name(), "Booster");

        let booster = &result.branches[1];
        assert_eq!(booster.events().first().map(|e| e.kind), Some(FlightEventType::StageSeparation));
        let sep = result.branches[0].first_event(FlightEventType::StageSeparation).unwrap();
        assert_abs_diff_eq!(sep.time, booster.events()[0].time, epsilon = 1e-12);
        assert!(result.branches[0].max_altitude() > booster.max_altitude());

        let sustainer = &result.branches[0];
        assert_abs_diff_eq!(sustainer.max_altitude(), 428.94, epsilon = 1.5);
        assert_abs_diff_eq!(sustainer.time_to_apogee(), 8.324, epsilon = 0.05);

        let sequence: Vec<_> = booster
            .events()
            .iter()
            .map(|e| e.kind)
            .filter(|k| k.is_logged() && *k != FlightEventType::SimulationEnd)
            .collect();
        assert_eq!(
            sequence,
            [
                FlightEventType::StageSeparation,
                FlightEventType::Apogee,
                FlightEventType::Tumble,
                FlightEventType::GroundHit,
            ]
        );
    }

    struct CancelAfter(f64, CancelToken);

    impl SimulationListener for CancelAfter {
        fn post_step(&mut self, status: &mut SimulationStatus) -> ListenerResult<()> {
            if status.time > self.0 {
                self.1.cancel();
            }
            Ok(())
        }
    }

    #[test]
    fn cancellation_keeps_data_up_to_the_request() {
        let token = CancelToken::new();
        let mut listeners = ListenerChain::new().with(CancelAfter(1.0, token.clone()));
        let result = simulate_with(calm().to_conditions(presets::alpha().unwrap()).unwrap(), &mut listeners, &token);
        assert!(matches!(result.outcome, SimulationOutcome::Cancelled));
        let b = result.main_branch().unwrap();
        assert!(!b.is_empty());
        assert!(b.last(FlightDataType::Time) < 1.1);
    }

    /// Counts `end_simulation` calls.
    struct EndCounter(Arc<AtomicUsize>);

    impl SimulationListener for EndCounter {
        fn end_simulation(&mut self, _status: &mut SimulationStatus, _error: Option<&SimulationError>) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn cancelled_branch_still_ends_listeners() {
        let token = CancelToken::new();
        let ended = Arc::new(AtomicUsize::new(0));
        let mut listeners = ListenerChain::new()
            .with(CancelAfter(1.0, token.clone()))
            .with(EndCounter(ended.clone()));
        let result = simulate_with(calm().to_conditions(presets::alpha().unwrap()).unwrap(), &mut listeners, &token);
        assert!(matches!(result.outcome, SimulationOutcome::Cancelled));
        assert_eq!(ended.load(Ordering::SeqCst), 1);
    }

    /// Cancels the run as soon as a recovery device opens.
    struct CancelOnDeploy(CancelToken);

    impl SimulationListener for CancelOnDeploy {
        fn recovery_device_deployment(&mut self, _: &mut SimulationStatus, _: ComponentId) -> ListenerResult<bool> {
            self.0.cancel();
            Ok(true)
        }
    }

    fn early_ejection() -> Arc<SimulationConditions> {
        let mut opts = calm();
        opts.motors.push(crate::sim::options::MotorOverride { ejection_delay: Some(0.5), ..Default::default() });
        opts.to_conditions(presets::alpha().unwrap()).unwrap()
    }

    #[test]
    fn early_deployment_records_coast_apogee() {
        let result = simulate(early_ejection());
        let b = result.main_branch().unwrap();
        let optimum = b.summary().optimum_altitude;
        assert!(optimum > b.max_altitude(), "optimum {} apogee {}", optimum, b.max_altitude());
    }

    #[test]
    fn coast_computation_honours_cancellation() {
        let token = CancelToken::new();
        let mut listeners = ListenerChain::new().with(CancelOnDeploy(token.clone()));
        let result = simulate_with(early_ejection(), &mut listeners, &token);
        assert!(matches!(result.outcome, SimulationOutcome::Cancelled));
        let b = result.main_branch().unwrap();
        assert!(b.summary().optimum_altitude.is_nan());
        assert!(b.first_event(FlightEventType::RecoveryDeviceDeployment).is_some());
    }

    struct FailAt(f64);

    impl SimulationListener for FailAt {
        fn name(&self) -> &str {
            "fail-at"
        }

        fn post_step(&mut self, status: &mut SimulationStatus) -> ListenerResult<()> {
            if status.time > self.0 {
                return Err(SimulationError::Listener { listener: "fail-at".into(), reason: "boom".into() });
            }
            Ok(())
        }
    }

    #[test]
    fn listener_failure_keeps_partial_data() {
        let mut listeners = ListenerChain::new().with(FailAt(0.5));
        let result = simulate_with(calm().to_conditions(presets::alpha().unwrap()).unwrap(), &mut listeners, &CancelToken::new());
        assert!(matches!(result.outcome.error(), Some(SimulationError::Listener { .. })));
        let b = result.main_branch().unwrap();
        assert!(!b.is_empty());
        assert_eq!(b.events().last().map(|e| e.kind), Some(FlightEventType::Exception));
    }

    #[test]
    fn unlit_motor_aborts() {
        let mut opts = calm();
        opts.motors.push(crate::sim::options::MotorOverride {
            ignition: Some(crate::vehicle::IgnitionEvent::Never),
            ..Default::default()
        });
        let result = simulate(opts.to_conditions(presets::alpha().unwrap()).unwrap());
        assert_eq!(
            result.outcome.error().and_then(|e| e.abort_reason()),
            Some(AbortReason::NoMotorsFired)
        );
    }
}
