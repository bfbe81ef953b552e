use std::sync::Arc;

use nalgebra::Vector3;

use crate::dynamics::{launch_orientation, RigidState};
use crate::physics::{WindModel, WorldCoordinate};
use crate::sim::data::{FlightDataBranch, FlightDataType};
use crate::sim::event::EventQueue;
use crate::sim::options::SimulationConditions;
use crate::vehicle::{ComponentId, FlightConfiguration, MotorState};
use crate::warning::WarningSet;

// ---------------------------------------------------------------------------
// Per-branch simulation status
// ---------------------------------------------------------------------------

/// Everything that changes while one branch is being simulated. Owned by
/// exactly one run; stage separation clones it into a new branch.
#[derive(Debug, Clone)]
pub struct SimulationStatus {
    conditions: Arc<SimulationConditions>,

    pub time: f64, // s
    pub state: RigidState,
    /// Active stages and motors of this branch.
    pub configuration: FlightConfiguration,
    /// Indexed like `configuration.motors()`.
    pub motor_states: Vec<MotorState>,
    pub events: EventQueue,
    pub branch: FlightDataBranch,
    pub warnings: WarningSet,
    pub wind: WindModel,

    pub liftoff: bool,
    pub launch_rod_cleared: bool,
    pub apogee_reached: bool,
    pub landed: bool,
    pub tumbling: bool,
    pub motor_ignited: bool,
    pub deployed: Vec<ComponentId>,

    pub max_altitude: f64,      // m above the launch site
    pub max_altitude_time: f64, // s

    /// Last step taken by the flight stepper, for the 1.5x growth limit.
    pub previous_time_step: Option<f64>,
}

impl SimulationStatus {
    /// Status at t = 0, on the pad and pointing along the launch rod.
    pub fn new(conditions: Arc<SimulationConditions>) -> Self {
        let configuration = conditions.configuration.clone();
        let name = configuration
            .active_stages()
            .next()
            .map(|s| configuration.rocket().component(configuration.rocket().stages()[s]).name.clone())
            .unwrap_or_else(|| configuration.rocket().name().to_string());
        let orientation = launch_orientation(conditions.launch_rod_angle, conditions.launch_rod_direction);
        Self {
            time: 0.0,
            state: RigidState::at_rest(orientation),
            motor_states: vec![MotorState::default(); configuration.motors().len()],
            configuration,
            events: EventQueue::new(),
            branch: FlightDataBranch::new(name),
            warnings: WarningSet::new(),
            wind: conditions.wind_model(),
            liftoff: false,
            launch_rod_cleared: false,
            apogee_reached: false,
            landed: false,
            tumbling: false,
            motor_ignited: false,
            deployed: Vec::new(),
            max_altitude: 0.0,
            max_altitude_time: 0.0,
            previous_time_step: None,
            conditions,
        }
    }

    pub fn conditions(&self) -> &Arc<SimulationConditions> {
        &self.conditions
    }

    /// Copy for a separated stage: same physical state, fresh data branch.
    pub fn fork(&self, name: impl Into<String>) -> Self {
        Self { branch: FlightDataBranch::new(name), warnings: WarningSet::new(), ..self.clone() }
    }

    /// Position on the globe.
    pub fn world_position(&self) -> WorldCoordinate {
        self.conditions.geodetic.add_coordinate(&self.conditions.launch_site, &self.state.position)
    }

    /// Altitude above sea level, m.
    pub fn altitude_msl(&self) -> f64 {
        self.conditions.launch_site.altitude + self.state.position.z
    }

    pub fn is_motor_burning(&self) -> bool {
        self.configuration.active_motors().any(|(i, _)| self.motor_states[i].is_burning())
    }

    /// Position on the launch rod, relative to the launch point.
    pub fn rod_distance(&self) -> f64 {
        self.state.position.norm()
    }

    /// Start a data point and record the kinematic channels of the current state.
    pub fn store_data(&mut self) {
        let p = self.state.position;
        let v = self.state.velocity;
        let world = self.world_position();
        let b = &mut self.branch;
        b.add_point();
        b.set_value(FlightDataType::Time, self.time);
        b.set_value(FlightDataType::Altitude, p.z);
        b.set_value(FlightDataType::PositionEast, p.x);
        b.set_value(FlightDataType::PositionNorth, p.y);
        b.set_value(FlightDataType::LateralDistance, p.x.hypot(p.y));
        b.set_value(FlightDataType::LateralDirection, p.x.atan2(p.y));
        b.set_value(FlightDataType::Latitude, world.latitude_deg());
        b.set_value(FlightDataType::Longitude, world.longitude_deg());
        b.set_value(FlightDataType::VelocityZ, v.z);
        b.set_value(FlightDataType::VelocityXy, v.x.hypot(v.y));
        b.set_value(FlightDataType::VelocityTotal, v.norm());
        b.set_value(FlightDataType::Zenith, self.state.zenith());
        b.set_value(FlightDataType::Azimuth, self.state.azimuth());
    }

    /// Record the acceleration channels of the last data point.
    pub fn store_acceleration(&mut self, acceleration: &Vector3<f64>) {
        let b = &mut self.branch;
        b.set_value(FlightDataType::AccelerationZ, acceleration.z);
        b.set_value(FlightDataType::AccelerationXy, acceleration.x.hypot(acceleration.y));
        b.set_value(FlightDataType::AccelerationTotal, acceleration.norm());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::options::SimulationOptions;
    use crate::vehicle::presets;
    use approx::assert_abs_diff_eq;

    fn status() -> SimulationStatus {
        let opts = SimulationOptions { launch_rod_angle: 5.0, ..Default::default() };
        SimulationStatus::new(opts.to_conditions(presets::two_stage().unwrap()).unwrap())
    }

    #[test]
    fn starts_on_the_rod() {
        let s = status();
        assert_eq!(s.branch.name(), "Sustainer");
        assert_eq!(s.motor_states.len(), 2);
        assert_abs_diff_eq!(s.state.zenith(), 5.0_f64.to_radians(), epsilon = 1e-12);
        assert!(!s.liftoff && !s.landed && s.deployed.is_empty());
    }

    #[test]
    fn fork_keeps_state_but_not_data() {
        let mut s = status();
        s.time = 2.0;
        s.state.position.z = 40.0;
        s.store_data();
        let f = s.fork("Booster");
        assert_eq!(f.branch.name(), "Booster");
        assert!(f.branch.is_empty());
        assert_eq!(f.state, s.state);
        assert_eq!(f.time, 2.0);
    }

    #[test]
    fn stored_point_reflects_state() {
        let mut s = status();
        s.time = 1.0;
        s.state.position = Vector3::new(3.0, 4.0, 100.0);
        s.state.velocity = Vector3::new(0.0, 0.0, -5.0);
        s.store_data();
        s.store_acceleration(&Vector3::new(0.0, 0.0, -9.8));
        assert_eq!(s.branch.last(FlightDataType::LateralDistance), 5.0);
        assert_eq!(s.branch.last(FlightDataType::VelocityTotal), 5.0);
        assert_eq!(s.branch.last(FlightDataType::AccelerationZ), -9.8);
        assert_abs_diff_eq!(s.altitude_msl(), 100.0, epsilon = 1e-12);
        assert!(s.world_position().latitude_deg() > 28.61);
    }
}
