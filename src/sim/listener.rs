use nalgebra::Vector3;

use crate::aero::{AerodynamicForces, FlightConditions};
use crate::error::SimulationError;
use crate::physics::AtmosphericConditions;
use crate::sim::event::FlightEvent;
use crate::sim::status::SimulationStatus;
use crate::vehicle::{ComponentId, RigidBody};
use crate::warning::Warning;

pub type ListenerResult<T> = Result<T, SimulationError>;

/// Linear and angular acceleration in the launch frame.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AccelerationData {
    pub linear: Vector3<f64>,  // m/s^2
    pub angular: Vector3<f64>, // rad/s^2
}

/// Which half of the mass model a mass hook is asked about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MassKind {
    Structure,
    Motors,
}

// ---------------------------------------------------------------------------
// Listener trait
// ---------------------------------------------------------------------------

/// Hooks into a running simulation. Every method has a no-op default, so a
/// listener implements only what it needs.
///
/// `pre_*` hooks return `Some` to replace the default calculation;
/// `post_*` hooks receive the computed value and return the value to use.
/// Boolean hooks return `false` to skip the default handling.
pub trait SimulationListener: Send {
    fn name(&self) -> &str {
        "listener"
    }

    fn start_simulation(&mut self, _status: &mut SimulationStatus) -> ListenerResult<()> {
        Ok(())
    }

    /// Called once per branch, also when the branch failed.
    fn end_simulation(&mut self, _status: &mut SimulationStatus, _error: Option<&SimulationError>) {}

    /// `false` skips the integration step; the listener is then responsible for advancing time.
    fn pre_step(&mut self, _status: &mut SimulationStatus) -> ListenerResult<bool> {
        Ok(true)
    }

    fn post_step(&mut self, _status: &mut SimulationStatus) -> ListenerResult<()> {
        Ok(())
    }

    /// `false` drops the event before it is queued.
    fn add_flight_event(&mut self, _status: &mut SimulationStatus, _event: &FlightEvent) -> ListenerResult<bool> {
        Ok(true)
    }

    /// `false` ignores the event.
    fn handle_flight_event(&mut self, _status: &mut SimulationStatus, _event: &FlightEvent) -> ListenerResult<bool> {
        Ok(true)
    }

    fn motor_ignition(&mut self, _status: &mut SimulationStatus, _motor: usize) -> ListenerResult<bool> {
        Ok(true)
    }

    fn recovery_device_deployment(
        &mut self,
        _status: &mut SimulationStatus,
        _device: ComponentId,
    ) -> ListenerResult<bool> {
        Ok(true)
    }

    fn pre_acceleration(&mut self, _status: &SimulationStatus) -> ListenerResult<Option<AccelerationData>> {
        Ok(None)
    }

    fn post_acceleration(
        &mut self,
        _status: &SimulationStatus,
        acceleration: AccelerationData,
    ) -> ListenerResult<AccelerationData> {
        Ok(acceleration)
    }

    fn pre_aerodynamic_forces(
        &mut self,
        _status: &SimulationStatus,
        _conditions: &FlightConditions,
    ) -> ListenerResult<Option<AerodynamicForces>> {
        Ok(None)
    }

    fn post_aerodynamic_forces(
        &mut self,
        _status: &SimulationStatus,
        forces: AerodynamicForces,
    ) -> ListenerResult<AerodynamicForces> {
        Ok(forces)
    }

    fn pre_atmosphere(&mut self, _status: &SimulationStatus) -> ListenerResult<Option<AtmosphericConditions>> {
        Ok(None)
    }

    fn post_atmosphere(
        &mut self,
        _status: &SimulationStatus,
        atmosphere: AtmosphericConditions,
    ) -> ListenerResult<AtmosphericConditions> {
        Ok(atmosphere)
    }

    fn pre_flight_conditions(&mut self, _status: &SimulationStatus) -> ListenerResult<Option<FlightConditions>> {
        Ok(None)
    }

    fn post_flight_conditions(
        &mut self,
        _status: &SimulationStatus,
        conditions: FlightConditions,
    ) -> ListenerResult<FlightConditions> {
        Ok(conditions)
    }

    fn pre_gravity(&mut self, _status: &SimulationStatus) -> ListenerResult<Option<f64>> {
        Ok(None)
    }

    fn post_gravity(&mut self, _status: &SimulationStatus, gravity: f64) -> ListenerResult<f64> {
        Ok(gravity)
    }

    fn pre_mass(&mut self, _status: &SimulationStatus, _kind: MassKind) -> ListenerResult<Option<RigidBody>> {
        Ok(None)
    }

    fn post_mass(&mut self, _status: &SimulationStatus, _kind: MassKind, mass: RigidBody) -> ListenerResult<RigidBody> {
        Ok(mass)
    }

    fn pre_thrust(&mut self, _status: &SimulationStatus) -> ListenerResult<Option<f64>> {
        Ok(None)
    }

    fn post_thrust(&mut self, _status: &SimulationStatus, thrust: f64) -> ListenerResult<f64> {
        Ok(thrust)
    }

    fn pre_wind(&mut self, _status: &SimulationStatus) -> ListenerResult<Option<Vector3<f64>>> {
        Ok(None)
    }

    fn post_wind(&mut self, _status: &SimulationStatus, wind: Vector3<f64>) -> ListenerResult<Vector3<f64>> {
        Ok(wind)
    }
}

// ---------------------------------------------------------------------------
// Listener chain
// ---------------------------------------------------------------------------

type Listener = Box<dyn SimulationListener>;

/// Listeners of one run, called in registration order.
///
/// The first `pre_*` override wins and later listeners are not asked.
/// `post_*` hooks chain, each seeing the previous listener's result.
/// Boolean hooks stop at the first `false`. Any change a listener makes
/// records [`Warning::ListenersAffected`].
#[derive(Default)]
pub struct ListenerChain {
    listeners: Vec<Listener>,
}

impl std::fmt::Debug for ListenerChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.listeners.iter().map(|l| l.name())).finish()
    }
}

impl ListenerChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, listener: impl SimulationListener + 'static) {
        self.listeners.push(Box::new(listener));
    }

    pub fn with(mut self, listener: impl SimulationListener + 'static) -> Self {
        self.push(listener);
        self
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    fn first_override<T>(
        &mut self,
        status: &mut SimulationStatus,
        mut hook: impl FnMut(&mut Listener, &SimulationStatus) -> ListenerResult<Option<T>>,
    ) -> ListenerResult<Option<T>> {
        for l in self.listeners.iter_mut() {
            if let Some(v) = hook(l, &*status)? {
                status.warnings.add(Warning::ListenersAffected);
                return Ok(Some(v));
            }
        }
        Ok(None)
    }

    fn chain<T: Clone + PartialEq>(
        &mut self,
        status: &mut SimulationStatus,
        value: T,
        mut hook: impl FnMut(&mut Listener, &SimulationStatus, T) -> ListenerResult<T>,
    ) -> ListenerResult<T> {
        let mut v = value.clone();
        for l in self.listeners.iter_mut() {
            v = hook(l, &*status, v)?;
        }
        if v != value {
            status.warnings.add(Warning::ListenersAffected);
        }
        Ok(v)
    }

    fn all(
        &mut self,
        status: &mut SimulationStatus,
        mut hook: impl FnMut(&mut Listener, &mut SimulationStatus) -> ListenerResult<bool>,
    ) -> ListenerResult<bool> {
        for l in self.listeners.iter_mut() {
            if !hook(l, &mut *status)? {
                status.warnings.add(Warning::ListenersAffected);
                return Ok(false);
            }
        }
        Ok(true)
    }

    // -- lifecycle --

    pub fn start_simulation(&mut self, status: &mut SimulationStatus) -> ListenerResult<()> {
        for l in self.listeners.iter_mut() {
            l.start_simulation(status)?;
        }
        Ok(())
    }

    pub fn end_simulation(&mut self, status: &mut SimulationStatus, error: Option<&SimulationError>) {
        for l in self.listeners.iter_mut() {
            l.end_simulation(status, error);
        }
    }

    pub fn pre_step(&mut self, status: &mut SimulationStatus) -> ListenerResult<bool> {
        self.all(status, |l, s| l.pre_step(s))
    }

    pub fn post_step(&mut self, status: &mut SimulationStatus) -> ListenerResult<()> {
        for l in self.listeners.iter_mut() {
            l.post_step(status)?;
        }
        Ok(())
    }

    // -- events --

    pub fn add_flight_event(&mut self, status: &mut SimulationStatus, event: &FlightEvent) -> ListenerResult<bool> {
        self.all(status, |l, s| l.add_flight_event(s, event))
    }

    pub fn handle_flight_event(&mut self, status: &mut SimulationStatus, event: &FlightEvent) -> ListenerResult<bool> {
        self.all(status, |l, s| l.handle_flight_event(s, event))
    }

    pub fn motor_ignition(&mut self, status: &mut SimulationStatus, motor: usize) -> ListenerResult<bool> {
        self.all(status, |l, s| l.motor_ignition(s, motor))
    }

    pub fn recovery_device_deployment(
        &mut self,
        status: &mut SimulationStatus,
        device: ComponentId,
    ) -> ListenerResult<bool> {
        self.all(status, |l, s| l.recovery_device_deployment(s, device))
    }

    // -- computations --

    pub fn pre_acceleration(&mut self, status: &mut SimulationStatus) -> ListenerResult<Option<AccelerationData>> {
        self.first_override(status, |l, s| l.pre_acceleration(s))
    }

    pub fn post_acceleration(
        &mut self,
        status: &mut SimulationStatus,
        value: AccelerationData,
    ) -> ListenerResult<AccelerationData> {
        self.chain(status, value, |l, s, v| l.post_acceleration(s, v))
    }

    pub fn pre_aerodynamic_forces(
        &mut self,
        status: &mut SimulationStatus,
        conditions: &FlightConditions,
    ) -> ListenerResult<Option<AerodynamicForces>> {
        self.first_override(status, |l, s| l.pre_aerodynamic_forces(s, conditions))
    }

    pub fn post_aerodynamic_forces(
        &mut self,
        status: &mut SimulationStatus,
        value: AerodynamicForces,
    ) -> ListenerResult<AerodynamicForces> {
        self.chain(status, value, |l, s, v| l.post_aerodynamic_forces(s, v))
    }

    pub fn pre_atmosphere(&mut self, status: &mut SimulationStatus) -> ListenerResult<Option<AtmosphericConditions>> {
        self.first_override(status, |l, s| l.pre_atmosphere(s))
    }

    pub fn post_atmosphere(
        &mut self,
        status: &mut SimulationStatus,
        value: AtmosphericConditions,
    ) -> ListenerResult<AtmosphericConditions> {
        self.chain(status, value, |l, s, v| l.post_atmosphere(s, v))
    }

    pub fn pre_flight_conditions(&mut self, status: &mut SimulationStatus) -> ListenerResult<Option<FlightConditions>> {
        self.first_override(status, |l, s| l.pre_flight_conditions(s))
    }

    pub fn post_flight_conditions(
        &mut self,
        status: &mut SimulationStatus,
        value: FlightConditions,
    ) -> ListenerResult<FlightConditions> {
        self.chain(status, value, |l, s, v| l.post_flight_conditions(s, v))
    }

    pub fn pre_gravity(&mut self, status: &mut SimulationStatus) -> ListenerResult<Option<f64>> {
        self.first_override(status, |l, s| l.pre_gravity(s))
    }

    pub fn post_gravity(&mut self, status: &mut SimulationStatus, value: f64) -> ListenerResult<f64> {
        self.chain(status, value, |l, s, v| l.post_gravity(s, v))
    }

    pub fn pre_mass(&mut self, status: &mut SimulationStatus, kind: MassKind) -> ListenerResult<Option<RigidBody>> {
        self.first_override(status, |l, s| l.pre_mass(s, kind))
    }

    pub fn post_mass(
        &mut self,
        status: &mut SimulationStatus,
        kind: MassKind,
        value: RigidBody,
    ) -> ListenerResult<RigidBody> {
        self.chain(status, value, |l, s, v| l.post_mass(s, kind, v))
    }

    pub fn pre_thrust(&mut self, status: &mut SimulationStatus) -> ListenerResult<Option<f64>> {
        self.first_override(status, |l, s| l.pre_thrust(s))
    }

    pub fn post_thrust(&mut self, status: &mut SimulationStatus, value: f64) -> ListenerResult<f64> {
        self.chain(status, value, |l, s, v| l.post_thrust(s, v))
    }

    pub fn pre_wind(&mut self, status: &mut SimulationStatus) -> ListenerResult<Option<Vector3<f64>>> {
        self.first_override(status, |l, s| l.pre_wind(s))
    }

    pub fn post_wind(&mut self, status: &mut SimulationStatus, value: Vector3<f64>) -> ListenerResult<Vector3<f64>> {
        self.chain(status, value, |l, s, v| l.post_wind(s, v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::options::SimulationOptions;
    use crate::vehicle::presets;

    fn status() -> SimulationStatus {
        let c = SimulationOptions::default().to_conditions(presets::alpha().unwrap()).unwrap();
        SimulationStatus::new(c)
    }

    struct FixedThrust(f64);

    impl SimulationListener for FixedThrust {
        fn pre_thrust(&mut self, _status: &SimulationStatus) -> ListenerResult<Option<f64>> {
            Ok(Some(self.0))
        }
    }

    struct ScaleThrust(f64);

    impl SimulationListener for ScaleThrust {
        fn post_thrust(&mut self, _status: &SimulationStatus, thrust: f64) -> ListenerResult<f64> {
            Ok(thrust * self.0)
        }
    }

    struct Veto;

    impl SimulationListener for Veto {
        fn handle_flight_event(&mut self, _status: &mut SimulationStatus, _event: &FlightEvent) -> ListenerResult<bool> {
            Ok(false)
        }
    }

    struct Counter(std::sync::Arc<std::sync::atomic::AtomicUsize>);

    impl SimulationListener for Counter {
        fn handle_flight_event(&mut self, _status: &mut SimulationStatus, _event: &FlightEvent) -> ListenerResult<bool> {
            self.0.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok(true)
        }
    }

    #[test]
    fn first_override_wins() {
        let mut chain = ListenerChain::new().with(FixedThrust(5.0)).with(FixedThrust(9.0));
        let mut s = status();
        assert_eq!(chain.pre_thrust(&mut s).unwrap(), Some(5.0));
        assert!(s.warnings.contains(|w| *w == Warning::ListenersAffected));
    }

    #[test]
    fn empty_chain_changes_nothing() {
        let mut chain = ListenerChain::new();
        let mut s = status();
        assert_eq!(chain.pre_thrust(&mut s).unwrap(), None);
        assert_eq!(chain.post_gravity(&mut s, 9.81).unwrap(), 9.81);
        assert!(chain.pre_step(&mut s).unwrap());
        assert!(s.warnings.is_empty());
    }

    #[test]
    fn post_hooks_compose() {
        let mut chain = ListenerChain::new().with(ScaleThrust(2.0)).with(ScaleThrust(3.0));
        let mut s = status();
        assert_eq!(chain.post_thrust(&mut s, 1.5).unwrap(), 9.0);
        assert!(s.warnings.contains(|w| *w == Warning::ListenersAffected));
    }

    #[test]
    fn false_stops_later_listeners() {
        let count = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let mut chain = ListenerChain::new().with(Veto).with(Counter(count.clone()));
        let mut s = status();
        let e = FlightEvent::new(0.0, crate::sim::event::FlightEventType::Launch);
        assert!(!chain.handle_flight_event(&mut s, &e).unwrap());
        assert_eq!(count.load(std::sync::atomic::Ordering::SeqCst), 0);
        assert_eq!(format!("{:?}", chain), r#"["listener", "listener"]"#);
    }
}
