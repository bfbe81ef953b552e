use std::sync::Arc;

use crate::error::ConfigError;
use crate::vehicle::component::{Component, ComponentId, ComponentKind};
use crate::vehicle::motor::{IgnitionEvent, ThrustCurveMotor};
use crate::vehicle::rocket::Rocket;

/// Minimum reference length when no active body has a diameter, m.
const MIN_REFERENCE_LENGTH: f64 = 0.01;

// ---------------------------------------------------------------------------
// Motor assignment
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct MotorConfig {
    pub mount: ComponentId,
    pub motor: Arc<ThrustCurveMotor>,
    pub ignition: IgnitionEvent,
    pub ignition_delay: f64, // s
    pub ejection_delay: f64, // s after burnout; infinite for plugged motors
}

impl MotorConfig {
    pub fn new(mount: ComponentId, motor: Arc<ThrustCurveMotor>) -> Self {
        let ejection_delay = motor.delays().first().copied().unwrap_or(f64::INFINITY);
        Self { mount, motor, ignition: IgnitionEvent::Automatic, ignition_delay: 0.0, ejection_delay }
    }

    pub fn ignition(mut self, v: IgnitionEvent) -> Self { self.ignition = v; self }
    pub fn ignition_delay(mut self, v: f64) -> Self { self.ignition_delay = v; self }
    pub fn ejection_delay(mut self, v: f64) -> Self { self.ejection_delay = v; self }
}

// ---------------------------------------------------------------------------
// Flight configuration
// ---------------------------------------------------------------------------

/// Active stage selection and motor assignment over a shared rocket.
#[derive(Debug, Clone)]
pub struct FlightConfiguration {
    rocket: Arc<Rocket>,
    active: Vec<bool>,
    motors: Vec<MotorConfig>,
}

impl FlightConfiguration {
    pub fn new(rocket: Arc<Rocket>) -> Self {
        let active = vec![true; rocket.stage_count()];
        Self { rocket, active, motors: Vec::new() }
    }

    pub fn rocket(&self) -> &Arc<Rocket> {
        &self.rocket
    }

    /// Assign a motor; the mount must be a body tube flagged as motor mount.
    pub fn add_motor(&mut self, config: MotorConfig) -> Result<(), ConfigError> {
        let mount = self
            .rocket
            .get(config.mount)
            .ok_or_else(|| ConfigError::geometry(config.motor.designation(), "unknown motor mount"))?;
        match &mount.kind {
            ComponentKind::BodyTube(b) if b.motor_mount => {}
            _ => return Err(ConfigError::geometry(&mount.name, "component is not a motor mount")),
        }
        if config.motor.diameter() > 2.0 * mount.fore_radius() + 1e-9 {
            return Err(ConfigError::Motor {
                motor: config.motor.designation().to_string(),
                reason: format!("does not fit mount '{}'", mount.name),
            });
        }
        if self.motors.iter().any(|m| m.mount == config.mount) {
            return Err(ConfigError::geometry(&mount.name, "mount already holds a motor"));
        }
        self.motors.push(config);
        Ok(())
    }

    pub fn with_motor(mut self, config: MotorConfig) -> Result<Self, ConfigError> {
        self.add_motor(config)?;
        Ok(self)
    }

    pub fn motors(&self) -> &[MotorConfig] {
        &self.motors
    }

    pub fn motor_mut(&mut self, index: usize) -> Option<&mut MotorConfig> {
        self.motors.get_mut(index)
    }

    pub fn has_motors(&self) -> bool {
        !self.motors.is_empty()
    }

    pub fn stage_count(&self) -> usize {
        self.active.len()
    }

    pub fn set_stage_active(&mut self, stage: usize, active: bool) {
        if let Some(a) = self.active.get_mut(stage) {
            *a = active;
        }
    }

    /// Deactivate every stage at or below `stage` (used when a stage separates).
    pub fn drop_stages_from(&mut self, stage: usize) {
        for s in stage..self.active.len() {
            self.active[s] = false;
        }
    }

    /// Keep only stages `stage..` active (the part that falls away on separation).
    pub fn keep_stages_from(&mut self, stage: usize) {
        for (s, a) in self.active.iter_mut().enumerate() {
            *a = s >= stage && *a;
        }
    }

    pub fn is_stage_active(&self, stage: usize) -> bool {
        self.active.get(stage).copied().unwrap_or(false)
    }

    pub fn active_stages(&self) -> impl Iterator<Item = usize> + '_ {
        self.active.iter().enumerate().filter(|(_, a)| **a).map(|(s, _)| s)
    }

    pub fn active_stage_count(&self) -> usize {
        self.active.iter().filter(|&&a| a).count()
    }

    /// Lowest active stage.
    pub fn bottom_stage(&self) -> Option<usize> {
        self.active_stages().last()
    }

    pub fn is_component_active(&self, id: ComponentId) -> bool {
        self.rocket.get(id).is_some_and(|c| self.is_stage_active(c.stage_number()))
    }

    /// Components of the active stages in depth-first order.
    pub fn active_components(&self) -> impl Iterator<Item = (ComponentId, &Component)> + '_ {
        self.rocket.components().filter(|(_, c)| self.is_stage_active(c.stage_number()))
    }

    /// Motors mounted in active stages.
    pub fn active_motors(&self) -> impl Iterator<Item = (usize, &MotorConfig)> + '_ {
        self.motors.iter().enumerate().filter(|(_, m)| self.is_component_active(m.mount))
    }

    pub fn motor_stage(&self, motor: &MotorConfig) -> usize {
        self.rocket.component(motor.mount).stage_number()
    }

    /// Axial position of the motor's fore end, m from the nose tip.
    pub fn motor_position(&self, motor: &MotorConfig) -> f64 {
        let mount = self.rocket.component(motor.mount);
        let overhang = match &mount.kind {
            ComponentKind::BodyTube(b) => b.motor_overhang,
            _ => 0.0,
        };
        mount.position() + mount.length() + overhang - motor.motor.length()
    }

    /// Maximum body diameter of the active stages, m; `None` without bodies.
    pub fn body_diameter(&self) -> Option<f64> {
        let d = self
            .active_components()
            .filter(|(_, c)| c.is_symmetric())
            .map(|(_, c)| 2.0 * c.max_radius())
            .fold(0.0, f64::max);
        (d > 0.0).then_some(d)
    }

    /// Body diameter, or a 1 cm fallback, m.
    pub fn reference_length(&self) -> f64 {
        self.body_diameter().unwrap_or(MIN_REFERENCE_LENGTH)
    }

    pub fn reference_area(&self) -> f64 {
        std::f64::consts::PI * crate::math::pow2(self.reference_length() / 2.0)
    }

    /// (fore, aft) extent of the active airframe, m.
    pub fn bounds(&self) -> (f64, f64) {
        let mut fore = f64::INFINITY;
        let mut aft = f64::NEG_INFINITY;
        for (_, c) in self.active_components().filter(|(_, c)| !c.is_stage()) {
            fore = fore.min(c.position());
            aft = aft.max(c.position() + c.length());
        }
        if fore > aft { (0.0, 0.0) } else { (fore, aft) }
    }

    /// Length of the active airframe, m.
    pub fn length(&self) -> f64 {
        let (fore, aft) = self.bounds();
        aft - fore
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vehicle::presets;
    use approx::assert_abs_diff_eq;

    #[test]
    fn reference_length_is_max_diameter() {
        let config = presets::alpha().unwrap();
        assert_abs_diff_eq!(config.reference_length(), 2.0 * presets::ALPHA_RADIUS, epsilon = 1e-12);
    }

    #[test]
    fn reference_length_falls_back_without_bodies() {
        let mut b = crate::vehicle::RocketBuilder::new("empty");
        b.stage("s");
        let config = FlightConfiguration::new(Arc::new(b.build().unwrap()));
        assert_abs_diff_eq!(config.reference_length(), MIN_REFERENCE_LENGTH, epsilon = 1e-12);
        assert!(config.body_diameter().is_none());
        assert!(!config.has_motors());
    }

    #[test]
    fn motor_sits_at_mount_aft_end() {
        let config = presets::alpha().unwrap();
        let m = &config.motors()[0];
        let mount = config.rocket().component(m.mount);
        let aft = config.motor_position(m) + m.motor.length();
        assert!(aft >= mount.position() + mount.length());
    }

    #[test]
    fn stage_selection() {
        let mut config = presets::two_stage().unwrap();
        assert_eq!(config.bottom_stage(), Some(1));
        let full = config.length();
        config.drop_stages_from(1);
        assert_eq!(config.active_stage_count(), 1);
        assert!(config.length() < full);
        assert_eq!(config.active_motors().count(), 1);
    }

    #[test]
    fn non_mount_is_rejected() {
        let mut config = presets::alpha().unwrap();
        let nose = config.rocket().find("Nose cone").unwrap();
        let motor = config.motors()[0].motor.clone();
        assert!(config.add_motor(MotorConfig::new(nose, motor)).is_err());
    }
}
