use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::math::pow2;
use crate::sim::event::{FlightEvent, FlightEventType};

// ---------------------------------------------------------------------------
// Thrust-curve motor
// ---------------------------------------------------------------------------

/// Solid motor described by a sampled thrust curve.
#[derive(Debug, Clone, PartialEq)]
pub struct ThrustCurveMotor {
    designation: String,
    diameter: f64, // m
    length: f64,   // m
    times: Vec<f64>,
    thrusts: Vec<f64>,
    impulse: Vec<f64>, // cumulative, N·s
    launch_mass: f64,  // kg
    burnout_mass: f64, // kg
    delays: Vec<f64>,  // s, standard ejection delays
}

impl ThrustCurveMotor {
    /// Build from (time, thrust) points. A leading (0, 0) point is added when the
    /// curve starts later, and the curve is closed with zero thrust at the end.
    pub fn new(
        designation: impl Into<String>,
        diameter: f64,
        length: f64,
        points: &[(f64, f64)],
        launch_mass: f64,
        burnout_mass: f64,
    ) -> Result<Self, ConfigError> {
        let designation = designation.into();
        let bad = |reason: &str| ConfigError::Motor { motor: designation.clone(), reason: reason.into() };

        if points.is_empty() {
            return Err(bad("thrust curve is empty"));
        }
        if !(diameter > 0.0 && length > 0.0) {
            return Err(bad("diameter and length must be positive"));
        }
        if !(burnout_mass >= 0.0 && launch_mass >= burnout_mass) {
            return Err(bad("launch mass must be at least the burnout mass"));
        }

        let mut times = Vec::with_capacity(points.len() + 2);
        let mut thrusts = Vec::with_capacity(points.len() + 2);
        if points[0].0 > 0.0 {
            times.push(0.0);
            thrusts.push(0.0);
        }
        for &(t, f) in points {
            if !t.is_finite() || !f.is_finite() || f < 0.0 || t < 0.0 {
                return Err(bad("thrust points must be finite and non-negative"));
            }
            if let Some(&last) = times.last() {
                if t <= last {
                    return Err(bad("thrust curve times must be strictly increasing"));
                }
            }
            times.push(t);
            thrusts.push(f);
        }
        if thrusts.last().is_some_and(|&f| f > 0.0) {
            let last = times[times.len() - 1];
            times.push(last + 1e-3);
            thrusts.push(0.0);
        }

        let mut impulse = vec![0.0; times.len()];
        for i in 1..times.len() {
            impulse[i] = impulse[i - 1] + 0.5 * (thrusts[i] + thrusts[i - 1]) * (times[i] - times[i - 1]);
        }

        Ok(Self {
            designation,
            diameter,
            length,
            times,
            thrusts,
            impulse,
            launch_mass,
            burnout_mass,
            delays: Vec::new(),
        })
    }

    pub fn with_delays(mut self, delays: &[f64]) -> Self {
        self.delays = delays.to_vec();
        self
    }

    pub fn designation(&self) -> &str {
        &self.designation
    }

    pub fn diameter(&self) -> f64 {
        self.diameter
    }

    pub fn length(&self) -> f64 {
        self.length
    }

    pub fn delays(&self) -> &[f64] {
        &self.delays
    }

    pub fn launch_mass(&self) -> f64 {
        self.launch_mass
    }

    pub fn burnout_mass(&self) -> f64 {
        self.burnout_mass
    }

    /// Time points of the curve, s after ignition.
    pub fn time_points(&self) -> &[f64] {
        &self.times
    }

    pub fn burn_time(&self) -> f64 {
        self.times.last().copied().unwrap_or(0.0)
    }

    pub fn total_impulse(&self) -> f64 {
        self.impulse.last().copied().unwrap_or(0.0)
    }

    pub fn average_thrust(&self) -> f64 {
        let t = self.burn_time();
        if t > 0.0 { self.total_impulse() / t } else { 0.0 }
    }

    pub fn max_thrust(&self) -> f64 {
        self.thrusts.iter().copied().fold(0.0, f64::max)
    }

    /// Thrust at `t` s after ignition, N. Zero outside the curve.
    pub fn thrust(&self, t: f64) -> f64 {
        match self.segment(t) {
            Some((i, f)) => self.thrusts[i] + f * (self.thrusts[i + 1] - self.thrusts[i]),
            None => 0.0,
        }
    }

    /// Impulse delivered up to `t`, N·s.
    fn impulse_at(&self, t: f64) -> f64 {
        if t <= 0.0 {
            return 0.0;
        }
        match self.segment(t) {
            Some((i, f)) => {
                let dt = f * (self.times[i + 1] - self.times[i]);
                let f_now = self.thrusts[i] + f * (self.thrusts[i + 1] - self.thrusts[i]);
                self.impulse[i] + 0.5 * (self.thrusts[i] + f_now) * dt
            }
            None => self.total_impulse(),
        }
    }

    fn segment(&self, t: f64) -> Option<(usize, f64)> {
        if t < 0.0 || self.times.len() < 2 || t > self.burn_time() {
            return None;
        }
        let i = self.times.partition_point(|&x| x <= t).saturating_sub(1).min(self.times.len() - 2);
        let span = self.times[i + 1] - self.times[i];
        Some((i, ((t - self.times[i]) / span).clamp(0.0, 1.0)))
    }

    /// Mass at `t` s after ignition; propellant burns in proportion to delivered impulse.
    pub fn mass(&self, t: f64) -> f64 {
        let total = self.total_impulse();
        if total <= 0.0 {
            return self.launch_mass;
        }
        let burnt = self.impulse_at(t) / total;
        self.launch_mass - (self.launch_mass - self.burnout_mass) * burnt
    }

    /// CG measured from the motor's fore end, m.
    pub fn cg(&self) -> f64 {
        self.length / 2.0
    }

    /// (longitudinal, rotational) inertia of a solid cylinder of the given mass.
    pub fn inertia(&self, mass: f64) -> (f64, f64) {
        let r2 = pow2(self.diameter / 2.0);
        (mass * (3.0 * r2 + pow2(self.length)) / 12.0, mass * r2 / 2.0)
    }
}

// ---------------------------------------------------------------------------
// Ignition
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IgnitionEvent {
    /// Launch for the bottom stage, otherwise the ejection charge of the stage below.
    #[default]
    Automatic,
    Launch,
    /// Ejection charge of the stage below.
    EjectionCharge,
    /// Burnout of the stage below.
    Burnout,
    Never,
}

impl IgnitionEvent {
    pub fn is_triggered_by(&self, event: &FlightEvent, stage: usize, stage_count: usize) -> bool {
        let below = Some(stage + 1);
        match self {
            IgnitionEvent::Automatic => {
                if stage + 1 == stage_count {
                    event.kind == FlightEventType::Launch
                } else {
                    event.kind == FlightEventType::EjectionCharge && event.stage == below
                }
            }
            IgnitionEvent::Launch => event.kind == FlightEventType::Launch,
            IgnitionEvent::EjectionCharge => {
                event.kind == FlightEventType::EjectionCharge && event.stage == below
            }
            IgnitionEvent::Burnout => event.kind == FlightEventType::Burnout && event.stage == below,
            IgnitionEvent::Never => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Per-flight motor bookkeeping
// ---------------------------------------------------------------------------

/// Ignition/burnout bookkeeping of one mounted motor during a flight.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MotorState {
    pub ignition_time: Option<f64>,
    pub burnout_time: Option<f64>,
    pub ejection_fired: bool,
}

impl MotorState {
    pub fn is_ignited(&self) -> bool {
        self.ignition_time.is_some()
    }

    pub fn is_burnt_out(&self) -> bool {
        self.burnout_time.is_some()
    }

    /// Burning between ignition and burnout.
    pub fn is_burning(&self) -> bool {
        self.is_ignited() && !self.is_burnt_out()
    }

    pub fn thrust(&self, motor: &ThrustCurveMotor, time: f64) -> f64 {
        match (self.ignition_time, self.burnout_time) {
            (Some(ign), None) => motor.thrust(time - ign),
            _ => 0.0,
        }
    }

    pub fn mass(&self, motor: &ThrustCurveMotor, time: f64) -> f64 {
        match self.ignition_time {
            Some(ign) => motor.mass(time - ign),
            None => motor.launch_mass(),
        }
    }
}
