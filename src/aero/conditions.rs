use std::f64::consts::PI;

use nalgebra::Vector3;

use crate::math::{pow2, EPSILON};
use crate::physics::AtmosphericConditions;

// ---------------------------------------------------------------------------
// Flight conditions snapshot
// ---------------------------------------------------------------------------

/// Everything the aerodynamic calculators need about the current flight
/// state. Rebuilt every integration step.
#[derive(Debug, Clone, PartialEq)]
pub struct FlightConditions {
    ref_length: f64, // m, reference diameter
    ref_area: f64,   // m^2

    aoa: f64,        // rad, [0, pi]
    sin_aoa: f64,
    sinc_aoa: f64,   // sin(aoa)/aoa
    theta: f64,      // rad, roll position of the airflow around the body axis

    mach: f64,
    beta: f64,       // sqrt(|1 - M^2|)
    velocity: f64,   // m/s

    roll_rate: f64,  // rad/s
    pitch_rate: f64,
    yaw_rate: f64,

    pitch_center: Vector3<f64>, // CG, rocket frame
    atmosphere: AtmosphericConditions,
}

impl FlightConditions {
    /// Zero-velocity conditions in the standard atmosphere for a reference diameter.
    pub fn new(ref_length: f64) -> Self {
        let mut c = Self {
            ref_length: 0.0,
            ref_area: 0.0,
            aoa: 0.0,
            sin_aoa: 0.0,
            sinc_aoa: 1.0,
            theta: 0.0,
            mach: 0.3,
            beta: (1.0_f64 - 0.09).sqrt(),
            velocity: 0.0,
            roll_rate: 0.0,
            pitch_rate: 0.0,
            yaw_rate: 0.0,
            pitch_center: Vector3::zeros(),
            atmosphere: AtmosphericConditions::standard(),
        };
        c.set_ref_length(ref_length);
        c.set_mach(0.3);
        c
    }

    pub fn ref_length(&self) -> f64 {
        self.ref_length
    }

    pub fn set_ref_length(&mut self, length: f64) {
        self.ref_length = length;
        self.ref_area = PI * pow2(length / 2.0);
    }

    pub fn ref_area(&self) -> f64 {
        self.ref_area
    }

    pub fn aoa(&self) -> f64 {
        self.aoa
    }

    /// Angle of attack, clamped to [0, pi].
    pub fn set_aoa(&mut self, aoa: f64) {
        let aoa = aoa.clamp(0.0, PI);
        self.set_aoa_with_sin(aoa, aoa.sin());
    }

    /// Angle of attack with a precomputed sine.
    pub fn set_aoa_with_sin(&mut self, aoa: f64, sin_aoa: f64) {
        let aoa = aoa.clamp(0.0, PI);
        self.aoa = aoa;
        self.sin_aoa = sin_aoa;
        self.sinc_aoa = if aoa < EPSILON { 1.0 } else { sin_aoa / aoa };
    }

    pub fn sin_aoa(&self) -> f64 {
        self.sin_aoa
    }

    pub fn sinc_aoa(&self) -> f64 {
        self.sinc_aoa
    }

    pub fn theta(&self) -> f64 {
        self.theta
    }

    pub fn set_theta(&mut self, theta: f64) {
        self.theta = theta;
    }

    pub fn mach(&self) -> f64 {
        self.mach
    }

    pub fn set_mach(&mut self, mach: f64) {
        let mach = mach.max(0.0);
        self.mach = mach;
        self.beta = if mach < 1.0 { (1.0 - mach * mach).sqrt() } else { (mach * mach - 1.0).sqrt() };
        self.velocity = mach * self.atmosphere.speed_of_sound();
    }

    pub fn beta(&self) -> f64 {
        self.beta
    }

    pub fn velocity(&self) -> f64 {
        self.velocity
    }

    /// Airspeed, m/s; Mach follows from the current atmosphere.
    pub fn set_velocity(&mut self, velocity: f64) {
        self.set_mach(velocity / self.atmosphere.speed_of_sound());
        self.velocity = velocity;
    }

    pub fn roll_rate(&self) -> f64 {
        self.roll_rate
    }

    pub fn set_roll_rate(&mut self, rate: f64) {
        self.roll_rate = rate;
    }

    pub fn pitch_rate(&self) -> f64 {
        self.pitch_rate
    }

    pub fn set_pitch_rate(&mut self, rate: f64) {
        self.pitch_rate = rate;
    }

    pub fn yaw_rate(&self) -> f64 {
        self.yaw_rate
    }

    pub fn set_yaw_rate(&mut self, rate: f64) {
        self.yaw_rate = rate;
    }

    pub fn pitch_center(&self) -> Vector3<f64> {
        self.pitch_center
    }

    pub fn set_pitch_center(&mut self, center: Vector3<f64>) {
        self.pitch_center = center;
    }

    pub fn atmosphere(&self) -> &AtmosphericConditions {
        &self.atmosphere
    }

    /// Replace the atmosphere, keeping the airspeed.
    pub fn set_atmosphere(&mut self, atmosphere: AtmosphericConditions) {
        let v = self.velocity;
        self.atmosphere = atmosphere;
        self.set_velocity(v);
    }

    /// Dynamic pressure, Pa.
    pub fn dynamic_pressure(&self) -> f64 {
        0.5 * self.atmosphere.density() * pow2(self.velocity)
    }

    /// Reynolds number for a characteristic length.
    pub fn reynolds(&self, length: f64) -> f64 {
        self.velocity * length / self.atmosphere.kinematic_viscosity()
    }
}
