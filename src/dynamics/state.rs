use nalgebra::{UnitQuaternion, Vector3};

// ---------------------------------------------------------------------------
// Physical constants
// ---------------------------------------------------------------------------

pub const G0: f64 = 9.80665;
pub const EARTH_RADIUS: f64 = 6_371_000.0;

// ---------------------------------------------------------------------------
// Rigid-body kinematic state
// ---------------------------------------------------------------------------

/// Kinematic state of the flying body in the launch frame (x east, y north, z up).
/// The orientation maps body coordinates, whose +z is the nose direction, into the launch frame.
#[derive(Debug, Clone, PartialEq)]
pub struct RigidState {
    pub position: Vector3<f64>,          // m, relative to the launch point
    pub velocity: Vector3<f64>,          // m/s
    pub orientation: UnitQuaternion<f64>,
    pub rotation_velocity: Vector3<f64>, // rad/s, launch frame
}

impl RigidState {
    /// At rest on the pad with the given orientation.
    pub fn at_rest(orientation: UnitQuaternion<f64>) -> Self {
        Self {
            position: Vector3::zeros(),
            velocity: Vector3::zeros(),
            orientation,
            rotation_velocity: Vector3::zeros(),
        }
    }

    /// Euler update used for the intermediate RK4 evaluations.
    pub fn apply(&self, d: &Deriv, dt: f64) -> RigidState {
        RigidState {
            position: self.position + d.dpos * dt,
            velocity: self.velocity + d.dvel * dt,
            orientation: rotate(&self.orientation, &(d.drot * dt)),
            rotation_velocity: self.rotation_velocity + d.domega * dt,
        }
    }

    /// Body +z (nose direction) in the launch frame.
    pub fn axis(&self) -> Vector3<f64> {
        self.orientation * Vector3::z()
    }

    /// Angle of the body axis from vertical, rad.
    pub fn zenith(&self) -> f64 {
        self.axis().z.clamp(-1.0, 1.0).acos()
    }

    /// Azimuth of the body axis, rad, clockwise from north.
    pub fn azimuth(&self) -> f64 {
        let a = self.axis();
        a.x.atan2(a.y)
    }

    pub fn is_finite(&self) -> bool {
        self.position.iter().all(|v| v.is_finite())
            && self.velocity.iter().all(|v| v.is_finite())
            && self.rotation_velocity.iter().all(|v| v.is_finite())
            && self.orientation.coords.iter().all(|v| v.is_finite())
    }
}

/// Left-multiply by the rotation of a rotation vector and renormalize.
pub fn rotate(orientation: &UnitQuaternion<f64>, rotation: &Vector3<f64>) -> UnitQuaternion<f64> {
    let q = UnitQuaternion::from_scaled_axis(*rotation) * orientation;
    UnitQuaternion::new_normalize(q.into_inner())
}

// ---------------------------------------------------------------------------
// State derivative
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct Deriv {
    pub dpos: Vector3<f64>,   // velocity
    pub dvel: Vector3<f64>,   // linear acceleration, launch frame
    pub drot: Vector3<f64>,   // rotation velocity, launch frame
    pub domega: Vector3<f64>, // angular acceleration, launch frame
}

impl Deriv {
    /// Weighted RK4 combination `(k1 + 2 k2 + 2 k3 + k4) / 6`.
    pub fn rk4_average(k1: &Deriv, k2: &Deriv, k3: &Deriv, k4: &Deriv) -> Deriv {
        Deriv {
            dpos: (k1.dpos + 2.0 * k2.dpos + 2.0 * k3.dpos + k4.dpos) / 6.0,
            dvel: (k1.dvel + 2.0 * k2.dvel + 2.0 * k3.dvel + k4.dvel) / 6.0,
            drot: (k1.drot + 2.0 * k2.drot + 2.0 * k3.drot + k4.drot) / 6.0,
            domega: (k1.domega + 2.0 * k2.domega + 2.0 * k3.domega + k4.domega) / 6.0,
        }
    }
}
