use std::f64::consts::FRAC_PI_2;

use nalgebra::{UnitQuaternion, Vector3};

use crate::aero::AerodynamicForces;
use crate::math::EPSILON;
use crate::vehicle::RigidBody;

// ---------------------------------------------------------------------------
// 6DOF equations of motion
// ---------------------------------------------------------------------------
//
// Body frame: +z along the nose, the airflow plane rotated by `theta` about z.
// Aerodynamic coefficients are per reference area; moments additionally per
// reference length and taken about the nose tip.

/// Angle of attack and airflow roll angle from the airspeed in body coordinates.
pub fn airflow_angles(airspeed_body: &Vector3<f64>) -> (f64, f64) {
    let speed = airspeed_body.norm();
    if speed < EPSILON {
        return (0.0, 0.0);
    }
    let aoa = (airspeed_body.z / speed).clamp(-1.0, 1.0).acos();
    let theta = airspeed_body.y.atan2(airspeed_body.x);
    (aoa, theta)
}

/// Linear acceleration in the launch frame, excluding gravity.
///
/// `qa` is dynamic pressure times reference area, N.
pub fn linear_acceleration(
    forces: &AerodynamicForces,
    qa: f64,
    thrust: f64,
    mass: f64,
    theta: f64,
    orientation: &UnitQuaternion<f64>,
) -> Vector3<f64> {
    let body = Vector3::new(
        -forces.cn * qa / mass,
        -forces.cside * qa / mass,
        (thrust - forces.cd_axial * qa) / mass,
    );
    orientation * (UnitQuaternion::from_axis_angle(&Vector3::z_axis(), theta) * body)
}

/// Angular acceleration in the launch frame.
pub fn angular_acceleration(
    forces: &AerodynamicForces,
    qa: f64,
    ref_length: f64,
    body: &RigidBody,
    theta: f64,
    orientation: &UnitQuaternion<f64>,
) -> Vector3<f64> {
    // moments about the CG
    let cm = forces.cm - forces.cn * body.cg / ref_length;
    let cyaw = forces.cyaw - forces.cside * body.cg / ref_length;
    let qal = qa * ref_length;

    let moment = Vector3::new(-cyaw * qal, cm * qal, forces.croll * qal);
    let local = Vector3::new(
        moment.x / body.longitudinal_inertia,
        moment.y / body.longitudinal_inertia,
        moment.z / body.rotational_inertia,
    );
    orientation * (UnitQuaternion::from_axis_angle(&Vector3::z_axis(), theta) * local)
}

// ---------------------------------------------------------------------------
// Launch geometry
// ---------------------------------------------------------------------------

/// Unit vector along the launch rod. `angle` from vertical, `direction` clockwise from north.
pub fn launch_rod_direction(angle: f64, direction: f64) -> Vector3<f64> {
    let phi = FRAC_PI_2 - direction;
    Vector3::new(angle.sin() * phi.cos(), angle.sin() * phi.sin(), angle.cos())
}

/// Orientation that points the body +z along the launch rod.
pub fn launch_orientation(angle: f64, direction: f64) -> UnitQuaternion<f64> {
    UnitQuaternion::from_axis_angle(&Vector3::z_axis(), FRAC_PI_2 - direction)
        * UnitQuaternion::from_axis_angle(&Vector3::y_axis(), angle)
}
