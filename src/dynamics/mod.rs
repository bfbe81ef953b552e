pub mod sixdof;
pub mod state;

pub use sixdof::{
    airflow_angles, angular_acceleration, launch_orientation, launch_rod_direction,
    linear_acceleration,
};
pub use state::{rotate, Deriv, RigidState, EARTH_RADIUS, G0};
