pub mod barrowman;
pub mod calc;
pub mod conditions;
pub mod drag;
pub mod forces;

pub use barrowman::{BarrowmanCalculator, ComponentForces};
pub use conditions::FlightConditions;
pub use forces::{AerodynamicForces, WeightedPoint};
