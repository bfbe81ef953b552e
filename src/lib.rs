pub mod aero;
pub mod dynamics;
pub mod error;
pub mod io;
pub mod math;
pub mod physics;
pub mod sim;
pub mod vehicle;
pub mod warning;

pub use error::{AbortReason, ConfigError, SimulationError};
pub use sim::{simulate, simulate_with, SimulationOptions, SimulationOutcome, SimulationResult};
pub use warning::{Warning, WarningSet};
