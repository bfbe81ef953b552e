pub mod batch;
pub mod cancel;
pub mod data;
pub mod descent;
pub mod event;
pub mod integrator;
pub mod listener;
pub mod options;
pub mod runner;
pub mod status;

pub use batch::{run_batch, run_batch_with, BatchStatistics};
pub use cancel::CancelToken;
pub use data::{BranchSummary, FlightDataBranch, FlightDataType};
pub use event::{EventData, FlightEvent, FlightEventType};
pub use listener::{AccelerationData, ListenerChain, ListenerResult, MassKind, SimulationListener};
pub use options::{MotorOverride, SimulationConditions, SimulationOptions};
pub use runner::{simulate, simulate_with, SimulationOutcome, SimulationResult};
pub use status::SimulationStatus;
