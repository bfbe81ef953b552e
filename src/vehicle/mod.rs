pub mod component;
pub mod configuration;
pub mod mass;
pub mod motor;
pub mod presets;
pub mod recovery;
pub mod rocket;
pub mod shape;

pub use component::{
    BodyTube, Component, ComponentId, ComponentKind, CrossSection, FinSet, Finish, LaunchLug,
    Parachute, Placement, RailButton, Streamer, Transition, TubeFinSet,
};
pub use configuration::{FlightConfiguration, MotorConfig};
pub use mass::RigidBody;
pub use motor::{IgnitionEvent, MotorState, ThrustCurveMotor};
pub use recovery::{DeployEvent, DeploymentConfig, SeparationConfig, SeparationEvent};
pub use rocket::{Rocket, RocketBuilder};
pub use shape::Shape;
