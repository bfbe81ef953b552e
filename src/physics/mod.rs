pub mod atmosphere;
pub mod geodetic;
pub mod gravity;
pub mod wind;

pub use atmosphere::{
    AtmosphericConditions, AtmosphericModel, ConstantAtmosphere, ExtendedIsaModel,
    InterpolatingAtmosphere,
};
pub use geodetic::{GeodeticComputation, WorldCoordinate};
pub use gravity::GravityModel;
pub use wind::{PinkNoiseWind, WindModel};
