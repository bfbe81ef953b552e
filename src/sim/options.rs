use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::sync::Arc;

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::aero::BarrowmanCalculator;
use crate::dynamics::launch_rod_direction;
use crate::error::ConfigError;
use crate::physics::wind::wind_from;
use crate::physics::{
    AtmosphericModel, ExtendedIsaModel, GeodeticComputation, GravityModel, InterpolatingAtmosphere,
    PinkNoiseWind, WindModel, WorldCoordinate,
};
use crate::vehicle::{FlightConfiguration, IgnitionEvent};

pub const RECOMMENDED_TIME_STEP: f64 = 0.05; // s
pub const RECOMMENDED_MAX_TIME: f64 = 1200.0; // s
pub const RECOMMENDED_ANGLE_STEP: f64 = 3.0; // deg

const MAX_LAUNCH_ROD_ANGLE: f64 = 60.0; // deg
const MAX_LAUNCH_ALTITUDE: f64 = 11_000.0; // m, first ISA layer boundary

/// Mixed into the run seed so the turbulence stream differs from the
/// pitch/yaw perturbation stream.
const WIND_SEED_MASK: u64 = 0x5DEE_CE66_D1CE_4E5B;

// ---------------------------------------------------------------------------
// User-facing options (JSON)
// ---------------------------------------------------------------------------

/// Simulation options as loaded from JSON. Angles are in degrees here;
/// [`SimulationConditions`] holds them in radians.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationOptions {
    pub launch_rod_length: f64,    // m
    pub launch_rod_angle: f64,     // deg from vertical
    pub launch_rod_direction: f64, // deg clockwise from north

    pub wind_average: f64,    // m/s
    pub wind_turbulence: f64, // m/s, standard deviation
    pub wind_direction: f64,  // deg the wind blows from

    pub launch_latitude: f64,  // deg
    pub launch_longitude: f64, // deg
    pub launch_altitude: f64,  // m above sea level

    /// Standard atmosphere; otherwise anchored at the launch site's temperature and pressure.
    pub use_isa: bool,
    pub launch_temperature: f64, // K
    pub launch_pressure: f64,    // Pa
    pub interpolate_atmosphere: bool,

    pub time_step: f64,      // s
    pub max_angle_step: f64, // deg
    pub max_time: f64,       // s

    pub geodetic: GeodeticComputation,
    pub gravity: GravityModel,
    pub seed: u64,

    /// Stages to fly; all stages when absent.
    pub active_stages: Option<Vec<usize>>,
    pub motors: Vec<MotorOverride>,
}

impl Default for SimulationOptions {
    fn default() -> Self {
        Self {
            launch_rod_length: 1.0,
            launch_rod_angle: 0.0,
            launch_rod_direction: 0.0,
            wind_average: 2.0,
            wind_turbulence: 0.2,
            wind_direction: 0.0,
            launch_latitude: 28.61,
            launch_longitude: -80.6,
            launch_altitude: 0.0,
            use_isa: true,
            launch_temperature: 288.15,
            launch_pressure: 101_325.0,
            interpolate_atmosphere: true,
            time_step: RECOMMENDED_TIME_STEP,
            max_angle_step: RECOMMENDED_ANGLE_STEP,
            max_time: RECOMMENDED_MAX_TIME,
            geodetic: GeodeticComputation::default(),
            gravity: GravityModel::default(),
            seed: 0,
            active_stages: None,
            motors: Vec::new(),
        }
    }
}

/// Per-motor changes to the configuration's ignition and ejection settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MotorOverride {
    /// Index into the configuration's motor list.
    pub motor: usize,
    #[serde(default)]
    pub ignition: Option<IgnitionEvent>,
    #[serde(default)]
    pub ignition_delay: Option<f64>,
    #[serde(default)]
    pub ejection_delay: Option<f64>,
    /// No ejection charge at all.
    #[serde(default)]
    pub plugged: bool,
}

impl SimulationOptions {
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, ConfigError> {
        Ok(serde_json::from_reader(reader)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file))
    }

    /// Validate every option and build the immutable run conditions.
    pub fn to_conditions(
        &self,
        mut configuration: FlightConfiguration,
    ) -> Result<Arc<SimulationConditions>, ConfigError> {
        self.validate()?;

        if let Some(stages) = &self.active_stages {
            if stages.is_empty() {
                return Err(ConfigError::option("active_stages", "at least one stage must fly"));
            }
            if let Some(&s) = stages.iter().find(|&&s| s >= configuration.stage_count()) {
                return Err(ConfigError::option(
                    "active_stages",
                    format!("stage {} does not exist ({} stages)", s, configuration.stage_count()),
                ));
            }
            for s in 0..configuration.stage_count() {
                configuration.set_stage_active(s, stages.contains(&s));
            }
        }

        for o in &self.motors {
            let count = configuration.motors().len();
            let motor = configuration.motor_mut(o.motor).ok_or_else(|| {
                ConfigError::option("motors", format!("motor {} does not exist ({} motors)", o.motor, count))
            })?;
            if let Some(v) = o.ignition {
                motor.ignition = v;
            }
            if let Some(v) = o.ignition_delay {
                if !(v >= 0.0) {
                    return Err(ConfigError::option("motors", "ignition delay must be non-negative"));
                }
                motor.ignition_delay = v;
            }
            if let Some(v) = o.ejection_delay {
                if !(v >= 0.0) {
                    return Err(ConfigError::option("motors", "ejection delay must be non-negative"));
                }
                motor.ejection_delay = v;
            }
            if o.plugged {
                motor.ejection_delay = f64::INFINITY;
            }
        }

        let base = if self.use_isa {
            ExtendedIsaModel::standard()
        } else {
            ExtendedIsaModel::with_launch_site(self.launch_altitude, self.launch_temperature, self.launch_pressure)?
        };
        let atmosphere: Arc<dyn AtmosphericModel> = if self.interpolate_atmosphere {
            Arc::new(InterpolatingAtmosphere::new(base))
        } else {
            Arc::new(base)
        };

        let calculator = Arc::new(BarrowmanCalculator::new(configuration.rocket()));
        debug!(rocket = configuration.rocket().name(), seed = self.seed, "simulation conditions built");

        Ok(Arc::new(SimulationConditions {
            configuration,
            calculator,
            atmosphere,
            launch_site: WorldCoordinate::from_degrees(
                self.launch_latitude,
                self.launch_longitude,
                self.launch_altitude,
            ),
            launch_rod_length: self.launch_rod_length,
            launch_rod_angle: self.launch_rod_angle.to_radians(),
            launch_rod_direction: self.launch_rod_direction.to_radians(),
            wind: WindSettings {
                average: self.wind_average,
                turbulence: self.wind_turbulence,
                direction: self.wind_direction.to_radians(),
            },
            gravity: self.gravity,
            geodetic: self.geodetic,
            time_step: self.time_step,
            max_angle_step: self.max_angle_step.to_radians(),
            max_time: self.max_time,
            seed: self.seed,
        }))
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let positive = |v: f64, name: &'static str| {
            if v > 0.0 && v.is_finite() {
                Ok(())
            } else {
                Err(ConfigError::option(name, format!("must be positive and finite, got {}", v)))
            }
        };
        let non_negative = |v: f64, name: &'static str| {
            if v >= 0.0 && v.is_finite() {
                Ok(())
            } else {
                Err(ConfigError::option(name, format!("must be non-negative and finite, got {}", v)))
            }
        };

        positive(self.time_step, "time_step")?;
        positive(self.max_angle_step, "max_angle_step")?;
        positive(self.max_time, "max_time")?;
        non_negative(self.launch_rod_length, "launch_rod_length")?;
        non_negative(self.wind_average, "wind_average")?;
        non_negative(self.wind_turbulence, "wind_turbulence")?;

        if !(self.launch_rod_angle.abs() <= MAX_LAUNCH_ROD_ANGLE) {
            return Err(ConfigError::option(
                "launch_rod_angle",
                format!("must be within ±{} degrees", MAX_LAUNCH_ROD_ANGLE),
            ));
        }
        if !self.launch_rod_direction.is_finite() || !self.wind_direction.is_finite() {
            return Err(ConfigError::option("launch_rod_direction", "directions must be finite"));
        }
        if !(self.launch_latitude.abs() <= 90.0) {
            return Err(ConfigError::option("launch_latitude", "must be within ±90 degrees"));
        }
        if !(self.launch_longitude.abs() <= 180.0) {
            return Err(ConfigError::option("launch_longitude", "must be within ±180 degrees"));
        }
        if !(self.launch_altitude < MAX_LAUNCH_ALTITUDE) {
            return Err(ConfigError::LaunchAltitudeOutOfRange {
                altitude: self.launch_altitude,
                limit: MAX_LAUNCH_ALTITUDE,
            });
        }
        if let GravityModel::Constant(g) = self.gravity {
            positive(g, "gravity")?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Validated run conditions
// ---------------------------------------------------------------------------

/// Average wind, turbulence intensity and source bearing (rad).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindSettings {
    pub average: f64,
    pub turbulence: f64,
    pub direction: f64,
}

/// Immutable inputs of a run, shared between runs through `Arc`.
#[derive(Debug, Clone)]
pub struct SimulationConditions {
    pub configuration: FlightConfiguration,
    pub calculator: Arc<BarrowmanCalculator>,
    pub atmosphere: Arc<dyn AtmosphericModel>,
    pub launch_site: WorldCoordinate,
    pub launch_rod_length: f64,    // m
    pub launch_rod_angle: f64,     // rad
    pub launch_rod_direction: f64, // rad
    pub wind: WindSettings,
    pub gravity: GravityModel,
    pub geodetic: GeodeticComputation,
    pub time_step: f64,      // s
    pub max_angle_step: f64, // rad
    pub max_time: f64,       // s
    pub seed: u64,
}

impl SimulationConditions {
    /// Fresh wind model for one run; turbulence is seeded from the run seed.
    pub fn wind_model(&self) -> WindModel {
        let w = &self.wind;
        if w.turbulence > 0.0 {
            WindModel::PinkNoise(PinkNoiseWind::new(w.average, w.turbulence, w.direction, self.seed ^ WIND_SEED_MASK))
        } else {
            WindModel::Constant(wind_from(w.direction, w.average))
        }
    }

    pub fn rod_direction(&self) -> Vector3<f64> {
        launch_rod_direction(self.launch_rod_angle, self.launch_rod_direction)
    }

    /// Same conditions with a different random seed.
    pub fn with_seed(&self, seed: u64) -> Self {
        Self { seed, ..self.clone() }
    }
}
