use thiserror::Error;

// ---------------------------------------------------------------------------
// Configuration errors: rejected before any simulation time advances
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("temperature must be positive, got {0} K")]
    NonPositiveTemperature(f64),

    #[error("pressure must be positive, got {0} Pa")]
    NonPositivePressure(f64),

    #[error("launch altitude {altitude} m must be below {limit} m")]
    LaunchAltitudeOutOfRange { altitude: f64, limit: f64 },

    #[error("invalid geometry for '{component}': {reason}")]
    Geometry { component: String, reason: String },

    #[error("invalid motor '{motor}': {reason}")]
    Motor { motor: String, reason: String },

    #[error("invalid simulation option '{option}': {reason}")]
    Option { option: &'static str, reason: String },

    #[error("unknown preset '{0}'")]
    UnknownPreset(String),

    #[error("failed to parse options: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ConfigError {
    pub fn geometry(component: impl Into<String>, reason: impl Into<String>) -> Self {
        ConfigError::Geometry { component: component.into(), reason: reason.into() }
    }

    pub fn option(option: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::Option { option, reason: reason.into() }
    }
}

// ---------------------------------------------------------------------------
// Run-level failures
// ---------------------------------------------------------------------------

/// Physical conditions under which a flight cannot be continued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortReason {
    NoMotorsDefined,
    NoActiveStages,
    NoMotorsFired,
    NoLiftoff,
    DeployUnderThrust,
    TumbleUnderThrust,
    ActiveMassZero,
}

impl std::fmt::Display for AbortReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            AbortReason::NoMotorsDefined => "no motors defined in the simulation",
            AbortReason::NoActiveStages => "no active stages in the configuration",
            AbortReason::NoMotorsFired => "no motors fired during the simulation",
            AbortReason::NoLiftoff => "motor burnout without liftoff",
            AbortReason::DeployUnderThrust => "recovery device deployed while motor still burning",
            AbortReason::TumbleUnderThrust => "stage began to tumble under thrust",
            AbortReason::ActiveMassZero => "active stages have zero mass",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Error)]
pub enum SimulationError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("numerical failure at t={time:.4} s: {reason}")]
    Numerical { time: f64, reason: String },

    #[error("simulation aborted at t={time:.4} s: {reason}")]
    Aborted { time: f64, reason: AbortReason },

    #[error("listener '{listener}' failed: {reason}")]
    Listener { listener: String, reason: String },
}

impl SimulationError {
    pub fn numerical(time: f64, reason: impl Into<String>) -> Self {
        SimulationError::Numerical { time, reason: reason.into() }
    }

    pub fn abort_reason(&self) -> Option<AbortReason> {
        match self {
            SimulationError::Aborted { reason, .. } => Some(*reason),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_are_readable() {
        let e = ConfigError::LaunchAltitudeOutOfRange { altitude: 12000.0, limit: 11000.0 };
        assert!(e.to_string().contains("12000"));
        let s = SimulationError::Aborted { time: 1.5, reason: AbortReason::NoLiftoff };
        assert!(s.to_string().contains("without liftoff"));
        assert_eq!(s.abort_reason(), Some(AbortReason::NoLiftoff));
    }

    #[test]
    fn config_errors_convert() {
        let s: SimulationError = ConfigError::NonPositivePressure(-1.0).into();
        assert!(matches!(s, SimulationError::Config(_)));
    }
}
