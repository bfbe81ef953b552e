use std::fmt;

use serde::Serialize;

use crate::sim::event::FlightEventType;

// ---------------------------------------------------------------------------
// Warnings: recorded, never fatal
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Warning {
    /// Angle of attack (rad) beyond the range the Barrowman method is valid for.
    LargeAoa(f64),
    /// Recovery device deployed at this speed, m/s.
    HighSpeedDeployment(f64),
    EventAfterLanding(FlightEventType),
    Supersonic,
    ThickFin,
    JaggedEdgedFin,
    ZeroAreaFin,
    ParallelFins,
    DiameterDiscontinuity,
    OpenAirframeForward,
    AirframeGap,
    AirframeOverlap,
    ZeroVolumeBody,
    TubeSeparation,
    TubeOverlap,
    NoRecoveryDevice,
    RecoveryLaunchRod,
    ListenersAffected,
    SeparationOrder,
    EarlySeparation,
    EmptyBranch,
    /// No body diameter to reference coefficients against; a fallback length was used.
    ZeroReferenceArea,
    /// Nose pressure drag extrapolated past the tabulated fineness ratios.
    FinenessExtrapolated,
    /// Body lift damped at low speed and high angle of attack.
    BodyLiftDamped,
}

impl Warning {
    /// Same kind, ignoring any payload.
    fn same_kind(&self, other: &Warning) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::LargeAoa(aoa) => write!(
                f,
                "Large angle of attack encountered ({:.1}°)",
                aoa.to_degrees()
            ),
            Warning::HighSpeedDeployment(v) => {
                write!(f, "Recovery device deployed at high speed ({:.1} m/s)", v)
            }
            Warning::EventAfterLanding(kind) => {
                write!(f, "Flight event {} occurred after landing", kind)
            }
            Warning::Supersonic => f.write_str("Body calculations may not be accurate at supersonic speeds"),
            Warning::ThickFin => f.write_str("Thick fins may not be modeled accurately"),
            Warning::JaggedEdgedFin => f.write_str("Jagged-edged fin predictions may be inaccurate"),
            Warning::ZeroAreaFin => f.write_str("Fin set has zero area"),
            Warning::ParallelFins => f.write_str("Too many parallel fins"),
            Warning::DiameterDiscontinuity => f.write_str("Discontinuity in rocket body diameter"),
            Warning::OpenAirframeForward => f.write_str("Forward end of airframe is open (radius > 0)"),
            Warning::AirframeGap => f.write_str("Gap in rocket airframe"),
            Warning::AirframeOverlap => f.write_str("Overlap in rocket airframe"),
            Warning::ZeroVolumeBody => f.write_str("Zero-volume body component"),
            Warning::TubeSeparation => f.write_str("Space between tube fins may not simulate accurately"),
            Warning::TubeOverlap => f.write_str("Overlapping tube fins may not simulate accurately"),
            Warning::NoRecoveryDevice => f.write_str("No recovery device for simulation"),
            Warning::RecoveryLaunchRod => f.write_str("Recovery device deployed while on the launch guide"),
            Warning::ListenersAffected => f.write_str("Listeners modified the flight simulation"),
            Warning::SeparationOrder => {
                f.write_str("Stages separated in an unreasonable order")
            }
            Warning::EarlySeparation => f.write_str("Stages separated before clearing the launch guide"),
            Warning::EmptyBranch => f.write_str("Simulation branch contains no data"),
            Warning::ZeroReferenceArea => {
                f.write_str("Rocket has no body diameter; a 1 cm reference length was used")
            }
            Warning::FinenessExtrapolated => {
                f.write_str("Nose cone fineness ratio outside the range of measured drag data")
            }
            Warning::BodyLiftDamped => {
                f.write_str("Body lift damped at low speed and high angle of attack")
            }
        }
    }
}

/// Ordered, deduplicated warning collection. Repeated warnings of the same kind
/// are kept once; for valued kinds the most severe value is kept.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WarningSet {
    warnings: Vec<Warning>,
}

impl WarningSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, warning: Warning) {
        if let Warning::EventAfterLanding(_) = warning {
            if !self.warnings.contains(&warning) {
                self.warnings.push(warning);
            }
            return;
        }
        let Some(index) = self.warnings.iter().position(|w| w.same_kind(&warning)) else {
            self.warnings.push(warning);
            return;
        };
        match (&mut self.warnings[index], warning) {
            (Warning::LargeAoa(old), Warning::LargeAoa(new)) => *old = old.max(new),
            (Warning::HighSpeedDeployment(old), Warning::HighSpeedDeployment(new)) => {
                *old = old.max(new)
            }
            _ => {}
        }
    }

    pub fn extend(&mut self, other: &WarningSet) {
        for w in &other.warnings {
            self.add(w.clone());
        }
    }

    pub fn contains(&self, predicate: impl Fn(&Warning) -> bool) -> bool {
        self.warnings.iter().any(predicate)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Warning> {
        self.warnings.iter()
    }

    pub fn len(&self) -> usize {
        self.warnings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.warnings.is_empty()
    }

    pub fn clear(&mut self) {
        self.warnings.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicates_collapse() {
        let mut set = WarningSet::new();
        set.add(Warning::ThickFin);
        set.add(Warning::ThickFin);
        set.add(Warning::Supersonic);
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn valued_warnings_keep_worst() {
        let mut set = WarningSet::new();
        set.add(Warning::LargeAoa(0.4));
        set.add(Warning::LargeAoa(0.9));
        set.add(Warning::LargeAoa(0.5));
        assert_eq!(set.len(), 1);
        assert!(set.contains(|w| *w == Warning::LargeAoa(0.9)));
    }

    #[test]
    fn display_is_human_readable() {
        assert!(Warning::HighSpeedDeployment(42.0).to_string().contains("42.0"));
    }
}
