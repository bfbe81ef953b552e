use serde::{Deserialize, Serialize};

use crate::sim::event::{EventData, FlightEvent, FlightEventType};

// ---------------------------------------------------------------------------
// Recovery device deployment
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeployEvent {
    Launch,
    /// Ejection charge of a motor in the device's own stage.
    Ejection,
    Apogee,
    /// Descending through the configured altitude after apogee.
    Altitude,
    LowerStageSeparation,
    CurrentStageSeparation,
    Never,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DeploymentConfig {
    pub event: DeployEvent,
    pub delay: f64,    // s after the trigger
    pub altitude: f64, // m, for `DeployEvent::Altitude`
}

impl Default for DeploymentConfig {
    fn default() -> Self {
        Self { event: DeployEvent::Ejection, delay: 0.0, altitude: 200.0 }
    }
}

impl DeploymentConfig {
    pub fn new(event: DeployEvent) -> Self {
        Self { event, ..Default::default() }
    }

    pub fn delay(mut self, v: f64) -> Self { self.delay = v; self }
    pub fn altitude(mut self, v: f64) -> Self { self.altitude = v; self }

    /// Whether `event` triggers deployment of a device in `stage`.
    pub fn is_triggered_by(&self, event: &FlightEvent, stage: usize, apogee_reached: bool) -> bool {
        match self.event {
            DeployEvent::Launch => event.kind == FlightEventType::Launch,
            DeployEvent::Ejection => {
                event.kind == FlightEventType::EjectionCharge && event.stage == Some(stage)
            }
            DeployEvent::Apogee => event.kind == FlightEventType::Apogee,
            DeployEvent::Altitude => {
                if event.kind != FlightEventType::Altitude || !apogee_reached {
                    return false;
                }
                match event.data {
                    Some(EventData::AltitudeCrossing { previous, current, .. }) => {
                        previous >= self.altitude && current <= self.altitude
                    }
                    _ => false,
                }
            }
            DeployEvent::LowerStageSeparation => {
                event.kind == FlightEventType::StageSeparation && event.stage == Some(stage + 1)
            }
            DeployEvent::CurrentStageSeparation => {
                event.kind == FlightEventType::StageSeparation && event.stage == Some(stage)
            }
            DeployEvent::Never => false,
        }
    }

    /// Time at which the trigger actually happened. Altitude crossings are
    /// interpolated inside the step that produced them.
    pub fn trigger_time(&self, event: &FlightEvent) -> f64 {
        match (self.event, event.data) {
            (
                DeployEvent::Altitude,
                Some(EventData::AltitudeCrossing { previous, current, previous_time }),
            ) if previous > current => {
                let f = (previous - self.altitude) / (previous - current);
                previous_time + f * (event.time - previous_time)
            }
            _ => event.time,
        }
    }
}

// ---------------------------------------------------------------------------
// Stage separation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeparationEvent {
    /// Ignition of the stage directly above.
    UpperIgnition,
    Ignition,
    Burnout,
    Ejection,
    Launch,
    Never,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeparationConfig {
    pub event: SeparationEvent,
    pub delay: f64,
}

impl Default for SeparationConfig {
    fn default() -> Self {
        Self { event: SeparationEvent::UpperIgnition, delay: 0.0 }
    }
}

impl SeparationConfig {
    pub fn new(event: SeparationEvent, delay: f64) -> Self {
        Self { event, delay }
    }

    pub fn is_triggered_by(&self, event: &FlightEvent, stage: usize) -> bool {
        match self.event {
            SeparationEvent::UpperIgnition => {
                event.kind == FlightEventType::Ignition && event.stage.map(|s| s + 1) == Some(stage)
            }
            SeparationEvent::Ignition => {
                event.kind == FlightEventType::Ignition && event.stage == Some(stage)
            }
            SeparationEvent::Burnout => {
                event.kind == FlightEventType::Burnout && event.stage == Some(stage)
            }
            SeparationEvent::Ejection => {
                event.kind == FlightEventType::EjectionCharge && event.stage == Some(stage)
            }
            SeparationEvent::Launch => event.kind == FlightEventType::Launch,
            SeparationEvent::Never => false,
        }
    }
}
