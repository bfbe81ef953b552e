use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use serde::Serialize;

use crate::sim::batch::BatchStatistics;
use crate::sim::data::BranchSummary;
use crate::sim::event::FlightEvent;
use crate::sim::runner::{SimulationOutcome, SimulationResult};

/// Machine-readable report of one simulated flight.
#[derive(Debug, Clone, Serialize)]
pub struct FlightSummary {
    pub rocket: String,
    /// `succeeded`, `failed` or `cancelled`.
    pub outcome: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub branches: Vec<BranchReport>,
    pub warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch: Option<BatchStatistics>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BranchReport {
    #[serde(flatten)]
    pub summary: BranchSummary,
    pub events: Vec<FlightEvent>,
}

impl FlightSummary {
    pub fn from_result(rocket: impl Into<String>, result: &SimulationResult) -> Self {
        let outcome = match result.outcome {
            SimulationOutcome::Succeeded => "succeeded",
            SimulationOutcome::Failed(_) => "failed",
            SimulationOutcome::Cancelled => "cancelled",
        };
        Self {
            rocket: rocket.into(),
            outcome,
            error: result.outcome.error().map(|e| e.to_string()),
            branches: result
                .branches
                .iter()
                .map(|b| BranchReport { summary: b.summary(), events: b.events().to_vec() })
                .collect(),
            warnings: result.warnings.iter().map(|w| w.to_string()).collect(),
            batch: None,
        }
    }

    pub fn with_batch(mut self, stats: BatchStatistics) -> Self {
        self.batch = Some(stats);
        self
    }
}

/// Write a summary as pretty-printed JSON. Values that never occurred are `null`.
pub fn write_summary<W: Write>(writer: &mut W, summary: &FlightSummary) -> io::Result<()> {
    serde_json::to_writer_pretty(&mut *writer, summary)?;
    writeln!(writer)
}

pub fn write_summary_file(path: impl AsRef<Path>, summary: &FlightSummary) -> io::Result<()> {
    let mut file = BufWriter::new(File::create(path)?);
    write_summary(&mut file, summary)?;
    file.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AbortReason, SimulationError};
    use crate::sim::data::{FlightDataBranch, FlightDataType};
    use crate::sim::event::FlightEventType;
    use crate::warning::{Warning, WarningSet};

    fn result(outcome: SimulationOutcome) -> SimulationResult {
        let mut b = FlightDataBranch::new("Sustainer");
        for (t, z) in [(0.0, 0.0), (5.0, 120.0), (10.0, 0.0)] {
            b.add_point();
            b.set_value(FlightDataType::Time, t);
            b.set_value(FlightDataType::Altitude, z);
        }
        b.add_event(FlightEvent::new(5.0, FlightEventType::Apogee));
        let mut warnings = WarningSet::new();
        warnings.add(Warning::NoRecoveryDevice);
        SimulationResult { branches: vec![b], warnings, outcome }
    }

    #[test]
    fn json_carries_summary_events_and_warnings() {
        let summary = FlightSummary::from_result("Alpha", &result(SimulationOutcome::Succeeded));
        let mut buf = Vec::new();
        write_summary(&mut buf, &summary).unwrap();
        let v: serde_json::Value = serde_json::from_slice(&buf).unwrap();

        assert_eq!(v["rocket"], "Alpha");
        assert_eq!(v["outcome"], "succeeded");
        assert!(v.get("error").is_none());
        assert_eq!(v["branches"][0]["name"], "Sustainer");
        assert_eq!(v["branches"][0]["max_altitude"], 120.0);
        assert_eq!(v["branches"][0]["events"][0]["kind"], "APOGEE");
        // never landed
        assert!(v["branches"][0]["ground_hit_velocity"].is_null());
        assert_eq!(v["warnings"][0], "No recovery device for simulation");
    }

    #[test]
    fn failure_is_reported() {
        let e = SimulationError::Aborted { time: 0.0, reason: AbortReason::NoMotorsFired };
        let summary = FlightSummary::from_result("Alpha", &result(SimulationOutcome::Failed(e)));
        assert_eq!(summary.outcome, "failed");
        assert!(summary.error.unwrap().contains("no motors fired"));
    }
}
