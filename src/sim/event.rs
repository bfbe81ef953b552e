use std::fmt;

use serde::Serialize;

use crate::vehicle::ComponentId;

// ---------------------------------------------------------------------------
// Flight events
// ---------------------------------------------------------------------------

/// Kinds of discrete flight events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FlightEventType {
    Launch,
    Ignition,
    Liftoff,
    LaunchRod,
    Burnout,
    EjectionCharge,
    StageSeparation,
    Apogee,
    RecoveryDeviceDeployment,
    GroundHit,
    Tumble,
    SimulationEnd,
    /// Internal step marker; carries the altitude change of a step. Never logged.
    Altitude,
    /// A failure ended the branch.
    Exception,
}

impl FlightEventType {
    /// Whether the event is recorded in the branch's event log.
    pub fn is_logged(&self) -> bool {
        !matches!(self, FlightEventType::Altitude)
    }
}

impl fmt::Display for FlightEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FlightEventType::Launch => "LAUNCH",
            FlightEventType::Ignition => "IGNITION",
            FlightEventType::Liftoff => "LIFTOFF",
            FlightEventType::LaunchRod => "LAUNCHROD",
            FlightEventType::Burnout => "BURNOUT",
            FlightEventType::EjectionCharge => "EJECTION_CHARGE",
            FlightEventType::StageSeparation => "STAGE_SEPARATION",
            FlightEventType::Apogee => "APOGEE",
            FlightEventType::RecoveryDeviceDeployment => "RECOVERY_DEVICE_DEPLOYMENT",
            FlightEventType::GroundHit => "GROUND_HIT",
            FlightEventType::Tumble => "TUMBLE",
            FlightEventType::SimulationEnd => "SIMULATION_END",
            FlightEventType::Altitude => "ALTITUDE",
            FlightEventType::Exception => "EXCEPTION",
        };
        f.write_str(s)
    }
}

/// Optional event payload.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventData {
    /// Altitude before and after the step that produced the event.
    AltitudeCrossing { previous: f64, current: f64, previous_time: f64 },
    /// Index of the motor that produced an ignition/burnout/ejection event.
    Motor(usize),
}

/// A discrete event that occurred (or is scheduled) during flight.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlightEvent {
    pub time: f64,
    pub kind: FlightEventType,
    pub source: Option<ComponentId>,
    /// Stage number of the source component.
    pub stage: Option<usize>,
    pub data: Option<EventData>,
}

impl FlightEvent {
    pub fn new(time: f64, kind: FlightEventType) -> Self {
        Self { time, kind, source: None, stage: None, data: None }
    }

    pub fn with_source(mut self, source: ComponentId, stage: usize) -> Self {
        self.source = Some(source);
        self.stage = Some(stage);
        self
    }

    pub fn with_data(mut self, data: EventData) -> Self {
        self.data = Some(data);
        self
    }

    pub fn motor_index(&self) -> Option<usize> {
        match self.data {
            Some(EventData::Motor(i)) => Some(i),
            _ => None,
        }
    }
}

impl fmt::Display for FlightEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at t={:.3} s", self.kind, self.time)
    }
}

// ---------------------------------------------------------------------------
// Event queue
// ---------------------------------------------------------------------------

/// Pending events ordered by time; events with equal times keep insertion order.
#[derive(Debug, Clone, Default)]
pub struct EventQueue {
    events: Vec<FlightEvent>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, event: FlightEvent) {
        let at = self.events.partition_point(|e| e.time <= event.time);
        self.events.insert(at, event);
    }

    /// Remove the earliest event if it is due at or before `time`.
    pub fn pop_due(&mut self, time: f64) -> Option<FlightEvent> {
        match self.events.first() {
            Some(e) if e.time <= time => Some(self.events.remove(0)),
            _ => None,
        }
    }

    pub fn next_time(&self) -> Option<f64> {
        self.events.first().map(|e| e.time)
    }

    /// Earliest pending event time, ignoring internal step markers.
    pub fn next_logged_time(&self) -> Option<f64> {
        self.events.iter().find(|e| e.kind.is_logged()).map(|e| e.time)
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FlightEvent> {
        self.events.iter()
    }

    pub fn contains(&self, kind: FlightEventType) -> bool {
        self.events.iter().any(|e| e.kind == kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_orders_by_time_then_insertion() {
        let mut q = EventQueue::new();
        q.add(FlightEvent::new(2.0, FlightEventType::Burnout));
        q.add(FlightEvent::new(1.0, FlightEventType::Ignition));
        q.add(FlightEvent::new(2.0, FlightEventType::EjectionCharge));
        q.add(FlightEvent::new(0.0, FlightEventType::Launch));

        let kinds: Vec<_> = std::iter::from_fn(|| q.pop_due(10.0)).map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![
                FlightEventType::Launch,
                FlightEventType::Ignition,
                FlightEventType::Burnout,
                FlightEventType::EjectionCharge
            ]
        );
    }

    #[test]
    fn pop_due_respects_time() {
        let mut q = EventQueue::new();
        q.add(FlightEvent::new(5.0, FlightEventType::Apogee));
        assert!(q.pop_due(4.9).is_none());
        assert_eq!(q.next_time(), Some(5.0));
        assert!(q.pop_due(5.0).is_some());
        assert!(q.is_empty());
    }

    #[test]
    fn altitude_markers_are_not_logged() {
        assert!(!FlightEventType::Altitude.is_logged());
        assert!(FlightEventType::Apogee.is_logged());
        let mut q = EventQueue::new();
        q.add(FlightEvent::new(1.0, FlightEventType::Altitude));
        q.add(FlightEvent::new(2.0, FlightEventType::Apogee));
        assert_eq!(q.next_logged_time(), Some(2.0));
    }
}
